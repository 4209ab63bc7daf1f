//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_core::validate_group_name;
use warden_perms::{DEFAULT_GROUP, DEFAULT_MAX_DEPTH};

use crate::error::{EngineError, Result};

/// Default background sweep period.
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60_000;

/// Configuration for the [`Engine`](crate::Engine).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use warden::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{ "max_inheritance_depth": 8 }"#).unwrap();
/// assert_eq!(config.max_inheritance_depth, 8);
/// assert_eq!(config.default_group, "default");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Group every new principal starts in.
    pub default_group: String,
    /// Whether to seed the `default`, `moderator` and `admin` groups.
    pub seed_builtin_groups: bool,
    /// Bound on inheritance descent per resolution.
    pub max_inheritance_depth: usize,
    /// Period of the background sweeper.
    pub sweep_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_group: DEFAULT_GROUP.to_string(),
            seed_builtin_groups: true,
            max_inheritance_depth: DEFAULT_MAX_DEPTH,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values make sense together.
    pub fn validate(&self) -> Result<()> {
        validate_group_name(&self.default_group)
            .map_err(|e| EngineError::InvalidConfig(format!("default_group: {}", e)))?;
        if self.max_inheritance_depth == 0 {
            return Err(EngineError::InvalidConfig(
                "max_inheritance_depth must be at least 1".to_string(),
            ));
        }
        if self.sweep_interval_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "sweep_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The sweep period as a `Duration`.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}
