//! Strong type definitions for Warden.
//!
//! Identifiers are newtypes so a principal id can never be passed where a
//! group name is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// The literal wildcard node.
pub const WILDCARD: &str = "*";

/// Opaque identifier of a principal (player or account).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Wrap an identifier. Emptiness is checked by [`PrincipalId::validate`].
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random 128-bit hex identifier.
    pub fn random() -> Self {
        Self(hex::encode(rand::random::<[u8; 16]>()))
    }

    /// Get the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reject blank identifiers.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.0.trim().is_empty() {
            return Err(ValidationError::EmptyPrincipalId);
        }
        Ok(())
    }
}

impl fmt::Debug for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrincipalId({})", self.0)
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PrincipalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for PrincipalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Registry key for a group name. Group names compare case-insensitively.
pub fn group_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Reject blank group names.
pub fn validate_group_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyGroupName);
    }
    Ok(())
}

/// Check a permission node: `*` or dot-separated, non-empty segments.
pub fn validate_node(node: &str) -> Result<(), ValidationError> {
    if node.is_empty() {
        return Err(ValidationError::EmptyNode);
    }
    if node.chars().any(char::is_whitespace) {
        return Err(ValidationError::NodeWhitespace(node.to_string()));
    }
    if node != WILDCARD && node.split('.').any(str::is_empty) {
        return Err(ValidationError::EmptyNodeSegment(node.to_string()));
    }
    Ok(())
}

/// Whether `node` is the universal wildcard.
pub fn is_wildcard(node: &str) -> bool {
    node == WILDCARD
}
