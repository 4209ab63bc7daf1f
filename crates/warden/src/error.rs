//! Error types for the engine.

use thiserror::Error;
use warden_core::{CoreError, ValidationError};
use warden_perms::PermsError;
use warden_store::StoreError;

/// Errors that can occur during engine operations.
///
/// A permission that resolves to `false` is never an error, and neither is
/// a missing group or principal: those are reported as `false` / `None`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Validation error.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Registry or resolution error.
    #[error("permission error: {0}")]
    Permission(#[from] PermsError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Snapshot encoding or decoding error.
    #[error("snapshot error: {0}")]
    Core(#[from] CoreError),

    /// Configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The background sweeper task failed.
    #[error("sweeper task failed: {0}")]
    Sweeper(String),
}

impl EngineError {
    /// Whether this is a rejected input, however deeply it was wrapped.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_) | EngineError::Permission(PermsError::Validation(_))
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
