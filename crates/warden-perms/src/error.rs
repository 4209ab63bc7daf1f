//! Error types for the permissions module.

use thiserror::Error;

use warden_core::{CoreError, ValidationError};

/// Errors that can occur during registry operations.
///
/// Missing groups and principals are not errors; those operations report
/// `false` or `None` instead.
#[derive(Debug, Error)]
pub enum PermsError {
    /// A caller-supplied value was rejected before any mutation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A snapshot could not be turned into registry state.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
