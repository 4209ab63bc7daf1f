//! Error types for the Warden core types.

use thiserror::Error;

/// Errors raised while encoding or decoding core types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(#[from] ValidationError),
}

/// Validation errors for values supplied by callers.
///
/// These are raised before any state is touched, so a rejected call never
/// leaves a partial mutation behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("permission node must not be empty")]
    EmptyNode,

    #[error("permission node {0:?} contains whitespace")]
    NodeWhitespace(String),

    #[error("permission node {0:?} has an empty segment")]
    EmptyNodeSegment(String),

    #[error("group name must not be empty")]
    EmptyGroupName,

    #[error("principal id must not be empty")]
    EmptyPrincipalId,

    #[error("record for {node:?} is stored under key {key:?}")]
    MismatchedKey { key: String, node: String },

    #[error("duplicate group {0:?}")]
    DuplicateGroup(String),

    #[error("duplicate principal {0:?}")]
    DuplicatePrincipal(String),
}
