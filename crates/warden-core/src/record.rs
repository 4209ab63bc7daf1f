//! Permission records: the atomic grant or denial of one node.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::time::Timestamp;
use crate::types::{is_wildcard, validate_node};

/// A grant (`value = true`) or explicit denial (`value = false`) of one node.
///
/// An owner (group or principal) holds at most one record per node. A later
/// grant on the same node replaces the earlier record outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    /// Dot-separated capability, or `*`.
    pub node: String,

    /// True grants, false denies.
    pub value: bool,

    /// When the record stops applying (Unix ms). `None` is permanent.
    pub expires_at: Option<Timestamp>,

    /// Who issued the record.
    pub granted_by: Option<String>,

    /// Why it was issued.
    pub reason: Option<String>,
}

impl PermissionRecord {
    /// Create a permanent record with no provenance.
    pub fn new(node: impl Into<String>, value: bool) -> Self {
        Self {
            node: node.into(),
            value,
            expires_at: None,
            granted_by: None,
            reason: None,
        }
    }

    /// Shorthand for a permanent grant.
    pub fn allow(node: impl Into<String>) -> Self {
        Self::new(node, true)
    }

    /// Shorthand for a permanent denial.
    pub fn deny(node: impl Into<String>) -> Self {
        Self::new(node, false)
    }

    /// Set the expiry time.
    pub fn expires_at(mut self, timestamp: Timestamp) -> Self {
        self.expires_at = Some(timestamp);
        self
    }

    /// Record who granted this.
    pub fn granted_by(mut self, who: impl Into<String>) -> Self {
        self.granted_by = Some(who.into());
        self
    }

    /// Record why this was granted.
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Whether the record has expired at `now`.
    ///
    /// A record is still in force at exactly `expires_at`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        matches!(self.expires_at, Some(expires) if now > expires)
    }

    /// Whether the record applies at `now`.
    pub fn is_valid(&self, now: Timestamp) -> bool {
        !self.is_expired(now)
    }

    /// Whether this record is for the wildcard node.
    pub fn is_wildcard(&self) -> bool {
        is_wildcard(&self.node)
    }

    /// Whether the record never expires.
    pub fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }

    /// Check the node.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_node(&self.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiration_boundary() {
        let record = PermissionRecord::allow("fly").expires_at(1000);

        assert!(record.is_valid(500)); // Before expiration
        assert!(record.is_valid(1000)); // At expiration
        assert!(record.is_expired(1001)); // After expiration
    }

    #[test]
    fn test_permanent_never_expires() {
        let record = PermissionRecord::deny("admin.kick");
        assert!(record.is_permanent());
        assert!(record.is_valid(i64::MAX));
        assert!(!record.value);
    }

    #[test]
    fn test_builder_provenance() {
        let record = PermissionRecord::allow("*")
            .granted_by("console")
            .reason("server owner");

        assert!(record.is_wildcard());
        assert_eq!(record.granted_by.as_deref(), Some("console"));
        assert_eq!(record.reason.as_deref(), Some("server owner"));
    }

    #[test]
    fn test_validate_rejects_empty_node() {
        assert_eq!(
            PermissionRecord::allow("").validate(),
            Err(ValidationError::EmptyNode)
        );
    }
}
