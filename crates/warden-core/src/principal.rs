//! Principal permission sets: direct records plus group memberships.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::record::PermissionRecord;
use crate::time::Timestamp;
use crate::types::{group_key, validate_group_name, validate_node, PrincipalId};

/// Everything attached directly to one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalPermissions {
    /// Who this set belongs to.
    pub principal_id: PrincipalId,

    /// Group memberships (registry keys), in resolution order, without duplicates.
    pub groups: Vec<String>,

    /// Records attached to the principal itself, keyed by node.
    pub direct_permissions: BTreeMap<String, PermissionRecord>,

    /// Last mutation time (Unix ms).
    pub last_updated: Timestamp,
}

impl PrincipalPermissions {
    /// Create a set that belongs to `default_group` only.
    pub fn new(principal_id: PrincipalId, default_group: &str, now: Timestamp) -> Self {
        Self {
            principal_id,
            groups: vec![group_key(default_group)],
            direct_permissions: BTreeMap::new(),
            last_updated: now,
        }
    }

    /// Whether the principal belongs to `group` (case-insensitive).
    pub fn is_member_of(&self, group: &str) -> bool {
        let key = group_key(group);
        self.groups.iter().any(|g| *g == key)
    }

    /// Add a membership. Returns `true` if it was not already present.
    pub fn join(&mut self, group: &str, now: Timestamp) -> bool {
        if self.is_member_of(group) {
            return false;
        }
        self.groups.push(group_key(group));
        self.last_updated = now;
        true
    }

    /// Drop a membership. Returns `true` if it was present.
    pub fn leave(&mut self, group: &str, now: Timestamp) -> bool {
        let key = group_key(group);
        let before = self.groups.len();
        self.groups.retain(|g| *g != key);
        if self.groups.len() == before {
            return false;
        }
        self.last_updated = now;
        true
    }

    /// Insert or replace the direct record for `record.node`.
    pub fn set_permission(
        &mut self,
        record: PermissionRecord,
        now: Timestamp,
    ) -> Option<PermissionRecord> {
        self.last_updated = now;
        self.direct_permissions.insert(record.node.clone(), record)
    }

    /// Remove the direct record for `node`.
    pub fn remove_permission(&mut self, node: &str, now: Timestamp) -> Option<PermissionRecord> {
        let removed = self.direct_permissions.remove(node);
        if removed.is_some() {
            self.last_updated = now;
        }
        removed
    }

    /// Get the direct record for exactly `node`.
    pub fn permission(&self, node: &str) -> Option<&PermissionRecord> {
        self.direct_permissions.get(node)
    }

    /// Drop direct records expired at `now`, bumping `last_updated` if any went.
    pub fn purge_expired(&mut self, now: Timestamp) -> usize {
        let before = self.direct_permissions.len();
        self.direct_permissions
            .retain(|_, record| !record.is_expired(now));
        let removed = before - self.direct_permissions.len();
        if removed > 0 {
            self.last_updated = now;
        }
        removed
    }

    /// Case-fold memberships and drop repeats, keeping first positions.
    ///
    /// Sets built through `join` are already in this form; sets decoded from
    /// outside may not be. Returns `true` if anything changed.
    pub fn normalize_groups(&mut self) -> bool {
        let mut folded: Vec<String> = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            let key = group_key(group);
            if !folded.contains(&key) {
                folded.push(key);
            }
        }
        let changed = folded != self.groups;
        self.groups = folded;
        changed
    }

    /// Check the id, memberships, and records.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.principal_id.validate()?;
        for group in &self.groups {
            validate_group_name(group)?;
        }
        for (key, record) in &self.direct_permissions {
            validate_node(key)?;
            if key != &record.node {
                return Err(ValidationError::MismatchedKey {
                    key: key.clone(),
                    node: record.node.clone(),
                });
            }
        }
        Ok(())
    }
}
