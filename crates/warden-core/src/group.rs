//! Groups: named, inheritable bundles of permission records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::record::PermissionRecord;
use crate::time::Timestamp;
use crate::types::{group_key, validate_group_name, validate_node};

/// A named bundle of permission records that may inherit from other groups.
///
/// `priority` orders groups for presentation only; resolution never reads it.
/// `inherited_groups` may name groups that do not exist and may form cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique name, compared case-insensitively.
    pub name: String,

    /// Human-readable name.
    pub display_name: String,

    /// Free-form description.
    pub description: String,

    /// Presentation order; higher sorts first.
    pub priority: i32,

    /// Records keyed by node.
    pub permissions: BTreeMap<String, PermissionRecord>,

    /// Parents, searched in order.
    pub inherited_groups: Vec<String>,
}

impl Group {
    /// Create an empty group. The display name defaults to `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            description: String::new(),
            priority: 0,
            permissions: BTreeMap::new(),
            inherited_groups: Vec::new(),
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Add a record, replacing any record on the same node.
    pub fn with_permission(mut self, record: PermissionRecord) -> Self {
        self.set_permission(record);
        self
    }

    /// Append a parent group.
    pub fn inherits(mut self, parent: impl Into<String>) -> Self {
        self.add_parent(parent);
        self
    }

    /// Registry key for this group.
    pub fn key(&self) -> String {
        group_key(&self.name)
    }

    /// Insert or replace the record for `record.node`.
    ///
    /// Returns the record it replaced.
    pub fn set_permission(&mut self, record: PermissionRecord) -> Option<PermissionRecord> {
        self.permissions.insert(record.node.clone(), record)
    }

    /// Remove the record for `node`.
    pub fn remove_permission(&mut self, node: &str) -> Option<PermissionRecord> {
        self.permissions.remove(node)
    }

    /// Get the record for exactly `node`.
    pub fn permission(&self, node: &str) -> Option<&PermissionRecord> {
        self.permissions.get(node)
    }

    /// Append `parent` unless already inherited (case-insensitive).
    ///
    /// Returns `true` if the list changed.
    pub fn add_parent(&mut self, parent: impl Into<String>) -> bool {
        let parent = parent.into();
        let key = group_key(&parent);
        if self.inherited_groups.iter().any(|p| group_key(p) == key) {
            return false;
        }
        self.inherited_groups.push(parent);
        true
    }

    /// Remove `parent` from the inheritance list (case-insensitive).
    pub fn remove_parent(&mut self, parent: &str) -> bool {
        let key = group_key(parent);
        let before = self.inherited_groups.len();
        self.inherited_groups.retain(|p| group_key(p) != key);
        self.inherited_groups.len() != before
    }

    /// Drop every record expired at `now`. Returns how many were dropped.
    pub fn purge_expired(&mut self, now: Timestamp) -> usize {
        let before = self.permissions.len();
        self.permissions.retain(|_, record| !record.is_expired(now));
        before - self.permissions.len()
    }

    /// Check the name, every record, and every parent name.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_group_name(&self.name)?;
        for (key, record) in &self.permissions {
            validate_node(key)?;
            if key != &record.node {
                return Err(ValidationError::MismatchedKey {
                    key: key.clone(),
                    node: record.node.clone(),
                });
            }
        }
        for parent in &self.inherited_groups {
            validate_group_name(parent)?;
        }
        Ok(())
    }
}
