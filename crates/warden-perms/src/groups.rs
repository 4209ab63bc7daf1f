//! The group registry.

use std::collections::HashMap;

use warden_core::{group_key, validate_group_name, Group, PermissionRecord, WILDCARD};

use crate::error::Result;

/// Name of the baseline group every new principal joins.
pub const DEFAULT_GROUP: &str = "default";

/// Name of the built-in moderation group.
pub const MODERATOR_GROUP: &str = "moderator";

/// Name of the built-in administrator group.
pub const ADMIN_GROUP: &str = "admin";

/// Nodes granted to the built-in moderator group.
pub const MODERATION_NODES: &[&str] = &["admin.kick", "admin.mute", "admin.warn", "moderation.view"];

/// Owns every group, keyed by case-folded name.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    groups: HashMap<String, Group>,
}

impl GroupRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with `default`, `moderator` and `admin`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for group in builtin_groups() {
            registry.groups.insert(group.key(), group);
        }
        registry
    }

    /// Build a registry from existing groups. Later duplicates win.
    pub fn from_groups(groups: impl IntoIterator<Item = Group>) -> Self {
        Self {
            groups: groups.into_iter().map(|g| (g.key(), g)).collect(),
        }
    }

    /// Create a new group.
    ///
    /// Returns `None` if a group with the same case-folded name exists.
    pub fn create(
        &mut self,
        name: &str,
        display_name: Option<&str>,
        description: Option<&str>,
        priority: i32,
    ) -> Result<Option<Group>> {
        validate_group_name(name)?;
        let key = group_key(name);
        if self.groups.contains_key(&key) {
            return Ok(None);
        }

        let mut group = Group::new(name.trim()).with_priority(priority);
        if let Some(display_name) = display_name {
            group.display_name = display_name.to_string();
        }
        if let Some(description) = description {
            group.description = description.to_string();
        }

        self.groups.insert(key, group.clone());
        Ok(Some(group))
    }

    /// Remove a group, returning it if it existed.
    pub fn remove(&mut self, name: &str) -> Option<Group> {
        self.groups.remove(&group_key(name))
    }

    /// Look up a group (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&Group> {
        self.groups.get(&group_key(name))
    }

    /// Look up a group mutably (case-insensitive).
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.groups.get_mut(&group_key(name))
    }

    /// Whether a group exists.
    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(&group_key(name))
    }

    /// Replace the stored group wholesale, inserting it if absent.
    ///
    /// Returns `true` if a group was replaced.
    pub fn upsert(&mut self, group: Group) -> Result<bool> {
        group.validate()?;
        Ok(self.groups.insert(group.key(), group).is_some())
    }

    /// Add or replace a record on a group. Returns `false` if the group is missing.
    pub fn set_permission(&mut self, name: &str, record: PermissionRecord) -> Result<bool> {
        record.validate()?;
        match self.get_mut(name) {
            Some(group) => {
                group.set_permission(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a record from a group. Returns `false` if nothing was removed.
    pub fn remove_permission(&mut self, name: &str, node: &str) -> bool {
        self.get_mut(name)
            .map(|group| group.remove_permission(node).is_some())
            .unwrap_or(false)
    }

    /// All groups, highest priority first, ties by name.
    pub fn list(&self) -> Vec<&Group> {
        let mut groups: Vec<&Group> = self.groups.values().collect();
        groups.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.key().cmp(&b.key()))
        });
        groups
    }

    /// Iterate over all groups in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Iterate mutably over all groups in no particular order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Group> {
        self.groups.values_mut()
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// The three groups a fresh registry starts with.
pub fn builtin_groups() -> Vec<Group> {
    let default = Group::new(DEFAULT_GROUP)
        .with_display_name("Default")
        .with_description("Baseline permissions for every principal")
        .with_priority(0)
        .with_permission(PermissionRecord::allow("basic.chat"))
        .with_permission(PermissionRecord::allow("basic.move"));

    let moderator = MODERATION_NODES
        .iter()
        .fold(
            Group::new(MODERATOR_GROUP)
                .with_display_name("Moderator")
                .with_description("Moderation tools")
                .with_priority(500),
            |group, node| group.with_permission(PermissionRecord::allow(*node)),
        )
        .inherits(DEFAULT_GROUP);

    let admin = Group::new(ADMIN_GROUP)
        .with_display_name("Administrator")
        .with_description("Full access")
        .with_priority(1000)
        .with_permission(PermissionRecord::allow(WILDCARD));

    vec![default, moderator, admin]
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::ValidationError;

    use crate::error::PermsError;

    #[test]
    fn test_builtins_are_seeded() {
        let registry = GroupRegistry::with_builtins();
        assert_eq!(registry.len(), 3);

        let moderator = registry.get("moderator").unwrap();
        assert_eq!(moderator.priority, 500);
        assert_eq!(moderator.inherited_groups, vec!["default".to_string()]);
        assert!(moderator.permission("admin.kick").unwrap().value);

        let admin = registry.get("admin").unwrap();
        assert!(admin.permission("*").unwrap().value);
    }

    #[test]
    fn test_create_rejects_duplicate_case_insensitive() {
        let mut registry = GroupRegistry::new();
        let vip = registry
            .create("VIP", Some("Very Important"), None, 10)
            .unwrap()
            .unwrap();
        assert_eq!(vip.name, "VIP");
        assert_eq!(vip.display_name, "Very Important");

        assert!(registry.create("vip", None, None, 0).unwrap().is_none());
        assert_eq!(registry.get("Vip").map(|g| g.priority), Some(10));
    }

    #[test]
    fn test_create_rejects_empty_name() {
        let mut registry = GroupRegistry::new();
        assert!(matches!(
            registry.create("  ", None, None, 0),
            Err(PermsError::Validation(ValidationError::EmptyGroupName))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_upsert_replaces_wholesale() {
        let mut registry = GroupRegistry::with_builtins();
        let replaced = registry
            .upsert(Group::new("Default").with_permission(PermissionRecord::allow("x.y")))
            .unwrap();
        assert!(replaced);

        let default = registry.get("default").unwrap();
        assert!(default.permission("basic.chat").is_none());
        assert!(default.permission("x.y").is_some());

        assert!(!registry.upsert(Group::new("new")).unwrap());
    }

    #[test]
    fn test_set_permission_validates_before_lookup() {
        let mut registry = GroupRegistry::with_builtins();
        assert!(registry.set_permission("default", PermissionRecord::allow("")).is_err());
        assert!(!registry
            .set_permission("missing", PermissionRecord::allow("a.b"))
            .unwrap());
        assert!(registry
            .set_permission("default", PermissionRecord::deny("basic.move"))
            .unwrap());
        assert!(!registry.get("default").unwrap().permission("basic.move").unwrap().value);
    }

    #[test]
    fn test_list_orders_by_priority() {
        let registry = GroupRegistry::with_builtins();
        let names: Vec<_> = registry.list().iter().map(|g| g.name.clone()).collect();
        assert_eq!(names, vec!["admin", "moderator", "default"]);
    }
}
