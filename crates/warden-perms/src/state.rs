//! Permission state: both registries plus the rules that span them.
//!
//! `PermissionState` is the unit the engine puts behind its lock. Operations
//! that touch groups and principals together (deleting a group, joining a
//! group that must exist) live here so they stay atomic under that lock.

use std::collections::BTreeSet;

use warden_core::{
    group_key, validate_group_name, Group, PermissionRecord, PrincipalId, PrincipalPermissions,
    Snapshot, Timestamp,
};

use crate::error::Result;
use crate::groups::{GroupRegistry, DEFAULT_GROUP};
use crate::principals::PrincipalRegistry;
use crate::resolve::{Resolution, Resolver, DEFAULT_MAX_DEPTH};
use crate::sweep::{sweep_expired, SweepReport};

/// Groups and principals, mutated together.
#[derive(Debug, Clone)]
pub struct PermissionState {
    groups: GroupRegistry,
    principals: PrincipalRegistry,
    max_depth: usize,
}

impl Default for PermissionState {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP, true, DEFAULT_MAX_DEPTH)
    }
}

impl PermissionState {
    /// Create a state, optionally seeded with the built-in groups.
    pub fn new(default_group: &str, seed_builtins: bool, max_depth: usize) -> Self {
        let groups = if seed_builtins {
            GroupRegistry::with_builtins()
        } else {
            GroupRegistry::new()
        };
        Self {
            groups,
            principals: PrincipalRegistry::new(default_group),
            max_depth,
        }
    }

    /// Rebuild state from a snapshot, validating it first.
    ///
    /// Nothing is seeded: the snapshot is the whole truth.
    pub fn from_snapshot(snapshot: Snapshot, default_group: &str, max_depth: usize) -> Result<Self> {
        snapshot.validate()?;
        Ok(Self {
            groups: GroupRegistry::from_groups(snapshot.groups),
            principals: PrincipalRegistry::from_principals(default_group, snapshot.principals),
            max_depth,
        })
    }

    /// Copy the full state into a snapshot.
    pub fn snapshot(&self, now: Timestamp) -> Snapshot {
        Snapshot::new(
            now,
            self.groups.iter().cloned().collect(),
            self.principals.iter().cloned().collect(),
        )
    }

    /// The group registry.
    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    /// The principal registry.
    pub fn principals(&self) -> &PrincipalRegistry {
        &self.principals
    }

    /// A resolver over the current state.
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.groups, &self.principals).with_max_depth(self.max_depth)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Group Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a group; `None` if the name is taken.
    pub fn create_group(
        &mut self,
        name: &str,
        display_name: Option<&str>,
        description: Option<&str>,
        priority: i32,
    ) -> Result<Option<Group>> {
        let created = self.groups.create(name, display_name, description, priority)?;
        if created.is_some() {
            tracing::debug!(group = name, priority, "group created");
        }
        Ok(created)
    }

    /// Delete a group and strip it from every principal.
    ///
    /// Other groups' inheritance lists are left alone; the dangling
    /// references are skipped at resolution time.
    pub fn delete_group(&mut self, name: &str, now: Timestamp) -> bool {
        if self.groups.remove(name).is_none() {
            return false;
        }
        let touched = self.principals.strip_group(name, now);
        tracing::debug!(group = name, principals = touched, "group deleted");
        true
    }

    /// Look up a group (case-insensitive).
    pub fn get_group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// Replace a group wholesale, inserting it if absent.
    pub fn update_group(&mut self, group: Group) -> Result<bool> {
        let name = group.name.clone();
        let replaced = self.groups.upsert(group)?;
        tracing::debug!(group = %name, replaced, "group updated");
        Ok(replaced)
    }

    /// All groups, highest priority first.
    pub fn list_groups(&self) -> Vec<&Group> {
        self.groups.list()
    }

    /// Add or replace a record on a group. `false` if the group is missing.
    pub fn set_group_permission(&mut self, name: &str, record: PermissionRecord) -> Result<bool> {
        let node = record.node.clone();
        let value = record.value;
        let set = self.groups.set_permission(name, record)?;
        if set {
            tracing::debug!(group = name, node = %node, value, "group permission set");
        }
        Ok(set)
    }

    /// Remove a record from a group.
    pub fn remove_group_permission(&mut self, name: &str, node: &str) -> bool {
        self.groups.remove_permission(name, node)
    }

    /// Make `group` inherit from `parent`.
    ///
    /// The parent need not exist yet, and cycles are accepted. Returns
    /// `false` if `group` is missing or already inherits `parent`.
    pub fn add_inheritance(&mut self, group: &str, parent: &str) -> Result<bool> {
        validate_group_name(parent)?;
        Ok(self
            .groups
            .get_mut(group)
            .map(|g| g.add_parent(parent.trim()))
            .unwrap_or(false))
    }

    /// Stop `group` inheriting from `parent`.
    pub fn remove_inheritance(&mut self, group: &str, parent: &str) -> bool {
        self.groups
            .get_mut(group)
            .map(|g| g.remove_parent(parent))
            .unwrap_or(false)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Principal Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a principal's set, creating the default one if unseen.
    pub fn get_or_create(&mut self, id: &PrincipalId, now: Timestamp) -> Result<&PrincipalPermissions> {
        Ok(self.principals.get_or_create(id, now)?)
    }

    /// Look up a principal's set without creating it.
    pub fn principal(&self, id: &PrincipalId) -> Option<&PrincipalPermissions> {
        self.principals.get(id)
    }

    /// Insert or replace a direct record on a principal.
    pub fn set_direct_permission(
        &mut self,
        id: &PrincipalId,
        record: PermissionRecord,
        now: Timestamp,
    ) -> Result<()> {
        let node = record.node.clone();
        let value = record.value;
        let expires_at = record.expires_at;
        self.principals.set_direct_permission(id, record, now)?;
        tracing::debug!(principal = %id, node = %node, value, ?expires_at, "direct permission set");
        Ok(())
    }

    /// Remove a direct record. `true` if something was removed.
    pub fn remove_direct_permission(&mut self, id: &PrincipalId, node: &str, now: Timestamp) -> bool {
        self.principals.remove_direct_permission(id, node, now)
    }

    /// Add a principal to an existing group.
    ///
    /// Returns `false`, without creating anything, if the group does not
    /// exist. Joining a group twice is a no-op that still returns `true`.
    pub fn add_to_group(&mut self, id: &PrincipalId, group: &str, now: Timestamp) -> Result<bool> {
        validate_group_name(group)?;
        id.validate()?;
        if !self.groups.contains(group) {
            tracing::debug!(principal = %id, group, "refusing membership in unknown group");
            return Ok(false);
        }
        if self.principals.add_to_group(id, group, now)? {
            tracing::debug!(principal = %id, group, "joined group");
        }
        Ok(true)
    }

    /// Remove a principal from a group. `true` if the membership existed.
    pub fn remove_from_group(&mut self, id: &PrincipalId, group: &str, now: Timestamp) -> Result<bool> {
        self.principals.remove_from_group(id, group, now)
    }

    /// Forget a principal.
    pub fn remove_principal(&mut self, id: &PrincipalId) -> bool {
        self.principals.remove(id).is_some()
    }

    /// All known principal ids, sorted.
    pub fn list_principals(&self) -> Vec<PrincipalId> {
        self.principals.ids()
    }

    /// Direct memberships in resolution order.
    pub fn groups_of(&self, id: &PrincipalId) -> Vec<String> {
        self.principals.groups_of(id)
    }

    /// Whether `id` is a direct member of `group`. Inherited groups do not count.
    pub fn is_in_group(&self, id: &PrincipalId, group: &str) -> bool {
        let key = group_key(group);
        self.groups_of(id).iter().any(|g| *g == key)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `id` holds `node` at `now`.
    pub fn has_permission(&self, id: &PrincipalId, node: &str, now: Timestamp) -> bool {
        self.resolver().has_permission(id, node, now)
    }

    /// Resolve and report the deciding record.
    pub fn resolve(&self, id: &PrincipalId, node: &str, now: Timestamp) -> Resolution {
        self.resolver().resolve(id, node, now)
    }

    /// Nodes that currently resolve to `true`.
    pub fn effective_permissions(
        &self,
        id: &PrincipalId,
        include_groups: bool,
        now: Timestamp,
    ) -> BTreeSet<String> {
        self.resolver().effective_permissions(id, include_groups, now)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Count memberships and inheritance entries that name a missing group.
    pub fn dangling_references(&self) -> usize {
        let memberships = self
            .principals
            .iter()
            .flat_map(|p| p.groups.iter())
            .filter(|g| !self.groups.contains(g))
            .count();
        let parents = self
            .groups
            .iter()
            .flat_map(|g| g.inherited_groups.iter())
            .filter(|parent| !self.groups.contains(parent))
            .count();
        memberships + parents
    }

    /// Remove every expired record.
    pub fn sweep_expired(&mut self, now: Timestamp) -> SweepReport {
        sweep_expired(&mut self.groups, &mut self.principals, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::CoreError;

    use crate::error::PermsError;

    fn id(s: &str) -> PrincipalId {
        PrincipalId::from(s)
    }

    #[test]
    fn test_add_to_unknown_group_fails_without_mutation() {
        let mut state = PermissionState::default();
        assert!(!state.add_to_group(&id("p"), "ghost", 1).unwrap());
        assert!(state.principal(&id("p")).is_none());

        assert!(state.add_to_group(&id("p"), "Moderator", 1).unwrap());
        assert!(state.add_to_group(&id("p"), "moderator", 2).unwrap());
        assert_eq!(
            state.groups_of(&id("p")),
            vec!["default".to_string(), "moderator".to_string()]
        );
    }

    #[test]
    fn test_delete_group_strips_memberships() {
        let mut state = PermissionState::default();
        state.add_to_group(&id("p"), "admin", 1).unwrap();
        state.remove_from_group(&id("p"), "default", 1).unwrap();

        assert!(state.delete_group("ADMIN", 5));
        assert!(state.groups_of(&id("p")).is_empty());
        assert_eq!(state.principal(&id("p")).unwrap().last_updated, 5);
        assert!(!state.has_permission(&id("p"), "anything", 5));
        assert!(!state.delete_group("admin", 6));
    }

    #[test]
    fn test_delete_group_leaves_dangling_inheritance() {
        let mut state = PermissionState::default();
        state.add_to_group(&id("m"), "moderator", 1).unwrap();
        state.remove_from_group(&id("m"), "default", 1).unwrap();

        assert!(state.delete_group("default", 2));
        assert_eq!(
            state.get_group("moderator").unwrap().inherited_groups,
            vec!["default".to_string()]
        );
        assert!(state.has_permission(&id("m"), "admin.kick", 2));
        assert!(!state.has_permission(&id("m"), "basic.chat", 2));
    }

    #[test]
    fn test_inheritance_management() {
        let mut state = PermissionState::default();
        state.create_group("vip", None, None, 10).unwrap();

        assert!(state.add_inheritance("vip", "future").unwrap());
        assert!(!state.add_inheritance("vip", "FUTURE").unwrap());
        assert!(!state.add_inheritance("ghost", "default").unwrap());
        assert!(state.add_inheritance("vip", "").is_err());

        assert!(state.remove_inheritance("vip", "future"));
        assert!(!state.remove_inheritance("vip", "future"));
    }

    #[test]
    fn test_is_in_group_is_direct_only() {
        let mut state = PermissionState::default();
        state.add_to_group(&id("p"), "moderator", 1).unwrap();

        assert!(state.is_in_group(&id("p"), "MODERATOR"));
        assert!(state.is_in_group(&id("p"), "default"));
        assert!(!state.is_in_group(&id("p"), "admin"));
        assert!(state.is_in_group(&id("unseen"), "default"));
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut state = PermissionState::default();
        state.create_group("vip", Some("V.I.P."), Some("paying"), 50).unwrap();
        state
            .set_group_permission("vip", PermissionRecord::allow("fly").granted_by("shop"))
            .unwrap();
        state.add_to_group(&id("p"), "vip", 1).unwrap();

        let snapshot = state.snapshot(10);
        let restored = PermissionState::from_snapshot(snapshot.clone(), "default", 64).unwrap();

        assert_eq!(restored.snapshot(10), snapshot);
        assert!(restored.has_permission(&id("p"), "fly", 10));
    }

    #[test]
    fn test_from_snapshot_rejects_invalid() {
        let mut snapshot = PermissionState::default().snapshot(0);
        snapshot.groups.push(Group::new(""));

        assert!(matches!(
            PermissionState::from_snapshot(snapshot, "default", 64),
            Err(PermsError::Core(CoreError::InvalidSnapshot(_)))
        ));
    }

    #[test]
    fn test_dangling_references_counted() {
        let mut state = PermissionState::default();
        assert_eq!(state.dangling_references(), 0);

        state.create_group("orphan", None, None, 0).unwrap();
        state.add_inheritance("orphan", "nowhere").unwrap();
        state.get_or_create(&id("p"), 1).unwrap();
        assert!(state.delete_group("default", 2));

        // moderator -> default, orphan -> nowhere; p was stripped
        assert_eq!(state.dangling_references(), 2);
    }

    #[test]
    fn test_restored_memberships_fold_case() {
        let mut snapshot = PermissionState::default().snapshot(0);
        let mut p = PrincipalPermissions::new(id("p"), "default", 0);
        p.groups = vec!["Moderator".to_string(), "MODERATOR".to_string()];
        snapshot.principals.push(p);

        let mut state = PermissionState::from_snapshot(snapshot, "default", 64).unwrap();
        assert_eq!(state.groups_of(&id("p")), vec!["moderator"]);
        assert!(state.is_in_group(&id("p"), "moderator"));
        assert!(state.has_permission(&id("p"), "admin.kick", 1));

        assert!(state.delete_group("moderator", 2));
        assert!(state.groups_of(&id("p")).is_empty());

        // A recreated group must not pick the old membership back up
        state.create_group("moderator", None, None, 0).unwrap();
        state
            .set_group_permission("moderator", PermissionRecord::allow("x.y"))
            .unwrap();
        assert!(!state.has_permission(&id("p"), "x.y", 3));
    }
}
