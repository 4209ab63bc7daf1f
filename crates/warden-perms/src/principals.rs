//! The principal registry.

use std::collections::HashMap;

use warden_core::{
    group_key, validate_group_name, PermissionRecord, PrincipalId, PrincipalPermissions,
    Timestamp,
};

use crate::error::Result;
use crate::groups::DEFAULT_GROUP;

/// Owns every principal permission set.
///
/// Sets are created lazily on first write or explicit [`get_or_create`];
/// read paths never create one.
///
/// [`get_or_create`]: PrincipalRegistry::get_or_create
#[derive(Debug, Clone)]
pub struct PrincipalRegistry {
    principals: HashMap<PrincipalId, PrincipalPermissions>,
    default_group: String,
}

impl Default for PrincipalRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP)
    }
}

impl PrincipalRegistry {
    /// Create an empty registry whose new principals join `default_group`.
    pub fn new(default_group: &str) -> Self {
        Self {
            principals: HashMap::new(),
            default_group: group_key(default_group),
        }
    }

    /// Build a registry from existing sets. Later duplicates win.
    ///
    /// Memberships are case-folded and deduplicated on the way in.
    pub fn from_principals(
        default_group: &str,
        principals: impl IntoIterator<Item = PrincipalPermissions>,
    ) -> Self {
        Self {
            principals: principals
                .into_iter()
                .map(|mut p| {
                    p.normalize_groups();
                    (p.principal_id.clone(), p)
                })
                .collect(),
            default_group: group_key(default_group),
        }
    }

    /// Key of the group new principals join.
    pub fn default_group(&self) -> &str {
        &self.default_group
    }

    /// Look up an existing set.
    pub fn get(&self, id: &PrincipalId) -> Option<&PrincipalPermissions> {
        self.principals.get(id)
    }

    /// Look up a set, creating it with the default membership if unseen.
    pub fn get_or_create(
        &mut self,
        id: &PrincipalId,
        now: Timestamp,
    ) -> Result<&mut PrincipalPermissions> {
        id.validate()?;
        let default_group = &self.default_group;
        Ok(self
            .principals
            .entry(id.clone())
            .or_insert_with(|| PrincipalPermissions::new(id.clone(), default_group, now)))
    }

    /// Memberships of `id`; an unseen principal reports the default membership.
    pub fn groups_of(&self, id: &PrincipalId) -> Vec<String> {
        match self.principals.get(id) {
            Some(principal) => principal.groups.clone(),
            None => vec![self.default_group.clone()],
        }
    }

    /// Insert or replace a direct record. Returns the record it replaced.
    pub fn set_direct_permission(
        &mut self,
        id: &PrincipalId,
        record: PermissionRecord,
        now: Timestamp,
    ) -> Result<Option<PermissionRecord>> {
        record.validate()?;
        Ok(self.get_or_create(id, now)?.set_permission(record, now))
    }

    /// Remove a direct record. Returns `true` if something was removed.
    pub fn remove_direct_permission(
        &mut self,
        id: &PrincipalId,
        node: &str,
        now: Timestamp,
    ) -> bool {
        self.principals
            .get_mut(id)
            .map(|principal| principal.remove_permission(node, now).is_some())
            .unwrap_or(false)
    }

    /// Add a membership without checking the group exists.
    ///
    /// Returns `true` if the membership was added.
    pub fn add_to_group(&mut self, id: &PrincipalId, group: &str, now: Timestamp) -> Result<bool> {
        validate_group_name(group)?;
        Ok(self.get_or_create(id, now)?.join(group, now))
    }

    /// Drop a membership. Returns `true` if it was present.
    ///
    /// An unseen principal is materialized first so that leaving the default
    /// group sticks.
    pub fn remove_from_group(
        &mut self,
        id: &PrincipalId,
        group: &str,
        now: Timestamp,
    ) -> Result<bool> {
        if !self.principals.contains_key(id) && group_key(group) != self.default_group {
            return Ok(false);
        }
        Ok(self.get_or_create(id, now)?.leave(group, now))
    }

    /// Remove `group` from every principal's memberships.
    ///
    /// Returns how many principals were touched.
    pub fn strip_group(&mut self, group: &str, now: Timestamp) -> usize {
        self.principals
            .values_mut()
            .filter_map(|principal| principal.leave(group, now).then_some(()))
            .count()
    }

    /// Forget a principal entirely.
    pub fn remove(&mut self, id: &PrincipalId) -> Option<PrincipalPermissions> {
        self.principals.remove(id)
    }

    /// All known principal ids, sorted.
    pub fn ids(&self) -> Vec<PrincipalId> {
        let mut ids: Vec<PrincipalId> = self.principals.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Iterate over all sets in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &PrincipalPermissions> {
        self.principals.values()
    }

    /// Iterate mutably over all sets in no particular order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PrincipalPermissions> {
        self.principals.values_mut()
    }

    /// Number of known principals.
    pub fn len(&self) -> usize {
        self.principals.len()
    }

    /// Whether no principal has been seen.
    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}
