//! The Engine: one explicitly constructed handle over all permission state.
//!
//! The engine owns a single lock around the group and principal registries.
//! Every public operation holds it for its whole, synchronous duration, so
//! concurrent callers are linearized and a mutation is visible to the very
//! next query. Persistence never performs I/O under the lock.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use warden_core::{
    duration_millis, Clock, Group, PermissionRecord, PrincipalId, PrincipalPermissions, Snapshot,
    SystemClock, Timestamp,
};
use warden_perms::{PermissionState, Resolution, SweepReport};
use warden_store::SnapshotStore;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::sweeper::{spawn_sweeper, SweeperHandle};

/// The permission engine.
///
/// Provides a unified API for:
/// - Managing groups, their records and their inheritance
/// - Managing principals, their memberships and direct records
/// - Answering permission queries
/// - Sweeping expired records
/// - Saving to and loading from a [`SnapshotStore`]
///
/// Share it between tasks as `Arc<Engine>`.
pub struct Engine {
    /// Both registries, behind one lock.
    state: Mutex<PermissionState>,
    /// Source of "now" for expiry checks and timestamps.
    clock: Arc<dyn Clock>,
    /// Configuration.
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine on the system clock.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an engine with an injected clock.
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let mut state = PermissionState::new(
            &config.default_group,
            config.seed_builtin_groups,
            config.max_inheritance_depth,
        );
        if config.seed_builtin_groups && state.get_group(&config.default_group).is_none() {
            state.create_group(&config.default_group, None, None, 0)?;
        }

        tracing::debug!(
            default_group = %config.default_group,
            seeded = config.seed_builtin_groups,
            max_depth = config.max_inheritance_depth,
            "engine created"
        );

        Ok(Self {
            state: Mutex::new(state),
            clock,
            config,
        })
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current time according to the engine's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // Poisoning is recovered from: registry mutations are single-step.
    fn state(&self) -> MutexGuard<'_, PermissionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Group Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a group. Returns `None` if the (case-folded) name is taken.
    pub fn create_group(
        &self,
        name: &str,
        display_name: Option<&str>,
        description: Option<&str>,
        priority: i32,
    ) -> Result<Option<Group>> {
        Ok(self
            .state()
            .create_group(name, display_name, description, priority)?)
    }

    /// Delete a group and strip it from every principal's memberships.
    pub fn delete_group(&self, name: &str) -> bool {
        let now = self.now();
        self.state().delete_group(name, now)
    }

    /// Look up a group by name, ignoring case.
    pub fn get_group(&self, name: &str) -> Option<Group> {
        self.state().get_group(name).cloned()
    }

    /// Replace (or insert) a group wholesale. Returns `true` if one was replaced.
    pub fn update_group(&self, group: Group) -> Result<bool> {
        Ok(self.state().update_group(group)?)
    }

    /// All groups, highest priority first, ties by name.
    pub fn list_groups(&self) -> Vec<Group> {
        self.state().list_groups().into_iter().cloned().collect()
    }

    /// Add or replace a record on a group. `false` if the group is missing.
    pub fn set_group_permission(&self, group: &str, record: PermissionRecord) -> Result<bool> {
        Ok(self.state().set_group_permission(group, record)?)
    }

    /// Remove a record from a group.
    pub fn remove_group_permission(&self, group: &str, node: &str) -> bool {
        self.state().remove_group_permission(group, node)
    }

    /// Make `group` inherit from `parent`. Cycles are accepted.
    pub fn add_inheritance(&self, group: &str, parent: &str) -> Result<bool> {
        Ok(self.state().add_inheritance(group, parent)?)
    }

    /// Stop `group` inheriting from `parent`.
    pub fn remove_inheritance(&self, group: &str, parent: &str) -> bool {
        self.state().remove_inheritance(group, parent)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Principal Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a principal's permission set, creating the default one if unseen.
    pub fn get_or_create(&self, principal: &PrincipalId) -> Result<PrincipalPermissions> {
        let now = self.now();
        Ok(self.state().get_or_create(principal, now)?.clone())
    }

    /// Get a principal's permission set without creating it.
    pub fn principal(&self, principal: &PrincipalId) -> Option<PrincipalPermissions> {
        self.state().principal(principal).cloned()
    }

    /// Insert or replace a direct record on a principal.
    pub fn set_direct_permission(
        &self,
        principal: &PrincipalId,
        record: PermissionRecord,
    ) -> Result<()> {
        let now = self.now();
        Ok(self.state().set_direct_permission(principal, record, now)?)
    }

    /// Grant (or deny) `node` directly, permanently.
    pub fn grant(&self, principal: &PrincipalId, node: &str, value: bool) -> Result<()> {
        self.set_direct_permission(principal, PermissionRecord::new(node, value))
    }

    /// Grant (or deny) `node` directly until `duration` from now.
    ///
    /// Returns the expiry timestamp. The record stays valid up to and
    /// including that instant.
    pub fn grant_temporary(
        &self,
        principal: &PrincipalId,
        node: &str,
        value: bool,
        duration: Duration,
    ) -> Result<Timestamp> {
        let now = self.now();
        let expires_at = now.saturating_add(duration_millis(duration));
        let record = PermissionRecord::new(node, value).expires_at(expires_at);
        self.state().set_direct_permission(principal, record, now)?;
        Ok(expires_at)
    }

    /// Remove a direct record. `true` if something was removed.
    pub fn remove_direct_permission(&self, principal: &PrincipalId, node: &str) -> bool {
        let now = self.now();
        self.state().remove_direct_permission(principal, node, now)
    }

    /// The direct records of a principal, sorted by node.
    pub fn direct_permissions_of(&self, principal: &PrincipalId) -> Vec<PermissionRecord> {
        self.state()
            .principal(principal)
            .map(|p| p.direct_permissions.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Add a principal to an existing group.
    ///
    /// Returns `false`, changing nothing, if the group does not exist.
    pub fn add_to_group(&self, principal: &PrincipalId, group: &str) -> Result<bool> {
        let now = self.now();
        Ok(self.state().add_to_group(principal, group, now)?)
    }

    /// Remove a principal from a group. `true` if the membership existed.
    pub fn remove_from_group(&self, principal: &PrincipalId, group: &str) -> Result<bool> {
        let now = self.now();
        Ok(self.state().remove_from_group(principal, group, now)?)
    }

    /// Forget a principal entirely.
    pub fn remove_principal(&self, principal: &PrincipalId) -> bool {
        let removed = self.state().remove_principal(principal);
        if removed {
            tracing::debug!(principal = %principal, "principal removed");
        }
        removed
    }

    /// Every principal the engine has seen, sorted.
    pub fn list_principals(&self) -> Vec<PrincipalId> {
        self.state().list_principals()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `principal` holds `node` right now.
    ///
    /// Unknown principals resolve as members of the default group only;
    /// the query itself never creates anything.
    pub fn has_permission(&self, principal: &PrincipalId, node: &str) -> bool {
        let now = self.now();
        let allowed = self.state().has_permission(principal, node, now);
        tracing::trace!(principal = %principal, node, allowed, "permission checked");
        allowed
    }

    /// True if any of `nodes` is held. Empty input is `false`.
    pub fn has_any_permission<S: AsRef<str>>(&self, principal: &PrincipalId, nodes: &[S]) -> bool {
        let now = self.now();
        self.state()
            .resolver()
            .has_any_permission(principal, nodes, now)
    }

    /// True if all of `nodes` are held. Empty input is `true`.
    pub fn has_all_permissions<S: AsRef<str>>(&self, principal: &PrincipalId, nodes: &[S]) -> bool {
        let now = self.now();
        self.state()
            .resolver()
            .has_all_permissions(principal, nodes, now)
    }

    /// Resolve `node` and report which record decided it.
    pub fn resolve(&self, principal: &PrincipalId, node: &str) -> Resolution {
        let now = self.now();
        self.state().resolve(principal, node, now)
    }

    /// Every known node that currently resolves to `true` for `principal`.
    ///
    /// With `include_groups` unset only direct records are considered.
    pub fn list_effective_permissions(
        &self,
        principal: &PrincipalId,
        include_groups: bool,
    ) -> BTreeSet<String> {
        let now = self.now();
        self.state()
            .effective_permissions(principal, include_groups, now)
    }

    /// Direct memberships, in resolution order.
    pub fn list_groups_of(&self, principal: &PrincipalId) -> Vec<String> {
        self.state().groups_of(principal)
    }

    /// Whether `principal` is a direct member of `group`.
    pub fn is_in_group(&self, principal: &PrincipalId, group: &str) -> bool {
        self.state().is_in_group(principal, group)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Remove every expired record.
    pub fn sweep_expired(&self) -> SweepReport {
        let now = self.now();
        let report = self.state().sweep_expired(now);
        if !report.is_empty() {
            tracing::info!(
                removed = report.total(),
                principals = report.principals_touched,
                groups = report.groups_touched,
                "expired permissions swept"
            );
        }
        report
    }

    /// Sweep on the configured interval until the handle is stopped or dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        spawn_sweeper(Arc::clone(self), self.config.sweep_interval())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Copy the whole state into a snapshot.
    pub fn snapshot(&self) -> Snapshot {
        let now = self.now();
        self.state().snapshot(now)
    }

    /// Replace the whole state with a snapshot.
    ///
    /// The snapshot is validated before the lock is taken; on error the
    /// current state is untouched. Built-in groups are not re-seeded.
    pub fn restore(&self, snapshot: Snapshot) -> Result<()> {
        let groups = snapshot.groups.len();
        let principals = snapshot.principals.len();
        let state = PermissionState::from_snapshot(
            snapshot,
            &self.config.default_group,
            self.config.max_inheritance_depth,
        )?;
        let dangling = state.dangling_references();
        if dangling > 0 {
            tracing::warn!(dangling, "restored state references missing groups");
        }
        *self.state() = state;
        tracing::debug!(groups, principals, "state restored");
        Ok(())
    }

    /// Save a snapshot to `store`.
    pub async fn save<S>(&self, store: &S) -> Result<()>
    where
        S: SnapshotStore + ?Sized,
    {
        let snapshot = self.snapshot();
        store.save(&snapshot).await?;
        tracing::info!(
            groups = snapshot.groups.len(),
            principals = snapshot.principals.len(),
            "permissions saved"
        );
        Ok(())
    }

    /// Load the snapshot in `store`, replacing the current state.
    ///
    /// Returns `false`, changing nothing, when the store is empty. A failed
    /// load also leaves the current state as it was.
    pub async fn load<S>(&self, store: &S) -> Result<bool>
    where
        S: SnapshotStore + ?Sized,
    {
        let Some(snapshot) = store.load().await? else {
            tracing::info!("no saved permissions; keeping current state");
            return Ok(false);
        };
        self.restore(snapshot)?;
        tracing::info!("permissions loaded");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::ManualClock;
    use warden_store::MemoryStore;

    fn engine_at(now: Timestamp) -> (Engine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let engine = Engine::with_clock(EngineConfig::default(), clock.clone()).unwrap();
        (engine, clock)
    }

    fn id(s: &str) -> PrincipalId {
        PrincipalId::from(s)
    }

    #[test]
    fn test_builtins_seeded() {
        let (engine, _) = engine_at(0);
        let names: Vec<String> = engine.list_groups().into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["admin", "moderator", "default"]);
    }

    #[test]
    fn test_custom_default_group_is_created() {
        let config = EngineConfig {
            default_group: "Member".to_string(),
            ..EngineConfig::default()
        };
        let engine = Engine::new(config).unwrap();
        assert!(engine.get_group("member").is_some());
        assert_eq!(engine.list_groups_of(&id("p")), vec!["member".to_string()]);
    }

    #[test]
    fn test_unseeded_engine_is_empty() {
        let config = EngineConfig {
            seed_builtin_groups: false,
            ..EngineConfig::default()
        };
        let engine = Engine::new(config).unwrap();
        assert!(engine.list_groups().is_empty());
        assert!(!engine.has_permission(&id("p"), "basic.chat"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            max_inheritance_depth: 0,
            ..EngineConfig::default()
        };
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn test_queries_do_not_create_principals() {
        let (engine, _) = engine_at(0);
        assert!(engine.has_permission(&id("ghost"), "basic.chat"));
        assert!(engine.list_principals().is_empty());
    }

    #[test]
    fn test_grant_temporary_expires_after_deadline() {
        let (engine, clock) = engine_at(1_000);
        let expires = engine
            .grant_temporary(&id("p"), "fly", true, Duration::from_secs(10))
            .unwrap();
        assert_eq!(expires, 11_000);

        clock.set(11_000);
        assert!(engine.has_permission(&id("p"), "fly"));

        clock.set(11_001);
        assert!(!engine.has_permission(&id("p"), "fly"));
        assert_eq!(engine.direct_permissions_of(&id("p")).len(), 1);

        let report = engine.sweep_expired();
        assert_eq!(report.principal_records, 1);
        assert!(engine.direct_permissions_of(&id("p")).is_empty());
    }

    #[test]
    fn test_validation_errors_before_mutation() {
        let (engine, _) = engine_at(0);
        let err = engine.grant(&id("p"), "bad node", true).unwrap_err();
        assert!(err.is_validation());
        assert!(engine.principal(&id("p")).is_none());

        assert!(engine.grant(&id(""), "ok", true).unwrap_err().is_validation());
        assert!(engine
            .create_group(" ", None, None, 0)
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_restore_failure_keeps_state() {
        let (engine, _) = engine_at(0);
        engine.grant(&id("p"), "fly", true).unwrap();

        let mut bad = engine.snapshot();
        bad.groups[0]
            .permissions
            .insert("x".to_string(), PermissionRecord::allow("y"));
        assert!(engine.restore(bad).is_err());
        assert!(engine.has_permission(&id("p"), "fly"));
        assert_eq!(engine.list_groups().len(), 3);
    }

    #[tokio::test]
    async fn test_load_from_empty_store_keeps_state() {
        let (engine, _) = engine_at(0);
        engine.grant(&id("p"), "fly", true).unwrap();

        let store = MemoryStore::new();
        assert!(!engine.load(&store).await.unwrap());
        assert!(engine.has_permission(&id("p"), "fly"));
    }

    #[tokio::test]
    async fn test_failed_save_surfaces_error() {
        let (engine, _) = engine_at(0);
        let store = MemoryStore::new();
        store.fail_next_save();
        assert!(engine.save(&store).await.is_err());
        engine.save(&store).await.unwrap();
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}
