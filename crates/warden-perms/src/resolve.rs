//! Permission resolution.
//!
//! Precedence, first match wins:
//!
//! 1. The principal's direct record for exactly the node.
//! 2. The principal's direct `*` record.
//! 3. Group records, searched depth-first from each membership in order.
//!    Each group checks its own exact record, then its own `*` record, then
//!    descends into `inherited_groups` in list order.
//!
//! Nothing found resolves to `false`. Expired records are skipped as if they
//! were absent. Visits are tracked across the whole call so cyclic
//! inheritance terminates, and a depth guard bounds very long chains.

use std::collections::{BTreeSet, HashMap};
use std::ops::ControlFlow;

use warden_core::{group_key, Group, PermissionRecord, PrincipalId, Timestamp, WILDCARD};

use crate::groups::GroupRegistry;
use crate::principals::PrincipalRegistry;

/// Default bound on inheritance depth below a membership root.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Where a decision came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A record attached to the principal (exact or `*`).
    Direct(PermissionRecord),

    /// A record on a group reached through membership.
    Inherited {
        /// Name of the group holding the record.
        group: String,
        /// The deciding record (exact or `*`).
        record: PermissionRecord,
    },

    /// No applicable record; denied by default.
    Undefined,
}

impl Resolution {
    /// The boolean outcome.
    pub fn value(&self) -> bool {
        match self {
            Resolution::Direct(record) | Resolution::Inherited { record, .. } => record.value,
            Resolution::Undefined => false,
        }
    }

    /// The deciding record, if any.
    pub fn record(&self) -> Option<&PermissionRecord> {
        match self {
            Resolution::Direct(record) | Resolution::Inherited { record, .. } => Some(record),
            Resolution::Undefined => None,
        }
    }
}

/// Read-only view over both registries that answers permission queries.
///
/// Holds no state of its own; every call starts a fresh traversal.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    groups: &'a GroupRegistry,
    principals: &'a PrincipalRegistry,
    max_depth: usize,
}

impl<'a> Resolver<'a> {
    /// Create a resolver with the default depth guard.
    pub fn new(groups: &'a GroupRegistry, principals: &'a PrincipalRegistry) -> Self {
        Self {
            groups,
            principals,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the depth guard.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Whether `principal` holds `node` at `now`.
    pub fn has_permission(&self, principal: &PrincipalId, node: &str, now: Timestamp) -> bool {
        self.resolve(principal, node, now).value()
    }

    /// True if any node is held. Empty input is `false`.
    pub fn has_any_permission<S: AsRef<str>>(
        &self,
        principal: &PrincipalId,
        nodes: &[S],
        now: Timestamp,
    ) -> bool {
        nodes
            .iter()
            .any(|node| self.has_permission(principal, node.as_ref(), now))
    }

    /// True if every node is held. Empty input is `true`.
    pub fn has_all_permissions<S: AsRef<str>>(
        &self,
        principal: &PrincipalId,
        nodes: &[S],
        now: Timestamp,
    ) -> bool {
        nodes
            .iter()
            .all(|node| self.has_permission(principal, node.as_ref(), now))
    }

    /// Resolve `node` for `principal`, reporting which record decided it.
    pub fn resolve(&self, principal: &PrincipalId, node: &str, now: Timestamp) -> Resolution {
        if let Some(record) = self.resolve_direct(principal, node, now) {
            return Resolution::Direct(record.clone());
        }

        let roots = self.principals.groups_of(principal);
        let found = self.walk_groups(&roots, |group| {
            match own_record(group, node, now) {
                Some(record) => ControlFlow::Break((group, record)),
                None => ControlFlow::Continue(()),
            }
        });

        match found {
            Some((group, record)) => Resolution::Inherited {
                group: group.name.clone(),
                record: record.clone(),
            },
            None => Resolution::Undefined,
        }
    }

    /// Every known node that currently resolves to `true`.
    ///
    /// Candidates are the principal's valid direct nodes and, when
    /// `include_groups` is set, every valid node on a reachable group
    /// (including `*`). Each candidate is then resolved with the normal
    /// precedence; with `include_groups` unset only direct records count.
    pub fn effective_permissions(
        &self,
        principal: &PrincipalId,
        include_groups: bool,
        now: Timestamp,
    ) -> BTreeSet<String> {
        let mut candidates: BTreeSet<&str> = BTreeSet::new();

        if let Some(set) = self.principals.get(principal) {
            candidates.extend(
                set.direct_permissions
                    .values()
                    .filter(|r| r.is_valid(now))
                    .map(|r| r.node.as_str()),
            );
        }

        if include_groups {
            let roots = self.principals.groups_of(principal);
            self.walk_groups(&roots, |group| {
                candidates.extend(
                    group
                        .permissions
                        .values()
                        .filter(|r| r.is_valid(now))
                        .map(|r| r.node.as_str()),
                );
                ControlFlow::<()>::Continue(())
            });
        }

        candidates
            .into_iter()
            .filter(|node| {
                if include_groups {
                    self.has_permission(principal, node, now)
                } else {
                    self.resolve_direct(principal, node, now)
                        .map(|r| r.value)
                        .unwrap_or(false)
                }
            })
            .map(str::to_string)
            .collect()
    }

    /// Group names reachable from `principal`'s memberships, in search order.
    ///
    /// Dangling references are left out.
    pub fn reachable_groups(&self, principal: &PrincipalId) -> Vec<String> {
        let roots = self.principals.groups_of(principal);
        let mut reached = Vec::new();
        self.walk_groups(&roots, |group| {
            reached.push(group.name.clone());
            ControlFlow::<()>::Continue(())
        });
        reached
    }

    /// Direct exact record, then direct wildcard.
    fn resolve_direct(
        &self,
        principal: &PrincipalId,
        node: &str,
        now: Timestamp,
    ) -> Option<&'a PermissionRecord> {
        let set = self.principals.get(principal)?;
        set.permission(node)
            .filter(|r| r.is_valid(now))
            .or_else(|| set.permission(WILDCARD).filter(|r| r.is_valid(now)))
    }

    /// Depth-first pre-order walk over the inheritance graph.
    ///
    /// Each group is handed to `visit` at most once per call. Missing groups
    /// are skipped. Groups deeper than `max_depth` below a root are not
    /// entered. A group first met at the depth limit and later met on a
    /// shorter path is re-entered, so its parents are still searched.
    fn walk_groups<T>(
        &self,
        roots: &[String],
        mut visit: impl FnMut(&'a Group) -> ControlFlow<T>,
    ) -> Option<T> {
        // key -> shallowest depth the group has been entered at
        let mut entered: HashMap<String, usize> = HashMap::new();
        let shallower = |entered: &HashMap<String, usize>, key: &str, depth: usize| {
            entered.get(key).map_or(true, |&seen| depth < seen)
        };

        for root in roots {
            let mut stack = vec![(group_key(root), 0usize)];

            while let Some((key, depth)) = stack.pop() {
                if !shallower(&entered, &key, depth) {
                    continue;
                }
                let first_visit = entered.insert(key.clone(), depth).is_none();
                let Some(group) = self.groups.get(&key) else {
                    continue;
                };

                if first_visit {
                    if let ControlFlow::Break(found) = visit(group) {
                        return Some(found);
                    }
                }

                if depth >= self.max_depth {
                    if !group.inherited_groups.is_empty() {
                        tracing::warn!(
                            group = %group.name,
                            max_depth = self.max_depth,
                            "inheritance depth limit reached, not descending"
                        );
                    }
                    continue;
                }

                // Reverse so the first parent is popped first.
                for parent in group.inherited_groups.iter().rev() {
                    let parent_key = group_key(parent);
                    if shallower(&entered, &parent_key, depth + 1) {
                        stack.push((parent_key, depth + 1));
                    }
                }
            }
        }

        None
    }
}

/// A group's own exact record, then its own wildcard.
fn own_record<'g>(group: &'g Group, node: &str, now: Timestamp) -> Option<&'g PermissionRecord> {
    group
        .permission(node)
        .filter(|r| r.is_valid(now))
        .or_else(|| group.permission(WILDCARD).filter(|r| r.is_valid(now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::PermissionRecord;

    const NOW: Timestamp = 1_000_000;

    fn registries() -> (GroupRegistry, PrincipalRegistry) {
        (GroupRegistry::with_builtins(), PrincipalRegistry::default())
    }

    fn id(s: &str) -> PrincipalId {
        PrincipalId::from(s)
    }

    #[test]
    fn test_default_member() {
        let (groups, principals) = registries();
        let resolver = Resolver::new(&groups, &principals);

        assert!(resolver.has_permission(&id("p1"), "basic.chat", NOW));
        assert!(!resolver.has_permission(&id("p1"), "admin.kick", NOW));
    }

    #[test]
    fn test_inherited_from_parent() {
        let (groups, mut principals) = registries();
        principals.remove_from_group(&id("p2"), "default", NOW).unwrap();
        principals.add_to_group(&id("p2"), "moderator", NOW).unwrap();
        let resolver = Resolver::new(&groups, &principals);

        assert!(resolver.has_permission(&id("p2"), "admin.kick", NOW));
        assert!(resolver.has_permission(&id("p2"), "basic.chat", NOW));
        assert_eq!(
            resolver.reachable_groups(&id("p2")),
            vec!["moderator".to_string(), "default".to_string()]
        );
    }

    #[test]
    fn test_direct_deny_beats_group_wildcard() {
        let (groups, mut principals) = registries();
        principals.add_to_group(&id("p4"), "admin", NOW).unwrap();
        principals
            .set_direct_permission(&id("p4"), PermissionRecord::deny("admin.kick"), NOW)
            .unwrap();
        let resolver = Resolver::new(&groups, &principals);

        assert!(!resolver.has_permission(&id("p4"), "admin.kick", NOW));
        assert!(resolver.has_permission(&id("p4"), "anything.unlisted", NOW));
        assert!(matches!(
            resolver.resolve(&id("p4"), "admin.kick", NOW),
            Resolution::Direct(_)
        ));
    }

    #[test]
    fn test_direct_exact_beats_direct_wildcard() {
        let (groups, mut principals) = registries();
        let p = id("p5");
        principals
            .set_direct_permission(&p, PermissionRecord::deny("*"), NOW)
            .unwrap();
        principals
            .set_direct_permission(&p, PermissionRecord::allow("basic.fly"), NOW)
            .unwrap();
        let resolver = Resolver::new(&groups, &principals);

        assert!(resolver.has_permission(&p, "basic.fly", NOW));
        // Direct wildcard deny overrides the default group's grant.
        assert!(!resolver.has_permission(&p, "basic.chat", NOW));
    }

    #[test]
    fn test_nearer_group_deny_overrides_ancestor_allow() {
        let (mut groups, mut principals) = registries();
        groups
            .upsert(
                Group::new("muted")
                    .with_permission(PermissionRecord::deny("basic.chat"))
                    .inherits("default"),
            )
            .unwrap();
        principals.remove_from_group(&id("p"), "default", NOW).unwrap();
        principals.add_to_group(&id("p"), "muted", NOW).unwrap();
        let resolver = Resolver::new(&groups, &principals);

        assert!(!resolver.has_permission(&id("p"), "basic.chat", NOW));
        assert!(resolver.has_permission(&id("p"), "basic.move", NOW));
    }

    #[test]
    fn test_nearer_wildcard_is_not_hoisted_over() {
        let (mut groups, mut principals) = registries();
        groups
            .upsert(
                Group::new("jailed")
                    .with_permission(PermissionRecord::deny("*"))
                    .inherits("default"),
            )
            .unwrap();
        principals.remove_from_group(&id("p"), "default", NOW).unwrap();
        principals.add_to_group(&id("p"), "jailed", NOW).unwrap();
        let resolver = Resolver::new(&groups, &principals);

        // The ancestor's exact grant is never reached.
        assert!(!resolver.has_permission(&id("p"), "basic.chat", NOW));
        match resolver.resolve(&id("p"), "basic.chat", NOW) {
            Resolution::Inherited { group, record } => {
                assert_eq!(group, "jailed");
                assert!(record.is_wildcard());
            }
            other => panic!("unexpected resolution: {:?}", other),
        }
    }

    #[test]
    fn test_membership_order_decides() {
        let (mut groups, mut principals) = registries();
        groups
            .upsert(Group::new("red").with_permission(PermissionRecord::allow("color.pick")))
            .unwrap();
        groups
            .upsert(Group::new("blue").with_permission(PermissionRecord::deny("color.pick")))
            .unwrap();
        principals.add_to_group(&id("a"), "red", NOW).unwrap();
        principals.add_to_group(&id("a"), "blue", NOW).unwrap();
        principals.add_to_group(&id("b"), "blue", NOW).unwrap();
        principals.add_to_group(&id("b"), "red", NOW).unwrap();
        let resolver = Resolver::new(&groups, &principals);

        assert!(resolver.has_permission(&id("a"), "color.pick", NOW));
        assert!(!resolver.has_permission(&id("b"), "color.pick", NOW));
    }

    #[test]
    fn test_priority_does_not_affect_resolution() {
        let (mut groups, mut principals) = registries();
        groups
            .upsert(
                Group::new("low")
                    .with_priority(-10)
                    .with_permission(PermissionRecord::allow("x.y")),
            )
            .unwrap();
        groups
            .upsert(
                Group::new("high")
                    .with_priority(9000)
                    .with_permission(PermissionRecord::deny("x.y")),
            )
            .unwrap();
        principals.add_to_group(&id("p"), "low", NOW).unwrap();
        principals.add_to_group(&id("p"), "high", NOW).unwrap();
        let resolver = Resolver::new(&groups, &principals);

        assert!(resolver.has_permission(&id("p"), "x.y", NOW));
    }

    #[test]
    fn test_cycle_terminates() {
        let (mut groups, mut principals) = registries();
        groups.upsert(Group::new("a").inherits("b")).unwrap();
        groups
            .upsert(
                Group::new("b")
                    .inherits("a")
                    .with_permission(PermissionRecord::allow("loop.ok")),
            )
            .unwrap();
        groups.upsert(Group::new("self").inherits("SELF")).unwrap();
        principals.add_to_group(&id("p"), "a", NOW).unwrap();
        principals.add_to_group(&id("p"), "self", NOW).unwrap();
        let resolver = Resolver::new(&groups, &principals);

        assert!(resolver.has_permission(&id("p"), "loop.ok", NOW));
        assert!(!resolver.has_permission(&id("p"), "loop.missing", NOW));
    }

    #[test]
    fn test_dangling_parent_is_skipped() {
        let (mut groups, mut principals) = registries();
        groups
            .upsert(Group::new("orphan").inherits("ghost").inherits("default"))
            .unwrap();
        principals.remove_from_group(&id("p"), "default", NOW).unwrap();
        principals.add_to_group(&id("p"), "orphan", NOW).unwrap();
        let resolver = Resolver::new(&groups, &principals);

        assert!(resolver.has_permission(&id("p"), "basic.chat", NOW));
        assert_eq!(
            resolver.reachable_groups(&id("p")),
            vec!["orphan".to_string(), "default".to_string()]
        );
    }

    #[test]
    fn test_depth_guard_stops_descent() {
        let mut groups = GroupRegistry::new();
        for i in 0..10 {
            groups
                .upsert(Group::new(format!("g{}", i)).inherits(format!("g{}", i + 1)))
                .unwrap();
        }
        groups
            .upsert(Group::new("g10").with_permission(PermissionRecord::allow("deep.node")))
            .unwrap();
        let mut principals = PrincipalRegistry::new("g0");
        principals.get_or_create(&id("p"), NOW).unwrap();

        let unbounded = Resolver::new(&groups, &principals);
        assert!(unbounded.has_permission(&id("p"), "deep.node", NOW));

        let bounded = Resolver::new(&groups, &principals).with_max_depth(5);
        assert!(!bounded.has_permission(&id("p"), "deep.node", NOW));
    }

    #[test]
    fn test_group_cut_off_by_depth_is_searched_on_shorter_path() {
        // a -> b -> c -> d, d holds the record; memberships [a, c]
        let mut groups = GroupRegistry::new();
        groups.upsert(Group::new("a").inherits("b")).unwrap();
        groups.upsert(Group::new("b").inherits("c")).unwrap();
        groups.upsert(Group::new("c").inherits("d")).unwrap();
        groups
            .upsert(Group::new("d").with_permission(PermissionRecord::allow("deep.node")))
            .unwrap();
        let mut principals = PrincipalRegistry::new("a");
        principals.add_to_group(&id("p"), "c", NOW).unwrap();

        let bounded = Resolver::new(&groups, &principals).with_max_depth(2);
        assert!(bounded.has_permission(&id("p"), "deep.node", NOW));
        assert_eq!(
            bounded.reachable_groups(&id("p")),
            vec!["a", "b", "c", "d"]
        );
    }

    #[test]
    fn test_expired_records_are_invisible() {
        let (mut groups, mut principals) = registries();
        principals
            .set_direct_permission(
                &id("p"),
                PermissionRecord::allow("admin.kick").expires_at(NOW - 1),
                NOW - 10,
            )
            .unwrap();
        groups
            .set_permission(
                "default",
                PermissionRecord::deny("basic.chat").expires_at(NOW - 1),
            )
            .unwrap();
        let resolver = Resolver::new(&groups, &principals);

        assert!(!resolver.has_permission(&id("p"), "admin.kick", NOW));
        // The expired deny replaced the grant, so nothing applies.
        assert!(!resolver.has_permission(&id("p"), "basic.chat", NOW));
        assert!(resolver.has_permission(&id("p"), "admin.kick", NOW - 5));
    }

    #[test]
    fn test_any_and_all() {
        let (groups, principals) = registries();
        let resolver = Resolver::new(&groups, &principals);
        let p = id("p1");

        assert!(resolver.has_any_permission(&p, &["admin.kick", "basic.chat"], NOW));
        assert!(!resolver.has_any_permission(&p, &["admin.kick"], NOW));
        assert!(!resolver.has_any_permission::<&str>(&p, &[], NOW));

        assert!(resolver.has_all_permissions(&p, &["basic.move", "basic.chat"], NOW));
        assert!(!resolver.has_all_permissions(&p, &["basic.chat", "admin.kick"], NOW));
        assert!(resolver.has_all_permissions::<&str>(&p, &[], NOW));
    }

    #[test]
    fn test_effective_permissions() {
        let (groups, mut principals) = registries();
        let p = id("p");
        principals.add_to_group(&p, "moderator", NOW).unwrap();
        principals
            .set_direct_permission(&p, PermissionRecord::deny("admin.mute"), NOW)
            .unwrap();
        principals
            .set_direct_permission(&p, PermissionRecord::allow("home.set"), NOW)
            .unwrap();
        let resolver = Resolver::new(&groups, &principals);

        let all = resolver.effective_permissions(&p, true, NOW);
        let expected: BTreeSet<String> = [
            "admin.kick",
            "admin.warn",
            "basic.chat",
            "basic.move",
            "home.set",
            "moderation.view",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(all, expected);

        let direct = resolver.effective_permissions(&p, false, NOW);
        assert_eq!(direct.into_iter().collect::<Vec<_>>(), vec!["home.set".to_string()]);
    }

    #[test]
    fn test_effective_permissions_with_wildcard() {
        let (groups, mut principals) = registries();
        let p = id("p3");
        principals.remove_from_group(&p, "default", NOW).unwrap();
        principals.add_to_group(&p, "admin", NOW).unwrap();
        let resolver = Resolver::new(&groups, &principals);

        let effective = resolver.effective_permissions(&p, true, NOW);
        assert!(effective.contains("*"));
        assert!(resolver.has_permission(&p, "anything.unlisted", NOW));
    }
}
