//! Proptest generators for property-based testing.
//!
//! Graphs are drawn from small name pools on purpose, so that duplicate
//! names, self-inheritance, cycles and dangling parents come up often.

use std::collections::{BTreeMap, HashSet};

use proptest::prelude::*;

use warden::{Engine, EngineConfig};
use warden_core::{group_key, PermissionRecord, WILDCARD};

use crate::fixtures::principal;

/// Principal every generated graph is queried for.
pub const SUBJECT: &str = "subject";

/// Nodes a generated graph may mention, besides the wildcard.
pub const NODE_POOL: &[&str] = &["n0", "n1", "n2", "n3", "chat.send", "chat.read"];

/// A node no generated graph ever mentions.
pub const UNUSED_NODE: &str = "never.granted";

/// One generated group.
#[derive(Debug, Clone, Default)]
pub struct GeneratedGroup {
    /// node -> value
    pub records: BTreeMap<String, bool>,
    /// Parent names, in order, without duplicates.
    pub parents: Vec<String>,
}

/// A random group graph plus the subject's memberships and direct records.
#[derive(Debug, Clone)]
pub struct GraphParams {
    /// Groups by key.
    pub groups: BTreeMap<String, GeneratedGroup>,
    /// Memberships, in order; every entry names an existing group.
    pub memberships: Vec<String>,
    /// Direct records of the subject.
    pub direct: BTreeMap<String, bool>,
}

/// Generate a group name; some pool names never get created.
pub fn group_name() -> impl Strategy<Value = String> {
    "[Gg][0-7]".prop_map(String::from)
}

/// Generate a node from the pool, optionally including `*`.
pub fn node(wildcards: bool) -> impl Strategy<Value = String> {
    let mut pool: Vec<String> = NODE_POOL.iter().map(|n| n.to_string()).collect();
    if wildcards {
        pool.push(WILDCARD.to_string());
    }
    prop::sample::select(pool)
}

fn records(wildcards: bool) -> impl Strategy<Value = Vec<(String, bool)>> {
    prop::collection::vec((node(wildcards), any::<bool>()), 0..4)
}

/// Generate a graph.
pub fn graph(wildcards: bool) -> impl Strategy<Value = GraphParams> {
    let group = (group_name(), records(wildcards), prop::collection::vec(group_name(), 0..3));
    (
        prop::collection::vec(group, 0..6),
        prop::collection::vec(group_name(), 0..4),
        records(wildcards),
    )
        .prop_map(|(raw_groups, raw_memberships, raw_direct)| {
            let mut groups: BTreeMap<String, GeneratedGroup> = BTreeMap::new();
            for (name, records, parents) in raw_groups {
                let generated = groups.entry(group_key(&name)).or_default();
                // Later records replace earlier ones, like repeated grants.
                generated.records.extend(records);
                for parent in parents {
                    let parent = group_key(&parent);
                    if !generated.parents.contains(&parent) {
                        generated.parents.push(parent);
                    }
                }
            }

            let mut memberships = Vec::new();
            for name in raw_memberships {
                let key = group_key(&name);
                if groups.contains_key(&key) && !memberships.contains(&key) {
                    memberships.push(key);
                }
            }

            GraphParams {
                groups,
                memberships,
                direct: raw_direct.into_iter().collect(),
            }
        })
}

impl Arbitrary for GraphParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        graph(true).boxed()
    }
}

/// Build an unseeded engine holding the graph.
///
/// # Panics
///
/// If the generated data is rejected, which would be a generator bug.
pub fn build_engine(params: &GraphParams) -> Engine {
    let config = EngineConfig {
        seed_builtin_groups: false,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config).expect("valid config");

    for (name, generated) in &params.groups {
        engine.create_group(name, None, None, 0).expect("group");
        for (node, value) in &generated.records {
            engine
                .set_group_permission(name, PermissionRecord::new(node.as_str(), *value))
                .expect("group record");
        }
        for parent in &generated.parents {
            engine.add_inheritance(name, parent).expect("inheritance");
        }
    }

    let subject = principal(SUBJECT);
    engine
        .remove_from_group(&subject, &engine.config().default_group)
        .expect("leave default");
    for group in &params.memberships {
        engine.add_to_group(&subject, group).expect("membership");
    }
    for (node, value) in &params.direct {
        engine.grant(&subject, node, *value).expect("direct record");
    }

    engine
}

/// Straightforward recursive resolution over the generated data.
pub fn reference_answer(params: &GraphParams, node: &str) -> bool {
    for key in [node, WILDCARD] {
        if let Some(value) = params.direct.get(key) {
            return *value;
        }
    }

    let mut visited = HashSet::new();
    params
        .memberships
        .iter()
        .find_map(|group| visit(params, group, node, &mut visited))
        .unwrap_or(false)
}

fn visit<'a>(
    params: &'a GraphParams,
    group: &'a str,
    node: &str,
    visited: &mut HashSet<&'a str>,
) -> Option<bool> {
    if !visited.insert(group) {
        return None;
    }
    let generated = params.groups.get(group)?;
    for key in [node, WILDCARD] {
        if let Some(value) = generated.records.get(key) {
            return Some(*value);
        }
    }
    generated
        .parents
        .iter()
        .find_map(|parent| visit(params, parent, node, visited))
}
