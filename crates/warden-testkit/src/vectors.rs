//! Query vectors: fixed (principal, node, expected) triples.
//!
//! The reference battery pins the behavior of the populated fixture and is
//! replayed after persistence round trips. Vectors serialize to JSON so other
//! implementations can check themselves against the same answers.

use serde::{Deserialize, Serialize};
use warden::Engine;

use crate::fixtures::principal;

/// One expected permission answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryVector {
    /// Human-readable name for the vector.
    pub name: String,
    /// Principal to query.
    pub principal: String,
    /// Node to query.
    pub node: String,
    /// Expected answer.
    pub expected: bool,
}

impl QueryVector {
    fn new(name: &str, principal: &str, node: &str, expected: bool) -> Self {
        Self {
            name: name.to_string(),
            principal: principal.to_string(),
            node: node.to_string(),
            expected,
        }
    }
}

/// The battery for [`TestFixture::populated`](crate::fixtures::TestFixture::populated).
pub fn reference_vectors() -> Vec<QueryVector> {
    vec![
        QueryVector::new("default member can chat", "p1", "basic.chat", true),
        QueryVector::new("default member can move", "p1", "basic.move", true),
        QueryVector::new("default member cannot kick", "p1", "admin.kick", false),
        QueryVector::new("moderator can kick", "p2", "admin.kick", true),
        QueryVector::new("moderator inherits chat", "p2", "basic.chat", true),
        QueryVector::new("moderator cannot stop server", "p2", "server.stop", false),
        QueryVector::new("admin wildcard", "p3", "anything.at.all", true),
        QueryVector::new("admin wildcard covers kick", "p3", "admin.kick", true),
        QueryVector::new("direct deny beats wildcard", "p4", "admin.kick", false),
        QueryVector::new("wildcard still covers the rest", "p4", "admin.mute", true),
        QueryVector::new("unknown principal gets defaults", "stranger", "basic.chat", true),
        QueryVector::new("unknown principal denied by default", "stranger", "admin.warn", false),
    ]
}

/// Vectors whose answer differs from `engine`'s current answer.
pub fn mismatches<'a>(engine: &Engine, vectors: &'a [QueryVector]) -> Vec<&'a QueryVector> {
    vectors
        .iter()
        .filter(|v| engine.has_permission(&principal(&v.principal), &v.node) != v.expected)
        .collect()
}

/// Serialize vectors as pretty JSON.
pub fn vectors_to_json(vectors: &[QueryVector]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(vectors)
}

/// Parse vectors from JSON.
pub fn vectors_from_json(json: &str) -> serde_json::Result<Vec<QueryVector>> {
    serde_json::from_str(json)
}
