//! # Warden
//!
//! A permission resolution engine: decide whether a principal holds a
//! capability, given named groups with inheritance, per-principal and
//! per-group overrides, wildcard grants, and time-limited grants.
//!
//! ## Overview
//!
//! Resolution order, first match wins:
//!
//! 1. A valid direct record for the exact node.
//! 2. A valid direct `*` record.
//! 3. Groups: each membership in order, depth-first through inheritance,
//!    checking each group's exact record and then its `*` record.
//!
//! Nothing matching means `false`. Cycles and dangling inheritance
//! references are tolerated and skipped.
//!
//! ## Usage
//!
//! ```rust
//! use warden::{Engine, EngineConfig, PrincipalId};
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! let alice = PrincipalId::from("alice");
//!
//! assert!(engine.has_permission(&alice, "basic.chat"));
//! assert!(!engine.has_permission(&alice, "admin.kick"));
//!
//! engine.add_to_group(&alice, "moderator").unwrap();
//! assert!(engine.has_permission(&alice, "admin.kick"));
//!
//! engine.grant(&alice, "admin.kick", false).unwrap();
//! assert!(!engine.has_permission(&alice, "admin.kick"));
//! ```
//!
//! ## Crate Structure
//!
//! - `warden-core`: records, groups, principal sets, snapshots, time
//! - `warden-perms`: registries, resolver, sweep logic
//! - `warden-store`: snapshot stores (memory, file, SQLite)
//! - `warden` (this crate): the engine handle, configuration, background sweeper

pub mod config;
pub mod engine;
pub mod error;
pub mod sweeper;

pub use config::{EngineConfig, DEFAULT_SWEEP_INTERVAL_MS};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use sweeper::{spawn_sweeper, SweeperHandle};

// Re-export commonly used types
pub use warden_core::{
    Clock, CoreError, Group, ManualClock, PermissionRecord, PrincipalId, PrincipalPermissions,
    Snapshot, SnapshotDigest, SystemClock, Timestamp, ValidationError, WILDCARD,
};
pub use warden_perms::{PermsError, Resolution, SweepReport};
pub use warden_store::{FileStore, MemoryStore, SnapshotStore, SqliteStore, StoreError};
