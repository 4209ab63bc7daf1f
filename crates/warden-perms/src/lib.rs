//! # Warden Permissions
//!
//! Group and principal registries and the resolution engine that answers
//! "may this principal do this?".
//!
//! ## Overview
//!
//! - [`GroupRegistry`] owns groups, keyed case-insensitively, seeded with
//!   `default`, `moderator` and `admin`.
//! - [`PrincipalRegistry`] owns principal permission sets and creates the
//!   default set on first write.
//! - [`Resolver`] walks direct records, then the inheritance graph,
//!   depth-first with a visited set, and denies by default.
//! - [`sweep_expired`] purges expired records.
//! - [`PermissionState`] bundles both registries so cross-registry
//!   operations are atomic under one lock.
//!
//! ## Usage
//!
//! ```rust
//! use warden_core::{PermissionRecord, PrincipalId};
//! use warden_perms::PermissionState;
//!
//! let mut state = PermissionState::default();
//! let alice = PrincipalId::from("alice");
//!
//! assert!(state.has_permission(&alice, "basic.chat", 0));
//! assert!(!state.has_permission(&alice, "admin.kick", 0));
//!
//! state.add_to_group(&alice, "moderator", 0).unwrap();
//! assert!(state.has_permission(&alice, "admin.kick", 0));
//!
//! state
//!     .set_direct_permission(&alice, PermissionRecord::deny("admin.kick"), 0)
//!     .unwrap();
//! assert!(!state.has_permission(&alice, "admin.kick", 0));
//! ```

pub mod error;
pub mod groups;
pub mod principals;
pub mod resolve;
pub mod state;
pub mod sweep;

pub use error::{PermsError, Result};
pub use groups::{
    builtin_groups, GroupRegistry, ADMIN_GROUP, DEFAULT_GROUP, MODERATION_NODES, MODERATOR_GROUP,
};
pub use principals::PrincipalRegistry;
pub use resolve::{Resolution, Resolver, DEFAULT_MAX_DEPTH};
pub use state::PermissionState;
pub use sweep::{sweep_expired, SweepReport};
