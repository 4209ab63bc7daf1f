//! # Warden Core
//!
//! Pure data types for the Warden permission engine: permission records,
//! groups, principal permission sets, and registry snapshots.
//!
//! This crate contains no I/O and no locking. It is plain data plus the
//! validation rules every mutation must pass.
//!
//! ## Key Types
//!
//! - [`PermissionRecord`] - A grant or explicit denial of one node
//! - [`Group`] - A named, inheritable bundle of records
//! - [`PrincipalPermissions`] - A principal's direct records and memberships
//! - [`Snapshot`] - Full registry state for persistence
//!
//! ## Nodes
//!
//! A node is a dot-separated capability such as `admin.kick`, or the literal
//! wildcard `*`. See [`validate_node`].

pub mod error;
pub mod group;
pub mod principal;
pub mod record;
pub mod snapshot;
pub mod time;
pub mod types;

pub use error::{CoreError, ValidationError};
pub use group::Group;
pub use principal::PrincipalPermissions;
pub use record::PermissionRecord;
pub use snapshot::{Snapshot, SnapshotDigest, SNAPSHOT_VERSION};
pub use time::{duration_millis, now_millis, Clock, ManualClock, SystemClock, Timestamp};
pub use types::{
    group_key, is_wildcard, validate_group_name, validate_node, PrincipalId, WILDCARD,
};
