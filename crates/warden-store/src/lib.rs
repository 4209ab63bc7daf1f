//! # Warden Store
//!
//! Persistence adapters for the Warden permission engine.
//!
//! ## Overview
//!
//! The engine is storage-agnostic: it produces and consumes whole
//! [`Snapshot`](warden_core::Snapshot)s through the [`SnapshotStore`] trait
//! and never performs I/O while holding its lock.
//!
//! ## Key Types
//!
//! - [`SnapshotStore`] - The async trait for saving and loading snapshots
//! - [`SqliteStore`] - Relational storage in SQLite
//! - [`FileStore`] - A single checksummed CBOR file
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden_core::Snapshot;
//! use warden_store::{SnapshotStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("warden.db").unwrap();
//!     store.save(&Snapshot::empty(0)).await.unwrap();
//!     let restored = store.load().await.unwrap();
//!     assert!(restored.is_some());
//! }
//! ```

pub mod error;
pub mod file;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::SnapshotStore;
