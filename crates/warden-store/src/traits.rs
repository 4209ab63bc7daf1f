//! SnapshotStore trait: the persistence boundary of the engine.
//!
//! The engine never does I/O while holding its lock. It hands a finished
//! [`Snapshot`] to [`SnapshotStore::save`] and swaps in whatever
//! [`SnapshotStore::load`] returns, so stores only deal in whole snapshots.

use async_trait::async_trait;
use warden_core::Snapshot;

use crate::error::Result;

/// Durable home for engine snapshots.
///
/// # Contract
///
/// - `save` replaces whatever was stored before.
/// - `load` returns `None` when nothing has been saved yet.
/// - Every field of every group, principal, and record round-trips,
///   including expiry timestamps and provenance strings.
/// - A returned snapshot has passed [`Snapshot::validate`].
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist a snapshot, replacing the previous one.
    async fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Load the most recent snapshot.
    async fn load(&self) -> Result<Option<Snapshot>>;
}

#[async_trait]
impl<S: SnapshotStore + ?Sized> SnapshotStore for std::sync::Arc<S> {
    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        (**self).save(snapshot).await
    }

    async fn load(&self) -> Result<Option<Snapshot>> {
        (**self).load().await
    }
}
