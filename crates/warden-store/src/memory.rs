//! In-memory implementation of the SnapshotStore trait.
//!
//! This is primarily for testing. Snapshots are kept in their encoded CBOR
//! form so loads go through the same decode and validation path as the
//! durable stores.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use warden_core::Snapshot;

use crate::error::{Result, StoreError};
use crate::traits::SnapshotStore;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Encoded snapshot, if one has been saved.
    encoded: Option<Bytes>,

    /// Number of successful saves.
    saves: u64,

    /// When set, the next save fails.
    fail_next_save: bool,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .saves
    }

    /// The encoded bytes of the last save.
    pub fn raw(&self) -> Option<Bytes> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .encoded
            .clone()
    }

    /// Replace the stored bytes directly, bypassing encoding.
    pub fn put_raw(&self, bytes: impl Into<Bytes>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .encoded = Some(bytes.into());
    }

    /// Make the next save fail with an I/O error.
    pub fn fail_next_save(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_next_save = true;
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let encoded = snapshot.to_cbor()?;
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if inner.fail_next_save {
            inner.fail_next_save = false;
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected save failure",
            )));
        }

        inner.encoded = Some(encoded);
        inner.saves += 1;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>> {
        let encoded = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .encoded
            .clone();

        match encoded {
            Some(bytes) => Ok(Some(Snapshot::from_cbor(&bytes)?)),
            None => Ok(None),
        }
    }
}
