//! File-backed implementation of the SnapshotStore trait.
//!
//! Layout: `MAGIC (4 bytes) || blake3(body) (32 bytes) || body`, where body
//! is the snapshot's canonical CBOR. Saves write a sibling temp file and
//! rename it over the target, so a crash mid-save leaves the old file intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use warden_core::{Snapshot, SnapshotDigest};

use crate::error::{Result, StoreError};
use crate::traits::SnapshotStore;

/// File signature.
pub const MAGIC: &[u8; 4] = b"WRDN";

const HEADER_LEN: usize = MAGIC.len() + 32;

/// Stores one snapshot in a single checksummed file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Use the file at `path`. Nothing is touched until the first save.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Frame encoded snapshot bytes with magic and digest.
pub fn encode_file(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let body = snapshot.to_cbor()?;
    let digest = SnapshotDigest::hash(&body);

    let mut buf = Vec::with_capacity(HEADER_LEN + body.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(digest.as_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Check framing and digest, then decode.
pub fn decode_file(bytes: &[u8]) -> Result<Snapshot> {
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(StoreError::InvalidData(
            "not a warden snapshot file".to_string(),
        ));
    }

    let mut expected = [0u8; 32];
    expected.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
    let expected = SnapshotDigest(expected);

    let body = &bytes[HEADER_LEN..];
    let actual = SnapshotDigest::hash(body);
    if actual != expected {
        return Err(StoreError::ChecksumMismatch {
            expected: expected.to_hex(),
            actual: actual.to_hex(),
        });
    }

    Ok(Snapshot::from_cbor(body)?)
}

#[async_trait]
impl SnapshotStore for FileStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = encode_file(snapshot)?;
        let temp = self.temp_path();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "snapshot written");
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        decode_file(&bytes).map(Some)
    }
}
