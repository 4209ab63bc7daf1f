//! Snapshots: the full registry state as a plain value.
//!
//! A snapshot is what crosses the persistence boundary. The engine never
//! defines a file format itself; stores choose between the canonical CBOR
//! encoding and the JSON form provided here.
//!
//! CBOR output is deterministic for a given snapshot: groups and principals
//! are kept sorted, and record maps are ordered by node.

use std::collections::HashSet;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ValidationError};
use crate::group::Group;
use crate::principal::PrincipalPermissions;
use crate::time::Timestamp;
use crate::types::group_key;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A 32-byte Blake3 digest of a snapshot's canonical bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotDigest(pub [u8; 32]);

impl SnapshotDigest {
    /// Compute the digest of the given bytes.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for SnapshotDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for SnapshotDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Complete registry state: every group and every principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version, [`SNAPSHOT_VERSION`] when written by this crate.
    pub version: u32,

    /// When the snapshot was taken (Unix ms).
    pub taken_at: Timestamp,

    /// Groups, sorted by registry key.
    pub groups: Vec<Group>,

    /// Principals, sorted by id.
    pub principals: Vec<PrincipalPermissions>,
}

impl Snapshot {
    /// Build a snapshot, sorting its contents into canonical order.
    pub fn new(
        taken_at: Timestamp,
        mut groups: Vec<Group>,
        mut principals: Vec<PrincipalPermissions>,
    ) -> Self {
        groups.sort_by_key(Group::key);
        principals.sort_by(|a, b| a.principal_id.cmp(&b.principal_id));
        Self {
            version: SNAPSHOT_VERSION,
            taken_at,
            groups,
            principals,
        }
    }

    /// A snapshot with no groups and no principals.
    pub fn empty(taken_at: Timestamp) -> Self {
        Self::new(taken_at, Vec::new(), Vec::new())
    }

    /// Whether there is nothing in the snapshot.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.principals.is_empty()
    }

    /// Check the version, every entry, and key uniqueness.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(CoreError::UnsupportedVersion(self.version));
        }

        let mut group_keys = HashSet::new();
        for group in &self.groups {
            group.validate()?;
            if !group_keys.insert(group.key()) {
                return Err(ValidationError::DuplicateGroup(group.name.clone()).into());
            }
        }

        let mut principal_ids = HashSet::new();
        for principal in &self.principals {
            principal.validate()?;
            if !principal_ids.insert(principal.principal_id.clone()) {
                return Err(ValidationError::DuplicatePrincipal(
                    principal.principal_id.to_string(),
                )
                .into());
            }
        }

        Ok(())
    }

    /// Encode to canonical CBOR bytes.
    pub fn to_cbor(&self) -> Result<Bytes, CoreError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(Bytes::from(buf))
    }

    /// Decode from CBOR bytes and validate.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, CoreError> {
        let snapshot: Self =
            ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Encode to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    /// Decode from JSON and validate.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| CoreError::DecodingError(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Blake3 digest of the canonical CBOR encoding.
    pub fn digest(&self) -> Result<SnapshotDigest, CoreError> {
        Ok(SnapshotDigest::hash(&self.to_cbor()?))
    }

    /// Find a group by name (case-insensitive).
    pub fn group(&self, name: &str) -> Option<&Group> {
        let key = group_key(name);
        self.groups.iter().find(|g| g.key() == key)
    }
}
