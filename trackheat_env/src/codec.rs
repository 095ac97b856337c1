//! Byte encoding of snapshots for stores that hold opaque blobs.

use crate::error::StoreError;
use crate::types::{CumulativeSnapshot, SnapshotKey};

/// Encodes a snapshot as JSON bytes.
///
/// Encoding is deterministic: equal snapshots produce identical bytes.
pub fn encode_snapshot(snapshot: &CumulativeSnapshot) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(snapshot).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Decodes bytes stored under `key`. Any failure is reported as
/// [`StoreError::Corrupt`].
pub fn decode_snapshot(key: &SnapshotKey, bytes: &[u8]) -> Result<CumulativeSnapshot, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::corrupt(key, e))
}
