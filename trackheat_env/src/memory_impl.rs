//! In-memory implementation of SnapshotStore.

use crate::codec::{decode_snapshot, encode_snapshot};
use crate::error::StoreError;
use crate::store::{SnapshotStore, WriteOutcome};
use crate::types::{CumulativeSnapshot, SnapshotKey};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Snapshot store backed by a map of encoded blobs.
///
/// Snapshots are held encoded, exactly as a durable store would hold them,
/// so decode failures behave the same way in tests.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemorySnapshotStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Stores raw bytes under `key`, replacing anything present.
    ///
    /// Bypasses encoding; used to simulate damaged entries.
    pub fn insert_raw(&self, key: &SnapshotKey, bytes: Vec<u8>) -> Result<(), StoreError> {
        let mut blobs = self.blobs.write().map_err(|_| StoreError::backend("lock poisoned"))?;
        blobs.insert(key.encode(), bytes);
        Ok(())
    }
    
    /// Number of stored snapshots across all collections.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }
    
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn exists(&self, key: &SnapshotKey) -> Result<bool, StoreError> {
        let blobs = self.blobs.read().map_err(|_| StoreError::backend("lock poisoned"))?;
        Ok(blobs.contains_key(&key.encode()))
    }
    
    fn read(&self, key: &SnapshotKey) -> Result<CumulativeSnapshot, StoreError> {
        let blobs = self.blobs.read().map_err(|_| StoreError::backend("lock poisoned"))?;
        let bytes = blobs
            .get(&key.encode())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        decode_snapshot(key, bytes)
    }
    
    fn write(&self, key: &SnapshotKey, snapshot: &CumulativeSnapshot) -> Result<WriteOutcome, StoreError> {
        let bytes = encode_snapshot(snapshot)?;
        let mut blobs = self.blobs.write().map_err(|_| StoreError::backend("lock poisoned"))?;
        let encoded = key.encode();
        if blobs.contains_key(&encoded) {
            return Ok(WriteOutcome::AlreadyPresent);
        }
        blobs.insert(encoded, bytes);
        Ok(WriteOutcome::Written)
    }
    
    fn remove(&self, key: &SnapshotKey) -> Result<bool, StoreError> {
        let mut blobs = self.blobs.write().map_err(|_| StoreError::backend("lock poisoned"))?;
        Ok(blobs.remove(&key.encode()).is_some())
    }
    
    fn clear_collection(&self, collection: &str) -> Result<usize, StoreError> {
        let prefix = SnapshotKey::collection_prefix(collection);
        let mut blobs = self.blobs.write().map_err(|_| StoreError::backend("lock poisoned"))?;
        let before = blobs.len();
        blobs.retain(|k, _| !k.starts_with(&prefix));
        Ok(before - blobs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellIndex;
    
    fn snapshot_with(count: u32) -> CumulativeSnapshot {
        let mut snapshot = CumulativeSnapshot::new();
        snapshot.add(CellIndex::new(1, 2), count);
        snapshot
    }
    
    #[test]
    fn test_write_then_read() {
        let store = MemorySnapshotStore::new();
        let key = SnapshotKey::new("walks", 4);
        
        assert!(!store.exists(&key).unwrap());
        assert_eq!(store.write(&key, &snapshot_with(3)).unwrap(), WriteOutcome::Written);
        assert!(store.exists(&key).unwrap());
        assert_eq!(store.read(&key).unwrap(), snapshot_with(3));
    }
    
    #[test]
    fn test_second_writer_does_not_overwrite() {
        let store = MemorySnapshotStore::new();
        let key = SnapshotKey::new("walks", 0);
        
        store.write(&key, &snapshot_with(1)).unwrap();
        let outcome = store.write(&key, &snapshot_with(9)).unwrap();
        
        assert_eq!(outcome, WriteOutcome::AlreadyPresent);
        assert_eq!(store.read(&key).unwrap().count(&CellIndex::new(1, 2)), 1);
    }
    
    #[test]
    fn test_missing_key_is_not_found() {
        let store = MemorySnapshotStore::new();
        let err = store.read(&SnapshotKey::new("walks", 1)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
    
    #[test]
    fn test_clear_collection_only_touches_prefix() {
        let store = MemorySnapshotStore::new();
        store.write(&SnapshotKey::new("a", 0), &snapshot_with(1)).unwrap();
        store.write(&SnapshotKey::new("a", 1), &snapshot_with(1)).unwrap();
        store.write(&SnapshotKey::new("ab", 0), &snapshot_with(1)).unwrap();
        
        assert_eq!(store.clear_collection("a").unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.exists(&SnapshotKey::new("ab", 0)).unwrap());
    }
    
    #[test]
    fn test_clear_collection_spares_nested_names() {
        let store = MemorySnapshotStore::new();
        store.write(&SnapshotKey::new("runs", 0), &snapshot_with(1)).unwrap();
        store.write(&SnapshotKey::new("runs/2024", 0), &snapshot_with(1)).unwrap();
        
        assert_eq!(store.clear_collection("runs").unwrap(), 1);
        assert!(store.exists(&SnapshotKey::new("runs/2024", 0)).unwrap());
    }
    
    #[test]
    fn test_raw_garbage_reads_as_corrupt() {
        let store = MemorySnapshotStore::new();
        let key = SnapshotKey::new("walks", 2);
        store.insert_raw(&key, b"\x00\x01".to_vec()).unwrap();
        
        assert!(store.exists(&key).unwrap());
        assert!(store.read(&key).unwrap_err().is_corrupt());
        
        assert!(store.remove(&key).unwrap());
        assert!(!store.remove(&key).unwrap());
        assert_eq!(store.write(&key, &snapshot_with(2)).unwrap(), WriteOutcome::Written);
    }
}
