//! Durable implementation of SnapshotStore using sled.

use crate::codec::{decode_snapshot, encode_snapshot};
use crate::error::StoreError;
use crate::store::{SnapshotStore, WriteOutcome};
use crate::types::{CumulativeSnapshot, SnapshotKey};
use std::path::Path;

/// Sled-based persistent snapshot store.
///
/// Uses an embedded key-value database for durability. Every successful
/// write is flushed before returning, so a crash after step `t` was
/// reported written never loses step `t`.
pub struct SledSnapshotStore {
    db: sled::Db,
}

impl SledSnapshotStore {
    /// Open a persistent store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)
            .map_err(|e| StoreError::backend(format!("Failed to open sled DB: {}", e)))?;
        Ok(Self { db })
    }
    
    /// Create a temporary store, deleted when dropped
    pub fn temporary() -> Result<Self, StoreError> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()
            .map_err(|e| StoreError::backend(format!("Failed to open temp DB: {}", e)))?;
        Ok(Self { db })
    }
    
    /// Stores raw bytes under `key`, replacing anything present.
    pub fn insert_raw(&self, key: &SnapshotKey, bytes: &[u8]) -> Result<(), StoreError> {
        self.db.insert(key.encode().as_bytes(), bytes)
            .map_err(|e| StoreError::backend(format!("Insert failed: {}", e)))?;
        Ok(())
    }
}

impl SnapshotStore for SledSnapshotStore {
    fn exists(&self, key: &SnapshotKey) -> Result<bool, StoreError> {
        self.db.contains_key(key.encode().as_bytes())
            .map_err(|e| StoreError::backend(format!("Lookup failed: {}", e)))
    }
    
    fn read(&self, key: &SnapshotKey) -> Result<CumulativeSnapshot, StoreError> {
        let bytes = self.db.get(key.encode().as_bytes())
            .map_err(|e| StoreError::backend(format!("Read failed: {}", e)))?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        decode_snapshot(key, &bytes)
    }
    
    fn write(&self, key: &SnapshotKey, snapshot: &CumulativeSnapshot) -> Result<WriteOutcome, StoreError> {
        let bytes = encode_snapshot(snapshot)?;
        let claimed = self.db
            .compare_and_swap(key.encode().as_bytes(), None as Option<&[u8]>, Some(bytes))
            .map_err(|e| StoreError::backend(format!("Write failed: {}", e)))?;
        if claimed.is_err() {
            return Ok(WriteOutcome::AlreadyPresent);
        }
        self.db.flush()
            .map_err(|e| StoreError::backend(format!("Flush failed: {}", e)))?;
        Ok(WriteOutcome::Written)
    }
    
    fn remove(&self, key: &SnapshotKey) -> Result<bool, StoreError> {
        let previous = self.db.remove(key.encode().as_bytes())
            .map_err(|e| StoreError::backend(format!("Remove failed: {}", e)))?;
        self.db.flush()
            .map_err(|e| StoreError::backend(format!("Flush failed: {}", e)))?;
        Ok(previous.is_some())
    }
    
    fn clear_collection(&self, collection: &str) -> Result<usize, StoreError> {
        let prefix = SnapshotKey::collection_prefix(collection);
        let mut removed = 0;
        for result in self.db.scan_prefix(prefix.as_bytes()) {
            let (key, _) = result
                .map_err(|e| StoreError::backend(format!("Iteration failed: {}", e)))?;
            self.db.remove(key)
                .map_err(|e| StoreError::backend(format!("Remove failed: {}", e)))?;
            removed += 1;
        }
        self.db.flush()
            .map_err(|e| StoreError::backend(format!("Flush failed: {}", e)))?;
        Ok(removed)
    }
}
