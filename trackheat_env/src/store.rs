//! Snapshot store abstraction used by the heatmap aggregator.

use crate::error::StoreError;
use crate::types::{CumulativeSnapshot, SnapshotKey};

/// Outcome of a write-if-absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The snapshot was stored under the key
    Written,
    
    /// Another writer already claimed the key; the stored value was kept
    AlreadyPresent,
}

/// Durable key -> snapshot storage.
///
/// # Implementations
///
/// - **Durable**: [`crate::SledSnapshotStore`], embedded sled database
/// - **Memory**: [`crate::MemorySnapshotStore`], lost on drop
///
/// # Single writer
///
/// `write` never overwrites. The first writer of a key wins and later
/// writers observe [`WriteOutcome::AlreadyPresent`], so two runs over the
/// same collection cannot interleave different values for one step.
pub trait SnapshotStore: Send + Sync {
    /// Returns true if a snapshot is stored under `key`.
    fn exists(&self, key: &SnapshotKey) -> Result<bool, StoreError>;
    
    /// Reads the snapshot stored under `key`.
    ///
    /// # Returns
    /// * `Err(StoreError::NotFound)` - Nothing stored under the key
    /// * `Err(StoreError::Corrupt)` - Bytes are present but undecodable
    fn read(&self, key: &SnapshotKey) -> Result<CumulativeSnapshot, StoreError>;
    
    /// Stores `snapshot` under `key` unless the key is already present.
    fn write(&self, key: &SnapshotKey, snapshot: &CumulativeSnapshot) -> Result<WriteOutcome, StoreError>;
    
    /// Deletes the entry under `key`, returning whether one was present.
    ///
    /// Used to discard a corrupt entry so the step can be written again.
    fn remove(&self, key: &SnapshotKey) -> Result<bool, StoreError>;
    
    /// Deletes every step stored for `collection`.
    ///
    /// # Returns
    /// Number of snapshots removed.
    fn clear_collection(&self, collection: &str) -> Result<usize, StoreError>;
}
