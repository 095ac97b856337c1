//! Error types for the TrackHeat storage abstraction.

use thiserror::Error;

/// Errors that can occur while reading or writing snapshots.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database or lock failed
    #[error("Storage backend error: {0}")]
    Backend(String),
    
    /// No snapshot is stored under the key
    #[error("Snapshot not found: {0}")]
    NotFound(String),
    
    /// Stored bytes could not be decoded into a snapshot
    #[error("Corrupt snapshot at {key}: {reason}")]
    Corrupt { key: String, reason: String },
    
    /// A snapshot could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Creates a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
    
    /// Creates a corruption error for the given key.
    pub fn corrupt(key: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::Corrupt {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
    
    /// Returns true if this error means the stored value is unusable but the
    /// store itself is healthy.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}
