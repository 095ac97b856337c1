//! TrackHeat Environment Abstraction Layer
//!
//! This crate isolates the heatmap engine from where its state lives.
//! The aggregator in `trackheat_core` only ever talks to a [`SnapshotStore`],
//! so the same code runs against:
//! - **Durable storage**: [`SledSnapshotStore`], an embedded key-value database
//! - **Memory**: [`MemorySnapshotStore`], for tests and throwaway runs
//!
//! # Keys
//!
//! Every persisted snapshot is addressed by a [`SnapshotKey`], the pair
//! `(collection name, elapsed-second step)`. Keys of one collection sort in
//! step order.
//!
//! # Example
//!
//! ```
//! use trackheat_env::{CellIndex, CumulativeSnapshot, MemorySnapshotStore, SnapshotKey, SnapshotStore};
//!
//! let store = MemorySnapshotStore::new();
//! let key = SnapshotKey::new("commutes", 0);
//!
//! let mut snapshot = CumulativeSnapshot::new();
//! snapshot.add(CellIndex::new(3, 4), 2);
//!
//! store.write(&key, &snapshot).unwrap();
//! assert!(store.exists(&key).unwrap());
//! assert_eq!(store.read(&key).unwrap(), snapshot);
//! ```

mod codec;
mod error;
mod memory_impl;
mod sled_impl;
mod store;
mod types;

pub use codec::{decode_snapshot, encode_snapshot};
pub use error::StoreError;
pub use memory_impl::MemorySnapshotStore;
pub use sled_impl::SledSnapshotStore;
pub use store::{SnapshotStore, WriteOutcome};
pub use types::{CellCount, CellIndex, CumulativeSnapshot, SnapshotKey};
