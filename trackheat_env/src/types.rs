//! Common types shared between the heatmap engine and its storage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A grid cell, addressed by `(lat_index, lon_index)`.
///
/// Indices are only meaningful relative to the grid that produced them;
/// validity (`index < num_cells` on each axis) is checked by the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellIndex {
    pub lat: u32,
    pub lon: u32,
}

impl CellIndex {
    /// Creates a cell index from its two axis indices.
    pub fn new(lat: u32, lon: u32) -> Self {
        Self { lat, lon }
    }

    /// Returns true if `other` is this cell or one of its 8 neighbours.
    pub fn is_adjacent_or_same(&self, other: &CellIndex) -> bool {
        self.lat.abs_diff(other.lat) <= 1 && self.lon.abs_diff(other.lon) <= 1
    }
}

impl std::fmt::Display for CellIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

/// Key of one persisted snapshot: collection name plus elapsed-second step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub collection: String,
    pub step: u32,
}

impl SnapshotKey {
    /// Creates a key for `step` within `collection`.
    pub fn new(collection: impl Into<String>, step: u32) -> Self {
        Self {
            collection: collection.into(),
            step,
        }
    }

    /// Prefix shared by every key of a collection and by no other key.
    ///
    /// The name is length-prefixed, so `"runs"` never matches keys of
    /// `"runs/2024"` whatever characters the names contain.
    pub fn collection_prefix(collection: &str) -> String {
        format!("{}:{}/", collection.len(), collection)
    }

    /// Storage form of the key. Steps are zero-padded so that a
    /// collection's keys sort in time order.
    pub fn encode(&self) -> String {
        format!("{}{:010}", Self::collection_prefix(&self.collection), self.step)
    }
}

impl std::fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.step)
    }
}

/// Visit count of a single cell, the wire form of a snapshot entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCount {
    pub lat: u32,
    pub lon: u32,
    pub count: u32,
}

/// Total visit count per cell over elapsed seconds `0..=t`.
///
/// Only non-zero cells are held. Cells live in a `BTreeMap` so iteration,
/// and therefore the encoded form, is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRecord", into = "SnapshotRecord")]
pub struct CumulativeSnapshot {
    cells: BTreeMap<CellIndex, u32>,
}

impl CumulativeSnapshot {
    /// Creates the all-zero snapshot (the state before step 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `count` visits to `cell`. Adding zero is a no-op.
    pub fn add(&mut self, cell: CellIndex, count: u32) {
        if count == 0 {
            return;
        }
        let entry = self.cells.entry(cell).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    /// Returns the next cumulative state: this snapshot plus `delta`,
    /// summed cell-wise. `self` is left untouched.
    pub fn accumulate<'a, I>(&self, delta: I) -> Self
    where
        I: IntoIterator<Item = (&'a CellIndex, &'a u32)>,
    {
        let mut next = self.clone();
        for (cell, count) in delta {
            next.add(*cell, *count);
        }
        next
    }

    /// Visit count of `cell` (zero if never visited).
    pub fn count(&self, cell: &CellIndex) -> u32 {
        self.cells.get(cell).copied().unwrap_or(0)
    }

    /// Iterates over visited cells in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&CellIndex, &u32)> {
        self.cells.iter()
    }

    /// Number of cells with a non-zero count.
    pub fn visited_cells(&self) -> usize {
        self.cells.len()
    }

    /// Sum of all cell counts.
    pub fn total_hits(&self) -> u64 {
        self.cells.values().map(|&c| c as u64).sum()
    }

    /// Largest single-cell count (zero for an empty snapshot).
    pub fn max_count(&self) -> u32 {
        self.cells.values().copied().max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns true if every cell of `previous` is present here with at
    /// least the same count.
    pub fn dominates(&self, previous: &CumulativeSnapshot) -> bool {
        previous
            .cells
            .iter()
            .all(|(cell, &count)| self.count(cell) >= count)
    }
}

/// Serialized layout of a [`CumulativeSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotRecord {
    cells: Vec<CellCount>,
}

impl From<CumulativeSnapshot> for SnapshotRecord {
    fn from(snapshot: CumulativeSnapshot) -> Self {
        Self {
            cells: snapshot
                .cells
                .into_iter()
                .map(|(cell, count)| CellCount {
                    lat: cell.lat,
                    lon: cell.lon,
                    count,
                })
                .collect(),
        }
    }
}

impl TryFrom<SnapshotRecord> for CumulativeSnapshot {
    type Error = String;

    fn try_from(record: SnapshotRecord) -> Result<Self, Self::Error> {
        let mut cells = BTreeMap::new();
        for entry in record.cells {
            if entry.count == 0 {
                return Err(format!("zero count stored for cell ({}, {})", entry.lat, entry.lon));
            }
            let cell = CellIndex::new(entry.lat, entry.lon);
            if cells.insert(cell, entry.count).is_some() {
                return Err(format!("duplicate cell {}", cell));
            }
        }
        Ok(Self { cells })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_key_sorts_by_step() {
        let early = SnapshotKey::new("ride", 9);
        let late = SnapshotKey::new("ride", 10);

        assert!(early.encode() < late.encode());
        assert_eq!(early.encode(), "4:ride/0000000009");
        assert_eq!(early.to_string(), "ride/9");
    }

    #[test]
    fn test_collection_prefix_is_unambiguous() {
        let prefix = SnapshotKey::collection_prefix("runs");

        assert!(SnapshotKey::new("runs", 3).encode().starts_with(&prefix));
        assert!(!SnapshotKey::new("runs/2024", 3).encode().starts_with(&prefix));
        assert!(!SnapshotKey::new("runsX", 3).encode().starts_with(&prefix));
    }

    #[test]
    fn test_accumulate_is_cell_wise_sum() {
        let mut base = CumulativeSnapshot::new();
        base.add(CellIndex::new(0, 0), 2);

        let mut delta = BTreeMap::new();
        delta.insert(CellIndex::new(0, 0), 1);
        delta.insert(CellIndex::new(1, 0), 3);

        let next = base.accumulate(&delta);

        assert_eq!(next.count(&CellIndex::new(0, 0)), 3);
        assert_eq!(next.count(&CellIndex::new(1, 0)), 3);
        assert_eq!(next.total_hits(), 6);
        assert!(next.dominates(&base));
        // Previous state is not mutated
        assert_eq!(base.total_hits(), 2);
    }

    #[test]
    fn test_zero_count_is_not_stored() {
        let mut snapshot = CumulativeSnapshot::new();
        snapshot.add(CellIndex::new(5, 5), 0);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_record_rejects_duplicate_cells() {
        let record = SnapshotRecord {
            cells: vec![
                CellCount { lat: 1, lon: 1, count: 1 },
                CellCount { lat: 1, lon: 1, count: 2 },
            ],
        };
        assert!(CumulativeSnapshot::try_from(record).is_err());
    }

    #[test]
    fn test_adjacency() {
        let cell = CellIndex::new(4, 4);
        assert!(cell.is_adjacent_or_same(&CellIndex::new(5, 3)));
        assert!(cell.is_adjacent_or_same(&cell));
        assert!(!cell.is_adjacent_or_same(&CellIndex::new(6, 4)));
    }
}
