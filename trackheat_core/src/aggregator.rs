//! The Heatmap Aggregator - cumulative per-cell visit counts over elapsed time
//!
//! ## Pipeline
//!
//! 1. **Indexing**: every cleaned sample is mapped to a [`CellIndex`]
//! 2. **Gap filling**: jumps of more than one cell between consecutive
//!    samples are bridged with interpolated cells
//! 3. **Delta heat**: samples grouped by elapsed second and cell
//! 4. **Fold**: `snapshot(t) = snapshot(t - 1) + delta(t)`, strictly in `t` order
//!
//! Steps 1-3 run per track in parallel. Step 4 is sequential and memoized
//! through a [`SnapshotStore`]: a step already in the store is loaded
//! instead of recomputed, so an interrupted run resumes where it stopped.

use crate::grid::{Grid, GridError, GridSpec};
use crate::track::CleanedTrack;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use trackheat_env::{CellIndex, CumulativeSnapshot, SnapshotKey, SnapshotStore, StoreError, WriteOutcome};
use tracing::{debug, info, warn};

/// Errors that stop an aggregation before it starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregateError {
    #[error("No tracks to aggregate")]
    EmptyCorpus,

    #[error("Track {track_id} does not fit the grid: {source}")]
    Grid {
        track_id: String,
        #[source]
        source: GridError,
    },
}

// ============================================================================
// INDEXED TRACKS
// ============================================================================

/// One cell visit at one elapsed second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedSample {
    pub elapsed_seconds: u32,
    pub cell: CellIndex,
}

impl IndexedSample {
    pub fn new(elapsed_seconds: u32, cell: CellIndex) -> Self {
        Self { elapsed_seconds, cell }
    }
}

/// A track as a gap-free walk over grid cells.
///
/// Consecutive samples never differ by more than one cell on either axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedTrack {
    id: String,
    samples: Vec<IndexedSample>,
}

impl IndexedTrack {
    /// Builds a track from raw cell visits, filling any gaps.
    pub fn new(id: impl Into<String>, samples: &[IndexedSample]) -> Self {
        Self {
            id: id.into(),
            samples: fill_gaps(samples),
        }
    }

    /// Maps every sample of `track` onto `grid`, then fills gaps.
    pub fn from_cleaned(track: &CleanedTrack, grid: &GridSpec) -> Result<Self, GridError> {
        let raw = track
            .samples()
            .iter()
            .map(|s| {
                grid.latlon_to_cell_index(s.latitude, s.longitude)
                    .map(|cell| IndexedSample::new(s.elapsed_seconds, cell))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(track.id(), &raw))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn samples(&self) -> &[IndexedSample] {
        &self.samples
    }

    pub fn max_elapsed_seconds(&self) -> u32 {
        self.samples.iter().map(|s| s.elapsed_seconds).max().unwrap_or(0)
    }

    /// Returns true if every consecutive pair is the same or a neighbouring cell.
    pub fn is_contiguous(&self) -> bool {
        self.samples
            .windows(2)
            .all(|w| w[0].cell.is_adjacent_or_same(&w[1].cell))
    }
}

/// Bridges every jump of more than one cell.
///
/// For a jump of `N = max(|dlat|, |dlon|)` cells, `N - 1` intermediate cells
/// are inserted on the straight line between the endpoints, each stamped
/// with the destination's elapsed second. Offsets are rounded half away
/// from zero.
pub fn fill_gaps(samples: &[IndexedSample]) -> Vec<IndexedSample> {
    let mut filled = Vec::with_capacity(samples.len());
    let mut previous: Option<IndexedSample> = None;

    for &sample in samples {
        if let Some(prev) = previous {
            for cell in interpolate(prev.cell, sample.cell) {
                let visit = IndexedSample::new(sample.elapsed_seconds, cell);
                if filled.last() != Some(&visit) {
                    filled.push(visit);
                }
            }
        }
        filled.push(sample);
        previous = Some(sample);
    }

    filled
}

/// Cells strictly between `from` and `to`; empty unless they are more than
/// one cell apart.
fn interpolate(from: CellIndex, to: CellIndex) -> Vec<CellIndex> {
    let dlat = to.lat as i64 - from.lat as i64;
    let dlon = to.lon as i64 - from.lon as i64;
    let n = dlat.abs().max(dlon.abs());
    if n <= 1 {
        return Vec::new();
    }

    (1..n)
        .map(|k| {
            let lat = from.lat as i64 + ((dlat * k) as f64 / n as f64).round() as i64;
            let lon = from.lon as i64 + ((dlon * k) as f64 / n as f64).round() as i64;
            CellIndex::new(lat as u32, lon as u32)
        })
        .collect()
}

// ============================================================================
// DELTA HEAT
// ============================================================================

/// Per-step visit counts: `steps[t][cell]` is the number of samples of all
/// tracks in `cell` at elapsed second `t`.
#[derive(Debug, Clone, Default, PartialEq)]
struct DeltaHeat {
    steps: Vec<BTreeMap<CellIndex, u32>>,
}

impl DeltaHeat {
    fn with_steps(len: usize) -> Self {
        Self {
            steps: vec![BTreeMap::new(); len],
        }
    }

    fn count_track(mut self, track: &IndexedTrack) -> Self {
        for sample in track.samples() {
            if let Some(step) = self.steps.get_mut(sample.elapsed_seconds as usize) {
                let count = step.entry(sample.cell).or_insert(0);
                *count = count.saturating_add(1);
            }
        }
        self
    }

    /// Sums two partial counts. Counting is commutative, so partials from
    /// any split of the tracks merge to the same result.
    fn merge(mut self, other: Self) -> Self {
        if other.steps.len() > self.steps.len() {
            return other.merge(self);
        }
        for (mine, theirs) in self.steps.iter_mut().zip(other.steps) {
            for (cell, n) in theirs {
                let count = mine.entry(cell).or_insert(0);
                *count = count.saturating_add(n);
            }
        }
        self
    }

    fn build(tracks: &[IndexedTrack], len: usize) -> Self {
        tracks
            .par_iter()
            .fold(|| Self::with_steps(len), |acc, track| acc.count_track(track))
            .reduce(|| Self::with_steps(len), Self::merge)
    }

    fn at(&self, step: u32) -> Option<&BTreeMap<CellIndex, u32>> {
        self.steps.get(step as usize)
    }
}

// ============================================================================
// RUN OUTPUT
// ============================================================================

/// What happened to each step of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationReport {
    /// Steps read back from the store
    pub loaded_steps: usize,

    /// Steps computed in this run
    pub computed_steps: usize,

    /// Steps present in the store but unreadable, recomputed
    pub unreadable_steps: Vec<u32>,

    /// Steps whose snapshot could not be persisted
    pub failed_writes: Vec<u32>,

    /// Steps another writer persisted first
    pub contested_writes: Vec<u32>,
}

impl AggregationReport {
    /// A run is durable when every step it produced is in the store.
    pub fn is_durable(&self) -> bool {
        self.failed_writes.is_empty()
    }
}

/// Ordered snapshots `0..=last_step` plus the grid they are drawn on.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapSeries {
    pub collection: String,
    pub grid: GridSpec,
    pub snapshots: Vec<CumulativeSnapshot>,
    pub report: AggregationReport,
}

impl HeatmapSeries {
    /// Snapshot at elapsed second `step`.
    pub fn snapshot(&self, step: u32) -> Option<&CumulativeSnapshot> {
        self.snapshots.get(step as usize)
    }

    /// The final cumulative state.
    pub fn last(&self) -> Option<&CumulativeSnapshot> {
        self.snapshots.last()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Returns true if no cell count ever decreases from one step to the next.
    pub fn is_monotonic(&self) -> bool {
        self.snapshots.windows(2).all(|w| w[1].dominates(&w[0]))
    }
}

/// Result of looking a step up in the store.
enum Lookup {
    Hit(CumulativeSnapshot),
    Miss,
    Unreadable { corrupt: bool },
}

// ============================================================================
// AGGREGATOR
// ============================================================================

/// Turns indexed tracks into a memoized sequence of cumulative snapshots.
#[derive(Debug, Clone)]
pub struct HeatmapAggregator {
    grid: GridSpec,
    tracks: Vec<IndexedTrack>,
    delta: DeltaHeat,
    max_elapsed_seconds: u32,
}

impl HeatmapAggregator {
    /// Indexes and gap-fills `tracks` on `grid`.
    ///
    /// # Arguments
    /// * `grid` - Grid built from the same corpus
    /// * `tracks` - Cleaned tracks; must not be empty
    pub fn new(grid: &Grid, tracks: &[CleanedTrack]) -> Result<Self, AggregateError> {
        if tracks.is_empty() {
            return Err(AggregateError::EmptyCorpus);
        }
        let spec = *grid.spec();

        let indexed = tracks
            .par_iter()
            .map(|track| {
                IndexedTrack::from_cleaned(track, &spec).map_err(|source| AggregateError::Grid {
                    track_id: track.id().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_indexed(spec, indexed)
    }

    /// Aggregates tracks that are already on the grid.
    pub fn from_indexed(grid: GridSpec, tracks: Vec<IndexedTrack>) -> Result<Self, AggregateError> {
        if tracks.is_empty() {
            return Err(AggregateError::EmptyCorpus);
        }

        let max_elapsed_seconds = tracks.iter().map(|t| t.max_elapsed_seconds()).max().unwrap_or(0);
        let delta = DeltaHeat::build(&tracks, max_elapsed_seconds as usize + 1);

        debug!(
            "aggregator: {} tracks, {} steps",
            tracks.len(),
            max_elapsed_seconds as usize + 1
        );

        Ok(Self {
            grid,
            tracks,
            delta,
            max_elapsed_seconds,
        })
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn indexed_tracks(&self) -> &[IndexedTrack] {
        &self.tracks
    }

    pub fn max_elapsed_seconds(&self) -> u32 {
        self.max_elapsed_seconds
    }

    /// Visits at exactly elapsed second `step`, by cell.
    pub fn delta_heat(&self, step: u32) -> BTreeMap<CellIndex, u32> {
        self.delta.at(step).cloned().unwrap_or_default()
    }

    /// Produces every snapshot from 0 to the longest track's last second.
    pub fn run<S: SnapshotStore + ?Sized>(&self, store: &S, collection: &str) -> HeatmapSeries {
        self.run_until(store, collection, self.max_elapsed_seconds)
    }

    /// Produces snapshots `0..=min(last_step, max_elapsed_seconds)`.
    ///
    /// Storage problems never abort the run: unreadable steps are
    /// recomputed and failed writes are listed in the report.
    pub fn run_until<S: SnapshotStore + ?Sized>(&self, store: &S, collection: &str, last_step: u32) -> HeatmapSeries {
        let last = last_step.min(self.max_elapsed_seconds);
        let mut report = AggregationReport::default();
        let mut snapshots = Vec::with_capacity(last as usize + 1);
        let mut current = CumulativeSnapshot::new();

        info!("Aggregating {} steps 0..={}", collection, last);

        for step in 0..=last {
            let key = SnapshotKey::new(collection, step);

            current = match lookup(store, &key) {
                Lookup::Hit(snapshot) => {
                    report.loaded_steps += 1;
                    snapshot
                }
                Lookup::Miss => self.compute_and_persist(store, &key, &current, &mut report),
                Lookup::Unreadable { corrupt } => {
                    report.unreadable_steps.push(step);
                    if corrupt {
                        if let Err(e) = store.remove(&key) {
                            warn!("Could not discard corrupt snapshot {}: {}", key, e);
                        }
                    }
                    self.compute_and_persist(store, &key, &current, &mut report)
                }
            };

            snapshots.push(current.clone());
        }

        info!(
            "{}: {} loaded, {} computed, {} unreadable, {} failed writes",
            collection,
            report.loaded_steps,
            report.computed_steps,
            report.unreadable_steps.len(),
            report.failed_writes.len()
        );

        HeatmapSeries {
            collection: collection.to_string(),
            grid: self.grid,
            snapshots,
            report,
        }
    }

    fn compute_and_persist<S: SnapshotStore + ?Sized>(
        &self,
        store: &S,
        key: &SnapshotKey,
        previous: &CumulativeSnapshot,
        report: &mut AggregationReport,
    ) -> CumulativeSnapshot {
        let next = match self.delta.at(key.step) {
            Some(delta) => previous.accumulate(delta),
            None => previous.clone(),
        };
        report.computed_steps += 1;

        match store.write(key, &next) {
            Ok(WriteOutcome::Written) => {}
            Ok(WriteOutcome::AlreadyPresent) => {
                debug!("{} already written by another run", key);
                report.contested_writes.push(key.step);
            }
            Err(e) => {
                warn!("Failed to persist {}: {}", key, e);
                report.failed_writes.push(key.step);
            }
        }

        next
    }
}

fn lookup<S: SnapshotStore + ?Sized>(store: &S, key: &SnapshotKey) -> Lookup {
    match store.exists(key) {
        Ok(false) => Lookup::Miss,
        Ok(true) => match store.read(key) {
            Ok(snapshot) => Lookup::Hit(snapshot),
            Err(StoreError::NotFound(_)) => Lookup::Miss,
            Err(e) => {
                warn!("Unreadable snapshot {}, recomputing: {}", key, e);
                Lookup::Unreadable { corrupt: e.is_corrupt() }
            }
        },
        Err(e) => {
            warn!("Cannot check {}, recomputing: {}", key, e);
            Lookup::Unreadable { corrupt: false }
        }
    }
}
