//! TrackHeat Core - Time-Evolving GPS Track Heatmaps
//!
//! Turns raw GPS recordings into a sequence of cumulative heatmaps, one per
//! elapsed second since movement began:
//! 1. **Track Normalizer**: pauses and dropouts removed, tracks resampled to a contiguous 1 Hz clock
//! 2. **Grid**: meter-sized cells over the corpus, with a margin, sized via spherical geodesy
//! 3. **Heatmap Aggregator**: gap-filled cell walks folded into memoized cumulative snapshots
//!
//! Snapshots are persisted through `trackheat_env`'s `SnapshotStore`, so an
//! interrupted run resumes from its last stored step.

pub mod aggregator;
pub mod config;
pub mod geodesy;
pub mod grid;
pub mod normalizer;
pub mod pipeline;
pub mod track;

// Re-export key types for convenience
pub use aggregator::{AggregateError, AggregationReport, HeatmapAggregator, HeatmapSeries, IndexedSample, IndexedTrack};
pub use config::{ConfigError, HeatmapConfig, SolverConfig};
pub use geodesy::{GeodesyError, LatLon};
pub use grid::{Grid, GridError, GridSpec, SpatialSpan};
pub use normalizer::{TrackNormalizer, TrackRejection};
pub use pipeline::{build_heatmap, collection_name, normalize_corpus, HeatmapOutput, NormalizationReport, NormalizedCorpus, PipelineError};
pub use track::{CleanedSample, CleanedTrack, RawSample, RawTrack, SourceError, TrackSource};
pub use trackheat_env::{CellIndex, CumulativeSnapshot};
