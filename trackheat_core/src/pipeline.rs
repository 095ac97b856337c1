//! End-to-end entry point: track sources in, snapshot series out.

use crate::aggregator::{AggregateError, HeatmapAggregator, HeatmapSeries};
use crate::config::{ConfigError, HeatmapConfig};
use crate::grid::{Grid, GridError};
use crate::normalizer::{TrackNormalizer, TrackRejection};
use crate::track::{CleanedTrack, TrackSource};
use rayon::prelude::*;
use thiserror::Error;
use trackheat_env::SnapshotStore;
use tracing::{debug, info, warn};

/// Failures that produce no heatmap at all.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("No usable tracks ({rejected} rejected)")]
    EmptyCorpus { rejected: usize },

    #[error("Grid construction failed: {0}")]
    Grid(#[from] GridError),

    #[error("Aggregation failed: {0}")]
    Aggregate(#[from] AggregateError),
}

/// Tracks that were dropped while cleaning a corpus, by source id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizationReport {
    pub accepted: usize,
    pub rejected: Vec<(String, TrackRejection)>,
}

impl NormalizationReport {
    /// Rejections that point at a bad source rather than a short ride.
    pub fn malformed(&self) -> impl Iterator<Item = &(String, TrackRejection)> {
        self.rejected.iter().filter(|(_, r)| r.is_malformed())
    }
}

/// Cleaned tracks of a corpus, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedCorpus {
    pub tracks: Vec<CleanedTrack>,
    pub report: NormalizationReport,
}

/// Cleans every source in parallel. Rejected tracks are logged and left out.
pub fn normalize_corpus<S: TrackSource>(sources: &[S], config: &HeatmapConfig) -> NormalizedCorpus {
    let normalizer = TrackNormalizer::new(config);
    let results: Vec<_> = sources
        .par_iter()
        .map(|source| (source.id().to_string(), normalizer.normalize_source(source)))
        .collect();

    let mut corpus = NormalizedCorpus::default();
    for (id, result) in results {
        match result {
            Ok(track) => corpus.tracks.push(track),
            Err(rejection) => {
                if rejection.is_malformed() {
                    warn!("Rejected track {}: {}", id, rejection);
                } else {
                    debug!("Skipped track {}: {}", id, rejection);
                }
                corpus.report.rejected.push((id, rejection));
            }
        }
    }
    corpus.report.accepted = corpus.tracks.len();
    corpus
}

/// Name of a heatmap combining the given tracks: their ids concatenated.
pub fn collection_name<I, S>(ids: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ids.into_iter().fold(String::new(), |mut name, id| {
        name.push_str(id.as_ref());
        name
    })
}

/// Output of [`build_heatmap`].
#[derive(Debug, Clone)]
pub struct HeatmapOutput {
    pub series: HeatmapSeries,
    pub normalization: NormalizationReport,
}

/// Cleans `sources`, builds their grid and aggregates every step into
/// `store` under `collection`.
///
/// # Arguments
/// * `collection` - Store namespace; see [`collection_name`]
/// * `sources` - One source per track
/// * `config` - Validated before any work starts
/// * `store` - Memo of previously computed steps
pub fn build_heatmap<S, St>(
    collection: &str,
    sources: &[S],
    config: &HeatmapConfig,
    store: &St,
) -> Result<HeatmapOutput, PipelineError>
where
    S: TrackSource,
    St: SnapshotStore + ?Sized,
{
    config.validate()?;

    let corpus = normalize_corpus(sources, config);
    info!(
        "{}: {} of {} tracks usable",
        collection,
        corpus.report.accepted,
        sources.len()
    );
    if corpus.tracks.is_empty() {
        return Err(PipelineError::EmptyCorpus {
            rejected: corpus.report.rejected.len(),
        });
    }

    let grid = Grid::build(&corpus.tracks, config)?;
    let aggregator = HeatmapAggregator::new(&grid, &corpus.tracks)?;
    let series = aggregator.run(store, collection);

    Ok(HeatmapOutput {
        series,
        normalization: corpus.report,
    })
}
