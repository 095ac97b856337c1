//! Track Normalizer - raw fixes to a contiguous 1 Hz track
//!
//! Removes pauses and dropouts before tracks are placed on the shared
//! elapsed-time axis, so tracks recorded on different days line up by
//! "seconds since movement began":
//! 1. Sort by timestamp
//! 2. Speed from the previous fix (haversine distance / raw time gap)
//! 3. Round timestamps to whole seconds, take the gap to the previous fix
//! 4. Drop slow fixes (paused) and fixes after a long gap (dropout)
//! 5. Reject short tracks, and tracks whose median gap is not 1 s
//! 6. Renumber survivors 0, 1, 2, ...

use crate::config::HeatmapConfig;
use crate::geodesy::distance;
use crate::track::{CleanedTrack, RawSample, SourceError, TrackSource};
use thiserror::Error;
use tracing::debug;

/// Reasons a track produces no cleaned output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackRejection {
    /// Too few samples survived pause removal
    #[error("only {remaining} samples left after pause removal (need {required})")]
    TooShort { remaining: usize, required: usize },

    /// Survivors are not effectively 1 Hz
    #[error("median time step is {median_delta_s} s, expected 1 s")]
    Malformed { median_delta_s: f64 },

    /// The source could not be decoded
    #[error(transparent)]
    Unparseable(#[from] SourceError),
}

impl TrackRejection {
    /// Malformed tracks point at a bad source file and are worth surfacing;
    /// short tracks are routine.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. } | Self::Unparseable(_))
    }
}

/// A raw fix annotated during cleaning.
#[derive(Debug, Clone, Copy)]
struct AnnotatedSample {
    sample: RawSample,
    speed_mps: Option<f64>,
    delta_s: i64,
}

/// Converts raw samples into [`CleanedTrack`]s.
#[derive(Debug, Clone)]
pub struct TrackNormalizer {
    low_speed_threshold_mps: f64,
    max_time_delta_s: f64,
    min_track_samples: usize,
}

impl TrackNormalizer {
    /// Creates a normalizer using the cleaning thresholds of `config`.
    pub fn new(config: &HeatmapConfig) -> Self {
        Self {
            low_speed_threshold_mps: config.low_speed_threshold_mps,
            max_time_delta_s: config.max_time_delta_s,
            min_track_samples: config.min_track_samples,
        }
    }

    /// Reads and cleans one track from its source.
    pub fn normalize_source<S: TrackSource + ?Sized>(&self, source: &S) -> Result<CleanedTrack, TrackRejection> {
        let samples = source.read_samples()?;
        self.normalize(source.id(), &samples)
    }

    /// Cleans the samples of one track.
    ///
    /// # Arguments
    /// * `id` - Track identifier carried onto the cleaned track
    /// * `samples` - Raw fixes in arrival order (not necessarily time order)
    pub fn normalize(&self, id: &str, samples: &[RawSample]) -> Result<CleanedTrack, TrackRejection> {
        let mut sorted = samples.to_vec();
        sorted.sort_by_key(|s| s.timestamp_ms);

        let annotated = annotate(&sorted);
        let survivors: Vec<AnnotatedSample> = annotated
            .into_iter()
            .filter(|a| self.keeps(a))
            .collect();

        debug!(
            "track {}: {} of {} samples survive pause removal",
            id,
            survivors.len(),
            samples.len()
        );

        if survivors.len() < self.min_track_samples {
            return Err(TrackRejection::TooShort {
                remaining: survivors.len(),
                required: self.min_track_samples,
            });
        }

        let deltas: Vec<i64> = survivors.iter().map(|a| a.delta_s).collect();
        let median_delta_s = median(&deltas);
        if median_delta_s != 1.0 {
            return Err(TrackRejection::Malformed { median_delta_s });
        }

        Ok(CleanedTrack::from_positions(
            id,
            survivors.iter().map(|a| a.sample.position()),
        ))
    }

    /// The first fix has no speed and is always dropped, as is a repeated
    /// fix (same instant, same position).
    fn keeps(&self, annotated: &AnnotatedSample) -> bool {
        match annotated.speed_mps {
            Some(speed) => {
                speed >= self.low_speed_threshold_mps
                    && (annotated.delta_s as f64) <= self.max_time_delta_s
            }
            None => false,
        }
    }
}

/// Attaches speed and rounded time gap to each time-sorted fix.
fn annotate(sorted: &[RawSample]) -> Vec<AnnotatedSample> {
    let mut annotated = Vec::with_capacity(sorted.len());
    for (i, sample) in sorted.iter().enumerate() {
        let (speed_mps, delta_s) = match i.checked_sub(1).map(|j| sorted[j]) {
            Some(prev) => {
                let raw_gap_s = (sample.timestamp_ms - prev.timestamp_ms) as f64 / 1000.0;
                let meters = distance(prev.position(), sample.position());
                let speed = if raw_gap_s > 0.0 {
                    Some(meters / raw_gap_s)
                } else if meters > 0.0 {
                    // Moved within the same instant
                    Some(f64::INFINITY)
                } else {
                    None
                };
                let delta = round_to_second(sample.timestamp_ms) - round_to_second(prev.timestamp_ms);
                (speed, delta)
            }
            None => (None, 0),
        };
        annotated.push(AnnotatedSample {
            sample: *sample,
            speed_mps,
            delta_s,
        });
    }
    annotated
}

/// Rounds a millisecond timestamp to the nearest whole second, ties to even.
fn round_to_second(timestamp_ms: i64) -> i64 {
    let seconds = timestamp_ms.div_euclid(1000);
    match timestamp_ms.rem_euclid(1000) {
        r if r > 500 => seconds + 1,
        500 if seconds % 2 != 0 => seconds + 1,
        _ => seconds,
    }
}

/// Median of whole-second gaps; even counts average the two middle values.
fn median(values: &[i64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid] as f64
    } else {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::angular_extent_for_distance;
    use crate::track::RawTrack;

    const START_MS: i64 = 1_700_000_000_000;

    /// Fixes heading north at `speed_mps`, one every `step_ms`.
    fn northbound(count: usize, speed_mps: f64, step_ms: i64) -> Vec<RawSample> {
        let dlat = angular_extent_for_distance(speed_mps * step_ms as f64 / 1000.0);
        (0..count)
            .map(|i| RawSample::new(START_MS + i as i64 * step_ms, 51.5 + dlat * i as f64, -0.12))
            .collect()
    }

    #[test]
    fn test_uniform_track_is_renumbered() {
        let normalizer = TrackNormalizer::new(&HeatmapConfig::default());
        let track = normalizer.normalize("ride", &northbound(15, 3.0, 1000)).unwrap();

        // First fix has no speed
        assert_eq!(track.len(), 14);
        for (i, s) in track.samples().iter().enumerate() {
            assert_eq!(s.elapsed_seconds, i as u32);
        }
    }

    #[test]
    fn test_arrival_order_does_not_matter() {
        let normalizer = TrackNormalizer::new(&HeatmapConfig::default());
        let ordered = northbound(20, 4.0, 1000);
        let mut shuffled = ordered.clone();
        shuffled.reverse();
        shuffled.swap(3, 11);

        assert_eq!(
            normalizer.normalize("a", &ordered).unwrap(),
            normalizer.normalize("a", &shuffled).unwrap()
        );
    }

    #[test]
    fn test_pause_is_excised() {
        let normalizer = TrackNormalizer::new(&HeatmapConfig::default());
        let mut samples = northbound(12, 3.0, 1000);
        let last = *samples.last().unwrap();
        // Thirty seconds waiting at a light
        for i in 1..=30 {
            samples.push(RawSample::new(last.timestamp_ms + i * 1000, last.latitude, last.longitude));
        }
        let resume = last.timestamp_ms + 30_000;
        let dlat = angular_extent_for_distance(3.0);
        for i in 1..=12 {
            samples.push(RawSample::new(resume + i * 1000, last.latitude + dlat * i as f64, last.longitude));
        }

        let track = normalizer.normalize("commute", &samples).unwrap();

        // 11 moving before, 12 after; stationary fixes gone
        assert_eq!(track.len(), 23);
        assert_eq!(track.max_elapsed_seconds(), 22);
    }

    #[test]
    fn test_dropout_sample_removed() {
        let normalizer = TrackNormalizer::new(&HeatmapConfig::default());
        let mut samples = northbound(12, 3.0, 1000);
        // Signal lost for five seconds, then fast enough to pass the speed filter
        let last = *samples.last().unwrap();
        let dlat = angular_extent_for_distance(3.0);
        for i in 1..=12 {
            samples.push(RawSample::new(
                last.timestamp_ms + 5_000 + i * 1000 - 1000,
                last.latitude + dlat * (5 + i) as f64,
                last.longitude,
            ));
        }

        let track = normalizer.normalize("tunnel", &samples).unwrap();
        assert_eq!(track.len(), 11 + 11);
    }

    #[test]
    fn test_eight_survivors_rejected() {
        let normalizer = TrackNormalizer::new(&HeatmapConfig::default());
        let result = normalizer.normalize("short", &northbound(9, 3.0, 1000));

        assert_eq!(
            result,
            Err(TrackRejection::TooShort {
                remaining: 8,
                required: 10
            })
        );
    }

    #[test]
    fn test_two_second_cadence_is_malformed() {
        let config = HeatmapConfig {
            max_time_delta_s: 3.0,
            ..HeatmapConfig::default()
        };
        let normalizer = TrackNormalizer::new(&config);
        let result = normalizer.normalize("sparse", &northbound(20, 3.0, 2000));

        assert_eq!(result, Err(TrackRejection::Malformed { median_delta_s: 2.0 }));
        assert!(result.unwrap_err().is_malformed());
    }

    #[test]
    fn test_two_hertz_track_is_malformed() {
        let normalizer = TrackNormalizer::new(&HeatmapConfig::default());
        let result = normalizer.normalize("fast_logger", &northbound(41, 3.0, 500));

        assert_eq!(result, Err(TrackRejection::Malformed { median_delta_s: 0.5 }));
    }

    #[test]
    fn test_repeated_fix_dropped() {
        let normalizer = TrackNormalizer::new(&HeatmapConfig::default());
        let mut samples = northbound(15, 3.0, 1000);
        samples.push(samples[6]);

        let track = normalizer.normalize("dup", &samples).unwrap();
        assert_eq!(track.len(), 14);
    }

    #[test]
    fn test_moved_fix_at_same_instant_kept() {
        let normalizer = TrackNormalizer::new(&HeatmapConfig::default());
        let mut samples = northbound(15, 3.0, 1000);
        let mut dup = samples[6];
        dup.latitude += 0.001;
        samples.push(dup);

        let track = normalizer.normalize("dup", &samples).unwrap();
        assert_eq!(track.len(), 15);
        assert_eq!(track.samples()[6].latitude, dup.latitude);
    }

    #[test]
    fn test_half_seconds_round_to_even() {
        assert_eq!(round_to_second(500), 0);
        assert_eq!(round_to_second(1500), 2);
        assert_eq!(round_to_second(2500), 2);
        assert_eq!(round_to_second(2501), 3);
        assert_eq!(round_to_second(2499), 2);
        assert_eq!(round_to_second(-500), 0);
        assert_eq!(round_to_second(-1500), -2);
    }

    #[test]
    fn test_half_second_offsets_follow_even_rounding() {
        // Fixes at x.5 s: 0.5, 1.5, 2.5, ... round to 0, 2, 2, 4, 4, ...
        let normalizer = TrackNormalizer::new(&HeatmapConfig::default());
        let mut samples = northbound(30, 3.0, 1000);
        for s in samples.iter_mut() {
            s.timestamp_ms += 500;
        }

        // Rounded gaps alternate 2 s and 0 s; the 2 s ones are dropouts and
        // only 0 s gaps survive, so the median is 0
        let result = normalizer.normalize("half", &samples);
        assert_eq!(result, Err(TrackRejection::Malformed { median_delta_s: 0.0 }));
    }

    struct BrokenFile;

    impl TrackSource for BrokenFile {
        fn id(&self) -> &str {
            "broken.tcx"
        }

        fn read_samples(&self) -> Result<Vec<RawSample>, SourceError> {
            Err(SourceError {
                track_id: "broken.tcx".into(),
                reason: "malformed header".into(),
            })
        }
    }

    #[test]
    fn test_unparseable_source_is_rejection() {
        let normalizer = TrackNormalizer::new(&HeatmapConfig::default());
        let result = normalizer.normalize_source(&BrokenFile);
        assert!(matches!(result, Err(TrackRejection::Unparseable(_))));

        let ok = normalizer.normalize_source(&RawTrack::new("ok", northbound(12, 2.0, 1000)));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_median_even_count() {
        assert_eq!(median(&[0, 1, 1, 1]), 1.0);
        assert_eq!(median(&[0, 0, 1, 1]), 0.5);
        assert_eq!(median(&[2]), 2.0);
    }
}
