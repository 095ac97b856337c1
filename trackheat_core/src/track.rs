//! Track data model: raw parser output and cleaned per-second tracks.

use crate::geodesy::LatLon;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One raw GPS fix as produced by a track-format parser.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Unix timestamp in milliseconds
    pub timestamp_ms: i64,
    pub latitude: f64,
    pub longitude: f64,
}

impl RawSample {
    pub fn new(timestamp_ms: i64, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp_ms,
            latitude,
            longitude,
        }
    }

    pub fn position(&self) -> LatLon {
        LatLon::new(self.latitude, self.longitude)
    }
}

/// Failure reported by a track source (unreadable or unparseable file).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Unparseable track {track_id}: {reason}")]
pub struct SourceError {
    pub track_id: String,
    pub reason: String,
}

/// Supplier of raw samples for one track.
///
/// Implemented by whatever parses GPX/TCX files; the engine only needs the
/// decoded samples or a clear failure.
pub trait TrackSource: Send + Sync {
    /// Identifier of the track (typically the source file name).
    fn id(&self) -> &str;

    /// Decodes the track's samples, in arrival order.
    fn read_samples(&self) -> Result<Vec<RawSample>, SourceError>;
}

impl<T: TrackSource + ?Sized> TrackSource for Box<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn read_samples(&self) -> Result<Vec<RawSample>, SourceError> {
        (**self).read_samples()
    }
}

/// An already-decoded track held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrack {
    pub id: String,
    pub samples: Vec<RawSample>,
}

impl RawTrack {
    pub fn new(id: impl Into<String>, samples: Vec<RawSample>) -> Self {
        Self {
            id: id.into(),
            samples,
        }
    }
}

impl TrackSource for RawTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn read_samples(&self) -> Result<Vec<RawSample>, SourceError> {
        Ok(self.samples.clone())
    }
}

/// One sample of a cleaned track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleanedSample {
    /// Seconds since the first surviving sample, with pauses excised
    pub elapsed_seconds: u32,
    pub latitude: f64,
    pub longitude: f64,
}

impl CleanedSample {
    pub fn position(&self) -> LatLon {
        LatLon::new(self.latitude, self.longitude)
    }
}

/// A track resampled onto a contiguous 1 Hz logical clock.
///
/// `samples[i].elapsed_seconds == i` for every `i`. Only the normalizer
/// creates these, so the invariant holds for every instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedTrack {
    id: String,
    samples: Vec<CleanedSample>,
}

impl CleanedTrack {
    /// Builds a track from positions, numbering them 0, 1, 2, ...
    pub(crate) fn from_positions<I>(id: impl Into<String>, positions: I) -> Self
    where
        I: IntoIterator<Item = LatLon>,
    {
        let samples = positions
            .into_iter()
            .enumerate()
            .map(|(i, p)| CleanedSample {
                elapsed_seconds: i as u32,
                latitude: p.latitude,
                longitude: p.longitude,
            })
            .collect();
        Self {
            id: id.into(),
            samples,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn samples(&self) -> &[CleanedSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest elapsed second of the track.
    pub fn max_elapsed_seconds(&self) -> u32 {
        self.samples.last().map(|s| s.elapsed_seconds).unwrap_or(0)
    }
}
