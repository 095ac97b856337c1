//! Synthetic GPS logger for simulation.
//!
//! The generator plays the part of a track-format parser fed by a real
//! logger: riders move along a heading in a local east/north frame and the
//! logger emits fixes with configurable imperfections:
//! - Gaussian position noise
//! - Pauses (stationary fixes, e.g. waiting at a light)
//! - Dropouts (moving, but no fixes logged)
//! - Sprints (segments fast enough to skip cells)
//! - Timestamp jitter and shuffled arrival order
//!
//! Every random draw comes from one seeded RNG, so a seed fully determines
//! the corpus.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use trackheat_core::geodesy::angular_extent_for_distance;
use trackheat_core::{LatLon, RawSample, RawTrack};

/// Start of the first generated recording (2023-11-14, Unix ms).
const EPOCH_MS: i64 = 1_700_000_000_000;

/// A stop or signal loss after a given logger tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interruption {
    pub after_tick: u32,
    pub seconds: u32,
}

/// A stretch of ticks ridden at a different speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub from_tick: u32,
    pub ticks: u32,
    pub speed_mps: f64,
}

/// How one recording unfolds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideProfile {
    /// Fixes logged while moving
    pub ticks: u32,

    /// Cruising speed
    pub speed_mps: f64,

    /// Heading, degrees clockwise from north
    pub heading_deg: f64,

    /// Logger interval (1000 for a 1 Hz logger)
    pub cadence_ms: i64,

    /// Stationary periods, fixes still logged
    pub pauses: Vec<Interruption>,

    /// Moving periods with no fixes
    pub dropouts: Vec<Interruption>,

    pub sprints: Vec<Sprint>,
}

impl Default for RideProfile {
    fn default() -> Self {
        Self {
            ticks: 120,
            speed_mps: 4.0,
            heading_deg: 0.0,
            cadence_ms: 1000,
            pauses: Vec::new(),
            dropouts: Vec::new(),
            sprints: Vec::new(),
        }
    }
}

impl RideProfile {
    fn speed_at(&self, tick: u32) -> f64 {
        self.sprints
            .iter()
            .find(|s| tick >= s.from_tick && tick < s.from_tick + s.ticks)
            .map(|s| s.speed_mps)
            .unwrap_or(self.speed_mps)
    }

    fn pause_after(&self, tick: u32) -> Option<&Interruption> {
        self.pauses.iter().find(|p| p.after_tick == tick)
    }

    fn dropout_after(&self, tick: u32) -> Option<&Interruption> {
        self.dropouts.iter().find(|d| d.after_tick == tick)
    }
}

/// Deterministic generator of raw tracks.
pub struct TrackGenerator {
    seed: u64,
    rng: ChaCha8Rng,

    /// Centre of the region rides start around
    origin: LatLon,

    /// Position noise, meters (None = exact fixes)
    noise: Option<Normal<f64>>,

    /// Maximum timestamp jitter, milliseconds
    timestamp_jitter_ms: i64,

    next_id: u64,
}

impl TrackGenerator {
    /// Creates a generator with exact, jitter-free fixes.
    pub fn new(seed: u64, origin: LatLon) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            origin,
            noise: None,
            timestamp_jitter_ms: 0,
            next_id: 0,
        }
    }

    /// Sets the position noise standard deviation (meters). Zero, negative or
    /// non-finite values turn noise off.
    pub fn with_position_noise(mut self, std_dev_m: f64) -> Self {
        self.noise = if std_dev_m > 0.0 {
            Normal::new(0.0, std_dev_m).ok()
        } else {
            None
        };
        self
    }

    /// Sets the timestamp jitter. Values are clamped below half a second so
    /// rounding to whole seconds still recovers the logger's cadence.
    pub fn with_timestamp_jitter(mut self, jitter_ms: i64) -> Self {
        self.timestamp_jitter_ms = jitter_ms.clamp(0, 499);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn origin(&self) -> LatLon {
        self.origin
    }

    /// Records one ride starting at `start`.
    pub fn generate(&mut self, start: LatLon, profile: &RideProfile) -> RawTrack {
        let id = format!("s{}-ride-{:03}", self.seed, self.next_id);
        self.next_id += 1;

        let heading = profile.heading_deg.to_radians();
        let (mut east, mut north) = (0.0_f64, 0.0_f64);
        let step_s = profile.cadence_ms as f64 / 1000.0;
        // Rides start on different days
        let mut clock_ms = EPOCH_MS + self.next_id as i64 * 86_400_000;
        let mut samples = Vec::with_capacity(profile.ticks as usize);

        for tick in 0..profile.ticks {
            if tick > 0 {
                clock_ms += profile.cadence_ms;
                let d = profile.speed_at(tick) * step_s;
                east += d * heading.sin();
                north += d * heading.cos();
            }
            samples.push(self.fix(start, clock_ms, east, north));

            if let Some(pause) = profile.pause_after(tick) {
                let stationary_ticks = pause.seconds as i64 * 1000 / profile.cadence_ms.max(1);
                for _ in 0..stationary_ticks {
                    clock_ms += profile.cadence_ms;
                    samples.push(self.fix(start, clock_ms, east, north));
                }
            }

            if let Some(dropout) = profile.dropout_after(tick) {
                clock_ms += dropout.seconds as i64 * 1000;
                let d = profile.speed_at(tick) * dropout.seconds as f64;
                east += d * heading.sin();
                north += d * heading.cos();
            }
        }

        RawTrack::new(id, samples)
    }

    /// Shuffles the arrival order of a track's fixes.
    pub fn shuffle_arrival(&mut self, track: &mut RawTrack) {
        track.samples.shuffle(&mut self.rng);
    }

    /// A corpus of `count` commutes around the origin, each with random
    /// heading, speed, pauses, dropouts and sprints, delivered out of order.
    pub fn generate_commutes(&mut self, count: usize, ticks: u32) -> Vec<RawTrack> {
        (0..count)
            .map(|_| {
                let start = self.random_start(300.0);
                let profile = self.random_profile(ticks);
                let mut track = self.generate(start, &profile);
                self.shuffle_arrival(&mut track);
                track
            })
            .collect()
    }

    fn random_start(&mut self, radius_m: f64) -> LatLon {
        let east = self.rng.gen_range(-radius_m..radius_m);
        let north = self.rng.gen_range(-radius_m..radius_m);
        offset(self.origin, east, north)
    }

    fn random_profile(&mut self, ticks: u32) -> RideProfile {
        let mut profile = RideProfile {
            ticks,
            speed_mps: self.rng.gen_range(2.5..7.0),
            heading_deg: self.rng.gen_range(0.0..360.0),
            ..RideProfile::default()
        };
        let ticks = ticks.max(4);

        if self.rng.gen_bool(0.6) {
            profile.pauses.push(Interruption {
                after_tick: self.rng.gen_range(1..ticks - 1),
                seconds: self.rng.gen_range(5..60),
            });
        }
        if self.rng.gen_bool(0.4) {
            profile.dropouts.push(Interruption {
                after_tick: self.rng.gen_range(1..ticks - 1),
                seconds: self.rng.gen_range(2..15),
            });
        }
        if self.rng.gen_bool(0.5) {
            let from_tick = self.rng.gen_range(1..ticks - 1);
            profile.sprints.push(Sprint {
                from_tick,
                ticks: self.rng.gen_range(3..20),
                speed_mps: self.rng.gen_range(15.0..35.0),
            });
        }
        profile
    }

    fn fix(&mut self, start: LatLon, clock_ms: i64, east: f64, north: f64) -> RawSample {
        let (noise_e, noise_n) = match self.noise {
            Some(normal) => (normal.sample(&mut self.rng), normal.sample(&mut self.rng)),
            None => (0.0, 0.0),
        };
        let jitter = if self.timestamp_jitter_ms > 0 {
            self.rng.gen_range(-self.timestamp_jitter_ms..=self.timestamp_jitter_ms)
        } else {
            0
        };
        let p = offset(start, east + noise_e, north + noise_n);
        RawSample::new(clock_ms + jitter, p.latitude, p.longitude)
    }
}

/// Moves `start` by local east/north meters (flat-earth approximation).
pub fn offset(start: LatLon, east_m: f64, north_m: f64) -> LatLon {
    let dlat = angular_extent_for_distance(north_m);
    let dlon = angular_extent_for_distance(east_m) / start.latitude.to_radians().cos();
    LatLon::new(start.latitude + dlat, start.longitude + dlon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use trackheat_core::geodesy::distance;
    use trackheat_core::{HeatmapConfig, TrackNormalizer};

    const ORIGIN: LatLon = LatLon { latitude: 52.37, longitude: 4.89 };

    #[test]
    fn test_same_seed_same_corpus() {
        let a = TrackGenerator::new(7, ORIGIN).with_position_noise(0.5).generate_commutes(5, 60);
        let b = TrackGenerator::new(7, ORIGIN).with_position_noise(0.5).generate_commutes(5, 60);
        assert_eq!(a, b);

        let c = TrackGenerator::new(8, ORIGIN).with_position_noise(0.5).generate_commutes(5, 60);
        assert_ne!(a, c);
    }

    #[test]
    fn test_steady_ride_speed() {
        let mut generator = TrackGenerator::new(1, ORIGIN);
        let track = generator.generate(ORIGIN, &RideProfile { ticks: 10, speed_mps: 5.0, ..RideProfile::default() });

        assert_eq!(track.samples.len(), 10);
        let d = distance(track.samples[0].position(), track.samples[1].position());
        assert!((d - 5.0).abs() < 1e-6);
        assert_eq!(track.samples[1].timestamp_ms - track.samples[0].timestamp_ms, 1000);
    }

    #[test]
    fn test_pause_adds_stationary_fixes() {
        let mut generator = TrackGenerator::new(1, ORIGIN);
        let profile = RideProfile {
            ticks: 20,
            pauses: vec![Interruption { after_tick: 9, seconds: 15 }],
            ..RideProfile::default()
        };
        let track = generator.generate(ORIGIN, &profile);

        assert_eq!(track.samples.len(), 35);
        assert_eq!(track.samples[10].position(), track.samples[9].position());
    }

    #[test]
    fn test_dropout_skips_time() {
        let mut generator = TrackGenerator::new(1, ORIGIN);
        let profile = RideProfile {
            ticks: 20,
            dropouts: vec![Interruption { after_tick: 4, seconds: 6 }],
            ..RideProfile::default()
        };
        let track = generator.generate(ORIGIN, &profile);

        assert_eq!(track.samples.len(), 20);
        assert_eq!(track.samples[5].timestamp_ms - track.samples[4].timestamp_ms, 7000);
    }

    #[test]
    fn test_jitter_is_bounded() {
        let mut generator = TrackGenerator::new(3, ORIGIN).with_timestamp_jitter(5000);
        let track = generator.generate(ORIGIN, &RideProfile::default());

        for pair in track.samples.windows(2) {
            let gap = pair[1].timestamp_ms - pair[0].timestamp_ms;
            assert!((gap - 1000).abs() <= 2 * 499);
        }
    }

    proptest! {
        #[test]
        fn prop_clean_ride_keeps_all_but_first_fix(
            seed in any::<u64>(),
            ticks in 12u32..200,
            speed in 2.0f64..30.0,
            heading in 0.0f64..360.0,
        ) {
            let mut generator = TrackGenerator::new(seed, ORIGIN).with_timestamp_jitter(300);
            let profile = RideProfile { ticks, speed_mps: speed, heading_deg: heading, ..RideProfile::default() };
            let mut ride = generator.generate(ORIGIN, &profile);
            generator.shuffle_arrival(&mut ride);

            let track = TrackNormalizer::new(&HeatmapConfig::default()).normalize_source(&ride).unwrap();
            prop_assert_eq!(track.len(), ticks as usize - 1);
        }
    }
}
