//! TrackHeat Deterministic Simulation Harness
//!
//! Drives the heatmap engine with synthetic GPS corpora and checks its
//! invariants end to end.
//!
//! # Core Principle: One Seed
//!
//! Every source of variation is derived from a single 64-bit seed:
//! - **Routes**: start points, headings and speeds
//! - **Logger faults**: pauses, dropouts, sprints, noise and timestamp jitter
//! - **Arrival order**: fixes are shuffled before they reach the normalizer
//!
//! A failing seed therefore reproduces exactly.
//!
//! # Usage
//!
//! ```no_run
//! use trackheat_sim::{ScenarioId, ScenarioRunner};
//!
//! let runner = ScenarioRunner::new(42, 20).with_ride_ticks(180);
//! let result = runner.run(ScenarioId::Commute);
//! assert!(result.passed);
//! ```

mod exporter;
mod runner;
pub mod scenarios;
pub mod synthetic;

pub use exporter::{ExportError, HeatmapExport, HeatmapFrame};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
pub use synthetic::{Interruption, RideProfile, Sprint, TrackGenerator};
