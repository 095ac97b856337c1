//! Heatmap engine scenarios for deterministic simulation.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// HM-001: One pacing track inside a single cell
    SingleCell,

    /// HM-002: A three-cell jump between consecutive seconds
    CellJump,

    /// HM-003: Too few samples after cleaning
    ShortTrack,

    /// HM-004: A logger that records every two seconds
    SparseLogger,

    /// HM-005: Noisy commutes with pauses, dropouts and sprints
    Commute,

    /// HM-006: Two fresh runs must agree byte for byte
    Determinism,

    /// HM-007: A run interrupted half way and resumed
    Resume,

    /// HM-008: Damaged entries in the snapshot store
    CorruptStore,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SingleCell,
            ScenarioId::CellJump,
            ScenarioId::ShortTrack,
            ScenarioId::SparseLogger,
            ScenarioId::Commute,
            ScenarioId::Determinism,
            ScenarioId::Resume,
            ScenarioId::CorruptStore,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SingleCell => "single_cell",
            ScenarioId::CellJump => "cell_jump",
            ScenarioId::ShortTrack => "short_track",
            ScenarioId::SparseLogger => "sparse_logger",
            ScenarioId::Commute => "commute",
            ScenarioId::Determinism => "determinism",
            ScenarioId::Resume => "resume",
            ScenarioId::CorruptStore => "corrupt_store",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SingleCell => "12 cleaned samples in one cell give a count of 12 at t=11",
            ScenarioId::CellJump => "A (3, 0) jump adds exactly 2 cells at the destination second",
            ScenarioId::ShortTrack => "A track with 8 survivors is rejected and adds no heat",
            ScenarioId::SparseLogger => "A 0.5 Hz logger is rejected as malformed",
            ScenarioId::Commute => "Noisy shuffled commutes: bounds, contiguity and monotonicity",
            ScenarioId::Determinism => "Fresh runs over one corpus encode identically",
            ScenarioId::Resume => "Steps 0..5 persisted, then 0..10 resumed from the store",
            ScenarioId::CorruptStore => "Unreadable steps are recomputed and repaired",
        }
    }

    /// Returns true if the scenario persists snapshots across runs.
    pub fn uses_store(&self) -> bool {
        matches!(self, ScenarioId::Resume | ScenarioId::CorruptStore)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single_cell" | "singlecell" | "hm-001" => Ok(ScenarioId::SingleCell),
            "cell_jump" | "celljump" | "hm-002" => Ok(ScenarioId::CellJump),
            "short_track" | "shorttrack" | "hm-003" => Ok(ScenarioId::ShortTrack),
            "sparse_logger" | "sparselogger" | "hm-004" => Ok(ScenarioId::SparseLogger),
            "commute" | "hm-005" => Ok(ScenarioId::Commute),
            "determinism" | "hm-006" => Ok(ScenarioId::Determinism),
            "resume" | "hm-007" => Ok(ScenarioId::Resume),
            "corrupt_store" | "corruptstore" | "hm-008" => Ok(ScenarioId::CorruptStore),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
