//! JSON exporter for heatmap renderers.
//!
//! Exports the grid description and the snapshot sequence, the read-only
//! hand-off a renderer needs to draw one frame per elapsed second.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use trackheat_core::{GridSpec, HeatmapSeries};
use trackheat_env::{CellCount, CumulativeSnapshot};

/// Errors writing an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One elapsed second of a heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapFrame {
    /// Elapsed second
    pub step: u32,

    pub total_hits: u64,
    pub max_count: u32,

    /// Non-zero cells, in index order
    pub cells: Vec<CellCount>,
}

impl HeatmapFrame {
    pub fn from_snapshot(step: u32, snapshot: &CumulativeSnapshot) -> Self {
        Self {
            step,
            total_hits: snapshot.total_hits(),
            max_count: snapshot.max_count(),
            cells: snapshot
                .iter()
                .map(|(cell, &count)| CellCount {
                    lat: cell.lat,
                    lon: cell.lon,
                    count,
                })
                .collect(),
        }
    }
}

/// Complete heatmap export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Store collection the snapshots belong to
    pub collection: String,

    pub grid: GridSpec,

    /// Every `stride`-th frame, plus the last one
    pub frames: Vec<HeatmapFrame>,

    /// Final results
    pub passed: bool,
}

impl HeatmapExport {
    /// Builds an export of `series`, keeping every `stride`-th step.
    pub fn from_series(scenario: &str, seed: u64, series: &HeatmapSeries, stride: usize) -> Self {
        let stride = stride.max(1);
        let last = series.len().saturating_sub(1);
        let frames = series
            .snapshots
            .iter()
            .enumerate()
            .filter(|(step, _)| step % stride == 0 || *step == last)
            .map(|(step, snapshot)| HeatmapFrame::from_snapshot(step as u32, snapshot))
            .collect();

        Self {
            scenario: scenario.to_string(),
            seed,
            collection: series.collection.clone(),
            grid: series.grid,
            frames,
            passed: false,
        }
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool) {
        self.passed = passed;
    }

    /// Writes to a JSON file.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ExportError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackheat_core::{HeatmapConfig, RawSample, RawTrack};
    use trackheat_env::MemorySnapshotStore;

    fn series() -> HeatmapSeries {
        let samples = (0..25)
            .map(|i| RawSample::new(i * 1000, 48.2 + i as f64 * 4e-5, 16.37))
            .collect();
        trackheat_core::build_heatmap("export", &[RawTrack::new("r", samples)], &HeatmapConfig::default(), &MemorySnapshotStore::new())
            .unwrap()
            .series
    }

    #[test]
    fn test_stride_keeps_last_frame() {
        let series = series();
        let export = HeatmapExport::from_series("commute", 42, &series, 10);

        let steps: Vec<u32> = export.frames.iter().map(|f| f.step).collect();
        assert_eq!(steps, vec![0, 10, 20, 23]);
        assert_eq!(export.frames[3].total_hits, series.last().unwrap().total_hits());
    }

    #[test]
    fn test_export_file_parses_back() {
        let mut export = HeatmapExport::from_series("commute", 42, &series(), 1);
        export.finalize(true);

        let path = std::env::temp_dir().join(format!("trackheat-export-{}.json", std::process::id()));
        export.write_to_file(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let parsed: HeatmapExport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.frames, export.frames);
        assert_eq!(parsed.grid.num_cells, export.grid.num_cells);
        assert!(parsed.passed);
    }
}
