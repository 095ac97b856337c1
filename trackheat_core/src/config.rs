//! Tunables for track cleaning, grid sizing and the longitude solver.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Convergence settings for the longitude cell-size root finder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Absolute tolerance on the half central angle, in radians (default: 1e-14)
    pub tolerance: f64,
    
    /// Iteration cap before giving up (default: 100)
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-14,
            max_iterations: 100,
        }
    }
}

/// Configuration for building a heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Edge length of one grid cell in meters (default: 10.0)
    pub cell_size_m: f64,
    
    /// Padding fraction added on each side of the track bounding box (default: 0.05)
    pub margin: f64,
    
    /// Samples slower than this are treated as paused (default: 1.0 m/s)
    pub low_speed_threshold_mps: f64,
    
    /// Samples further than this from their predecessor are dropouts (default: 1.1 s)
    pub max_time_delta_s: f64,
    
    /// Tracks with fewer surviving samples are rejected (default: 10)
    pub min_track_samples: usize,
    
    /// Longitude solver settings
    pub solver: SolverConfig,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            cell_size_m: 10.0,
            margin: 0.05,
            low_speed_threshold_mps: 1.0,
            max_time_delta_s: 1.1,
            min_track_samples: 10,
            solver: SolverConfig::default(),
        }
    }
}

impl HeatmapConfig {
    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
    
    /// Loads a JSON config file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
    
    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cell_size_m.is_finite() && self.cell_size_m > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "cell_size_m must be positive, got {}",
                self.cell_size_m
            )));
        }
        if !(self.margin.is_finite() && self.margin >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "margin must be non-negative, got {}",
                self.margin
            )));
        }
        if !(self.max_time_delta_s.is_finite() && self.max_time_delta_s > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_time_delta_s must be positive, got {}",
                self.max_time_delta_s
            )));
        }
        if !self.low_speed_threshold_mps.is_finite() {
            return Err(ConfigError::Invalid("low_speed_threshold_mps must be finite".into()));
        }
        if self.solver.max_iterations == 0 || !(self.solver.tolerance > 0.0) {
            return Err(ConfigError::Invalid(
                "solver needs a positive tolerance and at least one iteration".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_config_default() {
        let config = HeatmapConfig::default();
        assert_eq!(config.cell_size_m, 10.0);
        assert_eq!(config.margin, 0.05);
        assert_eq!(config.min_track_samples, 10);
        assert!(config.validate().is_ok());
    }
    
    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = HeatmapConfig::from_json_str(r#"{"cell_size_m": 25.0, "solver": {"max_iterations": 40}}"#)
            .unwrap();
        assert_eq!(config.cell_size_m, 25.0);
        assert_eq!(config.margin, 0.05);
        assert_eq!(config.solver.max_iterations, 40);
        assert_eq!(config.solver.tolerance, 1e-14);
    }
    
    #[test]
    fn test_negative_cell_size_rejected() {
        let result = HeatmapConfig::from_json_str(r#"{"cell_size_m": -1.0}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
    
    #[test]
    fn test_config_file_is_validated_on_load() {
        let path = std::env::temp_dir().join(format!("trackheat-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"margin": -0.5}"#).unwrap();
        let result = HeatmapConfig::from_json_file(&path);
        let _ = std::fs::remove_file(&path);
        
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
