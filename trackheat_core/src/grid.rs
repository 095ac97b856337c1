//! The Grid - meter-sized cells over the region covered by a track corpus
//!
//! Built once per collection from every cleaned track:
//! 1. Tight bounding box of all samples ([`SpatialSpan`])
//! 2. Cell size in degrees from the target size in meters; the longitude
//!    size is solved at the mean latitude of the box
//! 3. Cell counts covering the box plus a margin on each side
//! 4. A margin-padded box that is an exact whole number of cells
//!
//! The resulting [`GridSpec`] is immutable and shared read-only by every
//! indexing worker.

use crate::config::HeatmapConfig;
use crate::geodesy::{angular_extent_for_distance, angular_extent_for_distance_at_latitude, GeodesyError, LatLon};
use crate::track::CleanedTrack;
use geo::{BoundingRect, MultiPoint, Point};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trackheat_env::{CellIndex, CumulativeSnapshot};
use tracing::debug;

/// Errors raised while building or querying a grid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("Cannot build a grid from an empty track corpus")]
    EmptyCorpus,

    #[error("Track corpus contains non-finite coordinates")]
    InvalidCoordinates,

    #[error("Cell size cannot be computed: {0}")]
    Geodesy(#[from] GeodesyError),

    #[error("Position ({latitude}, {longitude}) lies outside the grid")]
    OutOfDomain { latitude: f64, longitude: f64 },
}

/// No-margin bounding box of a set of tracks, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialSpan {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl SpatialSpan {
    /// Bounding box of every sample of every track, or `None` if there are
    /// no samples.
    pub fn of_tracks(tracks: &[CleanedTrack]) -> Option<Self> {
        let points: MultiPoint<f64> = tracks
            .iter()
            .flat_map(|t| t.samples())
            .map(|s| Point::new(s.longitude, s.latitude))
            .collect::<Vec<_>>()
            .into();

        points.bounding_rect().map(|rect| Self {
            lat_min: rect.min().y,
            lat_max: rect.max().y,
            lon_min: rect.min().x,
            lon_max: rect.max().x,
        })
    }

    pub fn lat_extent(&self) -> f64 {
        (self.lat_max - self.lat_min).abs()
    }

    pub fn lon_extent(&self) -> f64 {
        (self.lon_max - self.lon_min).abs()
    }

    pub fn mean_latitude(&self) -> f64 {
        (self.lat_min + self.lat_max) / 2.0
    }

    fn is_finite(&self) -> bool {
        self.lat_min.is_finite() && self.lat_max.is_finite() && self.lon_min.is_finite() && self.lon_max.is_finite()
    }
}

/// Closed interval on one axis, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Margin-padded extent of the grid on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpan {
    pub lat: AxisRange,
    pub lon: AxisRange,
}

/// Angular size of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellSize {
    pub lat_degrees: f64,
    pub lon_degrees: f64,
}

/// Number of cells along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumCells {
    pub lat: u32,
    pub lon: u32,
}

/// Immutable description of a grid, handed to renderers with the snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub span_with_margin: GridSpan,
    pub num_cells: NumCells,
    pub cell_size: CellSize,
    pub max_elapsed_seconds: u32,
}

impl GridSpec {
    /// Maps a position to the cell containing it.
    ///
    /// A position exactly on the upper edge belongs to the last cell.
    /// Positions outside the padded span are a grid/corpus mismatch and
    /// fail with [`GridError::OutOfDomain`].
    pub fn latlon_to_cell_index(&self, latitude: f64, longitude: f64) -> Result<CellIndex, GridError> {
        let span = &self.span_with_margin;
        if !(span.lat.contains(latitude) && span.lon.contains(longitude)) {
            return Err(GridError::OutOfDomain { latitude, longitude });
        }

        let lat = axis_index(latitude - span.lat.min, self.cell_size.lat_degrees, self.num_cells.lat);
        let lon = axis_index(longitude - span.lon.min, self.cell_size.lon_degrees, self.num_cells.lon);
        Ok(CellIndex::new(lat, lon))
    }

    /// Returns true if `cell` lies within the grid.
    pub fn contains_cell(&self, cell: &CellIndex) -> bool {
        cell.lat < self.num_cells.lat && cell.lon < self.num_cells.lon
    }

    /// South-west and north-east corners of a cell.
    pub fn cell_bounds(&self, cell: &CellIndex) -> (LatLon, LatLon) {
        let south = self.span_with_margin.lat.min + cell.lat as f64 * self.cell_size.lat_degrees;
        let west = self.span_with_margin.lon.min + cell.lon as f64 * self.cell_size.lon_degrees;
        (
            LatLon::new(south, west),
            LatLon::new(south + self.cell_size.lat_degrees, west + self.cell_size.lon_degrees),
        )
    }

    /// Centre of a cell.
    pub fn cell_center(&self, cell: &CellIndex) -> LatLon {
        let (sw, ne) = self.cell_bounds(cell);
        LatLon::new((sw.latitude + ne.latitude) / 2.0, (sw.longitude + ne.longitude) / 2.0)
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.num_cells.lat as usize * self.num_cells.lon as usize
    }

    /// Row-major `num_cells.lat x num_cells.lon` counts of a snapshot.
    /// Cells outside the grid are ignored.
    pub fn dense_frame(&self, snapshot: &CumulativeSnapshot) -> Vec<u32> {
        let mut frame = vec![0u32; self.cell_count()];
        for (cell, &count) in snapshot.iter() {
            if self.contains_cell(cell) {
                frame[cell.lat as usize * self.num_cells.lon as usize + cell.lon as usize] = count;
            }
        }
        frame
    }
}

fn axis_index(offset: f64, cell_size: f64, num_cells: u32) -> u32 {
    let index = (offset / cell_size).floor() as u32;
    index.min(num_cells.saturating_sub(1))
}

/// Number of cells on one axis. Never zero, so a corpus that is a line
/// (or a point) still gets a one-cell-wide grid.
fn axis_cells(extent: f64, cell_size: f64, margin: f64) -> u32 {
    let cells = ((1.0 + 2.0 * margin) * extent / cell_size).ceil();
    (cells as u32).max(1)
}

/// A grid built from one track corpus.
#[derive(Debug, Clone)]
pub struct Grid {
    spec: GridSpec,
    span_no_margin: SpatialSpan,
}

impl Grid {
    /// Builds the grid for `tracks`.
    ///
    /// # Errors
    /// * `EmptyCorpus` - no tracks, or no samples
    /// * `Geodesy` - the longitude cell size could not be solved
    pub fn build(tracks: &[CleanedTrack], config: &HeatmapConfig) -> Result<Self, GridError> {
        let span = SpatialSpan::of_tracks(tracks).ok_or(GridError::EmptyCorpus)?;
        if !span.is_finite() {
            return Err(GridError::InvalidCoordinates);
        }

        let cell_size = CellSize {
            lat_degrees: angular_extent_for_distance(config.cell_size_m),
            lon_degrees: angular_extent_for_distance_at_latitude(
                config.cell_size_m,
                span.mean_latitude(),
                &config.solver,
            )?,
        };

        let margin = config.margin;
        let mut num_cells = NumCells {
            lat: axis_cells(span.lat_extent(), cell_size.lat_degrees, margin),
            lon: axis_cells(span.lon_extent(), cell_size.lon_degrees, margin),
        };

        let lat_min = span.lat_min - margin * span.lat_extent();
        let lon_min = span.lon_min - margin * span.lon_extent();

        // Guard against the padded span falling a rounding error short of the data.
        while lat_min + cell_size.lat_degrees * (num_cells.lat as f64) < span.lat_max {
            num_cells.lat += 1;
        }
        while lon_min + cell_size.lon_degrees * (num_cells.lon as f64) < span.lon_max {
            num_cells.lon += 1;
        }

        let span_with_margin = GridSpan {
            lat: AxisRange {
                min: lat_min,
                max: lat_min + cell_size.lat_degrees * num_cells.lat as f64,
            },
            lon: AxisRange {
                min: lon_min,
                max: lon_min + cell_size.lon_degrees * num_cells.lon as f64,
            },
        };

        let max_elapsed_seconds = tracks
            .iter()
            .map(|t| t.max_elapsed_seconds())
            .max()
            .unwrap_or(0);

        debug!(
            "grid: {}x{} cells of {:.3e} x {:.3e} deg, {} s",
            num_cells.lat, num_cells.lon, cell_size.lat_degrees, cell_size.lon_degrees, max_elapsed_seconds
        );

        Ok(Self {
            spec: GridSpec {
                span_with_margin,
                num_cells,
                cell_size,
                max_elapsed_seconds,
            },
            span_no_margin: span,
        })
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    /// Tight bounding box of the corpus the grid was built from.
    pub fn span_no_margin(&self) -> &SpatialSpan {
        &self.span_no_margin
    }

    /// See [`GridSpec::latlon_to_cell_index`].
    pub fn latlon_to_cell_index(&self, latitude: f64, longitude: f64) -> Result<CellIndex, GridError> {
        self.spec.latlon_to_cell_index(latitude, longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn diagonal_track(id: &str, start: LatLon, steps: usize, dlat: f64, dlon: f64) -> CleanedTrack {
        CleanedTrack::from_positions(
            id,
            (0..steps).map(|i| LatLon::new(start.latitude + dlat * i as f64, start.longitude + dlon * i as f64)),
        )
    }

    fn sample_grid() -> Grid {
        let tracks = vec![
            diagonal_track("a", LatLon::new(37.7749, -122.4194), 60, 1e-4, 1e-4),
            diagonal_track("b", LatLon::new(37.7800, -122.4150), 30, -1e-4, 5e-5),
        ];
        Grid::build(&tracks, &HeatmapConfig::default()).unwrap()
    }

    #[test]
    fn test_grid_dimensions_follow_margin_formula() {
        let grid = sample_grid();
        let span = grid.span_no_margin();
        let spec = grid.spec();

        let expected_lat = (1.1 * span.lat_extent() / spec.cell_size.lat_degrees).ceil() as u32;
        let expected_lon = (1.1 * span.lon_extent() / spec.cell_size.lon_degrees).ceil() as u32;
        assert_eq!(spec.num_cells.lat, expected_lat);
        assert_eq!(spec.num_cells.lon, expected_lon);

        assert_relative_eq!(spec.span_with_margin.lat.min, span.lat_min - 0.05 * span.lat_extent());
        assert_relative_eq!(
            spec.span_with_margin.lat.max,
            spec.span_with_margin.lat.min + spec.cell_size.lat_degrees * spec.num_cells.lat as f64
        );
        assert_eq!(spec.max_elapsed_seconds, 59);
    }

    #[test]
    fn test_span_minimum_maps_to_zero() {
        let grid = sample_grid();
        let spec = grid.spec();
        let cell = grid
            .latlon_to_cell_index(spec.span_with_margin.lat.min, spec.span_with_margin.lon.min)
            .unwrap();
        assert_eq!(cell, CellIndex::new(0, 0));
    }

    #[test]
    fn test_span_maximum_maps_to_last_cell() {
        let grid = sample_grid();
        let spec = grid.spec();
        let cell = grid
            .latlon_to_cell_index(spec.span_with_margin.lat.max, spec.span_with_margin.lon.max)
            .unwrap();
        assert_eq!(cell, CellIndex::new(spec.num_cells.lat - 1, spec.num_cells.lon - 1));
    }

    #[test]
    fn test_every_corpus_sample_is_indexable() {
        let tracks = vec![
            diagonal_track("a", LatLon::new(-33.86, 151.2), 100, 3e-5, -2e-5),
            diagonal_track("b", LatLon::new(-33.861, 151.199), 100, 1e-5, 4e-5),
        ];
        let grid = Grid::build(&tracks, &HeatmapConfig::default()).unwrap();
        for track in &tracks {
            for s in track.samples() {
                let cell = grid.latlon_to_cell_index(s.latitude, s.longitude).unwrap();
                assert!(grid.spec().contains_cell(&cell));
            }
        }
    }

    #[test]
    fn test_outside_point_is_domain_error() {
        let grid = sample_grid();
        let result = grid.latlon_to_cell_index(0.0, 0.0);
        assert_eq!(result, Err(GridError::OutOfDomain { latitude: 0.0, longitude: 0.0 }));
    }

    #[test]
    fn test_empty_corpus() {
        let result = Grid::build(&[], &HeatmapConfig::default());
        assert!(matches!(result, Err(GridError::EmptyCorpus)));
    }

    #[test]
    fn test_north_south_line_gets_one_column() {
        let track = diagonal_track("line", LatLon::new(48.85, 2.35), 20, 2e-5, 0.0);
        let grid = Grid::build(&[track], &HeatmapConfig::default()).unwrap();

        assert_eq!(grid.spec().num_cells.lon, 1);
        let cell = grid.latlon_to_cell_index(48.85, 2.35).unwrap();
        assert_eq!(cell.lon, 0);
    }

    #[test]
    fn test_polar_corpus_cannot_be_sized() {
        let track = diagonal_track("pole", LatLon::new(90.0, 0.0), 12, 0.0, 1e-3);
        let result = Grid::build(&[track], &HeatmapConfig::default());
        assert!(matches!(result, Err(GridError::Geodesy(_))));
    }

    #[test]
    fn test_cell_center_round_trips() {
        let grid = sample_grid();
        let cell = CellIndex::new(3, 5);
        let center = grid.spec().cell_center(&cell);
        assert_eq!(grid.latlon_to_cell_index(center.latitude, center.longitude).unwrap(), cell);
    }

    #[test]
    fn test_dense_frame_layout() {
        let grid = sample_grid();
        let spec = grid.spec();
        let mut snapshot = CumulativeSnapshot::new();
        snapshot.add(CellIndex::new(1, 2), 7);

        let frame = spec.dense_frame(&snapshot);
        assert_eq!(frame.len(), spec.cell_count());
        assert_eq!(frame[spec.num_cells.lon as usize + 2], 7);
        assert_eq!(frame.iter().map(|&c| c as u64).sum::<u64>(), 7);
    }

    proptest! {
        #[test]
        fn prop_indices_within_bounds(fx in 0.0f64..=1.0, fy in 0.0f64..=1.0) {
            let grid = sample_grid();
            let span = grid.spec().span_with_margin;
            let lat = span.lat.min + fx * (span.lat.max - span.lat.min);
            let lon = span.lon.min + fy * (span.lon.max - span.lon.min);

            let cell = grid.latlon_to_cell_index(lat.min(span.lat.max), lon.min(span.lon.max)).unwrap();
            prop_assert!(grid.spec().contains_cell(&cell));
        }
    }
}
