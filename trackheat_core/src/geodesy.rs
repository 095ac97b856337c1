//! Spherical-earth distance and distance-to-angle conversions.
//!
//! The earth is a sphere of radius [`EARTH_RADIUS_M`]. That is accurate
//! enough for sizing 10 m cells across one metropolitan region.

use crate::config::SolverConfig;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use thiserror::Error;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_100.0;

/// Starting point of the longitude solver (1e-4 degrees, in radians).
const INITIAL_HALF_ANGLE_RAD: f64 = 1e-4 * std::f64::consts::PI / 180.0;

/// Failures of the angular-extent solver. Any of these means no grid can
/// be sized.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeodesyError {
    #[error("Invalid solver input: {0}")]
    InvalidInput(String),

    #[error("No longitude extent spans {meters} m at latitude {latitude}")]
    NoRoot { meters: f64, latitude: f64 },

    #[error("Longitude solver did not converge after {iterations} iterations ({meters} m at latitude {latitude})")]
    NoConvergence {
        meters: f64,
        latitude: f64,
        iterations: u32,
    },
}

/// A position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLon {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Great-circle (haversine) distance between two points, in meters.
pub fn distance(p0: LatLon, p1: LatLon) -> f64 {
    let lat0 = p0.latitude.to_radians();
    let lat1 = p1.latitude.to_radians();
    let dlat = lat1 - lat0;
    let dlon = (p1.longitude - p0.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat0.cos() * lat1.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Change in latitude, in degrees, covering `meters` north-south.
///
/// Meridians are great circles, so this is exact at any latitude.
pub fn angular_extent_for_distance(meters: f64) -> f64 {
    (meters / EARTH_RADIUS_M).to_degrees()
}

/// Change in longitude, in degrees, whose haversine distance along the
/// parallel at `latitude` equals `meters`.
///
/// Solves `Y·sin(x) / sqrt(1 - Y²·sin²(x)) = tan(c/2)` for the half angle
/// `x`, with `Y = cos(latitude)` and `c = meters / R`, using Newton steps
/// safeguarded by bisection on `(0, π/2)`.
pub fn angular_extent_for_distance_at_latitude(
    meters: f64,
    latitude: f64,
    solver: &SolverConfig,
) -> Result<f64, GeodesyError> {
    if !(meters.is_finite() && meters > 0.0) {
        return Err(GeodesyError::InvalidInput(format!("distance must be positive, got {}", meters)));
    }
    if !(latitude.is_finite() && latitude.abs() < 90.0) {
        return Err(GeodesyError::InvalidInput(format!(
            "latitude must lie strictly between -90 and 90, got {}",
            latitude
        )));
    }

    let half_central = meters / EARTH_RADIUS_M / 2.0;
    if half_central >= FRAC_PI_2 {
        return Err(GeodesyError::NoRoot { meters, latitude });
    }
    let target = half_central.tan();
    let y = latitude.to_radians().cos();

    let residual = |x: f64| {
        let s = y * x.sin();
        s / (1.0 - s * s).sqrt() - target
    };

    // The residual increases on (0, π/2); without a sign change there is no root.
    if residual(FRAC_PI_2) <= 0.0 {
        return Err(GeodesyError::NoRoot { meters, latitude });
    }

    let (mut lo, mut hi) = (0.0_f64, FRAC_PI_2);
    let mut x = INITIAL_HALF_ANGLE_RAD;

    for _ in 0..solver.max_iterations {
        let s = y * x.sin();
        let denom = 1.0 - s * s;
        let g = s / denom.sqrt() - target;
        if g == 0.0 {
            return Ok((2.0 * x).to_degrees());
        }
        if g < 0.0 {
            lo = x;
        } else {
            hi = x;
        }

        let slope = y * x.cos() / denom.powf(1.5);
        let mut next = x - g / slope;
        if !next.is_finite() || next <= lo || next >= hi {
            next = 0.5 * (lo + hi);
        }

        if (next - x).abs() <= solver.tolerance {
            return Ok((2.0 * next).to_degrees());
        }
        x = next;
    }

    Err(GeodesyError::NoConvergence {
        meters,
        latitude,
        iterations: solver.max_iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distance_symmetric_and_zero() {
        let a = LatLon::new(51.5074, -0.1278);
        let b = LatLon::new(51.5080, -0.1290);

        assert_eq!(distance(a, a), 0.0);
        assert_relative_eq!(distance(a, b), distance(b, a), epsilon = 1e-9);
        assert!(distance(a, b) > 0.0);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = distance(LatLon::new(10.0, 20.0), LatLon::new(11.0, 20.0));
        assert_relative_eq!(d, EARTH_RADIUS_M * 1f64.to_radians(), max_relative = 1e-12);
    }

    #[test]
    fn test_latitude_extent_inverts_distance() {
        let dlat = angular_extent_for_distance(10.0);
        let d = distance(LatLon::new(45.0, 7.0), LatLon::new(45.0 + dlat, 7.0));
        assert_relative_eq!(d, 10.0, max_relative = 1e-9);
    }

    #[test]
    fn test_longitude_extent_matches_closed_form() {
        let solver = SolverConfig::default();
        for &latitude in &[0.0, 37.7749, -33.9, 60.0, 80.0] {
            let dlon = angular_extent_for_distance_at_latitude(10.0, latitude, &solver).unwrap();

            let half_c = 10.0 / EARTH_RADIUS_M / 2.0;
            let expected = (2.0 * (half_c.sin() / latitude.to_radians().cos()).asin()).to_degrees();
            assert_relative_eq!(dlon, expected, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_longitude_extent_round_trips_through_distance() {
        let solver = SolverConfig::default();
        let latitude = 51.5;
        let dlon = angular_extent_for_distance_at_latitude(10.0, latitude, &solver).unwrap();

        let d = distance(LatLon::new(latitude, 0.0), LatLon::new(latitude, dlon));
        assert_relative_eq!(d, 10.0, max_relative = 1e-8);
    }

    #[test]
    fn test_longitude_extent_grows_towards_poles() {
        let solver = SolverConfig::default();
        let equator = angular_extent_for_distance_at_latitude(10.0, 0.0, &solver).unwrap();
        let north = angular_extent_for_distance_at_latitude(10.0, 60.0, &solver).unwrap();
        assert!(north > equator);
        assert_relative_eq!(equator, angular_extent_for_distance(10.0), max_relative = 1e-9);
    }

    #[test]
    fn test_pole_is_invalid() {
        let result = angular_extent_for_distance_at_latitude(10.0, 90.0, &SolverConfig::default());
        assert!(matches!(result, Err(GeodesyError::InvalidInput(_))));
    }

    #[test]
    fn test_unreachable_distance_has_no_root() {
        // Half the circumference of the 89.9° parallel is far below 1000 km
        let result = angular_extent_for_distance_at_latitude(1_000_000.0, 89.9, &SolverConfig::default());
        assert!(matches!(result, Err(GeodesyError::NoRoot { .. })));
    }

    #[test]
    fn test_iteration_cap_reports_no_convergence() {
        let solver = SolverConfig {
            tolerance: 1e-14,
            max_iterations: 1,
        };
        let result = angular_extent_for_distance_at_latitude(10.0, 45.0, &solver);
        assert!(matches!(result, Err(GeodesyError::NoConvergence { iterations: 1, .. })));
    }
}
