//! Loop closure detection.
//!
//! A walk is closed when it has enough points, has covered a minimum
//! perimeter, and the latest fix is back within a radius of the *first*
//! recorded point. Intermediate points are never considered, so a walk that
//! crosses itself does not close early.

use serde::{Deserialize, Serialize};

use crate::geo_utils::{haversine_distance, path_length};
use crate::Coordinate;

/// Configuration for closure detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosureConfig {
    /// Minimum number of recorded points (including the latest) before a
    /// closure can fire. Keeps GPS jitter at the start from closing the loop.
    /// Default: 10
    pub min_points: usize,

    /// The latest fix must be strictly closer than this to the first point.
    /// Default: 20.0 meters
    pub closure_radius_meters: f64,

    /// The walked length must strictly exceed this.
    /// Default: 50.0 meters
    pub min_perimeter_meters: f64,
}

impl Default for ClosureConfig {
    fn default() -> Self {
        Self {
            min_points: 10,
            closure_radius_meters: 20.0,
            min_perimeter_meters: 50.0,
        }
    }
}

/// Outcome of a closure evaluation, with the figure that decided it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClosureCheck {
    TooFewPoints { point_count: usize },
    PerimeterTooShort { perimeter_meters: f64 },
    TooFar { distance_meters: f64 },
    Closed { distance_meters: f64 },
}

impl ClosureCheck {
    pub fn is_closed(&self) -> bool {
        matches!(self, ClosureCheck::Closed { .. })
    }
}

/// Pure closure policy over a path and its most recent fix.
#[derive(Debug, Clone, Default)]
pub struct ClosureDetector {
    config: ClosureConfig,
}

impl ClosureDetector {
    pub fn new(config: ClosureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClosureConfig {
        &self.config
    }

    /// Whether `path` (which ends with `latest`) forms a closed loop.
    pub fn check(&self, path: &[Coordinate], latest: &Coordinate) -> bool {
        self.evaluate(path, latest).is_closed()
    }

    /// Like [`check`](Self::check) but reports why the loop is or isn't closed.
    pub fn evaluate(&self, path: &[Coordinate], latest: &Coordinate) -> ClosureCheck {
        self.evaluate_with_length(path, latest, path_length(path))
    }

    /// Evaluate with a path length the caller already tracks incrementally.
    pub fn evaluate_with_length(
        &self,
        path: &[Coordinate],
        latest: &Coordinate,
        path_length_meters: f64,
    ) -> ClosureCheck {
        let min_points = self.config.min_points.max(3);
        let Some(first) = path.first() else {
            return ClosureCheck::TooFewPoints { point_count: 0 };
        };
        if path.len() < min_points {
            return ClosureCheck::TooFewPoints {
                point_count: path.len(),
            };
        }
        if path_length_meters <= self.config.min_perimeter_meters {
            return ClosureCheck::PerimeterTooShort {
                perimeter_meters: path_length_meters,
            };
        }

        let distance_meters = haversine_distance(latest, first);
        if distance_meters < self.config.closure_radius_meters {
            ClosureCheck::Closed { distance_meters }
        } else {
            ClosureCheck::TooFar { distance_meters }
        }
    }
}
