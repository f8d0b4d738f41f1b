//! Area of a closed walking loop.
//!
//! The ring is implicitly closed: callers pass the points in walk order and
//! the last point is joined back to the first. Sign (ring direction) is
//! discarded, so clockwise and counter-clockwise walks of the same loop
//! yield the same area.

use geo::orient::Direction;
use geo::{
    ChamberlainDuquetteArea, Coord, GeodesicArea, Intersects, Line, LineString, Orient, Polygon,
};
use serde::{Deserialize, Serialize};

use crate::error::{LoopClaimError, Result};
use crate::geo_utils::ring_perimeter;
use crate::Coordinate;

/// Consecutive points closer than this (degrees, ~1 mm) count as duplicates.
const DUPLICATE_EPSILON_DEG: f64 = 1e-8;

/// Which surface model to integrate over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaMethod {
    /// Ellipsoidal (WGS-84) geodesic area. Most accurate.
    #[default]
    Geodesic,
    /// Spherical excess on the mean-radius sphere. Cheaper, within ~0.5%
    /// for loops of a few kilometers.
    Spherical,
}

/// Configuration for area computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    /// Surface model.
    /// Default: Geodesic
    pub method: AreaMethod,

    /// Rings enclosing less than this are rejected as degenerate. Catches
    /// collinear walks and figure-eights whose lobes cancel out.
    /// Default: 1.0 square meter
    pub min_area_square_meters: f64,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            method: AreaMethod::Geodesic,
            min_area_square_meters: 1.0,
        }
    }
}

/// Computes the enclosed area of a ring in square meters.
#[derive(Debug, Clone, Default)]
pub struct AreaCalculator {
    config: AreaConfig,
}

impl AreaCalculator {
    pub fn new(config: AreaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AreaConfig {
        &self.config
    }

    /// Area enclosed by `ring` in square meters.
    ///
    /// Fails with [`LoopClaimError::DegeneratePolygon`] when fewer than three
    /// distinct points remain after dropping consecutive duplicates, or when
    /// the result is below `min_area_square_meters`.
    ///
    /// # Example
    /// ```
    /// use loopclaim::{AreaCalculator, Coordinate};
    /// use loopclaim::geo_utils::destination_point;
    ///
    /// let a = Coordinate::new(51.5, -0.12);
    /// let b = destination_point(&a, 90.0, 100.0);
    /// let c = destination_point(&b, 0.0, 100.0);
    /// let d = destination_point(&a, 0.0, 100.0);
    ///
    /// let area = AreaCalculator::default().area(&[a, b, c, d]).unwrap();
    /// assert!((area - 10_000.0).abs() < 200.0);
    /// ```
    pub fn area(&self, ring: &[Coordinate]) -> Result<f64> {
        let distinct = dedup_ring(ring);
        if distinct.len() < 3 {
            return Err(LoopClaimError::degenerate(format!(
                "{} distinct points, need at least 3",
                distinct.len()
            )));
        }

        // Signed area of a counter-clockwise ring, then the magnitude: the
        // unsigned variants read a reversed or cancelled-out ring as the rest
        // of the globe. Walked loops are far below half the earth.
        let polygon = to_polygon(&distinct).orient(Direction::Default);
        let area = match self.config.method {
            AreaMethod::Geodesic => polygon.geodesic_area_signed(),
            AreaMethod::Spherical => polygon.chamberlain_duquette_signed_area(),
        }
        .abs();

        if !area.is_finite() {
            return Err(LoopClaimError::degenerate("area is not finite"));
        }
        if area < self.config.min_area_square_meters {
            return Err(LoopClaimError::degenerate(format!(
                "area {:.3} m² below tolerance {:.3} m²",
                area, self.config.min_area_square_meters
            )));
        }
        Ok(area)
    }

    /// Length of the closed ring in meters.
    pub fn perimeter(&self, ring: &[Coordinate]) -> f64 {
        ring_perimeter(ring)
    }
}

/// Area with the default configuration.
pub fn polygon_area(ring: &[Coordinate]) -> Result<f64> {
    AreaCalculator::default().area(ring)
}

/// True if any two non-adjacent edges of the implicitly closed ring touch or
/// cross.
///
/// O(n²); walking loops are at most a few hundred fixes.
pub fn is_self_intersecting(ring: &[Coordinate]) -> bool {
    let distinct = dedup_ring(ring);
    let n = distinct.len();
    if n < 4 {
        return false;
    }

    let edges: Vec<Line<f64>> = (0..n)
        .map(|i| {
            let a: Coord<f64> = distinct[i].into();
            let b: Coord<f64> = distinct[(i + 1) % n].into();
            Line::new(a, b)
        })
        .collect();

    for i in 0..n {
        // j starts at i + 2 to skip the shared vertex with the next edge
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue; // first and closing edge share the start point
            }
            if edges[i].intersects(&edges[j]) {
                return true;
            }
        }
    }
    false
}

/// Drop consecutive duplicates, including a trailing copy of the first point.
fn dedup_ring(ring: &[Coordinate]) -> Vec<Coordinate> {
    let mut out: Vec<Coordinate> = Vec::with_capacity(ring.len());
    for c in ring {
        if out.last().is_some_and(|last| same_point(last, c)) {
            continue;
        }
        out.push(*c);
    }
    while out.len() > 1 && same_point(&out[0], &out[out.len() - 1]) {
        out.pop();
    }
    out
}

fn same_point(a: &Coordinate, b: &Coordinate) -> bool {
    (a.latitude - b.latitude).abs() < DUPLICATE_EPSILON_DEG
        && (a.longitude - b.longitude).abs() < DUPLICATE_EPSILON_DEG
}

fn to_polygon(ring: &[Coordinate]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = ring.iter().map(|&c| c.into()).collect();
    Polygon::new(LineString::new(coords), vec![])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_ring_drops_repeats_and_closing_copy() {
        let a = Coordinate::new(10.0, 10.0);
        let b = Coordinate::new(10.001, 10.0);
        let c = Coordinate::new(10.001, 10.001);
        let ring = vec![a, a, b, b, b, c, a];
        assert_eq!(dedup_ring(&ring), vec![a, b, c]);
    }

    #[test]
    fn test_dedup_ring_keeps_non_consecutive_repeats() {
        let a = Coordinate::new(10.0, 10.0);
        let b = Coordinate::new(10.001, 10.0);
        let c = Coordinate::new(10.001, 10.001);
        assert_eq!(dedup_ring(&[a, b, a, c]).len(), 4);
    }
}
