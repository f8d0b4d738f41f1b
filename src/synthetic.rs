//! Synthetic walks for testing and benchmarking.
//!
//! Generates deterministic loop walks with known geometry (so the expected
//! area is known), GPS noise, and stationary jitter that must never close.
//!
//! # Example
//!
//! ```rust
//! use loopclaim::Coordinate;
//! use loopclaim::synthetic::LoopWalk;
//!
//! let walk = LoopWalk {
//!     noise_sigma_meters: 2.0,
//!     seed: 7,
//!     ..LoopWalk::new(Coordinate::new(47.37, 8.55), 50.0, 24)
//! };
//!
//! let fixes = walk.generate();
//! assert_eq!(fixes.len(), 25); // 24 around the circle + 1 closing fix
//! ```

use std::f64::consts::PI;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geo_utils::{destination_point, meters_to_degrees, METERS_PER_DEG_LAT};
use crate::{Coordinate, Fix};

// ============================================================================
// Exact Shapes
// ============================================================================

/// `n` points evenly spaced on a circle, starting due north, clockwise.
pub fn circle_ring(center: &Coordinate, radius_meters: f64, n: usize) -> Vec<Coordinate> {
    (0..n)
        .map(|i| {
            let bearing = 360.0 * i as f64 / n as f64;
            destination_point(center, bearing, radius_meters)
        })
        .collect()
}

/// A square with great-circle sides of `side_meters`, walked
/// counter-clockwise from `origin` (east, north, west).
pub fn square_ring(origin: &Coordinate, side_meters: f64) -> Vec<Coordinate> {
    let east = destination_point(origin, 90.0, side_meters);
    let north_east = destination_point(&east, 0.0, side_meters);
    let north = destination_point(origin, 0.0, side_meters);
    vec![*origin, east, north_east, north]
}

/// Area of the regular `n`-gon inscribed in a circle of `radius_meters`.
pub fn inscribed_polygon_area(radius_meters: f64, n: usize) -> f64 {
    0.5 * n as f64 * radius_meters * radius_meters * (2.0 * PI / n as f64).sin()
}

// ============================================================================
// Noise
// ============================================================================

/// Offset a coordinate by Gaussian noise (Box-Muller transform).
fn jitter(c: &Coordinate, sigma_meters: f64, rng: &mut StdRng) -> Coordinate {
    if sigma_meters <= 0.0 {
        return *c;
    }
    let u1: f64 = rng.gen_range(0.0001..1.0);
    let u2: f64 = rng.r#gen();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    let z1 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).sin();

    Coordinate::new(
        c.latitude + z0 * sigma_meters / METERS_PER_DEG_LAT,
        c.longitude + meters_to_degrees(z1 * sigma_meters, c.latitude),
    )
}

fn stamp(coordinates: Vec<Coordinate>, start: Option<DateTime<Utc>>, step_secs: i64) -> Vec<Fix> {
    coordinates
        .into_iter()
        .enumerate()
        .map(|(i, c)| match start {
            Some(t0) => Fix::at(c, t0 + Duration::seconds(step_secs * i as i64)),
            None => Fix::from(c),
        })
        .collect()
}

// ============================================================================
// Walk Scenarios
// ============================================================================

/// A walk around a circle that returns near its start.
#[derive(Debug, Clone)]
pub struct LoopWalk {
    pub center: Coordinate,
    pub radius_meters: f64,
    /// Fixes around the circle, before the closing fix.
    pub point_count: usize,
    /// GPS noise standard deviation in meters.
    pub noise_sigma_meters: f64,
    /// Distance of the closing fix from the (noise-free) first point.
    pub closing_offset_meters: f64,
    /// When set, fixes are timestamped from here every `step_secs`.
    pub start_time: Option<DateTime<Utc>>,
    pub step_secs: i64,
    /// RNG seed for deterministic reproduction.
    pub seed: u64,
}

impl LoopWalk {
    /// Noise-free walk with a closing fix 5 m from the start.
    pub fn new(center: Coordinate, radius_meters: f64, point_count: usize) -> Self {
        Self {
            center,
            radius_meters,
            point_count,
            noise_sigma_meters: 0.0,
            closing_offset_meters: 5.0,
            start_time: None,
            step_secs: 10,
            seed: 42,
        }
    }

    /// A ~100 m diameter loop around a city block, sampled every ~13 m.
    pub fn city_block(center: Coordinate) -> Self {
        Self {
            noise_sigma_meters: 3.0,
            start_time: Some(Utc::now()),
            ..Self::new(center, 50.0, 24)
        }
    }

    /// Generate the fixes: `point_count` around the circle, then one
    /// closing fix. The closing fix is offset toward the center so it never
    /// lands on the first point.
    pub fn generate(&self) -> Vec<Fix> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let ring = circle_ring(&self.center, self.radius_meters, self.point_count);

        let mut coordinates: Vec<Coordinate> = ring
            .iter()
            .map(|c| jitter(c, self.noise_sigma_meters, &mut rng))
            .collect();

        if let Some(first) = ring.first() {
            // The first point lies due north of the center
            let closing = destination_point(first, 180.0, self.closing_offset_meters);
            coordinates.push(closing);
        }

        stamp(coordinates, self.start_time, self.step_secs)
    }

    /// Expected enclosed area ignoring noise and the closing fix.
    pub fn expected_area(&self) -> f64 {
        inscribed_polygon_area(self.radius_meters, self.point_count)
    }
}

/// A device standing still: fixes scattered around one point.
#[derive(Debug, Clone)]
pub struct StationaryJitter {
    pub center: Coordinate,
    pub sigma_meters: f64,
    pub count: usize,
    pub seed: u64,
}

impl StationaryJitter {
    pub fn generate(&self) -> Vec<Fix> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let coordinates = (0..self.count)
            .map(|_| jitter(&self.center, self.sigma_meters, &mut rng))
            .collect();
        stamp(coordinates, None, 1)
    }
}
