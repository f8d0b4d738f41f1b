//! WGS-84 ↔ GCJ-02 datum conversion.
//!
//! Map tiles served inside mainland China are drawn in the GCJ-02 datum, so a
//! WGS-84 path overlaid on them appears shifted by a few hundred meters. These
//! functions shift coordinates for *rendering only*. Closure distance and
//! area are always computed on the original WGS-84 values.
//!
//! Coordinates outside the China bounding box pass through unchanged.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::Coordinate;

/// Semi-major axis of the Krasovsky 1940 ellipsoid used by GCJ-02.
const KRASOVSKY_A: f64 = 6_378_245.0;
/// First eccentricity squared of the Krasovsky 1940 ellipsoid.
const KRASOVSKY_EE: f64 = 0.006_693_421_622_965_943;

/// Bounding box where the GCJ-02 offset applies.
const CHINA_MIN_LNG: f64 = 72.004;
const CHINA_MAX_LNG: f64 = 137.8347;
const CHINA_MIN_LAT: f64 = 0.8293;
const CHINA_MAX_LAT: f64 = 55.8271;

/// Convergence threshold (degrees) and iteration cap for the inverse.
const INVERSE_EPSILON: f64 = 1e-9;
const INVERSE_MAX_ITERATIONS: usize = 30;
/// GCJ-02 shifts stay well under this many degrees.
const EDGE_MARGIN_DEG: f64 = 0.05;

/// True when the coordinate lies outside the region GCJ-02 applies to.
pub fn is_outside_china(c: &Coordinate) -> bool {
    c.longitude < CHINA_MIN_LNG
        || c.longitude > CHINA_MAX_LNG
        || c.latitude < CHINA_MIN_LAT
        || c.latitude > CHINA_MAX_LAT
}

fn transform_lat(x: f64, y: f64) -> f64 {
    let pi = std::f64::consts::PI;
    let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * pi).sin() + 20.0 * (2.0 * x * pi).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * pi).sin() + 40.0 * (y / 3.0 * pi).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * pi).sin() + 320.0 * (y * pi / 30.0).sin()) * 2.0 / 3.0;
    ret
}

fn transform_lng(x: f64, y: f64) -> f64 {
    let pi = std::f64::consts::PI;
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * pi).sin() + 20.0 * (2.0 * x * pi).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * pi).sin() + 40.0 * (x / 3.0 * pi).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * pi).sin() + 300.0 * (x / 30.0 * pi).sin()) * 2.0 / 3.0;
    ret
}

/// The (dlat, dlng) offset GCJ-02 applies at a WGS-84 position.
fn offset(c: &Coordinate) -> (f64, f64) {
    let pi = std::f64::consts::PI;
    let x = c.longitude - 105.0;
    let y = c.latitude - 35.0;

    let rad_lat = c.latitude.to_radians();
    let magic = 1.0 - KRASOVSKY_EE * rad_lat.sin().powi(2);
    let sqrt_magic = magic.sqrt();

    let dlat = (transform_lat(x, y) * 180.0)
        / ((KRASOVSKY_A * (1.0 - KRASOVSKY_EE)) / (magic * sqrt_magic) * pi);
    let dlng = (transform_lng(x, y) * 180.0) / (KRASOVSKY_A / sqrt_magic * rad_lat.cos() * pi);
    (dlat, dlng)
}

/// Convert a WGS-84 coordinate to GCJ-02.
///
/// # Example
/// ```
/// use loopclaim::{Coordinate, wgs84_to_gcj02};
///
/// let tokyo = Coordinate::new(35.6762, 139.6503);
/// assert_eq!(wgs84_to_gcj02(&tokyo), tokyo); // outside the region
/// ```
pub fn wgs84_to_gcj02(c: &Coordinate) -> Coordinate {
    if is_outside_china(c) {
        return *c;
    }
    let (dlat, dlng) = offset(c);
    Coordinate::new(c.latitude + dlat, c.longitude + dlng)
}

/// Convert a GCJ-02 coordinate back to WGS-84.
///
/// GCJ-02 has no closed-form inverse; this refines the estimate until the
/// forward offset reproduces the input within `1e-9` degrees. The shift is
/// north-east, so a GCJ-02 value just past the region's edge can still come
/// from a WGS-84 point inside it: the region test applies to the solution,
/// not the input.
pub fn gcj02_to_wgs84(c: &Coordinate) -> Coordinate {
    if !near_china(c) {
        return *c;
    }
    let mut estimate = *c;
    for _ in 0..INVERSE_MAX_ITERATIONS {
        let (off_lat, off_lng) = offset(&estimate);
        let dlat = estimate.latitude + off_lat - c.latitude;
        let dlng = estimate.longitude + off_lng - c.longitude;
        if dlat.abs() < INVERSE_EPSILON && dlng.abs() < INVERSE_EPSILON {
            break;
        }
        estimate = Coordinate::new(estimate.latitude - dlat, estimate.longitude - dlng);
    }
    if is_outside_china(&estimate) {
        // Forward conversion passed it through unchanged
        return *c;
    }
    estimate
}

/// The region grown by more than the largest GCJ-02 shift.
fn near_china(c: &Coordinate) -> bool {
    c.longitude >= CHINA_MIN_LNG - EDGE_MARGIN_DEG
        && c.longitude <= CHINA_MAX_LNG + EDGE_MARGIN_DEG
        && c.latitude >= CHINA_MIN_LAT - EDGE_MARGIN_DEG
        && c.latitude <= CHINA_MAX_LAT + EDGE_MARGIN_DEG
}

/// Convert a whole path for rendering, preserving order and count.
pub fn convert_path(points: &[Coordinate]) -> Vec<Coordinate> {
    points.iter().map(wgs84_to_gcj02).collect()
}

/// Parallel [`convert_path`] for long recorded tracks.
#[cfg(feature = "parallel")]
pub fn convert_path_parallel(points: &[Coordinate]) -> Vec<Coordinate> {
    points.par_iter().map(wgs84_to_gcj02).collect()
}
