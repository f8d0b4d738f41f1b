//! Geographic utilities.
//!
//! Great-circle distance, forward destination, path length and bounds
//! helpers. All inputs are WGS-84 coordinates.

use geo::{Destination, Distance, Haversine};

use crate::{Bounds, Coordinate};

/// Meters per degree of latitude (approximately constant).
pub const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Haversine distance between two coordinates in meters.
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    Haversine::distance(a.to_point(), b.to_point())
}

/// The coordinate reached by travelling `distance_meters` from `origin` along
/// `bearing_degrees` (0 = north, 90 = east) on the haversine sphere.
///
/// Inverse of [`haversine_distance`] up to floating point error.
pub fn destination_point(origin: &Coordinate, bearing_degrees: f64, distance_meters: f64) -> Coordinate {
    Haversine::destination(origin.to_point(), bearing_degrees, distance_meters).into()
}

/// Sum of segment lengths along an open path, in meters.
pub fn path_length(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Length of a ring including the implicit closing edge, in meters.
pub fn ring_perimeter(points: &[Coordinate]) -> f64 {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() > 2 => {
            path_length(points) + haversine_distance(last, first)
        }
        _ => path_length(points),
    }
}

/// Compute bounds of a set of coordinates. Empty input yields a zeroed box.
pub fn compute_bounds(points: &[Coordinate]) -> Bounds {
    Bounds::from_points(points).unwrap_or(Bounds {
        min_lat: 0.0,
        max_lat: 0.0,
        min_lng: 0.0,
        max_lng: 0.0,
    })
}

/// Arithmetic mean of the coordinates. Empty input yields (0, 0).
pub fn compute_center(points: &[Coordinate]) -> Coordinate {
    if points.is_empty() {
        return Coordinate::new(0.0, 0.0);
    }
    let n = points.len() as f64;
    let (lat_sum, lng_sum) = points
        .iter()
        .fold((0.0, 0.0), |(la, ln), p| (la + p.latitude, ln + p.longitude));
    Coordinate::new(lat_sum / n, lng_sum / n)
}

/// Convert a distance in meters to degrees of longitude at `latitude`.
///
/// Used for envelope queries; longitude degrees shrink toward the poles.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let cos_lat = latitude.to_radians().cos().abs().max(0.01);
    meters / (METERS_PER_DEG_LAT * cos_lat)
}

/// Expand `center` by `radius_meters` into a lat/lng box that contains the
/// whole circle.
///
/// Padded by 1%: `METERS_PER_DEG_LAT` is an equatorial figure, slightly
/// larger than a degree on the haversine sphere.
pub fn radius_bounds(center: &Coordinate, radius_meters: f64) -> Bounds {
    let padded = radius_meters * 1.01;
    let dlat = padded / METERS_PER_DEG_LAT;
    let dlng = meters_to_degrees(padded, center.latitude);
    Bounds {
        min_lat: center.latitude - dlat,
        max_lat: center.latitude + dlat,
        min_lng: center.longitude - dlng,
        max_lng: center.longitude + dlng,
    }
}
