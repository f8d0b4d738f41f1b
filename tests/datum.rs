//! Tests for WGS-84 / GCJ-02 conversion

use loopclaim::geo_utils::haversine_distance;
use loopclaim::{Coordinate, convert_path, gcj02_to_wgs84, is_outside_china, wgs84_to_gcj02};

fn china_cities() -> Vec<Coordinate> {
    vec![
        Coordinate::new(39.9042, 116.4074),  // Beijing
        Coordinate::new(31.2304, 121.4737),  // Shanghai
        Coordinate::new(22.5431, 114.0579),  // Shenzhen
        Coordinate::new(30.5728, 104.0668),  // Chengdu
        Coordinate::new(43.8256, 87.6168),   // Urumqi
        Coordinate::new(45.8038, 126.5350),  // Harbin
    ]
}

#[test]
fn test_round_trip_within_tolerance() {
    for wgs in china_cities() {
        let back = gcj02_to_wgs84(&wgs84_to_gcj02(&wgs));
        assert!((back.latitude - wgs.latitude).abs() < 1e-6, "{wgs:?}");
        assert!((back.longitude - wgs.longitude).abs() < 1e-6, "{wgs:?}");
    }
}

#[test]
fn test_round_trip_near_region_edges() {
    // The north-east shift carries these just outside the region
    for wgs in [
        Coordinate::new(55.826, 120.0),
        Coordinate::new(40.0, 137.834),
        Coordinate::new(40.0, 72.005),
        Coordinate::new(0.83, 110.0),
    ] {
        let back = gcj02_to_wgs84(&wgs84_to_gcj02(&wgs));
        let err = haversine_distance(&back, &wgs);
        assert!(err < 0.01, "{wgs:?} round trip off by {err}m");
    }
}

#[test]
fn test_gcj_value_past_the_edge_from_outside_passes_through() {
    // Nothing inside the region maps here, so it is left alone
    let c = Coordinate::new(55.84, 120.0);
    assert_eq!(gcj02_to_wgs84(&c), c);
}

#[test]
fn test_shift_magnitude_inside_china() {
    for wgs in china_cities() {
        let shift = haversine_distance(&wgs, &wgs84_to_gcj02(&wgs));
        assert!(shift > 1.0 && shift < 1500.0, "{wgs:?} shifted {shift}m");
    }
}

#[test]
fn test_outside_china_passes_through() {
    for c in [
        Coordinate::new(35.6762, 139.6503), // Tokyo
        Coordinate::new(51.5074, -0.1278),  // London
        Coordinate::new(-33.8688, 151.2093), // Sydney
        Coordinate::new(0.5, 110.0),        // south of the box
    ] {
        assert!(is_outside_china(&c));
        assert_eq!(wgs84_to_gcj02(&c), c);
        assert_eq!(gcj02_to_wgs84(&c), c);
    }
}

#[test]
fn test_convert_path_preserves_order_and_count() {
    let path = china_cities();
    let converted = convert_path(&path);

    assert_eq!(converted.len(), path.len());
    for (original, shifted) in path.iter().zip(&converted) {
        assert_eq!(*shifted, wgs84_to_gcj02(original));
    }
    assert!(convert_path(&[]).is_empty());
}

#[test]
fn test_conversion_keeps_local_geometry() {
    // A 100 m step stays ~100 m after shifting both ends
    let a = Coordinate::new(31.2304, 121.4737);
    let b = loopclaim::geo_utils::destination_point(&a, 45.0, 100.0);
    let before = haversine_distance(&a, &b);
    let after = haversine_distance(&wgs84_to_gcj02(&a), &wgs84_to_gcj02(&b));
    assert!((before - after).abs() < 1.0);
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_matches_sequential() {
    use loopclaim::datum::convert_path_parallel;

    let path: Vec<Coordinate> = (0..500)
        .map(|i| Coordinate::new(30.0 + i as f64 * 0.01, 110.0 + i as f64 * 0.01))
        .collect();
    assert_eq!(convert_path_parallel(&path), convert_path(&path));
}
