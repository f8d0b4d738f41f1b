//! Tests for loop closure detection

use loopclaim::geo_utils::destination_point;
use loopclaim::synthetic::circle_ring;
use loopclaim::{ClosureCheck, ClosureConfig, ClosureDetector, Coordinate};

const CENTER: Coordinate = Coordinate {
    latitude: 31.2304,
    longitude: 121.4737,
};

/// A 12-point walk around a 50 m circle with `last` appended.
fn walk_ending_at(last: Coordinate) -> Vec<Coordinate> {
    let mut path = circle_ring(&CENTER, 50.0, 12);
    path.push(last);
    path
}

fn start_point() -> Coordinate {
    circle_ring(&CENTER, 50.0, 12)[0]
}

#[test]
fn test_closes_inside_radius() {
    let latest = destination_point(&start_point(), 200.0, 19.0);
    let path = walk_ending_at(latest);
    let detector = ClosureDetector::default();

    assert!(detector.check(&path, &latest));
    match detector.evaluate(&path, &latest) {
        ClosureCheck::Closed { distance_meters } => assert!((distance_meters - 19.0).abs() < 0.01),
        other => panic!("expected closure, got {other:?}"),
    }
}

#[test]
fn test_does_not_close_outside_radius() {
    let latest = destination_point(&start_point(), 200.0, 21.0);
    let path = walk_ending_at(latest);
    let detector = ClosureDetector::default();

    assert!(!detector.check(&path, &latest));
    assert!(matches!(
        detector.evaluate(&path, &latest),
        ClosureCheck::TooFar { .. }
    ));
}

#[test]
fn test_too_few_points_never_close() {
    let detector = ClosureDetector::default();
    let start = start_point();

    // Back at the start after a long walk, but only 3 points
    let far = destination_point(&start, 90.0, 500.0);
    let path = vec![start, far, start];
    assert_eq!(
        detector.evaluate(&path, &start),
        ClosureCheck::TooFewPoints { point_count: 3 }
    );
}

#[test]
fn test_min_points_boundary() {
    let start = start_point();
    let mut path = circle_ring(&CENTER, 50.0, 8);
    path.push(start);
    let detector = ClosureDetector::default();

    // 9 points
    assert!(!detector.check(&path, &start));

    let mut longer = circle_ring(&CENTER, 50.0, 9);
    longer.push(start);
    // 10 points
    assert!(detector.check(&longer, &start));
}

#[test]
fn test_min_points_floor_of_three() {
    let detector = ClosureDetector::new(ClosureConfig {
        min_points: 0,
        ..ClosureConfig::default()
    });
    let start = start_point();
    let far = destination_point(&start, 90.0, 100.0);
    assert!(!detector.check(&[start, far], &far));
    assert!(!detector.check(&[start], &start));
    assert!(!detector.check(&[], &start));
}

#[test]
fn test_short_perimeter_does_not_close() {
    // GPS jitter in place: many points, tiny distance walked
    let start = start_point();
    let path: Vec<Coordinate> = (0..15)
        .map(|i| destination_point(&start, (i * 37) as f64, 2.0))
        .collect();
    let latest = path[14];

    assert!(matches!(
        ClosureDetector::default().evaluate(&path, &latest),
        ClosureCheck::PerimeterTooShort { .. }
    ));
}

#[test]
fn test_only_first_point_counts() {
    // Returning to an intermediate point is not a closure
    let mut path = circle_ring(&CENTER, 50.0, 12);
    let crossing = path[6];
    path.push(crossing);

    assert!(!ClosureDetector::default().check(&path, &crossing));
}

#[test]
fn test_precomputed_length_is_used() {
    let latest = destination_point(&start_point(), 200.0, 10.0);
    let path = walk_ending_at(latest);
    let detector = ClosureDetector::default();

    assert!(matches!(
        detector.evaluate_with_length(&path, &latest, 50.0),
        ClosureCheck::PerimeterTooShort { .. }
    ));
    assert!(detector.evaluate_with_length(&path, &latest, 50.1).is_closed());
}

#[test]
fn test_custom_radius() {
    let detector = ClosureDetector::new(ClosureConfig {
        closure_radius_meters: 30.0,
        ..ClosureConfig::default()
    });
    let latest = destination_point(&start_point(), 200.0, 25.0);
    assert!(detector.check(&walk_ending_at(latest), &latest));
}
