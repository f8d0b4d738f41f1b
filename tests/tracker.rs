//! Tests for the path tracking state machine

use std::f64::consts::PI;

use chrono::{Duration, Utc};
use loopclaim::geo_utils::{destination_point, meters_to_degrees, METERS_PER_DEG_LAT};
use loopclaim::synthetic::{LoopWalk, StationaryJitter};
use loopclaim::{
    Coordinate, Fix, FixRejection, LoopClaimError, PathTracker, TrackerConfig, TrackerEvent,
    TrackingState,
};
use uuid::Uuid;

const CENTER: Coordinate = Coordinate {
    latitude: 31.2304,
    longitude: 121.4737,
};

fn tracking(config: TrackerConfig) -> PathTracker {
    let mut tracker = PathTracker::new(Uuid::new_v4(), config);
    tracker.start().unwrap();
    tracker
}

/// Offset `origin` by local east/north meters.
fn local(origin: &Coordinate, east: f64, north: f64) -> Coordinate {
    Coordinate::new(
        origin.latitude + north / METERS_PER_DEG_LAT,
        origin.longitude + meters_to_degrees(east, origin.latitude),
    )
}

/// Straight-line interpolation from `a` to `b` in `steps`, excluding `a`.
fn leg(a: &Coordinate, b: &Coordinate, steps: usize) -> Vec<Coordinate> {
    (1..=steps)
        .map(|k| {
            let t = k as f64 / steps as f64;
            Coordinate::new(
                a.latitude + t * (b.latitude - a.latitude),
                a.longitude + t * (b.longitude - a.longitude),
            )
        })
        .collect()
}

/// A walk that crosses itself once and returns exactly to its start.
/// The left lobe encloses ~20000 m², the right ~5000 m².
fn crossing_walk() -> Vec<Coordinate> {
    let a = local(&CENTER, -200.0, 100.0);
    let b = local(&CENTER, 100.0, -50.0);
    let c = local(&CENTER, 100.0, 50.0);
    let d = local(&CENTER, -200.0, -100.0);

    let mut path = vec![a];
    path.extend(leg(&a, &b, 6));
    path.extend(leg(&b, &c, 2));
    path.extend(leg(&c, &d, 6));
    path.extend(leg(&d, &a, 3));
    path
}

#[test]
fn test_twelve_point_circle_closes() {
    let mut tracker = tracking(TrackerConfig::default());
    let fixes = LoopWalk::new(CENTER, 50.0, 12).generate();
    let last = fixes.len() - 1;

    let mut territory = None;
    for (i, fix) in fixes.into_iter().enumerate() {
        let result = tracker.ingest(fix).unwrap();
        if i < last {
            assert!(result.is_none(), "closed early at fix {i}");
        } else {
            territory = result;
        }
    }

    let territory = territory.expect("loop should close on the 13th fix");
    let circle = PI * 50.0 * 50.0;
    assert!(
        (territory.area_square_meters - circle).abs() / circle < 0.10,
        "area {}",
        territory.area_square_meters
    );
    assert_eq!(territory.point_count(), 13);
    assert_eq!(territory.owner, tracker.owner());
    assert!(territory.perimeter_meters > 300.0 && territory.perimeter_meters < 330.0);
    assert!(territory.started_at <= territory.completed_at);
    assert!(territory.bounds.contains(&CENTER));
    assert_eq!(tracker.state(), TrackingState::Closed);
}

#[test]
fn test_noisy_city_block_closes() {
    let walk = LoopWalk::city_block(CENTER);
    let expected = walk.expected_area();
    let mut tracker = tracking(TrackerConfig::default());

    let territory = walk
        .generate()
        .into_iter()
        .find_map(|fix| tracker.ingest(fix).unwrap())
        .expect("noisy loop should close");
    assert!((territory.area_square_meters - expected).abs() / expected < 0.2);
}

#[test]
fn test_three_points_never_close() {
    let mut tracker = tracking(TrackerConfig::default());
    let start = CENTER;
    let far = destination_point(&start, 90.0, 200.0);

    assert!(tracker.ingest(start).unwrap().is_none());
    assert!(tracker.ingest(far).unwrap().is_none());
    assert!(tracker.ingest(start).unwrap().is_none());
    assert_eq!(tracker.state(), TrackingState::Tracking);
}

#[test]
fn test_stationary_jitter_never_closes() {
    let mut tracker = tracking(TrackerConfig::default());
    let jitter = StationaryJitter {
        center: CENTER,
        sigma_meters: 3.0,
        count: 30,
        seed: 9,
    };
    for fix in jitter.generate() {
        assert!(tracker.ingest(fix).unwrap().is_none());
    }
    assert_eq!(tracker.state(), TrackingState::Tracking);
}

#[test]
fn test_stop_then_start_has_no_carry_over() {
    let mut tracker = tracking(TrackerConfig::default());
    let fixes = LoopWalk::new(CENTER, 50.0, 12).generate();

    for fix in &fixes[..8] {
        tracker.ingest(*fix).unwrap();
    }
    tracker.stop();
    assert_eq!(tracker.state(), TrackingState::Idle);
    assert!(tracker.path().is_empty());

    tracker.start().unwrap();
    assert!(tracker.path().is_empty());
    assert_eq!(tracker.path_length_meters(), 0.0);

    // The tail alone cannot close against the discarded start
    for fix in &fixes[8..] {
        assert!(tracker.ingest(*fix).unwrap().is_none());
    }
    assert_eq!(tracker.path().len(), fixes.len() - 8);
}

#[test]
fn test_start_twice_is_rejected() {
    let mut tracker = tracking(TrackerConfig::default());
    tracker.ingest(CENTER).unwrap();

    assert_eq!(tracker.start(), Err(LoopClaimError::AlreadyTracking));
    assert_eq!(tracker.path().len(), 1);
}

#[test]
fn test_ingest_requires_tracking() {
    let mut tracker = PathTracker::new(Uuid::new_v4(), TrackerConfig::default());
    assert_eq!(tracker.ingest(CENTER), Err(LoopClaimError::NotTracking));
    assert!(tracker.path().is_empty());
}

#[test]
fn test_stop_is_idempotent() {
    let mut tracker = PathTracker::new(Uuid::new_v4(), TrackerConfig::default());
    let events = tracker.subscribe();
    tracker.stop();
    tracker.stop();
    assert!(events.try_recv().is_err());
}

#[test]
fn test_closed_tracker_restarts() {
    let mut tracker = tracking(TrackerConfig::default());
    for fix in LoopWalk::new(CENTER, 50.0, 12).generate() {
        tracker.ingest(fix).unwrap();
    }
    assert_eq!(tracker.state(), TrackingState::Closed);
    assert_eq!(tracker.ingest(CENTER), Err(LoopClaimError::NotTracking));

    tracker.start().unwrap();
    assert_eq!(tracker.state(), TrackingState::Tracking);
    assert!(tracker.path().is_empty());
}

#[test]
fn test_invalid_fix_dropped_and_tracking_continues() {
    let mut tracker = tracking(TrackerConfig::default());
    let events = tracker.subscribe();
    tracker.ingest(CENTER).unwrap();

    let bad = Coordinate::new(91.0, 0.0);
    assert!(matches!(
        tracker.ingest(bad),
        Err(LoopClaimError::InvalidCoordinate { .. })
    ));
    assert!(tracker.ingest(Coordinate::new(f64::NAN, 0.0)).is_err());
    assert_eq!(tracker.path().len(), 1);
    assert_eq!(tracker.state(), TrackingState::Tracking);

    let next = destination_point(&CENTER, 0.0, 10.0);
    tracker.ingest(next).unwrap();
    assert_eq!(tracker.path().len(), 2);

    let rejected: Vec<_> = events
        .try_iter()
        .filter_map(|e| match e {
            TrackerEvent::FixRejected { reason, .. } => Some(reason),
            _ => None,
        })
        .collect();
    assert_eq!(
        rejected,
        vec![FixRejection::InvalidCoordinate, FixRejection::InvalidCoordinate]
    );
}

#[test]
fn test_low_accuracy_fix_dropped() {
    let mut tracker = tracking(TrackerConfig::default());
    let events = tracker.subscribe();

    let fix = Fix::from(CENTER).with_accuracy(80.0);
    assert_eq!(tracker.ingest(fix), Ok(None));
    assert!(tracker.path().is_empty());
    assert!(events.try_iter().any(|e| matches!(
        e,
        TrackerEvent::FixRejected {
            reason: FixRejection::LowAccuracy { .. },
            ..
        }
    )));

    tracker.ingest(Fix::from(CENTER).with_accuracy(10.0)).unwrap();
    assert_eq!(tracker.path().len(), 1);
}

#[test]
fn test_overspeed_fix_dropped() {
    let mut tracker = tracking(TrackerConfig::default());
    let t0 = Utc::now();
    let b = destination_point(&CENTER, 90.0, 100.0);

    tracker.ingest(Fix::at(CENTER, t0)).unwrap();
    // 100 m in 5 s is 72 km/h
    tracker.ingest(Fix::at(b, t0 + Duration::seconds(5))).unwrap();
    assert_eq!(tracker.path().len(), 1);

    // Measured against the last accepted fix
    tracker.ingest(Fix::at(b, t0 + Duration::seconds(60))).unwrap();
    assert_eq!(tracker.path().len(), 2);
}

#[test]
fn test_speed_warning_keeps_fix() {
    let mut tracker = tracking(TrackerConfig::default());
    let events = tracker.subscribe();
    let t0 = Utc::now();

    tracker.ingest(Fix::at(CENTER, t0)).unwrap();
    // 50 m in 10 s is 18 km/h: jogging, not driving
    let b = destination_point(&CENTER, 90.0, 50.0);
    tracker.ingest(Fix::at(b, t0 + Duration::seconds(10))).unwrap();

    assert_eq!(tracker.path().len(), 2);
    let warning = events.try_iter().find_map(|e| match e {
        TrackerEvent::SpeedWarning { speed_mps } => Some(speed_mps),
        _ => None,
    });
    assert!(warning.is_some_and(|s| (s - 5.0).abs() < 0.01));
}

#[test]
fn test_untimed_fixes_skip_speed_filter() {
    let mut tracker = tracking(TrackerConfig::default());
    tracker.ingest(CENTER).unwrap();
    tracker
        .ingest(destination_point(&CENTER, 90.0, 5000.0))
        .unwrap();
    assert_eq!(tracker.path().len(), 2);
}

#[test]
fn test_min_spacing_filter() {
    let mut tracker = tracking(TrackerConfig {
        min_point_spacing_meters: 5.0,
        ..TrackerConfig::default()
    });
    tracker.ingest(CENTER).unwrap();
    tracker
        .ingest(destination_point(&CENTER, 0.0, 2.0))
        .unwrap();
    assert_eq!(tracker.path().len(), 1);

    tracker
        .ingest(destination_point(&CENTER, 0.0, 6.0))
        .unwrap();
    assert_eq!(tracker.path().len(), 2);
}

#[test]
fn test_small_loop_retracted_and_tracking_continues() {
    let mut tracker = tracking(TrackerConfig {
        min_territory_area_square_meters: 20_000.0,
        ..TrackerConfig::default()
    });
    let events = tracker.subscribe();

    for fix in LoopWalk::new(CENTER, 50.0, 12).generate() {
        assert!(tracker.ingest(fix).unwrap().is_none());
    }
    assert_eq!(tracker.state(), TrackingState::Tracking);
    assert_eq!(tracker.path().len(), 13);
    assert!(events
        .try_iter()
        .any(|e| matches!(e, TrackerEvent::ClosureRetracted { .. })));
}

#[test]
fn test_crossing_walk_claims_net_area() {
    let mut tracker = tracking(TrackerConfig::default());
    let territory = crossing_walk()
        .into_iter()
        .find_map(|c| tracker.ingest(c).unwrap())
        .expect("crossing walk should close");
    assert!((territory.area_square_meters - 15_000.0).abs() / 15_000.0 < 0.1);
}

#[test]
fn test_crossing_walk_retracted_when_rejecting_self_intersection() {
    let mut tracker = tracking(TrackerConfig {
        reject_self_intersecting: true,
        ..TrackerConfig::default()
    });
    let events = tracker.subscribe();

    for c in crossing_walk() {
        assert!(tracker.ingest(c).unwrap().is_none());
    }
    let reason = events.try_iter().find_map(|e| match e {
        TrackerEvent::ClosureRetracted { reason } => Some(reason),
        _ => None,
    });
    assert!(reason.is_some_and(|r| r.contains("crosses itself")));
}

#[test]
fn test_event_sequence() {
    let mut tracker = PathTracker::new(Uuid::new_v4(), TrackerConfig::default());
    let first = tracker.subscribe();
    let second = tracker.subscribe();
    tracker.start().unwrap();
    for fix in LoopWalk::new(CENTER, 50.0, 12).generate() {
        tracker.ingest(fix).unwrap();
    }
    tracker.stop();

    let events: Vec<TrackerEvent> = first.try_iter().collect();
    assert_eq!(events.first(), Some(&TrackerEvent::Started));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, TrackerEvent::PathUpdated { .. }))
            .count(),
        13
    );
    assert!(matches!(
        events[events.len() - 2],
        TrackerEvent::TerritoryClosed(_)
    ));
    assert_eq!(
        events.last(),
        Some(&TrackerEvent::Stopped {
            discarded_points: 13
        })
    );

    // Every subscriber sees the same stream
    assert_eq!(second.try_iter().count(), events.len());
}

#[test]
fn test_dropped_subscriber_does_not_block() {
    let mut tracker = PathTracker::new(Uuid::new_v4(), TrackerConfig::default());
    drop(tracker.subscribe());
    let live = tracker.subscribe();
    tracker.start().unwrap();
    tracker.ingest(CENTER).unwrap();
    assert_eq!(live.try_iter().count(), 2);
}
