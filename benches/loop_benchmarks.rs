//! Performance benchmarks for loopclaim.
//!
//! Run with: `cargo bench`
//!
//! Measures the per-fix hot path (closure check, ingest) and the one-off
//! work done when a loop closes (area, self-intersection) on synthetic walks
//! of realistic size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use loopclaim::area::is_self_intersecting;
use loopclaim::synthetic::{circle_ring, LoopWalk};
use loopclaim::{
    convert_path, AreaCalculator, AreaConfig, AreaMethod, ClosureDetector, Coordinate, PathTracker,
    TrackerConfig,
};
use uuid::Uuid;

const SHANGHAI: Coordinate = Coordinate {
    latitude: 31.2304,
    longitude: 121.4737,
};

// ============================================================================
// Benchmarks
// ============================================================================

/// Area of loops from a city block to a long run.
fn bench_area(c: &mut Criterion) {
    let mut group = c.benchmark_group("area");
    let geodesic = AreaCalculator::default();
    let spherical = AreaCalculator::new(AreaConfig {
        method: AreaMethod::Spherical,
        ..AreaConfig::default()
    });

    for points in [24, 200, 2000] {
        let ring = circle_ring(&SHANGHAI, 500.0, points);
        group.bench_with_input(BenchmarkId::new("geodesic", points), &ring, |b, ring| {
            b.iter(|| geodesic.area(black_box(ring)))
        });
        group.bench_with_input(BenchmarkId::new("spherical", points), &ring, |b, ring| {
            b.iter(|| spherical.area(black_box(ring)))
        });
    }
    group.finish();
}

/// Closure evaluation runs on every accepted fix.
fn bench_closure_check(c: &mut Criterion) {
    let detector = ClosureDetector::default();
    let path = circle_ring(&SHANGHAI, 500.0, 500);
    let latest = path[path.len() - 1];

    c.bench_function("closure_check_500_points", |b| {
        b.iter(|| detector.evaluate(black_box(&path), black_box(&latest)))
    });
}

fn bench_self_intersection(c: &mut Criterion) {
    let mut group = c.benchmark_group("self_intersection");
    for points in [24, 200] {
        let ring = circle_ring(&SHANGHAI, 500.0, points);
        group.bench_with_input(BenchmarkId::from_parameter(points), &ring, |b, ring| {
            b.iter(|| is_self_intersecting(black_box(ring)))
        });
    }
    group.finish();
}

/// Full walk through the state machine, fix by fix.
fn bench_tracker_walk(c: &mut Criterion) {
    let walk = LoopWalk {
        noise_sigma_meters: 3.0,
        ..LoopWalk::new(SHANGHAI, 300.0, 150)
    };
    let fixes = walk.generate();

    c.bench_function("tracker_walk_150_fixes", |b| {
        b.iter(|| {
            let mut tracker = PathTracker::new(Uuid::nil(), TrackerConfig::default());
            let _ = tracker.start();
            fixes
                .iter()
                .find_map(|fix| tracker.ingest(*fix).ok().flatten())
        })
    });
}

fn bench_datum_conversion(c: &mut Criterion) {
    let path = circle_ring(&SHANGHAI, 2000.0, 1000);

    c.bench_function("wgs84_to_gcj02_1000_points", |b| {
        b.iter(|| convert_path(black_box(&path)))
    });

    #[cfg(feature = "parallel")]
    c.bench_function("wgs84_to_gcj02_1000_points_parallel", |b| {
        b.iter(|| loopclaim::datum::convert_path_parallel(black_box(&path)))
    });
}

criterion_group!(
    benches,
    bench_area,
    bench_closure_check,
    bench_self_intersection,
    bench_tracker_walk,
    bench_datum_conversion,
);

criterion_main!(benches);
