//! FFI bindings for mobile platforms (iOS/Android).
//!
//! This module provides the UniFFI bindings that expose the tracking core to
//! Kotlin and Swift. Free functions are prefixed with `ffi_` to avoid naming
//! conflicts with the internal API. Networking stays on the platform side;
//! only pure geometry and the tracker state machine cross the boundary.

use std::sync::{Mutex, MutexGuard};

use log::{debug, info};
use uuid::Uuid;

use crate::area::{AreaCalculator, AreaConfig};
use crate::closure::{ClosureConfig, ClosureDetector};
use crate::datum::{convert_path, gcj02_to_wgs84};
use crate::presence::{DensityTier, suggested_poi_count};
use crate::{init_logging, Coordinate, Fix, PathTracker, Territory, TrackerConfig, TrackingState};

// ============================================================================
// Records
// ============================================================================

/// A finalized territory, flattened for the platform side.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTerritory {
    pub id: String,
    pub owner_id: String,
    pub path: Vec<Coordinate>,
    pub area_square_meters: f64,
    pub perimeter_meters: f64,
    /// Unix timestamp (seconds)
    pub started_at: i64,
    /// Unix timestamp (seconds)
    pub completed_at: i64,
}

impl From<Territory> for FfiTerritory {
    fn from(t: Territory) -> Self {
        Self {
            id: t.id.to_string(),
            owner_id: t.owner.to_string(),
            area_square_meters: t.area_square_meters,
            perimeter_meters: t.perimeter_meters,
            started_at: t.started_at.timestamp(),
            completed_at: t.completed_at.timestamp(),
            path: t.path,
        }
    }
}

/// Result of feeding one fix to the tracker.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiIngestResult {
    pub accepted: bool,
    pub point_count: u32,
    pub path_length_meters: f64,
    pub territory: Option<FfiTerritory>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiTrackingState {
    Idle,
    Tracking,
    Closed,
}

impl From<TrackingState> for FfiTrackingState {
    fn from(s: TrackingState) -> Self {
        match s {
            TrackingState::Idle => FfiTrackingState::Idle,
            TrackingState::Tracking => FfiTrackingState::Tracking,
            TrackingState::Closed => FfiTrackingState::Closed,
        }
    }
}

// ============================================================================
// Pure Functions
// ============================================================================

/// Area of a ring in square meters, or `None` for a degenerate ring.
#[uniffi::export]
pub fn ffi_polygon_area(ring: Vec<Coordinate>) -> Option<f64> {
    init_logging();
    AreaCalculator::new(AreaConfig::default()).area(&ring).ok()
}

/// Convert a WGS-84 path to GCJ-02 for drawing on China map tiles.
#[uniffi::export]
pub fn ffi_wgs84_to_gcj02_path(path: Vec<Coordinate>) -> Vec<Coordinate> {
    convert_path(&path)
}

#[uniffi::export]
pub fn ffi_gcj02_to_wgs84(coordinate: Coordinate) -> Coordinate {
    gcj02_to_wgs84(&coordinate)
}

/// Whether the path (ending with its latest fix) closes with default policy.
#[uniffi::export]
pub fn ffi_is_loop_closed(path: Vec<Coordinate>) -> bool {
    let Some(latest) = path.last() else {
        return false;
    };
    ClosureDetector::new(ClosureConfig::default()).check(&path, latest)
}

/// Density tier name ("solo", "low", "medium", "high") for a nearby count.
#[uniffi::export]
pub fn ffi_density_tier(nearby_count: u32) -> String {
    DensityTier::from_count(nearby_count).to_string()
}

#[uniffi::export]
pub fn ffi_suggested_poi_count(nearby_count: u32) -> u32 {
    suggested_poi_count(nearby_count)
}

// ============================================================================
// Tracker Object
// ============================================================================

/// A [`PathTracker`] owned by the platform side.
#[derive(uniffi::Object)]
pub struct TrackerHandle {
    inner: Mutex<PathTracker>,
}

impl TrackerHandle {
    fn tracker(&self) -> MutexGuard<'_, PathTracker> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[uniffi::export]
impl TrackerHandle {
    /// Create a tracker for `owner_id` (a UUID string). An unparsable id
    /// falls back to the nil UUID.
    #[uniffi::constructor]
    pub fn new(owner_id: String) -> Self {
        init_logging();
        let owner = Uuid::parse_str(&owner_id).unwrap_or_else(|_| Uuid::nil());
        info!("[LoopClaim] TrackerHandle created for {}", owner);
        Self {
            inner: Mutex::new(PathTracker::new(owner, TrackerConfig::default())),
        }
    }

    /// Returns false if already tracking.
    pub fn start(&self) -> bool {
        self.tracker().start().is_ok()
    }

    pub fn stop(&self) {
        self.tracker().stop();
    }

    pub fn state(&self) -> FfiTrackingState {
        self.tracker().state().into()
    }

    pub fn path(&self) -> Vec<Coordinate> {
        self.tracker().path().to_vec()
    }

    /// Feed one fix. `horizontal_accuracy` < 0 means unknown.
    pub fn ingest(&self, latitude: f64, longitude: f64, horizontal_accuracy: f64) -> FfiIngestResult {
        let mut fix = Fix::from(Coordinate::new(latitude, longitude));
        if horizontal_accuracy >= 0.0 {
            fix = fix.with_accuracy(horizontal_accuracy);
        }

        let mut tracker = self.tracker();
        let before = tracker.path().len();
        let result = tracker.ingest(fix);
        let point_count = tracker.path().len();
        debug!("[LoopClaim] ingest → {} points", point_count);

        match result {
            Ok(territory) => FfiIngestResult {
                accepted: point_count > before,
                point_count: point_count as u32,
                path_length_meters: tracker.path_length_meters(),
                territory: territory.map(FfiTerritory::from),
                error: None,
            },
            Err(e) => FfiIngestResult {
                accepted: false,
                point_count: point_count as u32,
                path_length_meters: tracker.path_length_meters(),
                territory: None,
                error: Some(e.to_string()),
            },
        }
    }
}
