//! # loopclaim
//!
//! Territory claiming by walking a closed loop.
//!
//! This library provides:
//! - A path-tracking state machine that ingests GPS fixes in order
//! - Closure detection against the first recorded point
//! - Geodesic (or spherical) area of the enclosed ring
//! - WGS-84 → GCJ-02 datum conversion for map overlays in mainland China
//! - Throttled, cancellable position reporting to a presence backend
//! - Nearby-player density tiers and point-of-interest recommendations
//!
//! ## Features
//!
//! - **`parallel`** - Parallel batch datum conversion with rayon
//! - **`http`** - PostgREST/Supabase transport for the presence RPCs
//! - **`ffi`** - FFI bindings for mobile platforms (iOS/Android)
//! - **`cli`** - Debug CLI for replaying GPX walks
//!
//! ## Quick Start
//!
//! ```rust
//! use loopclaim::{Coordinate, PathTracker, TrackerConfig};
//! use loopclaim::synthetic::LoopWalk;
//! use uuid::Uuid;
//!
//! let walk = LoopWalk::new(Coordinate::new(31.2304, 121.4737), 50.0, 12).generate();
//!
//! let mut tracker = PathTracker::new(Uuid::new_v4(), TrackerConfig::default());
//! tracker.start().unwrap();
//!
//! let mut claimed = None;
//! for fix in walk {
//!     if let Ok(Some(territory)) = tracker.ingest(fix) {
//!         claimed = Some(territory);
//!     }
//! }
//! let territory = claimed.expect("loop should close");
//! println!("Claimed {:.0} m²", territory.area_square_meters);
//! ```
//!
//! Geometry (closure distance, area) always runs on WGS-84 input. The
//! [`datum`] module exists only for rendering.

use std::path::Path;

use chrono::{DateTime, Utc};
use geo::{Coord, Point};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Unified error handling
pub mod error;
pub use error::{LoopClaimError, OptionExt, Result};

// Geographic utilities (distance, destination, bounds, path length)
pub mod geo_utils;

// GCJ-02 datum conversion for map overlays
pub mod datum;
pub use datum::{convert_path, gcj02_to_wgs84, is_outside_china, wgs84_to_gcj02};

// Polygon area of a closed ring
pub mod area;
pub use area::{AreaCalculator, AreaConfig, AreaMethod};

// Loop closure policy
pub mod closure;
pub use closure::{ClosureCheck, ClosureConfig, ClosureDetector};

// Path tracking state machine
pub mod tracker;
pub use tracker::{FixRejection, PathTracker, TrackerConfig, TrackerEvent, TrackingState};

// Presence reporting and nearby-player density
pub mod presence;
pub use presence::{
    AuthSession, DensityConfig, DensityService, DensityTier, InMemoryBackend, LocationReporter,
    NearbyDensity, NearbyQuery, PresenceBackend, ReportOutcome, ReporterConfig, ReporterEvent,
    TerritoryStore, suggested_poi_count,
};

// Synthetic loop walks for tests, benches and the CLI
pub mod synthetic;

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("LoopClaimRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// Identity of a player (the backend's auth user id).
pub type PlayerId = Uuid;

/// A WGS-84 coordinate.
///
/// # Example
/// ```
/// use loopclaim::Coordinate;
/// let point = Coordinate::new(31.2304, 121.4737); // Shanghai
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate without validating it.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Create a coordinate, rejecting values outside the valid range.
    pub fn validated(latitude: f64, longitude: f64) -> Result<Self> {
        let coordinate = Self::new(latitude, longitude);
        coordinate.validate()?;
        Ok(coordinate)
    }

    /// Check if the coordinate is finite and inside the lat/lon range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// `Ok(())` when valid, otherwise [`LoopClaimError::InvalidCoordinate`].
    pub fn validate(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(LoopClaimError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }

    /// As a geo point (x = longitude, y = latitude).
    pub fn to_point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

impl From<Coordinate> for Coord<f64> {
    fn from(c: Coordinate) -> Self {
        Coord {
            x: c.longitude,
            y: c.latitude,
        }
    }
}

impl From<Point<f64>> for Coordinate {
    fn from(p: Point<f64>) -> Self {
        Self::new(p.y(), p.x())
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self::new(lat, lng)
    }
}

/// A single GPS reading.
///
/// Only the coordinate feeds geometry. The timestamp and horizontal accuracy
/// drive the tracker's optional fix filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub coordinate: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Horizontal accuracy radius in meters, as reported by the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_accuracy: Option<f64>,
}

impl Fix {
    /// A fix taken at `timestamp`.
    pub fn at(coordinate: Coordinate, timestamp: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            timestamp: Some(timestamp),
            horizontal_accuracy: None,
        }
    }

    pub fn with_accuracy(mut self, meters: f64) -> Self {
        self.horizontal_accuracy = Some(meters);
        self
    }
}

impl From<Coordinate> for Fix {
    fn from(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            timestamp: None,
            horizontal_accuracy: None,
        }
    }
}

/// Bounding box of a path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from coordinates.
    pub fn from_points(points: &[Coordinate]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    pub fn contains(&self, c: &Coordinate) -> bool {
        c.latitude >= self.min_lat
            && c.latitude <= self.max_lat
            && c.longitude >= self.min_lng
            && c.longitude <= self.max_lng
    }
}

/// A claimed territory: the closed ring a player walked and its area.
///
/// Produced only by [`PathTracker`] when a closure is confirmed and the area
/// computation succeeds. Persistence is up to a [`TerritoryStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    pub id: Uuid,
    pub owner: PlayerId,
    /// The ring in walk order (WGS-84). The last point is near, not equal to, the first.
    pub path: Vec<Coordinate>,
    /// Enclosed area in square meters (finite, >= 0)
    pub area_square_meters: f64,
    /// Length of the closed ring in meters
    pub perimeter_meters: f64,
    pub bounds: Bounds,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl Territory {
    pub fn point_count(&self) -> usize {
        self.path.len()
    }

    /// Render the ring as `[{"lat": .., "lon": ..}, ..]` for storage.
    pub fn path_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.path
                .iter()
                .map(|c| serde_json::json!({ "lat": c.latitude, "lon": c.longitude }))
                .collect(),
        )
    }
}

/// Latest known position of a player, as upserted by the reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLocationRecord {
    pub player_id: PlayerId,
    pub coordinate: Coordinate,
    pub reported_at: DateTime<Utc>,
    pub is_online: bool,
}

// ============================================================================
// Configuration
// ============================================================================

/// All tunables in one document, loadable from JSON.
///
/// Every section falls back to its defaults when omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopClaimConfig {
    pub tracker: TrackerConfig,
    pub reporter: ReporterConfig,
    pub density: DensityConfig,
}

impl LoopClaimConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| LoopClaimError::Config {
            message: e.to_string(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LoopClaimError::Config {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_json_str(&contents)
    }
}
