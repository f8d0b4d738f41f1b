//! Path tracking state machine.
//!
//! ```text
//!            start()             closure + area ok
//!   Idle ─────────────▶ Tracking ──────────────────▶ Closed
//!    ▲                     │  ▲                         │
//!    │       stop()        │  └── closure retracted     │
//!    └─────────────────────┴────────────────────────────┘
//! ```
//!
//! Fixes must be ingested in arrival order from a single consumer: path
//! mutation and closure are not commutative. The tracker has no network or
//! storage dependency; everything it does is observable through the
//! [`TrackerEvent`]s it emits to subscribers and the [`Territory`] returned
//! from [`PathTracker::ingest`].

use std::sync::mpsc::{self, Receiver, Sender};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::area::{is_self_intersecting, AreaCalculator, AreaConfig};
use crate::closure::{ClosureCheck, ClosureConfig, ClosureDetector};
use crate::error::{LoopClaimError, OptionExt, Result};
use crate::geo_utils::{haversine_distance, ring_perimeter};
use crate::{Bounds, Coordinate, Fix, PlayerId, Territory};

/// Configuration for the path tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub closure: ClosureConfig,
    pub area: AreaConfig,

    /// Fixes reporting a worse horizontal accuracy are dropped.
    /// Default: Some(50.0) meters
    pub max_horizontal_accuracy_meters: Option<f64>,

    /// Implied speed between timestamped fixes above which a
    /// `SpeedWarning` is emitted (the fix is kept).
    /// Default: Some(4.17) m/s (15 km/h)
    pub warn_speed_mps: Option<f64>,

    /// Implied speed between timestamped fixes above which the fix is
    /// dropped. Claiming is done on foot.
    /// Default: Some(8.33) m/s (30 km/h)
    pub max_speed_mps: Option<f64>,

    /// Fixes closer than this to the last recorded point are skipped.
    /// 0 disables the filter.
    /// Default: 0.0 meters
    pub min_point_spacing_meters: f64,

    /// Closed loops enclosing less than this are retracted.
    /// Default: 100.0 square meters
    pub min_territory_area_square_meters: f64,

    /// Retract closures whose ring crosses itself.
    /// Default: false
    pub reject_self_intersecting: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            closure: ClosureConfig::default(),
            area: AreaConfig::default(),
            max_horizontal_accuracy_meters: Some(50.0),
            warn_speed_mps: Some(15.0 / 3.6),
            max_speed_mps: Some(30.0 / 3.6),
            min_point_spacing_meters: 0.0,
            min_territory_area_square_meters: 100.0,
            reject_self_intersecting: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingState {
    Idle,
    Tracking,
    Closed,
}

/// Why a fix did not make it into the path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixRejection {
    InvalidCoordinate,
    LowAccuracy { accuracy_meters: f64 },
    Overspeed { speed_mps: f64 },
    TooClose { distance_meters: f64 },
}

/// Events emitted by [`PathTracker`].
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Started,
    PathUpdated {
        point_count: usize,
        path_length_meters: f64,
        latest: Coordinate,
    },
    FixRejected {
        coordinate: Coordinate,
        reason: FixRejection,
    },
    SpeedWarning {
        speed_mps: f64,
    },
    /// A closure fired but the loop could not be claimed; tracking continues.
    ClosureRetracted {
        reason: String,
    },
    TerritoryClosed(Territory),
    Stopped {
        discarded_points: usize,
    },
}

/// The stateful core: ingests fixes, detects closure, emits territories.
pub struct PathTracker {
    owner: PlayerId,
    config: TrackerConfig,
    detector: ClosureDetector,
    calculator: AreaCalculator,

    state: TrackingState,
    path: Vec<Coordinate>,
    path_length_meters: f64,
    last_fix_time: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,

    subscribers: Vec<Sender<TrackerEvent>>,
}

impl PathTracker {
    pub fn new(owner: PlayerId, config: TrackerConfig) -> Self {
        Self {
            owner,
            detector: ClosureDetector::new(config.closure.clone()),
            calculator: AreaCalculator::new(config.area.clone()),
            config,
            state: TrackingState::Idle,
            path: Vec::new(),
            path_length_meters: 0.0,
            last_fix_time: None,
            started_at: None,
            subscribers: Vec::new(),
        }
    }

    pub fn owner(&self) -> PlayerId {
        self.owner
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    /// The recorded path (WGS-84, arrival order).
    pub fn path(&self) -> &[Coordinate] {
        &self.path
    }

    pub fn path_length_meters(&self) -> f64 {
        self.path_length_meters
    }

    /// Register an observer. Events are delivered in emission order; a
    /// dropped receiver is pruned on the next emission.
    pub fn subscribe(&mut self) -> Receiver<TrackerEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Begin a new walk with an empty path.
    ///
    /// Fails with [`LoopClaimError::AlreadyTracking`] while a walk is in
    /// progress. Starting from `Closed` discards the claimed ring.
    pub fn start(&mut self) -> Result<()> {
        if self.state == TrackingState::Tracking {
            debug!("[PathTracker] start ignored: already tracking");
            return Err(LoopClaimError::AlreadyTracking);
        }
        self.reset_path();
        self.started_at = Some(Utc::now());
        self.state = TrackingState::Tracking;
        info!("[PathTracker] Tracking started for {}", self.owner);
        self.emit(TrackerEvent::Started);
        Ok(())
    }

    /// Stop tracking and discard the path. Idempotent when idle.
    pub fn stop(&mut self) {
        if self.state == TrackingState::Idle {
            return;
        }
        let discarded_points = self.path.len();
        self.emit(TrackerEvent::Stopped { discarded_points });
        self.reset_path();
        self.started_at = None;
        self.state = TrackingState::Idle;
        info!("[PathTracker] Tracking stopped, discarded {} points", discarded_points);
    }

    /// Append a fix and check for closure.
    ///
    /// Returns `Ok(Some(territory))` when this fix closed the loop. Filtered
    /// fixes return `Ok(None)`; an out-of-range coordinate returns
    /// [`LoopClaimError::InvalidCoordinate`] and leaves the state untouched.
    pub fn ingest(&mut self, fix: impl Into<Fix>) -> Result<Option<Territory>> {
        let fix = fix.into();
        if self.state != TrackingState::Tracking {
            return Err(LoopClaimError::NotTracking);
        }

        let coordinate = fix.coordinate;
        if let Err(e) = coordinate.validate() {
            warn!("[PathTracker] Dropping fix: {}", e);
            self.reject(coordinate, FixRejection::InvalidCoordinate);
            return Err(e);
        }

        if let (Some(max), Some(accuracy)) = (
            self.config.max_horizontal_accuracy_meters,
            fix.horizontal_accuracy,
        ) {
            if accuracy > max {
                debug!("[PathTracker] Dropping fix with accuracy {:.0}m", accuracy);
                self.reject(
                    coordinate,
                    FixRejection::LowAccuracy {
                        accuracy_meters: accuracy,
                    },
                );
                return Ok(None);
            }
        }

        let step = self
            .path
            .last()
            .map(|last| haversine_distance(last, &coordinate))
            .unwrap_or(0.0);

        if let Some(speed_mps) = self.implied_speed(step, fix.timestamp) {
            if self.config.max_speed_mps.is_some_and(|max| speed_mps > max) {
                warn!("[PathTracker] Dropping fix at {:.1} m/s", speed_mps);
                self.reject(coordinate, FixRejection::Overspeed { speed_mps });
                return Ok(None);
            }
            if self.config.warn_speed_mps.is_some_and(|warn| speed_mps > warn) {
                self.emit(TrackerEvent::SpeedWarning { speed_mps });
            }
        }

        if !self.path.is_empty() && step < self.config.min_point_spacing_meters {
            self.reject(
                coordinate,
                FixRejection::TooClose {
                    distance_meters: step,
                },
            );
            return Ok(None);
        }

        self.path.push(coordinate);
        self.path_length_meters += step;
        if fix.timestamp.is_some() {
            self.last_fix_time = fix.timestamp;
        }
        self.emit(TrackerEvent::PathUpdated {
            point_count: self.path.len(),
            path_length_meters: self.path_length_meters,
            latest: coordinate,
        });

        let check =
            self.detector
                .evaluate_with_length(&self.path, &coordinate, self.path_length_meters);
        let ClosureCheck::Closed { distance_meters } = check else {
            return Ok(None);
        };
        debug!(
            "[PathTracker] Closure candidate: {} points, {:.1}m from start",
            self.path.len(),
            distance_meters
        );

        match self.claim(fix.timestamp) {
            Ok(territory) => {
                self.state = TrackingState::Closed;
                info!(
                    "[PathTracker] Territory closed: {} points, {:.0} m²",
                    territory.point_count(),
                    territory.area_square_meters
                );
                self.emit(TrackerEvent::TerritoryClosed(territory.clone()));
                Ok(Some(territory))
            }
            Err(e) => {
                warn!("[PathTracker] Closure retracted: {}", e);
                self.emit(TrackerEvent::ClosureRetracted {
                    reason: e.to_string(),
                });
                Ok(None)
            }
        }
    }

    /// Validate the closed ring and build the territory value.
    fn claim(&self, completed_at: Option<DateTime<Utc>>) -> Result<Territory> {
        let area = self.calculator.area(&self.path)?;
        if area < self.config.min_territory_area_square_meters {
            return Err(LoopClaimError::degenerate(format!(
                "area {:.0} m² below minimum claim of {:.0} m²",
                area, self.config.min_territory_area_square_meters
            )));
        }
        if self.config.reject_self_intersecting && is_self_intersecting(&self.path) {
            return Err(LoopClaimError::degenerate("ring crosses itself"));
        }

        let now = Utc::now();
        Ok(Territory {
            id: Uuid::new_v4(),
            owner: self.owner,
            path: self.path.clone(),
            area_square_meters: area,
            perimeter_meters: ring_perimeter(&self.path),
            bounds: Bounds::from_points(&self.path).ok_or_degenerate("empty path")?,
            started_at: self.started_at.unwrap_or(now),
            completed_at: completed_at.unwrap_or(now),
        })
    }

    fn implied_speed(&self, step_meters: f64, timestamp: Option<DateTime<Utc>>) -> Option<f64> {
        let (previous, current) = (self.last_fix_time?, timestamp?);
        let seconds = (current - previous).num_milliseconds() as f64 / 1000.0;
        (seconds > 0.0).then(|| step_meters / seconds)
    }

    fn reject(&mut self, coordinate: Coordinate, reason: FixRejection) {
        self.emit(TrackerEvent::FixRejected { coordinate, reason });
    }

    fn reset_path(&mut self) {
        self.path.clear();
        self.path_length_meters = 0.0;
        self.last_fix_time = None;
    }

    fn emit(&mut self, event: TrackerEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl std::fmt::Debug for PathTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathTracker")
            .field("owner", &self.owner)
            .field("state", &self.state)
            .field("points", &self.path.len())
            .field("path_length_meters", &self.path_length_meters)
            .finish()
    }
}
