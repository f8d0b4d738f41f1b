//! Periodic, throttled position reporting.
//!
//! The reporter is independent of [`PathTracker`](crate::PathTracker): it
//! keeps its own latest and last-reported positions, runs its cadence on a
//! tokio task owned through a [`CancellationToken`] and [`JoinHandle`], and
//! treats every failure as best-effort telemetry (logged, broadcast as an
//! event, never propagated).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{AuthSession, PresenceBackend};
use crate::error::LoopClaimError;
use crate::geo_utils::haversine_distance;
use crate::{Coordinate, PlayerLocationRecord};

/// Configuration for the location reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Seconds between periodic reports.
    /// Default: 30
    pub interval_secs: u64,

    /// `report_if_moved` only reports when the player moved strictly more
    /// than this from the last successful report.
    /// Default: 50.0 meters
    pub min_move_meters: f64,

    /// Buffered events per subscriber before old ones are dropped.
    /// Default: 64
    pub event_capacity: usize,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            min_move_meters: 50.0,
            event_capacity: 64,
        }
    }
}

impl ReporterConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Events broadcast by [`LocationReporter`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReporterEvent {
    ReportSent(PlayerLocationRecord),
    /// `report_if_moved` was throttled.
    ReportSkipped { distance_meters: f64 },
    ReportFailed { error: LoopClaimError },
}

/// Result of a single report attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    Sent(PlayerLocationRecord),
    /// Movement since the last successful report was within the threshold.
    NotMoved { distance_meters: f64 },
    /// No position known yet.
    NoPosition,
    /// Reporting was stopped; only `start_reporting` resumes online reports.
    Stopped,
    Failed(LoopClaimError),
}

impl ReportOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, ReportOutcome::Sent(_))
    }
}

struct Shared<B> {
    backend: Arc<B>,
    session: Arc<AuthSession>,
    config: ReporterConfig,
    latest: Mutex<Option<Coordinate>>,
    last_reported: Mutex<Option<Coordinate>>,
    events: broadcast::Sender<ReporterEvent>,
    /// Set by `stop`, cleared by `start_reporting`. Online reports are
    /// refused while set.
    stopped: AtomicBool,
    /// Held across each upsert so reports reach the backend in order and
    /// the offline marker is always the last write.
    in_flight: AsyncMutex<()>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl<B: PresenceBackend> Shared<B> {
    async fn send(&self, coordinate: Coordinate, is_online: bool) -> ReportOutcome {
        let player_id = match self.session.player_id() {
            Ok(id) => id,
            Err(e) => {
                debug!("[LocationReporter] Skipping report: {}", e);
                return self.failed(e);
            }
        };
        if let Err(e) = coordinate.validate() {
            return self.failed(e);
        }

        let _in_flight = self.in_flight.lock().await;
        if is_online && self.stopped.load(Ordering::SeqCst) {
            debug!("[LocationReporter] Reporting stopped, dropping online report");
            return ReportOutcome::Stopped;
        }

        let record = PlayerLocationRecord {
            player_id,
            coordinate,
            reported_at: Utc::now(),
            is_online,
        };

        match self.backend.upsert_location(record.clone()).await {
            Ok(()) => {
                *lock(&self.last_reported) = is_online.then_some(coordinate);
                debug!(
                    "[LocationReporter] Reported ({:.5}, {:.5}) online={}",
                    coordinate.latitude, coordinate.longitude, is_online
                );
                let _ = self.events.send(ReporterEvent::ReportSent(record.clone()));
                ReportOutcome::Sent(record)
            }
            Err(e) => {
                warn!("[LocationReporter] Report failed: {}", e);
                self.failed(e)
            }
        }
    }

    async fn report_latest(&self) {
        let latest = *lock(&self.latest);
        match latest {
            Some(coordinate) => {
                self.send(coordinate, true).await;
            }
            None => debug!("[LocationReporter] No position yet, skipping tick"),
        }
    }

    fn failed(&self, error: LoopClaimError) -> ReportOutcome {
        let _ = self.events.send(ReporterEvent::ReportFailed {
            error: error.clone(),
        });
        ReportOutcome::Failed(error)
    }
}

struct CadenceTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Sends the player's position to a [`PresenceBackend`].
///
/// Must be used from within a tokio runtime.
pub struct LocationReporter<B: PresenceBackend> {
    shared: Arc<Shared<B>>,
    task: Mutex<Option<CadenceTask>>,
}

impl<B: PresenceBackend> LocationReporter<B> {
    pub fn new(backend: Arc<B>, session: Arc<AuthSession>, config: ReporterConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                backend,
                session,
                config,
                latest: Mutex::new(None),
                last_reported: Mutex::new(None),
                events,
                stopped: AtomicBool::new(false),
                in_flight: AsyncMutex::new(()),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.shared.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReporterEvent> {
        self.shared.events.subscribe()
    }

    /// Record the latest known position for the periodic cadence.
    pub fn update_position(&self, coordinate: Coordinate) -> crate::Result<()> {
        coordinate.validate()?;
        *lock(&self.shared.latest) = Some(coordinate);
        Ok(())
    }

    /// The last coordinate the backend accepted as online.
    pub fn last_reported(&self) -> Option<Coordinate> {
        *lock(&self.shared.last_reported)
    }

    pub fn is_running(&self) -> bool {
        lock(&self.task)
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Report now, then every `interval_secs` until [`stop`](Self::stop).
    ///
    /// A no-op when the cadence is already running.
    pub fn start_reporting(&self) {
        let mut task = lock(&self.task);
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            info!("[LocationReporter] start_reporting ignored: already running");
            return;
        }
        self.shared.stopped.store(false, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let shared = Arc::clone(&self.shared);
        let interval = shared.config.interval();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    // First tick completes immediately
                    _ = ticker.tick() => shared.report_latest().await,
                }
            }
            debug!("[LocationReporter] Cadence stopped");
        });

        info!(
            "[LocationReporter] Reporting every {}s",
            interval.as_secs()
        );
        *task = Some(CadenceTask { cancel, handle });
    }

    /// Report only if the player moved more than `min_move_meters` since the
    /// last successful report (or nothing has been reported yet).
    ///
    /// After [`stop`](Self::stop) the position is still recorded but nothing
    /// is sent until [`start_reporting`](Self::start_reporting).
    pub async fn report_if_moved(&self, current: Coordinate) -> ReportOutcome {
        if let Err(e) = current.validate() {
            return self.shared.failed(e);
        }
        *lock(&self.shared.latest) = Some(current);
        if self.shared.stopped.load(Ordering::SeqCst) {
            return ReportOutcome::Stopped;
        }

        let last = *lock(&self.shared.last_reported);
        if let Some(last) = last {
            let distance_meters = haversine_distance(&last, &current);
            if distance_meters <= self.shared.config.min_move_meters {
                let _ = self
                    .shared
                    .events
                    .send(ReporterEvent::ReportSkipped { distance_meters });
                return ReportOutcome::NotMoved { distance_meters };
            }
        }
        self.shared.send(current, true).await
    }

    /// Report the latest known position immediately.
    pub async fn report_now(&self) -> ReportOutcome {
        let latest = *lock(&self.shared.latest);
        match latest {
            Some(coordinate) => self.shared.send(coordinate, true).await,
            None => ReportOutcome::NoPosition,
        }
    }

    /// Cancel the cadence and mark the player offline.
    ///
    /// Once this returns no online report can fire until the next
    /// [`start_reporting`](Self::start_reporting). A report already in
    /// flight is awaited first, so the offline marker is the last write.
    pub async fn stop(&self) -> ReportOutcome {
        self.shared.stopped.store(true, Ordering::SeqCst);
        let task = lock(&self.task).take();
        if let Some(task) = task {
            task.cancel.cancel();
            task.handle.abort();
            let _ = task.handle.await;
            info!("[LocationReporter] Reporting stopped");
        }

        let known = {
            let latest = *lock(&self.shared.latest);
            latest.or(*lock(&self.shared.last_reported))
        };
        match known {
            Some(coordinate) => self.shared.send(coordinate, false).await,
            None => ReportOutcome::NoPosition,
        }
    }
}

impl<B: PresenceBackend> Drop for LocationReporter<B> {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.task).take() {
            task.cancel.cancel();
            task.handle.abort();
        }
    }
}
