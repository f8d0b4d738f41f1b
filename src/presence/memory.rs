//! In-process backend implementing the presence RPCs and territory storage.
//!
//! Mirrors the server semantics: upserts are keyed by player, nearby counts
//! only include online reports inside a freshness window, and the caller is
//! excluded by identity. Used for offline play, the CLI and tests, with
//! failure injection to exercise the error paths.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{Duration, Utc};
use log::debug;

use super::index::PresenceIndex;
use super::{NearbyQuery, PresenceBackend, TerritoryStore};
use crate::error::{LoopClaimError, Result};
use crate::{PlayerId, PlayerLocationRecord, Territory};

/// Reports older than this do not count as nearby.
pub const DEFAULT_ONLINE_WINDOW_SECS: i64 = 5 * 60;

/// Upserts kept for [`InMemoryBackend::history`]; older ones are dropped.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

#[derive(Debug, Default)]
struct MemoryState {
    locations: HashMap<PlayerId, PlayerLocationRecord>,
    index: PresenceIndex,
    history: VecDeque<PlayerLocationRecord>,
    upserts: usize,
    territories: Vec<Territory>,
    failing: bool,
}

/// Presence backend and territory store held in memory.
#[derive(Debug)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
    online_window: Duration,
    history_limit: usize,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::with_online_window(Duration::seconds(DEFAULT_ONLINE_WINDOW_SECS))
    }

    pub fn with_online_window(online_window: Duration) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            online_window,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Keep at most `limit` upserts in [`history`](Self::history).
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Make every subsequent call fail with a network error (or recover).
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Insert a record directly, bypassing failure injection. Lets tests
    /// seed other players and stale reports.
    pub fn seed(&self, record: PlayerLocationRecord) {
        let mut state = self.lock();
        state.locations.insert(record.player_id, record);
        state.index.mark_dirty();
    }

    /// Latest record for a player.
    pub fn location_of(&self, player_id: &PlayerId) -> Option<PlayerLocationRecord> {
        self.lock().locations.get(player_id).cloned()
    }

    /// The most recent accepted upserts, oldest first.
    pub fn history(&self) -> Vec<PlayerLocationRecord> {
        self.lock().history.iter().cloned().collect()
    }

    /// Total accepted upserts, including those aged out of the history.
    pub fn upsert_count(&self) -> usize {
        self.lock().upserts
    }

    pub fn territories(&self) -> Vec<Territory> {
        self.lock().territories.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn count_nearby(&self, query: &NearbyQuery) -> u32 {
        let cutoff = Utc::now() - self.online_window;
        let mut state = self.lock();
        let MemoryState {
            locations, index, ..
        } = &mut *state;

        index.ensure_built(
            locations
                .values()
                .filter(|r| r.is_online && r.reported_at >= cutoff),
        );

        let count = index
            .within_radius(&query.center, query.radius_meters)
            .iter()
            .filter(|e| e.player_id != query.player_id)
            .filter_map(|e| locations.get(&e.player_id))
            .filter(|r| r.is_online && r.reported_at >= cutoff)
            .count();
        count as u32
    }
}

impl PresenceBackend for InMemoryBackend {
    async fn upsert_location(&self, record: PlayerLocationRecord) -> Result<()> {
        let mut state = self.lock();
        if state.failing {
            return Err(LoopClaimError::network("in-memory backend unavailable"));
        }
        debug!(
            "[InMemoryBackend] upsert {} online={}",
            record.player_id, record.is_online
        );
        state.upserts += 1;
        if self.history_limit > 0 {
            if state.history.len() == self.history_limit {
                state.history.pop_front();
            }
            state.history.push_back(record.clone());
        }
        state.locations.insert(record.player_id, record);
        state.index.mark_dirty();
        Ok(())
    }

    async fn count_nearby_players(&self, query: NearbyQuery) -> Result<u32> {
        if self.lock().failing {
            return Err(LoopClaimError::network("in-memory backend unavailable"));
        }
        Ok(self.count_nearby(&query))
    }
}

impl TerritoryStore for InMemoryBackend {
    async fn save_territory(&self, territory: Territory) -> Result<()> {
        let mut state = self.lock();
        if state.failing {
            return Err(LoopClaimError::network("in-memory backend unavailable"));
        }
        state.territories.push(territory);
        Ok(())
    }
}
