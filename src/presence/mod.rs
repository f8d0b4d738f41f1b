//! # Presence
//!
//! Position reporting and nearby-player density, decoupled from path
//! tracking.
//!
//! ## Architecture
//!
//! - `PresenceBackend` - the two RPC contracts (position upsert, nearby count)
//! - `TerritoryStore` - hand-off of finalized territories
//! - `AuthSession` - explicit identity holder checked before every RPC
//! - `LocationReporter` - cancellable periodic and movement-triggered reports
//! - `DensityService` - nearby count → density tier → POI recommendation
//! - `InMemoryBackend` - local backend with an R-tree presence index
//! - `SupabaseBackend` - PostgREST transport (feature `http`)

pub mod density;
pub mod index;
pub mod memory;
pub mod reporter;

#[cfg(feature = "http")]
pub mod http;

pub use density::{
    DensityConfig, DensityService, DensityTier, MAX_MONITORED_POIS, NearbyDensity,
    suggested_poi_count,
};
pub use index::{PresenceEntry, PresenceIndex};
pub use memory::{DEFAULT_HISTORY_LIMIT, InMemoryBackend};
pub use reporter::{LocationReporter, ReportOutcome, ReporterConfig, ReporterEvent};

#[cfg(feature = "http")]
pub use http::SupabaseBackend;

use std::future::Future;
use std::sync::RwLock;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result};
use crate::{Coordinate, PlayerId, PlayerLocationRecord, Territory};

/// Default radius for nearby-player queries.
pub const DEFAULT_NEARBY_RADIUS_METERS: f64 = 1000.0;

/// Input of the `count_nearby_players` RPC.
///
/// The caller is excluded by `player_id`, never by coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NearbyQuery {
    pub player_id: PlayerId,
    pub center: Coordinate,
    pub radius_meters: f64,
}

/// The backend RPCs the presence layer depends on.
pub trait PresenceBackend: Send + Sync + 'static {
    /// Upsert the player's latest position (latest write wins per player).
    fn upsert_location(
        &self,
        record: PlayerLocationRecord,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Count other players with a fresh online report inside the radius.
    fn count_nearby_players(&self, query: NearbyQuery) -> impl Future<Output = Result<u32>> + Send;
}

/// Persistence for finalized territories.
pub trait TerritoryStore: Send + Sync + 'static {
    fn save_territory(&self, territory: Territory) -> impl Future<Output = Result<()>> + Send;
}

/// The signed-in identity, shared by every network-facing service.
#[derive(Debug, Default)]
pub struct AuthSession {
    player: RwLock<Option<PlayerId>>,
}

impl AuthSession {
    /// A session with nobody signed in.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(player_id: PlayerId) -> Self {
        Self {
            player: RwLock::new(Some(player_id)),
        }
    }

    pub fn sign_in(&self, player_id: PlayerId) {
        *self.player.write().unwrap_or_else(|e| e.into_inner()) = Some(player_id);
        info!("[AuthSession] Signed in as {}", player_id);
    }

    pub fn sign_out(&self) {
        *self.player.write().unwrap_or_else(|e| e.into_inner()) = None;
        info!("[AuthSession] Signed out");
    }

    /// The current player, or [`LoopClaimError::NotAuthenticated`](crate::LoopClaimError::NotAuthenticated).
    pub fn player_id(&self) -> Result<PlayerId> {
        let guard = self.player.read().unwrap_or_else(|e| e.into_inner());
        (*guard).ok_or_not_authenticated()
    }

    pub fn is_signed_in(&self) -> bool {
        self.player_id().is_ok()
    }
}
