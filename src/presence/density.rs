//! Nearby-player density and point-of-interest recommendations.
//!
//! Density directly affects gameplay balance, so query failures are
//! returned to the caller instead of being defaulted.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{AuthSession, DEFAULT_NEARBY_RADIUS_METERS, NearbyQuery, PresenceBackend};
use crate::error::{LoopClaimError, Result};
use crate::Coordinate;

/// Ceiling on simultaneously monitored points of interest imposed by the
/// mobile platform's region monitoring.
pub const MAX_MONITORED_POIS: u32 = 20;

/// Coarse classification of how many other players are nearby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityTier {
    Solo,
    Low,
    Medium,
    High,
}

impl DensityTier {
    /// 0 → Solo, 1–5 → Low, 6–20 → Medium, more → High.
    pub fn from_count(nearby_count: u32) -> Self {
        match nearby_count {
            0 => DensityTier::Solo,
            1..=5 => DensityTier::Low,
            6..=20 => DensityTier::Medium,
            _ => DensityTier::High,
        }
    }

    /// Recommended number of POIs to surface for this tier.
    pub fn suggested_poi_count(self) -> u32 {
        match self {
            DensityTier::Solo => 1,
            DensityTier::Low => 3,
            DensityTier::Medium => 6,
            DensityTier::High => MAX_MONITORED_POIS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DensityTier::Solo => "solo",
            DensityTier::Low => "low",
            DensityTier::Medium => "medium",
            DensityTier::High => "high",
        }
    }
}

impl fmt::Display for DensityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// POI count for a nearby-player count: 0 → 1, 1–5 → 3, 6–20 → 6, more → 20.
///
/// Computed locally; identical to the backend's `suggest_poi_count`.
pub fn suggested_poi_count(nearby_count: u32) -> u32 {
    DensityTier::from_count(nearby_count)
        .suggested_poi_count()
        .min(MAX_MONITORED_POIS)
}

/// Result of a density query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearbyDensity {
    pub count: u32,
    pub tier: DensityTier,
    pub suggested_poi_count: u32,
}

impl NearbyDensity {
    pub fn from_count(count: u32) -> Self {
        Self {
            count,
            tier: DensityTier::from_count(count),
            suggested_poi_count: suggested_poi_count(count),
        }
    }
}

/// Configuration for density queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    /// Radius used by [`DensityService::query_nearby`].
    /// Default: 1000.0 meters
    pub default_radius_meters: f64,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            default_radius_meters: DEFAULT_NEARBY_RADIUS_METERS,
        }
    }
}

/// Queries how many other players are nearby.
pub struct DensityService<B: PresenceBackend> {
    backend: Arc<B>,
    session: Arc<AuthSession>,
    config: DensityConfig,
}

impl<B: PresenceBackend> DensityService<B> {
    pub fn new(backend: Arc<B>, session: Arc<AuthSession>, config: DensityConfig) -> Self {
        Self {
            backend,
            session,
            config,
        }
    }

    /// Count other players within `radius_meters` of `around` and classify.
    pub async fn query_nearby_count(
        &self,
        around: Coordinate,
        radius_meters: f64,
    ) -> Result<NearbyDensity> {
        let player_id = self.session.player_id()?;
        around.validate()?;
        if !(radius_meters.is_finite() && radius_meters > 0.0) {
            return Err(LoopClaimError::Config {
                message: format!("radius must be positive, got {radius_meters}"),
            });
        }

        let query = NearbyQuery {
            player_id,
            center: around,
            radius_meters,
        };
        let count = self
            .backend
            .count_nearby_players(query)
            .await
            .inspect_err(|e| warn!("[DensityService] Unable to determine nearby density: {}", e))?;

        let density = NearbyDensity::from_count(count);
        debug!(
            "[DensityService] {} players within {:.0}m → {} ({} POIs)",
            count, radius_meters, density.tier, density.suggested_poi_count
        );
        Ok(density)
    }

    /// [`query_nearby_count`](Self::query_nearby_count) with the configured default radius.
    pub async fn query_nearby(&self, around: Coordinate) -> Result<NearbyDensity> {
        self.query_nearby_count(around, self.config.default_radius_meters)
            .await
    }
}
