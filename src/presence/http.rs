//! PostgREST (Supabase) transport for the presence RPCs and territory storage.
//!
//! - position upsert: `POST /rest/v1/player_locations?on_conflict=user_id`
//! - nearby count: `POST /rest/v1/rpc/count_nearby_players`
//! - territory hand-off: `POST /rest/v1/territories`
//!
//! The server excludes the caller from nearby counts using the identity in
//! the bearer token.

use std::sync::RwLock;
use std::time::Duration;

use log::debug;
use serde::Serialize;

use super::{NearbyQuery, PresenceBackend, TerritoryStore};
use crate::error::{LoopClaimError, OptionExt, Result};
use crate::{PlayerLocationRecord, Territory};

const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Serialize)]
struct LocationRow {
    user_id: String,
    latitude: f64,
    longitude: f64,
    last_updated: String,
    is_online: bool,
}

#[derive(Serialize)]
struct NearbyParams {
    p_latitude: f64,
    p_longitude: f64,
    p_radius_meters: f64,
}

#[derive(Serialize)]
struct TerritoryRow {
    id: String,
    user_id: String,
    path: serde_json::Value,
    area: f64,
    point_count: usize,
    started_at: String,
    completed_at: String,
    is_active: bool,
}

/// Presence backend and territory store over PostgREST.
pub struct SupabaseBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: RwLock<Option<String>>,
}

impl SupabaseBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LoopClaimError::network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: RwLock::new(None),
        })
    }

    /// Set (or clear) the signed-in user's JWT.
    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    fn bearer(&self) -> Result<String> {
        self.access_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_not_authenticated()
    }

    async fn post<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        prefer: Option<&str>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer()?)
            .json(body);
        if let Some(prefer) = prefer {
            request = request.header("Prefer", prefer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LoopClaimError::network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LoopClaimError::network(format!("{} {}: {}", status, path, body)));
        }
        debug!("[SupabaseBackend] POST {} ok", path);
        Ok(response)
    }
}

impl PresenceBackend for SupabaseBackend {
    async fn upsert_location(&self, record: PlayerLocationRecord) -> Result<()> {
        let row = LocationRow {
            user_id: record.player_id.to_string(),
            latitude: record.coordinate.latitude,
            longitude: record.coordinate.longitude,
            last_updated: record.reported_at.to_rfc3339(),
            is_online: record.is_online,
        };
        self.post(
            "/rest/v1/player_locations?on_conflict=user_id",
            &row,
            Some("resolution=merge-duplicates,return=minimal"),
        )
        .await?;
        Ok(())
    }

    async fn count_nearby_players(&self, query: NearbyQuery) -> Result<u32> {
        let params = NearbyParams {
            p_latitude: query.center.latitude,
            p_longitude: query.center.longitude,
            p_radius_meters: query.radius_meters,
        };
        let response = self
            .post("/rest/v1/rpc/count_nearby_players", &params, None)
            .await?;
        let count: i64 = response
            .json()
            .await
            .map_err(|e| LoopClaimError::network(format!("bad count response: {}", e)))?;
        Ok(count.clamp(0, u32::MAX as i64) as u32)
    }
}

impl TerritoryStore for SupabaseBackend {
    async fn save_territory(&self, territory: Territory) -> Result<()> {
        let row = TerritoryRow {
            id: territory.id.to_string(),
            user_id: territory.owner.to_string(),
            path: territory.path_json(),
            area: territory.area_square_meters,
            point_count: territory.point_count(),
            started_at: territory.started_at.to_rfc3339(),
            completed_at: territory.completed_at.to_rfc3339(),
            is_active: true,
        };
        self.post("/rest/v1/territories", &row, Some("return=minimal"))
            .await?;
        Ok(())
    }
}
