// REST client for the tournament backend.
//
// Only the endpoints the live-auction controllers consume are modeled:
// tournament detail/update (bid-increment slabs), player categories, player
// listing for the manual-search dialog, and team listing. Everything is
// POST with a JSON body and a `{success, data}` envelope. Failures are
// returned to the call site and converted to local UI state there; nothing
// is retried automatically.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::auction::slabs::BidIncrementSlab;
use crate::protocol::{Envelope, PlayerCard, TeamSummary};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server rejected the request: {0}")]
    Rejected(String),
    #[error("server reported success but sent no data")]
    MissingData,
}

/// Tournament record, reduced to the fields the auction room reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bid_increments: Vec<BidIncrementSlab>,
}

/// Seam between the room controller and the backend REST surface, so
/// settings commits and the search dialog are testable without a server.
#[async_trait]
pub trait TournamentApi: Send + Sync {
    async fn tournament(&self, tournament_id: &str) -> Result<Tournament, ApiError>;
    async fn update_bid_increments(
        &self,
        tournament_id: &str,
        slabs: &[BidIncrementSlab],
    ) -> Result<(), ApiError>;
    async fn player_categories(&self, tournament_id: &str) -> Result<Vec<String>, ApiError>;
    async fn players(&self, tournament_id: &str) -> Result<Vec<PlayerCard>, ApiError>;
    async fn teams(&self, tournament_id: &str) -> Result<Vec<TeamSummary>, ApiError>;
}

/// reqwest-backed implementation against the backend's JSON API.
pub struct RestApi {
    http: reqwest::Client,
    base_url: String,
}

impl RestApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        RestApi {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        debug!("POST {url}");
        let envelope: Envelope<T> = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !envelope.success {
            return Err(ApiError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        envelope.data.ok_or(ApiError::MissingData)
    }

    /// Variant for endpoints whose success response carries no data.
    async fn post_unit(&self, path: &str, body: serde_json::Value) -> Result<(), ApiError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        debug!("POST {url}");
        let envelope: Envelope<serde_json::Value> = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !envelope.success {
            return Err(ApiError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TournamentApi for RestApi {
    async fn tournament(&self, tournament_id: &str) -> Result<Tournament, ApiError> {
        self.post("tournament/detail", json!({ "tournamentId": tournament_id }))
            .await
    }

    async fn update_bid_increments(
        &self,
        tournament_id: &str,
        slabs: &[BidIncrementSlab],
    ) -> Result<(), ApiError> {
        self.post_unit(
            "tournament/update",
            json!({ "tournamentId": tournament_id, "bidIncrements": slabs }),
        )
        .await
    }

    async fn player_categories(&self, tournament_id: &str) -> Result<Vec<String>, ApiError> {
        self.post("player/categories", json!({ "tournamentId": tournament_id }))
            .await
    }

    async fn players(&self, tournament_id: &str) -> Result<Vec<PlayerCard>, ApiError> {
        self.post("player/list", json!({ "tournamentId": tournament_id }))
            .await
    }

    async fn teams(&self, tournament_id: &str) -> Result<Vec<TeamSummary>, ApiError> {
        self.post("team/list", json!({ "tournamentId": tournament_id }))
            .await
    }
}
