use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::gateway::GatewayStats;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub started_at: DateTime<Utc>,
    /// Omitted in production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<GatewayStats>,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Relay is up", body = HealthResponse),
    ),
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state
        .config
        .environment
        .exposes_stats()
        .then(|| state.gateway.stats());

    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Relay server is running".to_string(),
        started_at: state.started_at,
        stats,
    })
}
