//! Read-only relay diagnostics.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use hyperlocal_common::RoomKey;
use serde::Deserialize;

use crate::error::{ApiError, ApiErrorBody};
use crate::gateway::{GatewayStats, RoomStats};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/stats/rooms/{kind}/{*scope}", get(room_stats))
}

#[derive(Debug, Deserialize)]
pub struct RoomPath {
    pub kind: String,
    pub scope: String,
}

// ---------------------------------------------------------------------------
// GET /stats
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/stats",
    tag = "Stats",
    responses(
        (status = 200, description = "Connection and room counts", body = GatewayStats),
    ),
)]
pub async fn stats(State(state): State<AppState>) -> Json<GatewayStats> {
    Json(state.gateway.stats())
}

// ---------------------------------------------------------------------------
// GET /stats/rooms/:kind/*scope
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/stats/rooms/{kind}/{scope}",
    tag = "Stats",
    params(
        ("kind" = String, Path, description = "Room kind, e.g. posts"),
        ("scope" = String, Path, description = "Location scope; may contain '/'"),
    ),
    responses(
        (status = 200, description = "Room membership", body = RoomStats),
        (status = 404, description = "No such room", body = ApiErrorBody),
    ),
)]
pub async fn room_stats(
    State(state): State<AppState>,
    Path(path): Path<RoomPath>,
) -> Result<Json<RoomStats>, ApiError> {
    let key = RoomKey::new(path.kind, path.scope);
    state
        .gateway
        .room_stats(&key)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Room {key} does not exist")))
}
