//! Server-originated pushes from the REST API.

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::routing::post;
use axum::{Json, Router};
use hyperlocal_common::RoomKey;
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::gateway::fanout::Delivery;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/broadcast", post(broadcast))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BroadcastRequest {
    /// Event name pushed to clients, e.g. `notification`.
    #[serde(rename = "type")]
    pub event: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Value,
    /// Target room; every connection when omitted.
    #[serde(default)]
    pub room: Option<BroadcastRoom>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BroadcastRoom {
    pub kind: String,
    pub scope: String,
}

impl BroadcastRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        if self.event.trim().is_empty() {
            errors.push(FieldError::new("type", "must not be empty"));
        }
        if let Some(room) = &self.room {
            if room.kind.is_empty() {
                errors.push(FieldError::new("room.kind", "must not be empty"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(errors))
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/v1/broadcast
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/broadcast",
    tag = "Broadcast",
    security(("bearer" = [])),
    request_body = BroadcastRequest,
    responses(
        (status = 200, description = "Event fanned out", body = Delivery),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 401, description = "Missing or wrong broadcast token", body = ApiErrorBody),
    ),
)]
pub async fn broadcast(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BroadcastRequest>,
) -> Result<Json<Delivery>, ApiError> {
    authorize(&state, &headers)?;
    body.validate()?;

    let delivery = match body.room {
        Some(room) => {
            let key = RoomKey::new(room.kind, room.scope);
            state.gateway.to_room(&key, &body.event, body.data)
        }
        None => state.gateway.to_all(&body.event, body.data),
    };
    Ok(Json(delivery))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.config.broadcast_token.as_deref() else {
        return Ok(());
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match presented {
        Some(token) if token == expected => Ok(()),
        _ => Err(ApiError::unauthorized("Invalid broadcast token")),
    }
}
