pub mod broadcast;
pub mod health;
pub mod stats;

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(stats::router())
        .merge(crate::gateway::server::router())
        .route("/openapi.json", get(openapi))
        .nest("/api/v1", broadcast::router())
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        stats::stats,
        stats::room_stats,
        broadcast::broadcast,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            crate::gateway::GatewayStats,
            crate::gateway::RoomStats,
            crate::gateway::fanout::Delivery,
            health::HealthResponse,
            broadcast::BroadcastRequest,
            broadcast::BroadcastRoom,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Stats", description = "Relay diagnostics"),
        (name = "Broadcast", description = "Server-originated pushes"),
    )
)]
pub struct ApiDoc;
