//! WebSocket upgrade handler and per-connection read/write loops.

use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use hyperlocal_common::ConnectionId;
use tokio::sync::mpsc;

use crate::AppState;

use super::lifecycle::CloseReason;
use super::router::handle_text;
use super::Gateway;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let gateway = state.gateway.clone();
    ws.on_upgrade(move |socket| handle_connection(socket, gateway))
}

async fn handle_connection(socket: WebSocket, gateway: Arc<Gateway>) {
    let (ws_tx, mut ws_rx) = socket.split();

    // `connected` is already buffered by the time the writer starts.
    let (connection_id, outbound) = gateway.register();
    tracing::info!(%connection_id, "connection opened");

    // Unregistering drops the only sender, so the writer flushes what is
    // left and exits by itself.
    tokio::spawn(write_loop(connection_id, ws_tx, outbound));

    let reason = read_loop(&gateway, connection_id, &mut ws_rx).await;
    gateway.disconnect(connection_id, reason);
}

/// Read client frames until the transport closes or fails.
async fn read_loop(
    gateway: &Gateway,
    connection_id: ConnectionId,
    ws_rx: &mut SplitStream<WebSocket>,
) -> CloseReason {
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => handle_text(gateway, connection_id, text.as_str()),
            Ok(Message::Binary(_)) => {
                tracing::debug!(%connection_id, "dropping binary frame");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => return CloseReason::Closed,
            Err(e) => {
                tracing::debug!(?e, %connection_id, "ws read error");
                return CloseReason::Error;
            }
        }
    }
    CloseReason::Closed
}

/// Drain the connection's outbound buffer into the socket. Exits when the
/// buffer is closed (connection unregistered) or a write fails; after that
/// the buffer reports closed and broadcasts skip this connection.
async fn write_loop(
    connection_id: ConnectionId,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Utf8Bytes>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = ws_tx.send(Message::Text(frame)).await {
            tracing::debug!(?e, %connection_id, "ws write error");
            break;
        }
    }
    outbound.close();
}
