#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::{tungstenite, MaybeTlsStream, WebSocketStream};

use relay_api::config::{Config, Environment};
use relay_api::AppState;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Config used by every test: no env vars involved.
pub fn test_config() -> Config {
    Config {
        port: 0,
        environment: Environment::Test,
        outbound_buffer: 64,
        broadcast_token: None,
        worker_id: 1,
    }
}

pub fn test_state_with(config: Config) -> AppState {
    AppState::new(config)
}

/// Build the full application router wired to a fresh state.
pub fn test_app_with(config: Config) -> (Router, AppState) {
    let state = test_state_with(config);
    let app = relay_api::routes::router().with_state(state.clone());
    (app, state)
}

pub fn test_app() -> (Router, AppState) {
    test_app_with(test_config())
}

/// Start an actual TCP server for WebSocket testing. Runs in the background.
pub async fn start_ws_server() -> (SocketAddr, AppState) {
    let (app, state) = test_app();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Open a relay connection and consume the `connected` greeting.
/// Returns the stream and the assigned client id.
pub async fn connect(addr: SocketAddr) -> (WsStream, String) {
    let url = format!("ws://{addr}/ws");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");

    let greeting = next_event(&mut ws).await;
    assert_eq!(greeting["type"], "connected");
    let client_id = greeting["data"]["clientId"]
        .as_str()
        .expect("clientId present")
        .to_string();
    (ws, client_id)
}

pub async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(tungstenite::Message::Text(value.to_string().into()))
        .await
        .expect("ws send");
}

/// Join a room and wait for the acknowledgment.
pub async fn join_room(ws: &mut WsStream, room: &str, location: &str) {
    send_json(
        ws,
        serde_json::json!({ "type": "join_room", "data": { "room": room, "location": location } }),
    )
    .await;
    let ack = next_event(ws).await;
    assert_eq!(ack["type"], "room_joined");
    assert_eq!(ack["data"]["location"], location);
}

/// Next text frame as JSON, failing after five seconds.
pub async fn next_event(ws: &mut WsStream) -> Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for event")
            .expect("stream ended")
            .expect("ws read error");
        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("event is JSON")
            }
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Assert nothing arrives within `window`.
pub async fn expect_silence(ws: &mut WsStream, window: Duration) {
    if let Ok(Some(Ok(msg))) = time::timeout(window, ws.next()).await {
        panic!("expected no event, got {msg:?}");
    }
}

/// Poll until `check` holds, failing after five seconds.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    let deadline = time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(time::Instant::now() < deadline, "condition not met in time");
        time::sleep(Duration::from_millis(10)).await;
    }
}
