//! The client against a real relay server on an ephemeral port.

use std::net::SocketAddr;
use std::time::Duration;

use hyperlocal_common::protocol::{PostPayload, RoomPayload};
use hyperlocal_common::{ClientMessage, Location, ServerEvent};
use hyperlocal_relay_client::{ClientConfig, ConnectionState, ReconnectPolicy, RelayClient};
use relay_api::config::{Config, Environment};
use relay_api::AppState;
use tokio::sync::mpsc;

async fn start_relay() -> SocketAddr {
    let state = AppState::new(Config {
        port: 0,
        environment: Environment::Test,
        outbound_buffer: 64,
        broadcast_token: None,
        worker_id: 2,
    });
    let app = relay_api::routes::router().with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn next_event(events: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

async fn wait_for_state(client: &RelayClient, want: ConnectionState) {
    let mut rx = client.watch_state();
    tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|s| *s == want))
        .await
        .unwrap_or_else(|_| panic!("never reached {want}"))
        .expect("driver alive");
}

#[tokio::test]
async fn queued_join_then_live_post() {
    let addr = start_relay().await;
    let url = format!("ws://{addr}/ws");
    let location = Location::place("Seattle", "Capitol Hill");

    let (reader, mut reader_events) = RelayClient::spawn(
        hyperlocal_relay_client::WsConnector::new(url.clone()),
        ClientConfig::default(),
    );
    // Queued: the socket is not open yet.
    reader
        .send(ClientMessage::JoinRoom(RoomPayload {
            room: "posts".into(),
            location: location.clone(),
        }))
        .unwrap();
    reader.connect().unwrap();

    let connected = next_event(&mut reader_events).await;
    assert_eq!(connected.event, "connected");
    assert!(connected.data["clientId"].as_str().unwrap().starts_with("conn_"));

    let joined = next_event(&mut reader_events).await;
    assert_eq!(joined.event, "room_joined");
    assert_eq!(joined.data["location"], "Seattle/Capitol Hill");

    let (writer, mut writer_events) = RelayClient::connect_ws(url, ClientConfig::default());
    assert_eq!(next_event(&mut writer_events).await.event, "connected");

    let mut fields = serde_json::Map::new();
    fields.insert("content".into(), "hi".into());
    writer
        .send(ClientMessage::CreatePost(PostPayload { location, fields }))
        .unwrap();

    let post = next_event(&mut reader_events).await;
    assert_eq!(post.event, "post_created");
    assert_eq!(post.data["content"], "hi");

    writer.shutdown().await;
    reader.shutdown().await;
}

#[tokio::test]
async fn unreachable_relay_falls_back() {
    // Grab a free port and release it so nothing is listening.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let policy = ReconnectPolicy::default()
        .with_connect_timeout(Duration::from_secs(1))
        .with_fallback_delay(Duration::from_millis(50));
    let (client, _events) =
        RelayClient::connect_ws(format!("ws://{addr}/ws"), ClientConfig::default().with_policy(policy));

    wait_for_state(&client, ConnectionState::Fallback).await;
    assert!(client.is_fallback());
}
