mod common;

use std::time::Duration;

use futures_util::SinkExt;
use hyperlocal_common::{ConnectionId, RoomKey};
use serde_json::json;
use tokio_tungstenite::tungstenite;

use common::{connect, expect_silence, join_room, next_event, send_json, start_ws_server, wait_until};

const QUIET: Duration = Duration::from_millis(300);

#[tokio::test]
async fn connect_sends_client_id() {
    let (addr, state) = start_ws_server().await;
    let (_ws, client_id) = connect(addr).await;

    assert!(client_id.starts_with("conn_"));
    let id: ConnectionId = client_id.parse().expect("client id parses");
    assert!(state.gateway.is_connected(id));
}

#[tokio::test]
async fn client_ids_are_unique() {
    let (addr, _state) = start_ws_server().await;
    let (_a, id_a) = connect(addr).await;
    let (_b, id_b) = connect(addr).await;
    assert_ne!(id_a, id_b);
}

#[tokio::test]
async fn create_post_reaches_neighborhood_room_only() {
    let (addr, _state) = start_ws_server().await;
    let (mut a, _) = connect(addr).await;
    let (mut b, _) = connect(addr).await;
    let (mut c, _) = connect(addr).await;

    join_room(&mut a, "posts", "Seattle/Capitol Hill").await;
    join_room(&mut c, "posts", "Seattle/Ballard").await;

    send_json(
        &mut b,
        json!({
            "type": "create_post",
            "data": {
                "location": { "city": "Seattle", "neighborhood": "Capitol Hill" },
                "content": "hi"
            }
        }),
    )
    .await;

    let event = next_event(&mut a).await;
    assert_eq!(event["type"], "post_created");
    assert_eq!(event["data"]["content"], "hi");

    expect_silence(&mut a, QUIET).await;
    expect_silence(&mut c, QUIET).await;
    expect_silence(&mut b, QUIET).await;
}

#[tokio::test]
async fn like_and_comment_are_relayed_in_order() {
    let (addr, _state) = start_ws_server().await;
    let (mut viewer, _) = connect(addr).await;
    let (mut actor, _) = connect(addr).await;

    send_json(
        &mut viewer,
        json!({ "type": "subscribe_posts", "data": { "location": "Portland/Pearl" } }),
    )
    .await;
    assert_eq!(next_event(&mut viewer).await["type"], "room_joined");

    let location = json!({ "city": "Portland", "neighborhood": "Pearl" });
    send_json(
        &mut actor,
        json!({ "type": "like_post", "data": { "postId": "p1", "location": location } }),
    )
    .await;
    send_json(
        &mut actor,
        json!({
            "type": "add_comment",
            "data": { "postId": "p1", "comment": { "text": "nice" }, "location": location }
        }),
    )
    .await;

    let liked = next_event(&mut viewer).await;
    assert_eq!(liked["type"], "post_liked");
    assert_eq!(liked["data"]["postId"], "p1");

    let commented = next_event(&mut viewer).await;
    assert_eq!(commented["type"], "comment_added");
    assert_eq!(commented["data"]["comment"]["text"], "nice");
}

#[tokio::test]
async fn disconnect_removes_connection_and_prunes_rooms() {
    let (addr, state) = start_ws_server().await;
    let (mut a, a_id) = connect(addr).await;
    let (mut b, _) = connect(addr).await;
    join_room(&mut a, "posts", "loc1").await;

    let key = RoomKey::new("posts", "loc1");
    assert!(state.gateway.has_room(&key));

    a.close(None).await.expect("close");
    let a_id: ConnectionId = a_id.parse().unwrap();
    wait_until(|| !state.gateway.is_connected(a_id)).await;

    assert!(!state.gateway.has_room(&key));
    assert!(state.gateway.rooms_of(a_id).is_none());

    // Broadcasting into the vanished room is a quiet no-op.
    send_json(
        &mut b,
        json!({ "type": "create_post", "data": { "location": "loc1", "content": "anyone?" } }),
    )
    .await;
    expect_silence(&mut b, QUIET).await;
    assert!(!state.gateway.has_room(&key));
    assert_eq!(state.gateway.stats().total_clients, 1);
}

#[tokio::test]
async fn dropped_transport_is_cleaned_up() {
    let (addr, state) = start_ws_server().await;
    let (mut a, a_id) = connect(addr).await;
    join_room(&mut a, "city", "Tacoma").await;

    // No close handshake: just drop the socket.
    drop(a);
    let a_id: ConnectionId = a_id.parse().unwrap();
    wait_until(|| !state.gateway.is_connected(a_id)).await;
    assert!(!state.gateway.has_room(&RoomKey::new("city", "Tacoma")));
}

#[tokio::test]
async fn reconnect_starts_with_no_rooms() {
    let (addr, state) = start_ws_server().await;
    let (mut first, first_id) = connect(addr).await;
    join_room(&mut first, "posts", "Seattle").await;
    first.close(None).await.expect("close");
    let first_id: ConnectionId = first_id.parse().unwrap();
    wait_until(|| !state.gateway.is_connected(first_id)).await;

    let (mut second, second_id) = connect(addr).await;
    let second_id: ConnectionId = second_id.parse().unwrap();
    assert_eq!(state.gateway.rooms_of(second_id), Some(vec![]));

    let (mut poster, _) = connect(addr).await;
    send_json(
        &mut poster,
        json!({ "type": "create_post", "data": { "location": "Seattle", "content": "x" } }),
    )
    .await;
    expect_silence(&mut second, QUIET).await;
}

#[tokio::test]
async fn malformed_frames_do_not_close_the_connection() {
    let (addr, _state) = start_ws_server().await;
    let (mut ws, _) = connect(addr).await;

    ws.send(tungstenite::Message::Text("{not json".into()))
        .await
        .unwrap();
    send_json(&mut ws, json!({ "data": {} })).await;
    send_json(&mut ws, json!({ "type": "explode", "data": {} })).await;
    send_json(&mut ws, json!({ "type": "join_room", "data": { "room": "posts" } })).await;
    ws.send(tungstenite::Message::Binary(vec![1u8, 2, 3].into()))
        .await
        .unwrap();

    // Still alive and still routing.
    join_room(&mut ws, "posts", "Spokane").await;
}

#[tokio::test]
async fn notification_subscription_receives_server_pushes() {
    let (addr, _state) = start_ws_server().await;
    let (mut ws, _) = connect(addr).await;
    let (mut other, _) = connect(addr).await;

    send_json(&mut ws, json!({ "type": "subscribe_notifications", "data": {} })).await;
    let ack = next_event(&mut ws).await;
    assert_eq!(ack["type"], "room_joined");
    assert_eq!(ack["data"]["room"], "notifications");
    assert_eq!(ack["data"]["location"], "global");

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/api/v1/broadcast"))
        .json(&json!({
            "type": "notification",
            "data": { "message": "new post nearby" },
            "room": { "kind": "notifications", "scope": "global" }
        }))
        .send()
        .await
        .expect("broadcast request");
    assert!(resp.status().is_success());
    let delivery: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(delivery["delivered"], 1);

    let event = next_event(&mut ws).await;
    assert_eq!(event["type"], "notification");
    assert_eq!(event["data"]["message"], "new post nearby");
    expect_silence(&mut other, QUIET).await;
}

#[tokio::test]
async fn stats_endpoint_tracks_live_rooms() {
    let (addr, _state) = start_ws_server().await;
    let (mut a, _) = connect(addr).await;
    let (mut b, _) = connect(addr).await;
    join_room(&mut a, "posts", "Seattle/Capitol Hill").await;
    join_room(&mut b, "posts", "Seattle/Capitol Hill").await;

    let stats: serde_json::Value = reqwest::get(format!("http://{addr}/stats"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["totalClients"], 2);
    assert_eq!(stats["totalRooms"], 1);
    assert_eq!(stats["rooms"][0]["room"], "posts:Seattle/Capitol Hill");
    assert_eq!(stats["rooms"][0]["clientCount"], 2);

    let room: serde_json::Value = reqwest::get(format!(
        "http://{addr}/stats/rooms/posts/Seattle/Capitol%20Hill"
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(room["clientCount"], 2);
}
