//! Relay wire format: `{type, data}` JSON objects, one per text frame.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::ConnectionId;
use crate::room::{Location, RoomKey};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Every message a client may send, with its typed payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    CreatePost(PostPayload),
    LikePost(LikePayload),
    AddComment(CommentPayload),
    JoinRoom(RoomPayload),
    LeaveRoom(RoomPayload),
    SubscribePosts(PostsSubscription),
    UnsubscribePosts(PostsSubscription),
    SubscribeNotifications {},
    UnsubscribeNotifications {},
}

/// `create_post`: the location plus whatever post fields the client sends.
/// Relayed verbatim as `post_created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostPayload {
    pub location: Location,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikePayload {
    #[serde(rename = "postId")]
    pub post_id: String,
    pub location: Location,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentPayload {
    #[serde(rename = "postId")]
    pub post_id: String,
    pub comment: Value,
    pub location: Location,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// `join_room` / `leave_room`: `room` is the kind, `location` the scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomPayload {
    pub room: String,
    pub location: Location,
}

impl RoomPayload {
    pub fn key(&self) -> RoomKey {
        RoomKey::new(self.room.clone(), self.location.scope())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostsSubscription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Why an inbound frame was dropped.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is not a JSON message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame has no type")]
    MissingType,
    #[error("unknown message type {0:?}")]
    UnknownType(String),
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: Value,
}

impl ClientMessage {
    /// Decode one text frame. Anything that is not a known, well-formed
    /// message is an error; callers log and drop it.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        let kind = envelope.kind.ok_or(DecodeError::MissingType)?;
        let data = envelope.data;

        match kind.as_str() {
            "create_post" => payload(&kind, data).map(Self::CreatePost),
            "like_post" => payload(&kind, data).map(Self::LikePost),
            "add_comment" => payload(&kind, data).map(Self::AddComment),
            "join_room" => payload(&kind, data).map(Self::JoinRoom),
            "leave_room" => payload(&kind, data).map(Self::LeaveRoom),
            "subscribe_posts" => optional_payload(&kind, data).map(Self::SubscribePosts),
            "unsubscribe_posts" => optional_payload(&kind, data).map(Self::UnsubscribePosts),
            "subscribe_notifications" => Ok(Self::SubscribeNotifications {}),
            "unsubscribe_notifications" => Ok(Self::UnsubscribeNotifications {}),
            _ => Err(DecodeError::UnknownType(kind)),
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// The wire `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::CreatePost(_) => "create_post",
            Self::LikePost(_) => "like_post",
            Self::AddComment(_) => "add_comment",
            Self::JoinRoom(_) => "join_room",
            Self::LeaveRoom(_) => "leave_room",
            Self::SubscribePosts(_) => "subscribe_posts",
            Self::UnsubscribePosts(_) => "unsubscribe_posts",
            Self::SubscribeNotifications {} => "subscribe_notifications",
            Self::UnsubscribeNotifications {} => "unsubscribe_notifications",
        }
    }
}

fn payload<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|source| DecodeError::InvalidPayload {
        kind: kind.to_string(),
        source,
    })
}

fn optional_payload<T: DeserializeOwned + Default>(kind: &str, data: Value) -> Result<T, DecodeError> {
    if data.is_null() {
        return Ok(T::default());
    }
    payload(kind, data)
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Event names pushed to clients.
pub struct EventName;

impl EventName {
    pub const CONNECTED: &'static str = "connected";
    pub const ROOM_JOINED: &'static str = "room_joined";
    pub const ROOM_LEFT: &'static str = "room_left";
    pub const POST_CREATED: &'static str = "post_created";
    pub const POST_LIKED: &'static str = "post_liked";
    pub const COMMENT_ADDED: &'static str = "comment_added";
    pub const NOTIFICATION: &'static str = "notification";
}

/// A message sent from the server to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEvent {
    #[serde(rename = "type")]
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl ServerEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn connected(client_id: ConnectionId) -> Self {
        Self::new(
            EventName::CONNECTED,
            serde_json::json!({ "clientId": client_id }),
        )
    }

    pub fn room_joined(key: &RoomKey) -> Self {
        Self::new(EventName::ROOM_JOINED, room_data(key))
    }

    pub fn room_left(key: &RoomKey) -> Self {
        Self::new(EventName::ROOM_LEFT, room_data(key))
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

fn room_data(key: &RoomKey) -> Value {
    serde_json::json!({ "room": key.kind, "location": key.scope })
}
