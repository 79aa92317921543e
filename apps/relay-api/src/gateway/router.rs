//! Inbound message dispatch.

use hyperlocal_common::protocol::{PostsSubscription, RoomPayload};
use hyperlocal_common::{ClientMessage, ConnectionId, EventName, RoomKey};
use serde::Serialize;

use super::fanout::Delivery;
use super::Gateway;

/// Decode one text frame and dispatch it. Frames that do not decode are
/// logged and dropped; the sender gets no reply.
pub fn handle_text(gateway: &Gateway, id: ConnectionId, text: &str) {
    match ClientMessage::decode(text) {
        Ok(message) => dispatch(gateway, id, message),
        Err(err) => {
            tracing::warn!(connection_id = %id, error = %err, "dropping inbound frame");
        }
    }
}

/// Run the built-in handler for a decoded message.
///
/// Relayed events (`create_post`, `like_post`, `add_comment`) are not checked
/// against the REST API: any connection can announce any event for any
/// location. Clients must treat pushes as hints and refetch.
pub fn dispatch(gateway: &Gateway, id: ConnectionId, message: ClientMessage) {
    tracing::trace!(connection_id = %id, message = message.type_name(), "dispatch");

    match message {
        ClientMessage::CreatePost(post) => {
            let key = RoomKey::posts(&post.location);
            relay(gateway, id, &key, EventName::POST_CREATED, &post);
        }
        ClientMessage::LikePost(like) => {
            let key = RoomKey::posts(&like.location);
            relay(gateway, id, &key, EventName::POST_LIKED, &like);
        }
        ClientMessage::AddComment(comment) => {
            let key = RoomKey::posts(&comment.location);
            relay(gateway, id, &key, EventName::COMMENT_ADDED, &comment);
        }
        ClientMessage::JoinRoom(room) => {
            gateway.join(id, room.key());
        }
        ClientMessage::LeaveRoom(RoomPayload { room, location }) => {
            gateway.leave(id, &RoomKey::new(room, location.scope()));
        }
        ClientMessage::SubscribePosts(PostsSubscription { location }) => match location {
            Some(location) => {
                gateway.join(id, RoomKey::posts(&location));
            }
            None => tracing::debug!(connection_id = %id, "subscribe_posts without location"),
        },
        ClientMessage::UnsubscribePosts(PostsSubscription { location }) => {
            if let Some(location) = location {
                gateway.leave(id, &RoomKey::posts(&location));
            }
        }
        ClientMessage::SubscribeNotifications {} => {
            gateway.join(id, RoomKey::notifications());
        }
        ClientMessage::UnsubscribeNotifications {} => {
            gateway.leave(id, &RoomKey::notifications());
        }
    }
}

fn relay<T: Serialize>(
    gateway: &Gateway,
    id: ConnectionId,
    key: &RoomKey,
    event_name: &str,
    payload: &T,
) -> Delivery {
    match serde_json::to_value(payload) {
        Ok(data) => gateway.to_room(key, event_name, data),
        Err(err) => {
            tracing::warn!(connection_id = %id, ?err, event = event_name, "failed to re-encode payload");
            Delivery::default()
        }
    }
}
