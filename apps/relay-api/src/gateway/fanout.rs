//! Broadcast engine: serialize once, write to every open member.
//!
//! Each connection has a bounded outbound buffer drained by its own writer
//! task. A broadcast only ever does a non-blocking `try_send`, so one slow or
//! dead client never holds up the rest of the room.

use axum::extract::ws::Utf8Bytes;
use hyperlocal_common::{ConnectionId, RoomKey, ServerEvent};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use super::registry::SendOutcome;
use super::Gateway;

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Delivery {
    /// Connections the frame was queued on.
    pub delivered: usize,
    /// Members that were not open (closed or buffer full).
    pub skipped: usize,
}

impl Gateway {
    /// Push an event to every member of one room. A missing room is not an
    /// error: nobody is looking at that scope right now.
    pub fn to_room(&self, key: &RoomKey, event_name: &str, payload: Value) -> Delivery {
        let Some(members) = self.rooms.members(key) else {
            tracing::trace!(room = %key, event = event_name, "no room; nothing to deliver");
            return Delivery::default();
        };
        let delivery = self.fan_out(members, event_name, payload);
        tracing::debug!(
            room = %key,
            event = event_name,
            delivered = delivery.delivered,
            skipped = delivery.skipped,
            "room broadcast"
        );
        delivery
    }

    /// Push an event to every registered connection.
    pub fn to_all(&self, event_name: &str, payload: Value) -> Delivery {
        let delivery = self.fan_out(self.connections.ids(), event_name, payload);
        tracing::debug!(
            event = event_name,
            delivered = delivery.delivered,
            skipped = delivery.skipped,
            "global broadcast"
        );
        delivery
    }

    fn fan_out(&self, targets: Vec<ConnectionId>, event_name: &str, payload: Value) -> Delivery {
        let frame = match ServerEvent::new(event_name, payload).encode() {
            Ok(text) => Utf8Bytes::from(text),
            Err(err) => {
                tracing::error!(?err, event = event_name, "failed to encode broadcast");
                return Delivery::default();
            }
        };

        let mut delivery = Delivery::default();
        for id in targets {
            match self.connections.send(id, frame.clone()) {
                SendOutcome::Sent => delivery.delivered += 1,
                SendOutcome::Full => {
                    tracing::warn!(connection_id = %id, event = event_name, "outbound buffer full; dropping event");
                    delivery.skipped += 1;
                }
                SendOutcome::Closed => delivery.skipped += 1,
            }
        }
        delivery
    }
}
