//! Live-post relay: connections, rooms, routing and fan-out.

pub mod fanout;
pub mod lifecycle;
pub mod registry;
pub mod rooms;
pub mod router;
pub mod server;

use axum::extract::ws::Utf8Bytes;
use hyperlocal_common::{ConnectionId, RoomKey, ServerEvent, SnowflakeGenerator};
use serde::Serialize;
use tokio::sync::mpsc;
use utoipa::ToSchema;

use registry::{ConnectionRegistry, SendOutcome};
use rooms::RoomIndex;

/// Default capacity of each connection's outbound buffer.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// The single owner of relay state. Registry and room index are private;
/// everything goes through register / join / leave / broadcast / disconnect.
pub struct Gateway {
    connections: ConnectionRegistry,
    rooms: RoomIndex,
    ids: SnowflakeGenerator,
    outbound_buffer: usize,
}

impl Gateway {
    pub fn new(worker_id: u16, outbound_buffer: usize) -> Self {
        Self {
            connections: ConnectionRegistry::new(),
            rooms: RoomIndex::new(),
            ids: SnowflakeGenerator::new(worker_id),
            outbound_buffer: outbound_buffer.max(1),
        }
    }

    /// Register a new connection and greet it with `connected`.
    ///
    /// Returns the id and the receiving end of the connection's outbound
    /// buffer, which the caller drains into the transport.
    pub fn register(&self) -> (ConnectionId, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        let id = loop {
            let candidate = ConnectionId::generate(&self.ids);
            if self.connections.insert(candidate, tx.clone()) {
                break candidate;
            }
        };
        drop(tx);

        self.send_event(id, &ServerEvent::connected(id));
        (id, rx)
    }

    /// Subscribe `id` to a room and acknowledge with `room_joined`.
    /// Returns `false` if the connection is not registered.
    pub fn join(&self, id: ConnectionId, key: RoomKey) -> bool {
        if !self.connections.add_room(id, &key) {
            return false;
        }
        let ack = ServerEvent::room_joined(&key);
        tracing::debug!(connection_id = %id, room = %key, "joined room");
        self.rooms.join(key.clone(), id);
        if !self.connections.contains(id) {
            // Disconnected between add_room and the index insert.
            self.rooms.leave(&key, id);
            return false;
        }
        self.send_event(id, &ack);
        true
    }

    /// Unsubscribe `id` from a room. Returns whether it was a member.
    pub fn leave(&self, id: ConnectionId, key: &RoomKey) -> bool {
        self.connections.remove_room(id, key);
        let was_member = self.rooms.leave(key, id);
        if was_member {
            tracing::debug!(connection_id = %id, room = %key, "left room");
            self.send_event(id, &ServerEvent::room_left(key));
        }
        was_member
    }

    /// Rooms the connection has joined, or `None` for unknown connections.
    pub fn rooms_of(&self, id: ConnectionId) -> Option<Vec<RoomKey>> {
        self.connections.rooms_of(id)
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections.contains(id)
    }

    pub fn has_room(&self, key: &RoomKey) -> bool {
        self.rooms.contains(key)
    }

    pub fn room_stats(&self, key: &RoomKey) -> Option<RoomStats> {
        self.rooms
            .member_count(key)
            .map(|client_count| RoomStats::new(key, client_count))
    }

    pub fn stats(&self) -> GatewayStats {
        let rooms: Vec<RoomStats> = self
            .rooms
            .snapshot()
            .iter()
            .map(|(key, count)| RoomStats::new(key, *count))
            .collect();
        GatewayStats {
            total_clients: self.connections.len(),
            total_rooms: rooms.len(),
            rooms,
        }
    }

    /// Send an event to one connection. Not-open connections are skipped.
    fn send_event(&self, id: ConnectionId, event: &ServerEvent) -> SendOutcome {
        match event.encode() {
            Ok(text) => self.connections.send(id, Utf8Bytes::from(text)),
            Err(err) => {
                tracing::error!(?err, event = %event.event, "failed to encode event");
                SendOutcome::Closed
            }
        }
    }
}

/// Relay-wide diagnostics served by `/stats` and `/health`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStats {
    pub total_clients: usize,
    pub total_rooms: usize,
    pub rooms: Vec<RoomStats>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomStats {
    /// Diagnostic `kind:scope` form.
    pub room: String,
    pub kind: String,
    pub scope: String,
    pub client_count: usize,
}

impl RoomStats {
    fn new(key: &RoomKey, client_count: usize) -> Self {
        Self {
            room: key.to_string(),
            kind: key.kind.clone(),
            scope: key.scope.clone(),
            client_count,
        }
    }
}
