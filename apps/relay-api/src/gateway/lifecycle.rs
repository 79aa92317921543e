//! Connection teardown.

use std::fmt;

use hyperlocal_common::ConnectionId;

use super::Gateway;

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent a close frame or the stream ended.
    Closed,
    /// Transport read error.
    Error,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Error => f.write_str("error"),
        }
    }
}

impl Gateway {
    /// Tear a connection down: unregister it and remove it from every room
    /// it joined, pruning rooms that become empty.
    ///
    /// Removal from the registry is the guard: only the call that actually
    /// removes the record does the room cleanup, so a close racing an error
    /// runs the teardown once. Returns `false` for repeat calls.
    pub fn disconnect(&self, id: ConnectionId, reason: CloseReason) -> bool {
        let Some(rooms) = self.connections.unregister(id) else {
            tracing::trace!(connection_id = %id, %reason, "already torn down");
            return false;
        };

        let joined = rooms.len();
        for key in &rooms {
            self.rooms.leave(key, id);
        }

        tracing::info!(
            connection_id = %id,
            %reason,
            rooms = joined,
            remaining = self.connections.len(),
            "connection closed"
        );
        true
    }
}
