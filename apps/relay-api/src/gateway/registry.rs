//! Registry of live connections and their room memberships.

use std::collections::HashSet;

use axum::extract::ws::Utf8Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hyperlocal_common::{ConnectionId, RoomKey};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Per-connection record. The outbound sender is the only handle to the
/// connection's writer task; dropping the record closes the transport.
struct ConnectionEntry {
    outbound: mpsc::Sender<Utf8Bytes>,
    rooms: HashSet<RoomKey>,
}

/// Result of writing one frame to one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Writer is alive but its buffer is full (slow consumer).
    Full,
    /// Writer has exited or the connection is not registered.
    Closed,
}

/// Shared registry of all live connections.
///
/// `DashMap` gives shard-level concurrency; the membership set of each
/// connection is only ever mutated by that connection's own task.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new connection with an empty room set.
    /// Returns `false` (and stores nothing) if `id` is already taken.
    pub fn insert(&self, id: ConnectionId, outbound: mpsc::Sender<Utf8Bytes>) -> bool {
        match self.connections.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(ConnectionEntry {
                    outbound,
                    rooms: HashSet::new(),
                });
                true
            }
        }
    }

    /// Remove a connection, handing back the rooms it was in.
    /// Returns `None` if it was already removed.
    pub fn unregister(&self, id: ConnectionId) -> Option<HashSet<RoomKey>> {
        self.connections.remove(&id).map(|(_, entry)| entry.rooms)
    }

    /// Record membership on the connection side. Returns `false` if the
    /// connection is unknown.
    pub fn add_room(&self, id: ConnectionId, key: &RoomKey) -> bool {
        match self.connections.get_mut(&id) {
            Some(mut entry) => {
                entry.rooms.insert(key.clone());
                true
            }
            None => false,
        }
    }

    /// Drop membership on the connection side. Returns whether it was present.
    pub fn remove_room(&self, id: ConnectionId, key: &RoomKey) -> bool {
        self.connections
            .get_mut(&id)
            .is_some_and(|mut entry| entry.rooms.remove(key))
    }

    /// Rooms the connection currently belongs to, sorted for stable output.
    pub fn rooms_of(&self, id: ConnectionId) -> Option<Vec<RoomKey>> {
        self.connections.get(&id).map(|entry| {
            let mut rooms: Vec<RoomKey> = entry.rooms.iter().cloned().collect();
            rooms.sort();
            rooms
        })
    }

    /// Queue a frame on one connection without waiting.
    pub fn send(&self, id: ConnectionId, frame: Utf8Bytes) -> SendOutcome {
        let Some(entry) = self.connections.get(&id) else {
            return SendOutcome::Closed;
        };
        match entry.outbound.try_send(frame) {
            Ok(()) => SendOutcome::Sent,
            Err(TrySendError::Full(_)) => SendOutcome::Full,
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Snapshot of every registered id.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
