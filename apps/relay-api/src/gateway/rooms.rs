//! Room index: room key → subscribed connections.

use std::collections::HashSet;

use dashmap::DashMap;
use hyperlocal_common::{ConnectionId, RoomKey};

/// Concurrent map of rooms. A room with no members is never present.
#[derive(Default)]
pub struct RoomIndex {
    rooms: DashMap<RoomKey, HashSet<ConnectionId>>,
}

impl RoomIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` to the room, creating it if needed.
    /// Returns `true` if the connection was not already a member.
    pub fn join(&self, key: RoomKey, id: ConnectionId) -> bool {
        self.rooms.entry(key).or_default().insert(id)
    }

    /// Remove `id` from the room and drop the room once it is empty.
    /// Returns `true` if the connection was a member.
    pub fn leave(&self, key: &RoomKey, id: ConnectionId) -> bool {
        let Some(mut members) = self.rooms.get_mut(key) else {
            return false;
        };
        let removed = members.remove(&id);
        drop(members);

        // Check-and-remove runs under the shard lock, so a join racing with
        // this either lands first (room survives) or recreates the room.
        self.rooms.remove_if(key, |_, members| members.is_empty());
        removed
    }

    /// Current members, or `None` when the room does not exist.
    pub fn members(&self, key: &RoomKey) -> Option<Vec<ConnectionId>> {
        self.rooms
            .get(key)
            .map(|members| members.iter().copied().collect())
    }

    pub fn member_count(&self, key: &RoomKey) -> Option<usize> {
        self.rooms.get(key).map(|members| members.len())
    }

    pub fn contains(&self, key: &RoomKey) -> bool {
        self.rooms.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// `(key, member count)` for every room, sorted by key.
    pub fn snapshot(&self) -> Vec<(RoomKey, usize)> {
        let mut rooms: Vec<(RoomKey, usize)> = self
            .rooms
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect();
        rooms.sort();
        rooms
    }
}
