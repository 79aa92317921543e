use std::collections::VecDeque;

use hyperlocal_common::ClientMessage;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Which message to discard when the queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    #[default]
    DropOldest,
    DropNewest,
}

/// Sends held while the socket is down, flushed in order on (re)connect.
#[derive(Debug)]
pub struct OutboundQueue {
    items: VecDeque<ClientMessage>,
    capacity: usize,
    policy: OverflowPolicy,
    dropped: u64,
}

impl OutboundQueue {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            policy,
            dropped: 0,
        }
    }

    /// Enqueue a message, returning whichever message was discarded to make room.
    pub fn push(&mut self, message: ClientMessage) -> Option<ClientMessage> {
        if self.items.len() < self.capacity {
            self.items.push_back(message);
            return None;
        }
        self.dropped += 1;
        match self.policy {
            OverflowPolicy::DropNewest => Some(message),
            OverflowPolicy::DropOldest => {
                let evicted = self.items.pop_front();
                self.items.push_back(message);
                evicted
            }
        }
    }

    pub fn pop_front(&mut self) -> Option<ClientMessage> {
        self.items.pop_front()
    }

    /// Put back a message whose send failed so it goes out first next time.
    pub fn requeue_front(&mut self, message: ClientMessage) {
        if self.items.len() >= self.capacity {
            self.items.pop_back();
            self.dropped += 1;
        }
        self.items.push_front(message);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total messages discarded because of overflow.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use hyperlocal_common::protocol::RoomPayload;
    use hyperlocal_common::Location;

    use super::*;

    fn join(scope: &str) -> ClientMessage {
        ClientMessage::JoinRoom(RoomPayload {
            room: "posts".into(),
            location: Location::from(scope),
        })
    }

    fn scopes(queue: &mut OutboundQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.pop_front())
            .map(|m| match m {
                ClientMessage::JoinRoom(p) => p.location.scope(),
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn preserves_order() {
        let mut queue = OutboundQueue::new(10, OverflowPolicy::default());
        for s in ["a", "b", "c"] {
            assert!(queue.push(join(s)).is_none());
        }
        assert_eq!(scopes(&mut queue), vec!["a", "b", "c"]);
    }

    #[test]
    fn drop_oldest_evicts_head() {
        let mut queue = OutboundQueue::new(2, OverflowPolicy::DropOldest);
        queue.push(join("a"));
        queue.push(join("b"));
        assert_eq!(queue.push(join("c")), Some(join("a")));
        assert_eq!(queue.dropped(), 1);
        assert_eq!(scopes(&mut queue), vec!["b", "c"]);
    }

    #[test]
    fn drop_newest_rejects_incoming() {
        let mut queue = OutboundQueue::new(2, OverflowPolicy::DropNewest);
        queue.push(join("a"));
        queue.push(join("b"));
        assert_eq!(queue.push(join("c")), Some(join("c")));
        assert_eq!(scopes(&mut queue), vec!["a", "b"]);
    }

    #[test]
    fn requeue_goes_first_and_stays_bounded() {
        let mut queue = OutboundQueue::new(2, OverflowPolicy::DropOldest);
        queue.push(join("b"));
        queue.push(join("c"));
        queue.requeue_front(join("a"));
        assert_eq!(queue.len(), 2);
        assert_eq!(scopes(&mut queue), vec!["a", "b"]);
    }

    #[test]
    fn zero_capacity_holds_one() {
        let queue = OutboundQueue::new(0, OverflowPolicy::DropOldest);
        assert_eq!(queue.capacity(), 1);
    }
}
