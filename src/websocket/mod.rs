use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod events;
pub mod fanout;
pub mod session;

/// Unique identifier for a room subscriber.
///
/// Each session gets a fresh subscriber id when it registers, so teardown
/// can remove exactly one subscription even when the same user holds
/// several connections to the same room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

struct Subscriber {
    id: SubscriberId,
    sender: UnboundedSender<String>,
}

/// Per-process broadcast groups, keyed by room key.
///
/// This is the local half of the fan-out bus: `broadcast` delivers a frame
/// to every subscriber of a room on this process. Cross-process delivery
/// happens through the broker bridge in [`fanout`].
#[derive(Default, Clone)]
pub struct RoomRegistry {
    inner: Arc<RwLock<HashMap<String, Vec<Subscriber>>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a room. Returns the subscriber id (needed for cleanup)
    /// and the receiving end of the frame channel.
    pub async fn add_subscriber(&self, room_key: &str) -> (SubscriberId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let subscriber_id = SubscriberId::new();

        let mut guard = self.inner.write().await;
        guard
            .entry(room_key.to_string())
            .or_default()
            .push(Subscriber {
                id: subscriber_id,
                sender: tx,
            });

        tracing::debug!(
            room = room_key,
            subscribers = guard.get(room_key).map(|v| v.len()).unwrap_or(0),
            "subscriber added"
        );

        (subscriber_id, rx)
    }

    /// Remove one subscription. Must be called on session teardown or the
    /// room entry leaks senders.
    pub async fn remove_subscriber(&self, room_key: &str, subscriber_id: SubscriberId) {
        let mut guard = self.inner.write().await;

        if let Some(subscribers) = guard.get_mut(room_key) {
            subscribers.retain(|s| s.id != subscriber_id);
            if subscribers.is_empty() {
                guard.remove(room_key);
                tracing::debug!(room = room_key, "room removed from registry");
            }
        }
    }

    /// Deliver a serialized frame to every local subscriber of a room.
    /// Dead senders (closed sessions) are dropped along the way.
    pub async fn broadcast(&self, room_key: &str, frame: String) {
        let mut guard = self.inner.write().await;
        if let Some(subscribers) = guard.get_mut(room_key) {
            let before = subscribers.len();
            subscribers.retain(|subscriber| subscriber.sender.send(frame.clone()).is_ok());
            let after = subscribers.len();
            if before != after {
                tracing::debug!(
                    room = room_key,
                    cleaned = before - after,
                    remaining = after,
                    "dead subscribers removed during broadcast"
                );
            }
        }
    }

    pub async fn subscriber_count(&self, room_key: &str) -> usize {
        let guard = self.inner.read().await;
        guard.get(room_key).map(|v| v.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOM: &str = "stream:00000000-0000-0000-0000-000000000001";

    #[tokio::test]
    async fn subscribe_and_broadcast() {
        let registry = RoomRegistry::new();
        let (_id, mut rx) = registry.add_subscriber(ROOM).await;

        registry.broadcast(ROOM, "hello".to_string()).await;

        assert_eq!(rx.recv().await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers_of_the_room_only() {
        let registry = RoomRegistry::new();
        let (_a, mut rx_a) = registry.add_subscriber(ROOM).await;
        let (_b, mut rx_b) = registry.add_subscriber(ROOM).await;
        let (_c, mut rx_other) = registry
            .add_subscriber("post:00000000-0000-0000-0000-000000000002")
            .await;

        registry.broadcast(ROOM, "frame".to_string()).await;

        assert_eq!(rx_a.recv().await, Some("frame".to_string()));
        assert_eq!(rx_b.recv().await, Some("frame".to_string()));
        assert!(rx_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn remove_subscriber_is_precise() {
        let registry = RoomRegistry::new();
        let (id_a, mut rx_a) = registry.add_subscriber(ROOM).await;
        let (_id_b, mut rx_b) = registry.add_subscriber(ROOM).await;

        registry.remove_subscriber(ROOM, id_a).await;
        registry.broadcast(ROOM, "after".to_string()).await;

        assert!(rx_a.try_recv().is_err() || rx_a.recv().await.is_none());
        assert_eq!(rx_b.recv().await, Some("after".to_string()));
        assert_eq!(registry.subscriber_count(ROOM).await, 1);
    }

    #[tokio::test]
    async fn dead_senders_are_cleaned_on_broadcast() {
        let registry = RoomRegistry::new();
        let (_id, rx) = registry.add_subscriber(ROOM).await;
        drop(rx);

        registry.broadcast(ROOM, "frame".to_string()).await;

        assert_eq!(registry.subscriber_count(ROOM).await, 0);
    }

    #[tokio::test]
    async fn empty_room_entry_is_removed() {
        let registry = RoomRegistry::new();
        let (id, _rx) = registry.add_subscriber(ROOM).await;
        registry.remove_subscriber(ROOM, id).await;
        assert_eq!(registry.subscriber_count(ROOM).await, 0);
    }
}
