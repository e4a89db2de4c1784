//! Cross-process fan-out over the shared Redis broker.
//!
//! `publish` delivers an event to all local room subscribers immediately;
//! global events are additionally published on a room-derived topic so
//! every other process can re-inject them into its own broadcast groups.
//! Each process tags outgoing envelopes with its instance id and the
//! bridge skips its own envelopes, so clients see each event exactly once
//! per process fleet. Cross-process ordering is best-effort only;
//! consumers of aggregate state receive full summaries, never deltas.

use crate::models::room::Room;
use crate::redis_client::RedisClient;
use crate::websocket::events::Outbound;
use crate::websocket::RoomRegistry;
use futures_util::StreamExt;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use uuid::Uuid;

/// Pattern the bridge subscribes to; one topic per room underneath it.
const TOPIC_PATTERN: &str = "rooms:*";

/// Whether an event should cross process boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Deliver to this process's subscribers only.
    Local,
    /// Deliver locally and republish through the broker.
    Global,
}

/// Envelope for events traveling through the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerEnvelope {
    /// Instance id of the publishing process.
    pub origin: Uuid,
    /// Room key the event belongs to.
    pub room: String,
    /// The outbound event, pre-serialized.
    pub event: serde_json::Value,
}

pub fn topic_for(room_key: &str) -> String {
    format!("rooms:{room_key}")
}

/// Extract the room key from a broker topic; `None` for foreign topics.
pub fn room_key_from_topic(topic: &str) -> Option<&str> {
    topic.strip_prefix("rooms:")
}

/// Re-inject one broker payload into the local broadcast groups.
///
/// Envelopes published by `instance_id` itself are skipped; their local
/// delivery already happened at publish time. Malformed payloads are
/// logged and dropped; the bridge never dies over one bad frame.
pub async fn bridge_dispatch(registry: &RoomRegistry, instance_id: Uuid, payload: &str) {
    let envelope: BrokerEnvelope = match serde_json::from_str(payload) {
        Ok(env) => env,
        Err(e) => {
            tracing::warn!(error = %e, "malformed broker envelope skipped");
            return;
        }
    };

    if envelope.origin == instance_id {
        return;
    }

    registry
        .broadcast(&envelope.room, envelope.event.to_string())
        .await;
}

#[derive(Clone)]
pub struct FanoutBus {
    registry: RoomRegistry,
    redis: RedisClient,
    instance_id: Uuid,
}

impl FanoutBus {
    pub fn new(registry: RoomRegistry, redis: RedisClient) -> Self {
        Self {
            registry,
            redis,
            instance_id: Uuid::new_v4(),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Publish an event to a room.
    ///
    /// Local delivery always succeeds; broker republication is
    /// best-effort: when the broker is down, the event still reaches
    /// every subscriber on this process and the failure is only logged.
    pub async fn publish(&self, room: &Room, event: &Outbound, scope: Scope) {
        self.publish_key(&room.key(), event, scope).await;
    }

    /// Same as [`publish`](Self::publish) but addressed by raw room key;
    /// used where only the key is known (e.g. the presence reaper).
    pub async fn publish_key(&self, room_key: &str, event: &Outbound, scope: Scope) {
        let frame = event.to_json();
        self.registry.broadcast(room_key, frame).await;

        if scope == Scope::Local {
            return;
        }

        let envelope = BrokerEnvelope {
            origin: self.instance_id,
            room: room_key.to_string(),
            event: match serde_json::to_value(event) {
                Ok(v) => v,
                Err(e) => {
                    tracing::error!(error = %e, room = room_key, "failed to encode broker envelope");
                    return;
                }
            },
        };

        let payload = match serde_json::to_string(&envelope) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, room = room_key, "failed to encode broker envelope");
                return;
            }
        };

        let mut conn = self.redis.connection().await;
        if let Err(e) = conn
            .publish::<_, _, ()>(topic_for(room_key), payload)
            .await
        {
            // Degrade gracefully: local delivery already happened.
            tracing::warn!(error = %e, room = room_key, "broker publish failed, event delivered locally only");
        }
    }

    /// Broker bridge: subscribes to all room topics and re-injects foreign
    /// events into the local broadcast groups. Runs for the process
    /// lifetime, reconnecting with a delay whenever the broker connection
    /// drops.
    pub async fn run_bridge(self, redis_url: String) {
        loop {
            match redis_utils::pubsub_connection(&redis_url).await {
                Ok(mut pubsub) => match pubsub.psubscribe(TOPIC_PATTERN).await {
                    Ok(()) => {
                        tracing::info!(instance = %self.instance_id, "fan-out bridge subscribed to {TOPIC_PATTERN}");
                        let mut stream = pubsub.on_message();
                        while let Some(msg) = stream.next().await {
                            let payload: String = match msg.get_payload() {
                                Ok(p) => p,
                                Err(e) => {
                                    tracing::warn!(error = %e, "undecodable broker payload skipped");
                                    continue;
                                }
                            };
                            bridge_dispatch(&self.registry, self.instance_id, &payload).await;
                        }
                        tracing::warn!("broker subscription stream ended");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "broker psubscribe failed");
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "broker connection failed");
                }
            }
            sleep(Duration::from_secs(5)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_are_room_derived() {
        let room = Room::Stream(Uuid::nil());
        let topic = topic_for(&room.key());
        assert_eq!(topic, format!("rooms:stream:{}", Uuid::nil()));
        assert_eq!(room_key_from_topic(&topic), Some(room.key().as_str()));
        assert_eq!(room_key_from_topic("other:thing"), None);
    }

    #[test]
    fn envelope_round_trips() {
        let envelope = BrokerEnvelope {
            origin: Uuid::new_v4(),
            room: Room::Post(Uuid::new_v4()).key(),
            event: serde_json::json!({"type": "typing", "user_id": Uuid::nil()}),
        };
        let encoded = serde_json::to_string(&envelope).unwrap();
        let decoded: BrokerEnvelope = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.origin, envelope.origin);
        assert_eq!(decoded.room, envelope.room);
        assert_eq!(decoded.event, envelope.event);
    }

    #[tokio::test]
    async fn foreign_envelopes_reach_local_subscribers() {
        let registry = RoomRegistry::new();
        let instance_id = Uuid::new_v4();
        let room = Room::Conversation(Uuid::new_v4());
        let (_id, mut rx) = registry.add_subscriber(&room.key()).await;

        let envelope = BrokerEnvelope {
            origin: Uuid::new_v4(), // someone else's process
            room: room.key(),
            event: serde_json::json!({"type": "typing", "user_id": Uuid::nil()}),
        };
        let payload = serde_json::to_string(&envelope).unwrap();

        bridge_dispatch(&registry, instance_id, &payload).await;

        let frame = rx.recv().await.unwrap();
        assert!(frame.contains(r#""type":"typing""#));
    }

    #[tokio::test]
    async fn own_envelopes_are_skipped() {
        let registry = RoomRegistry::new();
        let instance_id = Uuid::new_v4();
        let room = Room::Stream(Uuid::new_v4());
        let (_id, mut rx) = registry.add_subscriber(&room.key()).await;

        let envelope = BrokerEnvelope {
            origin: instance_id, // published by this very process
            room: room.key(),
            event: serde_json::json!({"type": "typing", "user_id": Uuid::nil()}),
        };
        let payload = serde_json::to_string(&envelope).unwrap();

        bridge_dispatch(&registry, instance_id, &payload).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_payloads_are_dropped() {
        let registry = RoomRegistry::new();
        let room = Room::Stream(Uuid::new_v4());
        let (_id, mut rx) = registry.add_subscriber(&room.key()).await;

        bridge_dispatch(&registry, Uuid::new_v4(), "{{nonsense").await;

        assert!(rx.try_recv().is_err());
    }
}
