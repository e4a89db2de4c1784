/// Unit tests for the realtime protocol surface
///
/// This test module covers:
/// - Inbound frame parsing (tagged dispatch, legacy aliases, unknown types)
/// - Outbound frame wire shapes
/// - Room key derivation and broker topic mapping
/// - Local fan-out registry and broker bridge behavior
/// - Moderation and preference decision logic
use realtime_interaction_service::models::message::{RoomMessage, AUTO_MODERATE_THRESHOLD};
use realtime_interaction_service::models::notification::{
    NotificationKind, NotificationPreference,
};
use realtime_interaction_service::models::reaction::{ReactionKind, ToggleOutcome};
use realtime_interaction_service::models::room::{Room, RoomKind};
use realtime_interaction_service::services::moderation::{
    contains_suspicious_content, should_auto_moderate,
};
use realtime_interaction_service::websocket::events::{Inbound, Outbound};
use realtime_interaction_service::websocket::fanout::{
    bridge_dispatch, topic_for, BrokerEnvelope,
};
use realtime_interaction_service::websocket::RoomRegistry;
use uuid::Uuid;

#[test]
fn inbound_frames_parse_by_type_tag() {
    assert_eq!(Inbound::parse(r#"{"type":"typing"}"#), Inbound::Typing);
    assert_eq!(Inbound::parse(r#"{"type":"heartbeat"}"#), Inbound::Heartbeat);
    assert_eq!(
        Inbound::parse(r#"{"type":"viewer_heartbeat"}"#),
        Inbound::Heartbeat
    );
}

#[test]
fn unknown_inbound_types_are_ignored_not_fatal() {
    for frame in [
        r#"{"type":"jazz_hands"}"#,
        r#"{"no_type_at_all":true}"#,
        "garbage",
        "",
    ] {
        assert_eq!(Inbound::parse(frame), Inbound::Ignored, "frame: {frame}");
    }
}

#[test]
fn message_frames_accept_reply_threading() {
    let parent = Uuid::new_v4();
    let frame = format!(r#"{{"type":"message","content":"agreed!","parent_id":"{parent}"}}"#);
    assert_eq!(
        Inbound::parse(&frame),
        Inbound::Message {
            content: "agreed!".into(),
            parent_id: Some(parent),
        }
    );

    // DM clients send in_reply_to; same event.
    let frame = format!(r#"{{"type":"message","content":"agreed!","in_reply_to":"{parent}"}}"#);
    assert_eq!(
        Inbound::parse(&frame),
        Inbound::Message {
            content: "agreed!".into(),
            parent_id: Some(parent),
        }
    );
}

#[test]
fn outbound_status_and_receipt_shapes() {
    let user_id = Uuid::new_v4();
    let frame = Outbound::status("joined", user_id).to_json();
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value["type"], "status");
    assert_eq!(value["event"], "joined");
    assert_eq!(value["user_id"], user_id.to_string());

    let frame = Outbound::ReadReceipt {
        message_id: Uuid::new_v4(),
        user_id,
    }
    .to_json();
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value["type"], "read_receipt");
}

#[test]
fn every_room_kind_derives_a_stable_key() {
    let id = Uuid::new_v4();
    assert_eq!(Room::Stream(id).key(), format!("stream:{id}"));
    assert_eq!(Room::Post(id).key(), format!("post:{id}"));
    assert_eq!(Room::Conversation(id).key(), format!("conversation:{id}"));
    assert_eq!(Room::User(id).key(), format!("user:{id}"));

    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    assert_eq!(Room::direct(a, b), Room::direct(b, a));
    assert_eq!(Room::direct(a, b).kind(), RoomKind::Direct);
}

#[test]
fn broker_topics_follow_room_keys() {
    let room = Room::Stream(Uuid::new_v4());
    assert_eq!(topic_for(&room.key()), format!("rooms:{}", room.key()));
}

#[tokio::test]
async fn local_publish_and_bridge_converge() {
    let registry = RoomRegistry::new();
    let room = Room::Stream(Uuid::new_v4());
    let (_id, mut rx) = registry.add_subscriber(&room.key()).await;

    // A frame arriving from another process through the broker reaches
    // local subscribers exactly once.
    let envelope = BrokerEnvelope {
        origin: Uuid::new_v4(),
        room: room.key(),
        event: serde_json::json!({"type": "viewer_count_update", "viewer_count": 2}),
    };
    let payload = serde_json::to_string(&envelope).unwrap();

    let our_instance = Uuid::new_v4();
    bridge_dispatch(&registry, our_instance, &payload).await;
    let frame = rx.recv().await.unwrap();
    assert!(frame.contains("viewer_count_update"));

    // The same envelope published by ourselves is skipped.
    let own = BrokerEnvelope {
        origin: our_instance,
        ..envelope
    };
    bridge_dispatch(&registry, our_instance, &serde_json::to_string(&own).unwrap()).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn unsubscribed_sessions_receive_nothing() {
    let registry = RoomRegistry::new();
    let room = Room::Post(Uuid::new_v4());
    let (id, mut rx) = registry.add_subscriber(&room.key()).await;

    registry.remove_subscriber(&room.key(), id).await;
    registry.broadcast(&room.key(), "late frame".into()).await;

    assert!(rx.try_recv().is_err());
    assert_eq!(registry.subscriber_count(&room.key()).await, 0);
}

#[test]
fn moderation_threshold_and_visibility_are_consistent() {
    assert!(should_auto_moderate(AUTO_MODERATE_THRESHOLD));
    assert!(!should_auto_moderate(AUTO_MODERATE_THRESHOLD - 1));

    let author = Uuid::new_v4();
    let moderated = RoomMessage {
        id: Uuid::new_v4(),
        room_key: Room::Stream(Uuid::new_v4()).key(),
        sender_id: author,
        kind: "chat".into(),
        content: "buy now".into(),
        parent_id: None,
        flag_count: AUTO_MODERATE_THRESHOLD,
        is_flagged: true,
        is_moderated: true,
        moderated_by: None,
        created_at: chrono::Utc::now(),
    };

    assert!(contains_suspicious_content(&moderated.content));
    // Hidden from plain viewers, visible to the owner, moderators and
    // the author themselves.
    assert!(!moderated.visible_to(Uuid::new_v4(), false, false));
    assert!(moderated.visible_to(Uuid::new_v4(), true, false));
    assert!(moderated.visible_to(Uuid::new_v4(), false, true));
    assert!(moderated.visible_to(author, false, false));
}

#[test]
fn toggle_outcomes_map_to_wire_actions() {
    assert_eq!(ToggleOutcome::Created.as_str(), "created");
    assert_eq!(ToggleOutcome::Updated.as_str(), "updated");
    assert_eq!(ToggleOutcome::Removed.as_str(), "removed");
}

#[test]
fn reaction_vocabulary_is_closed() {
    for kind in ReactionKind::ALL {
        assert_eq!(ReactionKind::parse(kind.as_str()), Some(kind));
    }
    assert_eq!(ReactionKind::parse("dislike"), None);
}

#[test]
fn preference_defaults_gate_channels_per_category() {
    let prefs = NotificationPreference::defaults(Uuid::new_v4());

    // Everything pushes by default; only direct-message mail is muted.
    for kind in [
        NotificationKind::Reaction,
        NotificationKind::Comment,
        NotificationKind::Reply,
        NotificationKind::Mention,
        NotificationKind::Message,
    ] {
        assert!(prefs.allows_push(kind), "push should default on: {kind:?}");
    }
    assert!(!prefs.allows_email(NotificationKind::Message));
    assert!(prefs.allows_email(NotificationKind::Reaction));
}
