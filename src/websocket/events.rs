use crate::models::message::RoomMessage;
use crate::models::notification::Notification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Inbound events, one tagged enum for all room kinds.
///
/// The protocol is tolerant by design: a frame whose `type` we do not
/// recognize parses to [`Inbound::Ignored`] and is dropped without closing
/// the session. Which variants are actually honored depends on the room
/// kind (a `stream_control` in a DM room is rejected by the dispatcher,
/// not by the parser).
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    Typing,

    /// Read receipt for a message.
    Read { message_id: Uuid },

    /// New chat message; `parent_id` threads comment replies.
    #[serde(alias = "chat_message")]
    Message {
        content: String,
        #[serde(default, alias = "in_reply_to")]
        parent_id: Option<Uuid>,
    },

    /// Reaction toggle. Exactly one of `post` / `comment` / `stream` must
    /// carry the target id.
    #[serde(alias = "toggle")]
    Reaction {
        reaction_type: String,
        #[serde(default)]
        post: Option<Uuid>,
        #[serde(default)]
        comment: Option<Uuid>,
        #[serde(default)]
        stream: Option<Uuid>,
    },

    /// Liveness signal; refreshes the participant's `last_activity`.
    #[serde(alias = "viewer_heartbeat")]
    Heartbeat,

    /// Owner-only stream lifecycle commands.
    StreamControl {
        action: StreamControlAction,
        #[serde(default)]
        title: Option<String>,
    },

    /// Flag a message for moderation.
    Flag { message_id: Uuid },

    /// Streamer/moderator only: ban a user from the room.
    Ban {
        user_id: Uuid,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        expires_at: Option<DateTime<Utc>>,
    },

    /// Streamer/moderator only: lift a ban.
    Unban { user_id: Uuid },

    /// Inbox only: mark a notification as read.
    MarkRead { notification_id: Uuid },

    /// Anything we do not understand. Never constructed by clients
    /// directly; produced by [`Inbound::parse`] for unknown tags.
    Ignored,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamControlAction {
    #[serde(alias = "start_stream")]
    Start,
    #[serde(alias = "end_stream")]
    End,
    UpdateTitle,
}

impl Inbound {
    /// Parse an inbound text frame. Unknown event types and malformed
    /// frames map to `Ignored`; per-event validation (empty content,
    /// missing target, unknown reaction kind) happens in the dispatcher
    /// where a structured error can be returned.
    pub fn parse(text: &str) -> Inbound {
        match serde_json::from_str::<Inbound>(text) {
            Ok(evt) => evt,
            Err(e) => {
                tracing::debug!(error = %e, "unrecognized inbound frame ignored");
                Inbound::Ignored
            }
        }
    }
}

/// Wire shape of a chat message broadcast to room subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagePayload {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<&RoomMessage> for MessagePayload {
    fn from(msg: &RoomMessage) -> Self {
        Self {
            id: msg.id,
            sender_id: msg.sender_id,
            content: msg.content.clone(),
            parent_id: msg.parent_id,
            created_at: msg.created_at,
        }
    }
}

/// Wire shape of a notification pushed to the recipient's inbox channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPayload {
    pub id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationPayload {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            kind: n.kind.clone(),
            title: n.title.clone(),
            body: n.body.clone(),
            sender_id: n.sender_id,
            created_at: n.created_at,
        }
    }
}

/// Outbound events broadcast to room subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Join/leave announcements.
    Status { event: String, user_id: Uuid },

    Typing { user_id: Uuid },

    Message { message: MessagePayload },

    /// One user's toggle result; aggregate state travels separately in
    /// `reaction_summary` so consumers never have to apply deltas.
    Reaction {
        user_id: Uuid,
        target_type: String,
        target_id: Uuid,
        reaction_type: String,
        action: String,
    },

    /// Full recomputed summary for a target; idempotent under reordering
    /// and duplicate delivery.
    ReactionSummary {
        target_type: String,
        target_id: Uuid,
        summary: BTreeMap<String, i64>,
    },

    ViewerCountUpdate { viewer_count: i64 },

    ReadReceipt { message_id: Uuid, user_id: Uuid },

    StreamStatus {
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },

    Notification { notification: NotificationPayload },

    System { message: String },

    Error { code: String, message: String },
}

impl Outbound {
    pub fn to_json(&self) -> String {
        // Serialization of these enums cannot fail; fall back to a bare
        // error frame if it ever does.
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"error","code":"INTERNAL_ERROR","message":"encode"}"#.into())
    }

    pub fn status(event: &str, user_id: Uuid) -> Self {
        Outbound::Status {
            event: event.to_string(),
            user_id,
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Outbound::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typing_event() {
        assert_eq!(Inbound::parse(r#"{"type":"typing"}"#), Inbound::Typing);
    }

    #[test]
    fn parses_message_with_legacy_alias() {
        let evt = Inbound::parse(r#"{"type":"chat_message","content":"hi"}"#);
        assert_eq!(
            evt,
            Inbound::Message {
                content: "hi".into(),
                parent_id: None
            }
        );
    }

    #[test]
    fn parses_reaction_toggle_alias() {
        let id = Uuid::new_v4();
        let frame = format!(r#"{{"type":"toggle","reaction_type":"like","post":"{id}"}}"#);
        match Inbound::parse(&frame) {
            Inbound::Reaction {
                reaction_type,
                post,
                comment,
                stream,
            } => {
                assert_eq!(reaction_type, "like");
                assert_eq!(post, Some(id));
                assert!(comment.is_none() && stream.is_none());
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_becomes_ignored() {
        assert_eq!(
            Inbound::parse(r#"{"type":"dance_party","intensity":11}"#),
            Inbound::Ignored
        );
    }

    #[test]
    fn malformed_json_becomes_ignored() {
        assert_eq!(Inbound::parse("not json at all"), Inbound::Ignored);
    }

    #[test]
    fn parses_ban_with_optional_fields() {
        let id = Uuid::new_v4();
        let frame = format!(r#"{{"type":"ban","user_id":"{id}","reason":"spamming"}}"#);
        match Inbound::parse(&frame) {
            Inbound::Ban {
                user_id,
                reason,
                expires_at,
            } => {
                assert_eq!(user_id, id);
                assert_eq!(reason.as_deref(), Some("spamming"));
                assert!(expires_at.is_none());
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn stream_control_accepts_legacy_action_names() {
        let evt = Inbound::parse(r#"{"type":"stream_control","action":"start_stream"}"#);
        assert_eq!(
            evt,
            Inbound::StreamControl {
                action: StreamControlAction::Start,
                title: None
            }
        );
    }

    #[test]
    fn outbound_frames_carry_snake_case_tags() {
        let frame = Outbound::ViewerCountUpdate { viewer_count: 7 }.to_json();
        assert!(frame.contains(r#""type":"viewer_count_update""#));
        assert!(frame.contains(r#""viewer_count":7"#));

        let frame = Outbound::status("joined", Uuid::nil()).to_json();
        assert!(frame.contains(r#""type":"status""#));
        assert!(frame.contains(r#""event":"joined""#));
    }

    #[test]
    fn reaction_summary_serializes_full_map() {
        let mut summary = BTreeMap::new();
        summary.insert("like".to_string(), 2i64);
        summary.insert("love".to_string(), 0i64);
        let frame = Outbound::ReactionSummary {
            target_type: "post".into(),
            target_id: Uuid::nil(),
            summary,
        }
        .to_json();
        assert!(frame.contains(r#""like":2"#));
        assert!(frame.contains(r#""love":0"#));
    }

    #[test]
    fn outbound_round_trips_through_serde() {
        let original = Outbound::ReadReceipt {
            message_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        };
        let decoded: Outbound = serde_json::from_str(&original.to_json()).unwrap();
        assert_eq!(decoded, original);
    }
}
