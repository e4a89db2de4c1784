use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of flags that forces a message out of the regular feed.
pub const AUTO_MODERATE_THRESHOLD: i32 = 3;

/// A chat message inside a room (stream chat, post comments, conversation,
/// direct message).
///
/// Invariants:
/// - `is_moderated` messages are only delivered to the room owner and
///   moderators.
/// - `flag_count >= AUTO_MODERATE_THRESHOLD` forces `is_flagged` and
///   `is_moderated` true; the escalation is monotonic and never reverts
///   automatically.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoomMessage {
    pub id: Uuid,
    pub room_key: String,
    pub sender_id: Uuid,
    pub kind: String,
    pub content: String,
    pub parent_id: Option<Uuid>,
    pub flag_count: i32,
    pub is_flagged: bool,
    pub is_moderated: bool,
    pub moderated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Chat,
    System,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Chat => "chat",
            MessageKind::System => "system",
        }
    }
}

impl RoomMessage {
    /// Whether `viewer` may see this message. Moderated content stays
    /// visible to the author, the room owner and moderators so they can
    /// review what was removed.
    pub fn visible_to(&self, viewer: Uuid, is_owner: bool, is_moderator: bool) -> bool {
        if !self.is_moderated {
            return true;
        }
        is_owner || is_moderator || viewer == self.sender_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(is_moderated: bool, sender_id: Uuid) -> RoomMessage {
        RoomMessage {
            id: Uuid::new_v4(),
            room_key: "post:00000000-0000-0000-0000-000000000001".into(),
            sender_id,
            kind: "chat".into(),
            content: "hello".into(),
            parent_id: None,
            flag_count: 0,
            is_flagged: false,
            is_moderated,
            moderated_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn unmoderated_messages_are_visible_to_everyone() {
        let msg = message(false, Uuid::new_v4());
        assert!(msg.visible_to(Uuid::new_v4(), false, false));
    }

    #[test]
    fn moderated_messages_hidden_from_plain_viewers() {
        let msg = message(true, Uuid::new_v4());
        assert!(!msg.visible_to(Uuid::new_v4(), false, false));
        assert!(msg.visible_to(Uuid::new_v4(), true, false));
        assert!(msg.visible_to(Uuid::new_v4(), false, true));
    }

    #[test]
    fn author_keeps_seeing_their_moderated_message() {
        let author = Uuid::new_v4();
        let msg = message(true, author);
        assert!(msg.visible_to(author, false, false));
    }
}
