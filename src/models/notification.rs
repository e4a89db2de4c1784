use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable notification record.
///
/// Created at most once per triggering event; self-notifications
/// (sender == recipient) are suppressed before this row ever exists.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub object_type: Option<String>,
    pub object_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Reaction,
    Comment,
    Reply,
    Mention,
    Message,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Reaction => "reaction",
            NotificationKind::Comment => "comment",
            NotificationKind::Reply => "reply",
            NotificationKind::Mention => "mention",
            NotificationKind::Message => "message",
            NotificationKind::System => "system",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "reaction" => NotificationKind::Reaction,
            "comment" => NotificationKind::Comment,
            "reply" => NotificationKind::Reply,
            "mention" => NotificationKind::Mention,
            "message" => NotificationKind::Message,
            _ => NotificationKind::System,
        }
    }
}

/// Per-user notification delivery preferences, one boolean per
/// (channel x category). Consulted, never mutated, by the fan-out; the row
/// is auto-created with defaults on first read.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationPreference {
    pub user_id: Uuid,
    pub email_reactions: bool,
    pub email_comments: bool,
    pub email_mentions: bool,
    pub email_messages: bool,
    pub push_reactions: bool,
    pub push_comments: bool,
    pub push_mentions: bool,
    pub push_messages: bool,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreference {
    /// Defaults match the platform's historical behavior: everything on
    /// except mail for direct messages (too chatty).
    pub fn defaults(user_id: Uuid) -> Self {
        Self {
            user_id,
            email_reactions: true,
            email_comments: true,
            email_mentions: true,
            email_messages: false,
            push_reactions: true,
            push_comments: true,
            push_mentions: true,
            push_messages: true,
            updated_at: Utc::now(),
        }
    }

    pub fn allows_email(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::Reaction => self.email_reactions,
            NotificationKind::Comment | NotificationKind::Reply => self.email_comments,
            NotificationKind::Mention => self.email_mentions,
            NotificationKind::Message => self.email_messages,
            NotificationKind::System => false,
        }
    }

    pub fn allows_push(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::Reaction => self.push_reactions,
            NotificationKind::Comment | NotificationKind::Reply => self.push_comments,
            NotificationKind::Mention => self.push_mentions,
            NotificationKind::Message => self.push_messages,
            NotificationKind::System => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips() {
        for kind in [
            NotificationKind::Reaction,
            NotificationKind::Comment,
            NotificationKind::Reply,
            NotificationKind::Mention,
            NotificationKind::Message,
            NotificationKind::System,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_kind_falls_back_to_system() {
        assert_eq!(NotificationKind::parse("follow"), NotificationKind::System);
    }

    #[test]
    fn default_preferences_mute_message_mail_only() {
        let prefs = NotificationPreference::defaults(Uuid::new_v4());
        assert!(prefs.allows_email(NotificationKind::Reaction));
        assert!(prefs.allows_email(NotificationKind::Comment));
        assert!(!prefs.allows_email(NotificationKind::Message));
        assert!(prefs.allows_push(NotificationKind::Message));
    }

    #[test]
    fn reply_shares_the_comment_category() {
        let mut prefs = NotificationPreference::defaults(Uuid::new_v4());
        prefs.email_comments = false;
        assert!(!prefs.allows_email(NotificationKind::Reply));
    }

    #[test]
    fn system_notifications_always_push_never_mail() {
        let prefs = NotificationPreference::defaults(Uuid::new_v4());
        assert!(prefs.allows_push(NotificationKind::System));
        assert!(!prefs.allows_email(NotificationKind::System));
    }
}
