//! Notification fan-out.
//!
//! A trigger produces at most one durable notification row; delivery then
//! fans out per channel according to the recipient's stored preferences:
//! a realtime push onto their personal room (best-effort) and optionally a
//! mail through the gateway (fire-and-forget). Self-notifications are
//! suppressed before anything is written.

use crate::error::AppResult;
use crate::models::notification::{Notification, NotificationKind, NotificationPreference};
use crate::models::room::Room;
use crate::services::mail::MailClient;
use crate::websocket::events::{NotificationPayload, Outbound};
use crate::websocket::fanout::{FanoutBus, Scope};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Shorten message content for a notification body, respecting character
/// boundaries.
pub fn preview(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let mut out: String = content.chars().take(max_chars).collect();
    out.push('…');
    out
}

pub struct NotificationService {
    db: PgPool,
    bus: FanoutBus,
    mail: Option<Arc<MailClient>>,
}

impl NotificationService {
    pub fn new(db: PgPool, bus: FanoutBus, mail: Option<Arc<MailClient>>) -> Self {
        Self { db, bus, mail }
    }

    /// Create a notification and fan it out.
    ///
    /// Returns `None` when the notification is suppressed (no recipient,
    /// or the recipient triggered the event themselves). The durable row
    /// is written before any delivery is attempted; delivery failures are
    /// logged and never undo it.
    pub async fn notify(
        &self,
        recipient: Uuid,
        sender: Option<Uuid>,
        kind: NotificationKind,
        title: &str,
        body: &str,
        related: Option<(&str, Uuid)>,
    ) -> AppResult<Option<Notification>> {
        if recipient.is_nil() || sender == Some(recipient) {
            return Ok(None);
        }

        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, recipient_id, sender_id, kind, title, body, object_type, object_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, recipient_id, sender_id, kind, title, body, object_type, object_id, is_read, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(recipient)
        .bind(sender)
        .bind(kind.as_str())
        .bind(title)
        .bind(body)
        .bind(related.map(|(object_type, _)| object_type))
        .bind(related.map(|(_, object_id)| object_id))
        .fetch_one(&self.db)
        .await?;

        let preferences = self.get_or_create_preferences(recipient).await?;

        if preferences.allows_push(kind) {
            let event = Outbound::Notification {
                notification: NotificationPayload::from(&notification),
            };
            // Global scope: whichever process hosts the recipient's inbox
            // session gets the payload. An offline recipient is fine.
            self.bus
                .publish(&Room::User(recipient), &event, Scope::Global)
                .await;
        }

        if preferences.allows_email(kind) {
            self.send_mail(recipient, title, body).await;
        }

        Ok(Some(notification))
    }

    /// Mark one notification as read; scoped to the recipient so a
    /// session cannot touch someone else's inbox.
    pub async fn mark_read(&self, notification_id: Uuid, recipient: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = true
            WHERE id = $1 AND recipient_id = $2 AND is_read = false
            "#,
        )
        .bind(notification_id)
        .bind(recipient)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Load the recipient's preferences, creating the default row on first
    /// contact. The fan-out only ever reads preferences; mutation belongs
    /// to the settings surface.
    pub async fn get_or_create_preferences(
        &self,
        user_id: Uuid,
    ) -> AppResult<NotificationPreference> {
        let existing = sqlx::query_as::<_, NotificationPreference>(
            r#"
            SELECT user_id, email_reactions, email_comments, email_mentions, email_messages,
                   push_reactions, push_comments, push_mentions, push_messages, updated_at
            FROM notification_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        if let Some(preferences) = existing {
            return Ok(preferences);
        }

        let defaults = NotificationPreference::defaults(user_id);
        sqlx::query(
            r#"
            INSERT INTO notification_preferences (
                user_id, email_reactions, email_comments, email_mentions, email_messages,
                push_reactions, push_comments, push_mentions, push_messages
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(defaults.user_id)
        .bind(defaults.email_reactions)
        .bind(defaults.email_comments)
        .bind(defaults.email_mentions)
        .bind(defaults.email_messages)
        .bind(defaults.push_reactions)
        .bind(defaults.push_comments)
        .bind(defaults.push_mentions)
        .bind(defaults.push_messages)
        .execute(&self.db)
        .await?;

        Ok(defaults)
    }

    /// Hand a mail to the gateway. Everything about this path is
    /// best-effort: no gateway, unknown address and gateway errors all end
    /// at a log line.
    async fn send_mail(&self, recipient: Uuid, subject: &str, body: &str) {
        let Some(mail) = &self.mail else {
            return;
        };

        let address: Option<String> = match sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
            .bind(recipient)
            .fetch_optional(&self.db)
            .await
        {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!(error = %e, recipient = %recipient, "mail address lookup failed");
                return;
            }
        };

        let Some(address) = address else {
            tracing::debug!(recipient = %recipient, "no mail address on file");
            return;
        };

        if let Err(e) = mail.send(&address, subject, body).await {
            tracing::warn!(error = %e, recipient = %recipient, "mail delivery failed");
        }
    }

    /// Resolve a set of usernames (from @mentions) to user ids.
    pub async fn resolve_usernames(&self, usernames: &[String]) -> AppResult<Vec<Uuid>> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM users WHERE lower(username) = ANY($1)",
        )
        .bind(usernames)
        .fetch_all(&self.db)
        .await?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_passes_through() {
        assert_eq!(preview("hello", 80), "hello");
    }

    #[test]
    fn long_content_is_truncated_with_ellipsis() {
        let long = "a".repeat(120);
        let shortened = preview(&long, 80);
        assert_eq!(shortened.chars().count(), 81);
        assert!(shortened.ends_with('…'));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let content = "héllo wörld ".repeat(20);
        let shortened = preview(&content, 10);
        assert_eq!(shortened.chars().count(), 11);
    }
}
