//! Chat moderation pipeline.
//!
//! Two entry points, the automatic screen on message creation and manual
//! flagging, funnel through one escalation step: once `flag_count`
//! reaches the threshold the message is flagged *and* moderated, and that
//! transition is monotonic. Moderated content disappears from the regular
//! feed but stays visible to the room owner and moderators.

use crate::error::{AppError, AppResult};
use crate::models::message::{RoomMessage, AUTO_MODERATE_THRESHOLD};
use sqlx::PgPool;
use uuid::Uuid;

/// Substrings that auto-flag a message on arrival (matched
/// case-insensitively).
const SUSPICIOUS_KEYWORDS: [&str; 5] = ["spam", "http://", "https://", "buy now", "click here"];

/// Whether message content trips the denylist.
pub fn contains_suspicious_content(content: &str) -> bool {
    let lowered = content.to_lowercase();
    SUSPICIOUS_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// The shared threshold check used by both the keyword path and manual
/// flags.
pub fn should_auto_moderate(flag_count: i32) -> bool {
    flag_count >= AUTO_MODERATE_THRESHOLD
}

#[derive(Clone)]
pub struct ModerationService {
    db: PgPool,
}

impl ModerationService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Screen a freshly persisted message. Suspicious content flags it,
    /// logs a system moderation entry and runs the escalation step. The
    /// message is updated in place so the caller broadcasts the final
    /// state.
    pub async fn screen_new_message(&self, message: &mut RoomMessage) -> AppResult<()> {
        if !contains_suspicious_content(&message.content) {
            return Ok(());
        }

        let (flag_count, is_flagged): (i32, bool) = sqlx::query_as(
            r#"
            UPDATE room_messages
            SET is_flagged = true, flag_count = flag_count + 1
            WHERE id = $1
            RETURNING flag_count, is_flagged
            "#,
        )
        .bind(message.id)
        .fetch_one(&self.db)
        .await?;

        message.flag_count = flag_count;
        message.is_flagged = is_flagged;

        self.log(
            &message.room_key,
            "message auto-flagged",
            None,
            Some(message.sender_id),
            "matched suspicious keyword",
        )
        .await?;

        self.escalate_if_needed(message).await
    }

    /// Manual flag by a viewer or moderator. `room_key` scopes the lookup
    /// so a message id from another room cannot be flagged through this
    /// session.
    pub async fn flag_message(
        &self,
        room_key: &str,
        message_id: Uuid,
        flagged_by: Uuid,
    ) -> AppResult<RoomMessage> {
        let mut message = sqlx::query_as::<_, RoomMessage>(
            r#"
            UPDATE room_messages
            SET is_flagged = true, flag_count = flag_count + 1
            WHERE id = $1 AND room_key = $2
            RETURNING id, room_key, sender_id, kind, content, parent_id,
                      flag_count, is_flagged, is_moderated, moderated_by, created_at
            "#,
        )
        .bind(message_id)
        .bind(room_key)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound)?;

        self.log(
            room_key,
            "message flagged",
            Some(flagged_by),
            Some(message.sender_id),
            &format!("flag count: {}", message.flag_count),
        )
        .await?;

        self.escalate_if_needed(&mut message).await?;
        Ok(message)
    }

    /// The single escalation step both paths share. Once moderated, a
    /// message never auto-reverts; the guard on `is_moderated` keeps the
    /// log free of duplicate escalation entries.
    async fn escalate_if_needed(&self, message: &mut RoomMessage) -> AppResult<()> {
        if message.is_moderated || !should_auto_moderate(message.flag_count) {
            return Ok(());
        }

        sqlx::query(
            r#"
            UPDATE room_messages
            SET is_moderated = true, is_flagged = true
            WHERE id = $1
            "#,
        )
        .bind(message.id)
        .execute(&self.db)
        .await?;

        message.is_moderated = true;
        message.is_flagged = true;

        self.log(
            &message.room_key,
            "message auto-moderated",
            None,
            Some(message.sender_id),
            &format!("moderated after {} flags", message.flag_count),
        )
        .await?;

        tracing::info!(
            message_id = %message.id,
            room = %message.room_key,
            flag_count = message.flag_count,
            "message auto-moderated"
        );

        Ok(())
    }

    async fn log(
        &self,
        room_key: &str,
        action: &str,
        performed_by: Option<Uuid>,
        target_user: Option<Uuid>,
        notes: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO moderation_log (id, room_key, action, performed_by, target_user, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(room_key)
        .bind(action)
        .bind(performed_by)
        .bind(target_user)
        .bind(notes)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denylist_matches_are_case_insensitive() {
        assert!(contains_suspicious_content("BUY NOW while stocks last"));
        assert!(contains_suspicious_content("this is Spam"));
        assert!(contains_suspicious_content("see https://example.com"));
        assert!(contains_suspicious_content("Click Here for riches"));
    }

    #[test]
    fn clean_content_passes() {
        assert!(!contains_suspicious_content("great stream, loved the demo"));
        assert!(!contains_suspicious_content(""));
    }

    #[test]
    fn substring_matches_inside_words() {
        // The denylist is substring-based on purpose; "spammer" trips it.
        assert!(contains_suspicious_content("what a spammer"));
    }

    #[test]
    fn escalation_threshold_is_three() {
        assert!(!should_auto_moderate(0));
        assert!(!should_auto_moderate(2));
        assert!(should_auto_moderate(3));
        assert!(should_auto_moderate(10));
    }
}
