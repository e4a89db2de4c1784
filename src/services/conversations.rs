//! Room message storage: conversations, direct messages, post comments
//! and stream chat all persist through the same table, keyed by room.

use crate::error::{AppError, AppResult};
use crate::models::message::{MessageKind, RoomMessage};
use crate::models::room::Room;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct ConversationService {
    db: PgPool,
    max_reply_depth: i32,
}

impl ConversationService {
    pub fn new(db: PgPool, max_reply_depth: i32) -> Self {
        Self {
            db,
            max_reply_depth,
        }
    }

    /// Whether the user belongs to a group conversation.
    pub async fn is_member(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let member: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM conversation_members
                WHERE conversation_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(member)
    }

    /// Persist a chat message. Validation happens here so every room kind
    /// shares it: content must be non-empty and a reply parent must live
    /// in the same room and sit above the depth limit.
    pub async fn create_message(
        &self,
        room: &Room,
        sender_id: Uuid,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> AppResult<RoomMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::BadRequest("message content cannot be empty".into()));
        }

        if let Some(parent_id) = parent_id {
            let depth = self.reply_depth(room, parent_id).await?;
            if depth >= self.max_reply_depth {
                return Err(AppError::BadRequest(format!(
                    "reply depth limit of {} exceeded",
                    self.max_reply_depth
                )));
            }
        }

        let message = sqlx::query_as::<_, RoomMessage>(
            r#"
            INSERT INTO room_messages (id, room_key, sender_id, kind, content, parent_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, room_key, sender_id, kind, content, parent_id,
                      flag_count, is_flagged, is_moderated, moderated_by, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(room.key())
        .bind(sender_id)
        .bind(MessageKind::Chat.as_str())
        .bind(content)
        .bind(parent_id)
        .fetch_one(&self.db)
        .await?;

        Ok(message)
    }

    /// Depth of the reply chain above `parent_id` (a top-level parent is
    /// depth 1). The walk is bounded by the configured limit instead of
    /// trusting the data to be acyclic.
    async fn reply_depth(&self, room: &Room, parent_id: Uuid) -> AppResult<i32> {
        let mut depth = 1;
        let mut current = parent_id;

        loop {
            let parent: Option<Option<Uuid>> = sqlx::query_scalar(
                "SELECT parent_id FROM room_messages WHERE id = $1 AND room_key = $2",
            )
            .bind(current)
            .bind(room.key())
            .fetch_optional(&self.db)
            .await?;

            match parent {
                None => return Err(AppError::BadRequest("reply parent not found".into())),
                Some(None) => return Ok(depth),
                Some(Some(grandparent)) => {
                    depth += 1;
                    if depth > self.max_reply_depth {
                        return Ok(depth);
                    }
                    current = grandparent;
                }
            }
        }
    }

    /// Record a read receipt. Reading your own message or re-reading one
    /// is a no-op; returns whether a new receipt was written so the caller
    /// knows to broadcast.
    pub async fn mark_read(
        &self,
        room: &Room,
        message_id: Uuid,
        reader_id: Uuid,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO message_receipts (message_id, user_id)
            SELECT id, $2 FROM room_messages
            WHERE id = $1 AND room_key = $3 AND sender_id <> $2
            ON CONFLICT (message_id, user_id) DO NOTHING
            "#,
        )
        .bind(message_id)
        .bind(reader_id)
        .bind(room.key())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Recent messages in a room, newest first. Callers serving a feed
    /// must filter with [`RoomMessage::visible_to`] so moderated content
    /// only reaches the room owner, moderators and its own author.
    pub async fn list_recent(&self, room: &Room, limit: i64) -> AppResult<Vec<RoomMessage>> {
        let messages = sqlx::query_as::<_, RoomMessage>(
            r#"
            SELECT id, room_key, sender_id, kind, content, parent_id,
                   flag_count, is_flagged, is_moderated, moderated_by, created_at
            FROM room_messages
            WHERE room_key = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(room.key())
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(messages)
    }

    /// For a direct room, the side that should be notified about a new
    /// message from `sender_id`.
    pub fn direct_recipient(room: &Room, sender_id: Uuid) -> Option<Uuid> {
        room.direct_peer(sender_id)
    }

    /// Author of the post a comment room hangs off.
    pub async fn post_author(&self, post_id: Uuid) -> AppResult<Option<Uuid>> {
        let author: Option<Uuid> = sqlx::query_scalar("SELECT author_id FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(author)
    }

    /// Sender of a message in this room, used to address reply
    /// notifications.
    pub async fn message_sender(&self, room: &Room, message_id: Uuid) -> AppResult<Option<Uuid>> {
        let sender: Option<Uuid> = sqlx::query_scalar(
            "SELECT sender_id FROM room_messages WHERE id = $1 AND room_key = $2",
        )
        .bind(message_id)
        .bind(room.key())
        .fetch_optional(&self.db)
        .await?;

        Ok(sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_recipient_is_the_peer() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let room = Room::direct(a, b);
        assert_eq!(ConversationService::direct_recipient(&room, a), Some(b));
        assert_eq!(ConversationService::direct_recipient(&room, b), Some(a));
    }

    #[test]
    fn non_direct_rooms_have_no_recipient() {
        let room = Room::Conversation(Uuid::new_v4());
        assert_eq!(
            ConversationService::direct_recipient(&room, Uuid::new_v4()),
            None
        );
    }
}
