//! Room-scoped bans.
//!
//! An active ban keeps a user out of the room and rejects their messages
//! before the moderation pipeline ever runs. Bans expire by `expires_at`;
//! the room owner can never be banned from their own room.

use crate::error::{AppError, AppResult};
use crate::models::ban::RoomBan;
use crate::models::room::Room;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct BanService {
    db: PgPool,
}

impl BanService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Whether the user currently holds an active ban for the room.
    pub async fn is_banned(&self, room: &Room, user_id: Uuid) -> AppResult<bool> {
        let banned: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM room_bans
                WHERE room_key = $1 AND user_id = $2
                  AND (expires_at IS NULL OR expires_at > now())
            )
            "#,
        )
        .bind(room.key())
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(banned)
    }

    /// Issue (or refresh) a ban. `room_owner` is the authorization anchor:
    /// banning the owner of the room is always rejected. Re-banning an
    /// already banned user updates the reason and expiry in place.
    pub async fn ban(
        &self,
        room: &Room,
        room_owner: Uuid,
        user_id: Uuid,
        issued_by: Uuid,
        reason: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<RoomBan> {
        if user_id == room_owner {
            return Err(AppError::Forbidden(
                "the room owner cannot be banned from their own room".into(),
            ));
        }

        let ban = sqlx::query_as::<_, RoomBan>(
            r#"
            INSERT INTO room_bans (id, room_key, user_id, issued_by, reason, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (room_key, user_id) DO UPDATE
            SET issued_by = EXCLUDED.issued_by,
                reason = EXCLUDED.reason,
                expires_at = EXCLUDED.expires_at,
                created_at = now()
            RETURNING id, room_key, user_id, issued_by, reason, expires_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(room.key())
        .bind(user_id)
        .bind(issued_by)
        .bind(reason)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(room = %room.key(), user = %user_id, issued_by = %issued_by, "user banned");
        Ok(ban)
    }

    /// Lift a ban; lifting a ban that does not exist is a silent no-op.
    pub async fn lift(&self, room: &Room, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM room_bans WHERE room_key = $1 AND user_id = $2")
            .bind(room.key())
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}
