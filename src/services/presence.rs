//! Presence tracking: who is in which room right now.
//!
//! One open participant row per (room, user) at any time. Joins are
//! idempotent upserts, leaves close the row and accumulate watch time,
//! heartbeats keep `last_activity` fresh so the reaper can reclaim
//! sessions that died without saying goodbye.

use crate::error::AppResult;
use crate::models::participant::{Participant, ParticipantRole};
use crate::models::room::Room;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PresenceService {
    db: PgPool,
}

impl PresenceService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Join a room. Re-joining while already present is a no-op; joining
    /// after a leave reopens the same row with a fresh `joined_at`. The
    /// unique (room_key, user_id) constraint makes a duplicate open row
    /// impossible even under concurrent joins.
    pub async fn join(&self, room: &Room, user_id: Uuid) -> AppResult<Participant> {
        let participant = sqlx::query_as::<_, Participant>(
            r#"
            INSERT INTO participants (id, room_key, user_id, role, joined_at, left_at, last_activity, watch_time_secs)
            VALUES ($1, $2, $3, $4, now(), NULL, now(), 0)
            ON CONFLICT (room_key, user_id) DO UPDATE
            SET joined_at = CASE
                    WHEN participants.left_at IS NULL THEN participants.joined_at
                    ELSE now()
                END,
                left_at = NULL,
                last_activity = now()
            RETURNING id, room_key, user_id, role, joined_at, left_at, last_activity, watch_time_secs
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(room.key())
        .bind(user_id)
        .bind(ParticipantRole::Viewer.as_str())
        .fetch_one(&self.db)
        .await?;

        Ok(participant)
    }

    /// Leave a room: closes the open row and adds this visit to the
    /// accumulated watch time. Absence is a valid terminal state: leaving
    /// a room you are not in is a silent no-op.
    pub async fn leave(&self, room: &Room, user_id: Uuid) -> AppResult<Option<i64>> {
        let watch_time: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE participants
            SET left_at = now(),
                watch_time_secs = watch_time_secs
                    + GREATEST(EXTRACT(EPOCH FROM (now() - joined_at))::bigint, 0)
            WHERE room_key = $1 AND user_id = $2 AND left_at IS NULL
            RETURNING watch_time_secs
            "#,
        )
        .bind(room.key())
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(watch_time)
    }

    /// Refresh `last_activity` for an open participant; silent no-op when
    /// there is none.
    pub async fn heartbeat(&self, room: &Room, user_id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE participants
            SET last_activity = now()
            WHERE room_key = $1 AND user_id = $2 AND left_at IS NULL
            "#,
        )
        .bind(room.key())
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Number of currently-open participant rows in a room.
    pub async fn viewer_count(&self, room: &Room) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM participants
            WHERE room_key = $1 AND left_at IS NULL
            "#,
        )
        .bind(room.key())
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    /// Push the current viewer count onto the stream row. `peak_viewers`
    /// is a running maximum and never decreases.
    pub async fn refresh_stream_viewers(&self, stream_id: Uuid, count: i64) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE streams
            SET viewer_count = $2,
                peak_viewers = GREATEST(peak_viewers, $2)
            WHERE id = $1
            "#,
        )
        .bind(stream_id)
        .bind(count as i32)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// The open participant row for (room, user), if any.
    pub async fn open_participant(
        &self,
        room: &Room,
        user_id: Uuid,
    ) -> AppResult<Option<Participant>> {
        let participant = sqlx::query_as::<_, Participant>(
            r#"
            SELECT id, room_key, user_id, role, joined_at, left_at, last_activity, watch_time_secs
            FROM participants
            WHERE room_key = $1 AND user_id = $2 AND left_at IS NULL
            "#,
        )
        .bind(room.key())
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(participant)
    }

    /// Whether the user currently holds the moderator role in the room.
    /// The role itself is assigned from the stream settings surface; the
    /// realtime core only reads it.
    pub async fn is_moderator(&self, room: &Room, user_id: Uuid) -> AppResult<bool> {
        Ok(self
            .open_participant(room, user_id)
            .await?
            .map(|p| ParticipantRole::parse(&p.role) == ParticipantRole::Moderator)
            .unwrap_or(false))
    }

    /// Close every participant row whose heartbeat has gone stale and
    /// return the affected room keys (deduplicated). Covers sessions that
    /// vanished without a disconnect: process crashes, dropped links.
    pub async fn reap_stale(&self, ttl_secs: i64) -> AppResult<Vec<String>> {
        let rooms: Vec<String> = sqlx::query_scalar(
            r#"
            UPDATE participants
            SET left_at = now(),
                watch_time_secs = watch_time_secs
                    + GREATEST(EXTRACT(EPOCH FROM (now() - joined_at))::bigint, 0)
            WHERE left_at IS NULL
              AND last_activity < now() - ($1 * interval '1 second')
            RETURNING room_key
            "#,
        )
        .bind(ttl_secs as f64)
        .fetch_all(&self.db)
        .await?;

        let mut unique = rooms;
        unique.sort();
        unique.dedup();
        Ok(unique)
    }
}
