//! Stream authorization and owner-only lifecycle control.

use crate::error::{AppError, AppResult};
use crate::models::stream::{Stream, StreamPrivacy};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct StreamService {
    db: PgPool,
}

impl StreamService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get(&self, stream_id: Uuid) -> AppResult<Option<Stream>> {
        let stream = sqlx::query_as::<_, Stream>(
            r#"
            SELECT id, owner_id, title, privacy, status, viewer_count, peak_viewers,
                   started_at, ended_at, created_at
            FROM streams
            WHERE id = $1
            "#,
        )
        .bind(stream_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(stream)
    }

    /// Privacy check for joining a stream room: public streams admit
    /// anyone, friends-only streams admit the owner's friends, private
    /// streams admit only the owner.
    pub async fn can_view(&self, stream: &Stream, user_id: Uuid) -> AppResult<bool> {
        if user_id == stream.owner_id {
            return Ok(true);
        }

        match StreamPrivacy::parse(&stream.privacy) {
            StreamPrivacy::Public => Ok(true),
            StreamPrivacy::Friends => self.are_friends(stream.owner_id, user_id).await,
            StreamPrivacy::Private => Ok(false),
        }
    }

    async fn are_friends(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
        let friends: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM friendships
                WHERE (user_id = $1 AND friend_id = $2)
                   OR (user_id = $2 AND friend_id = $1)
            )
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.db)
        .await?;

        Ok(friends)
    }

    /// Go live. Idempotent: starting an already-live stream changes
    /// nothing. Only the owner may control the stream.
    pub async fn start(&self, stream_id: Uuid, by: Uuid) -> AppResult<Stream> {
        let stream = self.owned_stream(stream_id, by).await?;

        if stream.is_live() {
            return Ok(stream);
        }

        let updated = sqlx::query_as::<_, Stream>(
            r#"
            UPDATE streams
            SET status = 'live', started_at = now(), ended_at = NULL
            WHERE id = $1
            RETURNING id, owner_id, title, privacy, status, viewer_count, peak_viewers,
                      started_at, ended_at, created_at
            "#,
        )
        .bind(stream_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(stream = %stream_id, "stream started");
        Ok(updated)
    }

    /// End a live stream; ending a stream that is not live is a no-op.
    pub async fn end(&self, stream_id: Uuid, by: Uuid) -> AppResult<Stream> {
        let stream = self.owned_stream(stream_id, by).await?;

        if !stream.is_live() {
            return Ok(stream);
        }

        let updated = sqlx::query_as::<_, Stream>(
            r#"
            UPDATE streams
            SET status = 'ended', ended_at = now()
            WHERE id = $1
            RETURNING id, owner_id, title, privacy, status, viewer_count, peak_viewers,
                      started_at, ended_at, created_at
            "#,
        )
        .bind(stream_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(stream = %stream_id, "stream ended");
        Ok(updated)
    }

    pub async fn update_title(&self, stream_id: Uuid, by: Uuid, title: &str) -> AppResult<Stream> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::BadRequest("title cannot be empty".into()));
        }

        self.owned_stream(stream_id, by).await?;

        let updated = sqlx::query_as::<_, Stream>(
            r#"
            UPDATE streams
            SET title = $2
            WHERE id = $1
            RETURNING id, owner_id, title, privacy, status, viewer_count, peak_viewers,
                      started_at, ended_at, created_at
            "#,
        )
        .bind(stream_id)
        .bind(title)
        .fetch_one(&self.db)
        .await?;

        Ok(updated)
    }

    async fn owned_stream(&self, stream_id: Uuid, by: Uuid) -> AppResult<Stream> {
        let stream = self.get(stream_id).await?.ok_or(AppError::NotFound)?;
        if stream.owner_id != by {
            return Err(AppError::Forbidden(
                "only the streamer can control the stream".into(),
            ));
        }
        Ok(stream)
    }
}
