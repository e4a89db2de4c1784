//! Cached reaction summaries.
//!
//! A summary is the map reaction kind -> count for one target, zero-filled
//! over the whole vocabulary. Redis holds the cached copy with a TTL;
//! Postgres is the source of truth. Writers invalidate, readers recompute
//! on miss; last write wins, staleness is bounded by invalidation plus
//! the TTL, never by locking.

use crate::error::AppResult;
use crate::models::reaction::{ReactionKind, ReactionTarget};
use crate::redis_client::RedisClient;
use redis::AsyncCommands;
use sqlx::PgPool;
use std::collections::BTreeMap;

pub type ReactionSummary = BTreeMap<String, i64>;

#[derive(Clone)]
pub struct SummaryCache {
    redis: RedisClient,
    db: PgPool,
    ttl_secs: u64,
}

fn cache_key(target: &ReactionTarget) -> String {
    format!("reactions:{}:{}:summary", target.type_str(), target.id())
}

/// A summary with every known kind present at zero.
pub fn zero_filled() -> ReactionSummary {
    ReactionKind::ALL
        .iter()
        .map(|kind| (kind.as_str().to_string(), 0i64))
        .collect()
}

/// Fold grouped-count rows into a zero-filled summary. Unknown kinds
/// (left over from a retired vocabulary) are dropped rather than leaked
/// to clients.
pub fn summary_from_rows(rows: &[(String, i64)]) -> ReactionSummary {
    let mut summary = zero_filled();
    for (kind, count) in rows {
        if let Some(entry) = summary.get_mut(kind.as_str()) {
            *entry = *count;
        }
    }
    summary
}

impl SummaryCache {
    pub fn new(redis: RedisClient, db: PgPool, ttl_secs: u64) -> Self {
        Self { redis, db, ttl_secs }
    }

    /// Current summary for a target: cached copy if present, otherwise
    /// recomputed from Postgres and written back with the TTL. A broken
    /// cache degrades to straight Postgres reads.
    pub async fn summary(&self, target: &ReactionTarget) -> AppResult<ReactionSummary> {
        let key = cache_key(target);

        let mut conn = self.redis.connection().await;
        match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(raw)) => {
                if let Ok(summary) = serde_json::from_str::<ReactionSummary>(&raw) {
                    return Ok(summary);
                }
                // Unparseable cache entry: fall through and recompute.
                tracing::warn!(key = %key, "dropping unparseable summary cache entry");
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "summary cache read failed, using database");
            }
        }

        let summary = self.compute(target).await?;

        if let Ok(encoded) = serde_json::to_string(&summary) {
            if let Err(e) = conn
                .set_ex::<_, _, ()>(&key, encoded, self.ttl_secs)
                .await
            {
                tracing::warn!(error = %e, key = %key, "failed to warm summary cache");
            }
        }

        Ok(summary)
    }

    /// Drop the cached entry after a reaction change; the next read
    /// recomputes. Cache errors are logged, never surfaced; the entry
    /// expires by TTL anyway.
    pub async fn invalidate(&self, target: &ReactionTarget) {
        let key = cache_key(target);
        let mut conn = self.redis.connection().await;
        if let Err(e) = conn.del::<_, ()>(&key).await {
            tracing::warn!(error = %e, key = %key, "summary cache invalidation failed");
        }
    }

    async fn compute(&self, target: &ReactionTarget) -> AppResult<ReactionSummary> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT reaction_kind, COUNT(*) FROM reactions
            WHERE target_type = $1 AND target_id = $2
            GROUP BY reaction_kind
            "#,
        )
        .bind(target.type_str())
        .bind(target.id())
        .fetch_all(&self.db)
        .await?;

        Ok(summary_from_rows(&rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn zero_filled_covers_the_whole_vocabulary() {
        let summary = zero_filled();
        assert_eq!(summary.len(), ReactionKind::ALL.len());
        assert!(summary.values().all(|&count| count == 0));
    }

    #[test]
    fn rows_overlay_the_zero_base() {
        let rows = vec![("like".to_string(), 3i64), ("fire".to_string(), 1i64)];
        let summary = summary_from_rows(&rows);
        assert_eq!(summary["like"], 3);
        assert_eq!(summary["fire"], 1);
        assert_eq!(summary["love"], 0);
    }

    #[test]
    fn unknown_kinds_are_dropped() {
        let rows = vec![("thumbsdown".to_string(), 9i64)];
        let summary = summary_from_rows(&rows);
        assert!(!summary.contains_key("thumbsdown"));
        assert!(summary.values().all(|&count| count == 0));
    }

    #[test]
    fn cache_keys_are_target_scoped() {
        let id = Uuid::new_v4();
        assert_eq!(
            cache_key(&ReactionTarget::Post(id)),
            format!("reactions:post:{id}:summary")
        );
        assert_ne!(
            cache_key(&ReactionTarget::Post(id)),
            cache_key(&ReactionTarget::Comment(id))
        );
    }
}
