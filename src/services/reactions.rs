//! Reaction toggle engine.
//!
//! One call cycles a (user, target) pair through create -> update ->
//! remove: no prior record creates one, the same kind again removes it,
//! a different kind overwrites in place. The unique (user_id, target_type,
//! target_id) constraint is the authoritative guard against double-create
//! races; a violation is re-read and resolved as the intended toggle, not
//! surfaced as a failure.

use crate::error::{AppError, AppResult};
use crate::models::notification::NotificationKind;
use crate::models::reaction::{ReactionKind, ReactionRecord, ReactionTarget, ToggleOutcome};
use crate::services::notifications::NotificationService;
use crate::services::summary_cache::{ReactionSummary, SummaryCache};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct ReactionService {
    db: PgPool,
    cache: SummaryCache,
    notifications: Arc<NotificationService>,
}

impl ReactionService {
    pub fn new(db: PgPool, cache: SummaryCache, notifications: Arc<NotificationService>) -> Self {
        Self {
            db,
            cache,
            notifications,
        }
    }

    /// Toggle a reaction and return the outcome together with the fresh
    /// aggregate summary for the target.
    ///
    /// Side effects, in order: cache invalidation (always), then one
    /// notification to the target's owner on create/update; never on
    /// removal, never to the acting user themselves, and never allowed to
    /// fail the toggle.
    pub async fn toggle(
        &self,
        user_id: Uuid,
        target: &ReactionTarget,
        kind: ReactionKind,
    ) -> AppResult<(ToggleOutcome, ReactionSummary)> {
        let outcome = self.apply(user_id, target, kind).await?;

        self.cache.invalidate(target).await;
        let summary = self.cache.summary(target).await?;

        if outcome != ToggleOutcome::Removed {
            if let Err(e) = self.notify_owner(user_id, target, kind).await {
                tracing::warn!(error = %e, target = %target.id(), "reaction notification failed");
            }
        }

        Ok((outcome, summary))
    }

    async fn apply(
        &self,
        user_id: Uuid,
        target: &ReactionTarget,
        kind: ReactionKind,
    ) -> AppResult<ToggleOutcome> {
        match self.find(user_id, target).await? {
            None => match self.insert(user_id, target, kind).await {
                Ok(()) => Ok(ToggleOutcome::Created),
                Err(AppError::Conflict(_)) => {
                    // Lost a double-create race. Re-read and resolve: the
                    // concurrent writer already reacted, so a matching kind
                    // collapses to "already created" and a different kind
                    // becomes an update.
                    match self.find(user_id, target).await? {
                        Some(existing) if existing.reaction_kind == kind.as_str() => {
                            Ok(ToggleOutcome::Created)
                        }
                        Some(_) => {
                            self.update_kind(user_id, target, kind).await?;
                            Ok(ToggleOutcome::Updated)
                        }
                        // The racing row vanished again; ours can go in now.
                        None => {
                            self.insert(user_id, target, kind).await?;
                            Ok(ToggleOutcome::Created)
                        }
                    }
                }
                Err(other) => Err(other),
            },
            Some(existing) if existing.reaction_kind == kind.as_str() => {
                self.delete(user_id, target).await?;
                Ok(ToggleOutcome::Removed)
            }
            Some(_) => {
                self.update_kind(user_id, target, kind).await?;
                Ok(ToggleOutcome::Updated)
            }
        }
    }

    async fn find(
        &self,
        user_id: Uuid,
        target: &ReactionTarget,
    ) -> AppResult<Option<ReactionRecord>> {
        let record = sqlx::query_as::<_, ReactionRecord>(
            r#"
            SELECT id, user_id, target_type, target_id, reaction_kind, created_at
            FROM reactions
            WHERE user_id = $1 AND target_type = $2 AND target_id = $3
            "#,
        )
        .bind(user_id)
        .bind(target.type_str())
        .bind(target.id())
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }

    async fn insert(
        &self,
        user_id: Uuid,
        target: &ReactionTarget,
        kind: ReactionKind,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO reactions (id, user_id, target_type, target_id, reaction_kind)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(target.type_str())
        .bind(target.id())
        .bind(kind.as_str())
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AppError::Conflict("already reacted".into()))
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn update_kind(
        &self,
        user_id: Uuid,
        target: &ReactionTarget,
        kind: ReactionKind,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE reactions
            SET reaction_kind = $4, created_at = now()
            WHERE user_id = $1 AND target_type = $2 AND target_id = $3
            "#,
        )
        .bind(user_id)
        .bind(target.type_str())
        .bind(target.id())
        .bind(kind.as_str())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn delete(&self, user_id: Uuid, target: &ReactionTarget) -> AppResult<()> {
        // A concurrent removal leaves nothing to delete; the net state is
        // the same, so rows_affected is deliberately not checked.
        sqlx::query(
            r#"
            DELETE FROM reactions
            WHERE user_id = $1 AND target_type = $2 AND target_id = $3
            "#,
        )
        .bind(user_id)
        .bind(target.type_str())
        .bind(target.id())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// The owner of a reaction target, used as the notification recipient.
    async fn target_owner(&self, target: &ReactionTarget) -> AppResult<Option<Uuid>> {
        let query = match target {
            ReactionTarget::Post(_) => "SELECT author_id FROM posts WHERE id = $1",
            ReactionTarget::Comment(_) => "SELECT author_id FROM comments WHERE id = $1",
            ReactionTarget::Stream(_) => "SELECT owner_id FROM streams WHERE id = $1",
        };

        let owner: Option<Uuid> = sqlx::query_scalar(query)
            .bind(target.id())
            .fetch_optional(&self.db)
            .await?;

        Ok(owner)
    }

    async fn notify_owner(
        &self,
        actor: Uuid,
        target: &ReactionTarget,
        kind: ReactionKind,
    ) -> AppResult<()> {
        let Some(owner) = self.target_owner(target).await? else {
            return Ok(());
        };

        self.notifications
            .notify(
                owner,
                Some(actor),
                NotificationKind::Reaction,
                "New reaction",
                &format!("Your {} received a {} reaction", target.type_str(), kind.as_str()),
                Some((target.type_str(), target.id())),
            )
            .await?;

        Ok(())
    }
}
