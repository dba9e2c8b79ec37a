use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{like_award_due, DocumentStatus, ReactionCounts, ReactionKind, ReactionState};
use crate::services::achievement_service::AchievementService;
use crate::services::gamification::{GamificationService, PointEvent};

pub struct ReactionService {
    db: Database,
}

impl ReactionService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn document_owner(&self, document_id: Uuid) -> Result<Uuid> {
        sqlx::query_scalar("SELECT owner_id FROM documents WHERE id = $1 AND status = $2")
            .bind(document_id)
            .bind(DocumentStatus::Approved.as_str())
            .fetch_optional(&self.db.pg)
            .await?
            .ok_or_else(|| AppError::not_found("Documento"))
    }

    /// Upserts the caller's reaction. Repeating the same kind changes nothing;
    /// the owner is credited for the first like from each user and never again,
    /// however the reaction is toggled or removed afterwards.
    pub async fn react(
        &self,
        document_id: Uuid,
        user_id: Uuid,
        kind: ReactionKind,
    ) -> Result<ReactionState> {
        let owner_id = self.document_owner(document_id).await?;

        let mut tx = self.db.pg.begin().await?;

        let previous: Option<String> = sqlx::query_scalar(
            "SELECT kind FROM reactions WHERE user_id = $1 AND document_id = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(document_id)
        .fetch_optional(&mut *tx)
        .await?;
        let previous = previous.as_deref().and_then(ReactionKind::parse);

        if previous != Some(kind) {
            sqlx::query(
                r#"
                INSERT INTO reactions (user_id, document_id, kind)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id, document_id)
                DO UPDATE SET kind = EXCLUDED.kind, updated_at = NOW()
                "#,
            )
            .bind(user_id)
            .bind(document_id)
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await?;
        }

        let first_credit = if kind == ReactionKind::Like && owner_id != user_id {
            sqlx::query(
                "INSERT INTO like_awards (user_id, document_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(document_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
                == 1
        } else {
            false
        };

        tx.commit().await?;

        if like_award_due(kind, user_id, owner_id, first_credit) {
            GamificationService::new(self.db.clone())
                .award_or_log(owner_id, PointEvent::LikeReceived)
                .await;
            AchievementService::new(self.db.clone())
                .check_and_grant_or_log(owner_id)
                .await;
        }

        self.state(document_id, Some(user_id)).await
    }

    pub async fn remove(&self, document_id: Uuid, user_id: Uuid) -> Result<ReactionState> {
        sqlx::query("DELETE FROM reactions WHERE user_id = $1 AND document_id = $2")
            .bind(user_id)
            .bind(document_id)
            .execute(&self.db.pg)
            .await?;

        self.state(document_id, Some(user_id)).await
    }

    pub async fn state(&self, document_id: Uuid, user_id: Option<Uuid>) -> Result<ReactionState> {
        let counts: ReactionCounts = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE kind = 'like') AS likes,
                COUNT(*) FILTER (WHERE kind = 'dislike') AS dislikes
            FROM reactions
            WHERE document_id = $1
            "#,
        )
        .bind(document_id)
        .fetch_one(&self.db.pg)
        .await?;

        let my_reaction = match user_id {
            Some(user_id) => {
                let kind: Option<String> = sqlx::query_scalar(
                    "SELECT kind FROM reactions WHERE user_id = $1 AND document_id = $2",
                )
                .bind(user_id)
                .bind(document_id)
                .fetch_optional(&self.db.pg)
                .await?;
                kind.as_deref().and_then(ReactionKind::parse)
            }
            None => None,
        };

        Ok(ReactionState {
            counts,
            my_reaction,
        })
    }
}
