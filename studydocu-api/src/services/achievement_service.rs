use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::Database;
use crate::error::Result;
use crate::models::{evaluate, AchievementCode, AchievementStatus, ContributionStats};
use crate::services::gamification::{GamificationService, PointEvent};

pub struct AchievementService {
    db: Database,
}

impl AchievementService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Uploads and likes received from other users.
    pub async fn stats(&self, user_id: Uuid) -> Result<ContributionStats> {
        let (uploads, likes_received): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM documents WHERE owner_id = $1),
                (SELECT COUNT(*) FROM reactions r
                    JOIN documents d ON d.id = r.document_id
                    WHERE d.owner_id = $1 AND r.kind = 'like' AND r.user_id <> $1)
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db.pg)
        .await?;

        Ok(ContributionStats {
            uploads,
            likes_received,
        })
    }

    /// Grants every achievement whose threshold is met and was not held yet.
    /// Rewards are paid only for rows this call inserted.
    pub async fn check_and_grant(&self, user_id: Uuid) -> Result<Vec<AchievementCode>> {
        let stats = self.stats(user_id).await?;
        let gamification = GamificationService::new(self.db.clone());
        let mut granted = Vec::new();

        for code in evaluate(&stats) {
            let inserted = sqlx::query(
                r#"
                INSERT INTO user_achievements (user_id, achievement_code)
                VALUES ($1, $2)
                ON CONFLICT (user_id, achievement_code) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(code.as_str())
            .execute(&self.db.pg)
            .await?
            .rows_affected();

            if inserted == 1 {
                gamification
                    .award_or_log(user_id, PointEvent::AchievementUnlocked(code.points_reward()))
                    .await;
                tracing::info!(user_id = %user_id, achievement = code.as_str(), "Achievement unlocked");
                granted.push(code);
            }
        }

        Ok(granted)
    }

    pub async fn check_and_grant_or_log(&self, user_id: Uuid) {
        if let Err(e) = self.check_and_grant(user_id).await {
            tracing::warn!(user_id = %user_id, error = %e, "Achievement check failed");
        }
    }

    /// Full catalog with the caller's unlock dates filled in.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<AchievementStatus>> {
        let rows: Vec<(String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT achievement_code, granted_at FROM user_achievements WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.db.pg)
        .await?;

        Ok(AchievementCode::ALL
            .into_iter()
            .map(|code| {
                let granted_at = rows
                    .iter()
                    .find(|(c, _)| AchievementCode::parse(c) == Some(code))
                    .map(|(_, at)| *at);
                AchievementStatus::new(code, granted_at)
            })
            .collect())
    }

    pub async fn count_unlocked(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_achievements WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.db.pg)
                .await?;

        Ok(count)
    }
}
