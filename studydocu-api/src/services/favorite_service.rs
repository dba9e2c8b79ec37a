use serde::Serialize;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{DocumentStatus, DocumentSummary};
use crate::services::document_service::SUMMARY_SELECT;
use crate::services::gamification::{GamificationService, PointEvent};
use crate::utils::{Page, Pagination};

pub struct FavoriteService {
    db: Database,
}

#[derive(Debug, Serialize)]
pub struct FavoriteState {
    pub document_id: Uuid,
    pub favorited: bool,
}

impl FavoriteService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn add(&self, document_id: Uuid, user_id: Uuid) -> Result<FavoriteState> {
        let owner_id: Uuid =
            sqlx::query_scalar("SELECT owner_id FROM documents WHERE id = $1 AND status = $2")
                .bind(document_id)
                .bind(DocumentStatus::Approved.as_str())
                .fetch_optional(&self.db.pg)
                .await?
                .ok_or_else(|| AppError::not_found("Documento"))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO favorites (user_id, document_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, document_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(document_id)
        .execute(&self.db.pg)
        .await?
        .rows_affected();

        if inserted == 1 && owner_id != user_id {
            GamificationService::new(self.db.clone())
                .award_or_log(owner_id, PointEvent::FavoriteReceived)
                .await;
        }

        Ok(FavoriteState {
            document_id,
            favorited: true,
        })
    }

    pub async fn remove(&self, document_id: Uuid, user_id: Uuid) -> Result<FavoriteState> {
        sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND document_id = $2")
            .bind(user_id)
            .bind(document_id)
            .execute(&self.db.pg)
            .await?;

        Ok(FavoriteState {
            document_id,
            favorited: false,
        })
    }

    /// Most recently saved first; documents taken down since are hidden.
    pub async fn list(&self, user_id: Uuid, pagination: &Pagination) -> Result<Page<DocumentSummary>> {
        let query = format!(
            r#"{}
            JOIN favorites f ON f.document_id = d.id
            WHERE f.user_id = $1 AND d.status = $2
            ORDER BY f.created_at DESC
            LIMIT $3 OFFSET $4"#,
            SUMMARY_SELECT
        );
        let items: Vec<DocumentSummary> = sqlx::query_as(&query)
            .bind(user_id)
            .bind(DocumentStatus::Approved.as_str())
            .bind(pagination.limit() as i64)
            .bind(pagination.offset())
            .fetch_all(&self.db.pg)
            .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM favorites f
            JOIN documents d ON d.id = f.document_id
            WHERE f.user_id = $1 AND d.status = $2
            "#,
        )
        .bind(user_id)
        .bind(DocumentStatus::Approved.as_str())
        .fetch_one(&self.db.pg)
        .await?;

        Ok(Page::new(items, total, pagination))
    }
}
