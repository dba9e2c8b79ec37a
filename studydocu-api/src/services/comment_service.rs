use uuid::Uuid;
use validator::Validate;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::{Comment, CreateComment, DocumentStatus};
use crate::services::document_service::can_view;
use crate::services::gamification::{GamificationService, PointEvent};
use crate::utils::{Page, Pagination};

pub struct CommentService {
    db: Database,
}

impl CommentService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        document_id: Uuid,
        author: &CurrentUser,
        input: &CreateComment,
    ) -> Result<Comment> {
        input.validate()?;
        let body = input.body.trim();
        if body.is_empty() {
            return Err(AppError::BadRequest("El comentario no puede estar vacío".to_string()));
        }

        let comment: Comment = sqlx::query_as(
            r#"
            WITH inserted AS (
                INSERT INTO comments (document_id, author_id, body)
                SELECT id, $2, $3 FROM documents WHERE id = $1 AND status = $4
                RETURNING *
            )
            SELECT i.id, i.document_id, i.author_id, p.full_name AS author_name,
                   p.avatar_url AS author_avatar, i.body, i.created_at
            FROM inserted i
            JOIN profiles p ON p.id = i.author_id
            "#,
        )
        .bind(document_id)
        .bind(author.id)
        .bind(body)
        .bind(DocumentStatus::Approved.as_str())
        .fetch_optional(&self.db.pg)
        .await?
        .ok_or_else(|| AppError::not_found("Documento"))?;

        GamificationService::new(self.db.clone())
            .award_or_log(author.id, PointEvent::CommentPosted)
            .await;

        Ok(comment)
    }

    /// Newest first. Comments follow their document's visibility.
    pub async fn list(
        &self,
        document_id: Uuid,
        viewer: Option<&CurrentUser>,
        pagination: &Pagination,
    ) -> Result<Page<Comment>> {
        let (status, owner_id): (String, Uuid) =
            sqlx::query_as("SELECT status, owner_id FROM documents WHERE id = $1")
                .bind(document_id)
                .fetch_optional(&self.db.pg)
                .await?
                .ok_or_else(|| AppError::not_found("Documento"))?;
        if !can_view(status == DocumentStatus::Approved.as_str(), owner_id, viewer) {
            return Err(AppError::not_found("Documento"));
        }

        let comments: Vec<Comment> = sqlx::query_as(
            r#"
            SELECT c.id, c.document_id, c.author_id, p.full_name AS author_name,
                   p.avatar_url AS author_avatar, c.body, c.created_at
            FROM comments c
            JOIN profiles p ON p.id = c.author_id
            WHERE c.document_id = $1
            ORDER BY c.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(document_id)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset())
        .fetch_all(&self.db.pg)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE document_id = $1")
            .bind(document_id)
            .fetch_one(&self.db.pg)
            .await?;

        Ok(Page::new(comments, total, pagination))
    }

    /// Authors delete their own comments; admins delete any.
    pub async fn delete(&self, comment_id: Uuid, actor: &CurrentUser) -> Result<()> {
        let author_id: Uuid = sqlx::query_scalar("SELECT author_id FROM comments WHERE id = $1")
            .bind(comment_id)
            .fetch_optional(&self.db.pg)
            .await?
            .ok_or_else(|| AppError::not_found("Comentario"))?;

        if !actor.can_manage(author_id) {
            return Err(AppError::Forbidden);
        }

        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.db.pg)
            .await?;

        tracing::info!(comment_id = %comment_id, actor_id = %actor.id, "Comment deleted");
        Ok(())
    }
}
