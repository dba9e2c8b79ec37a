//! Document lifecycle: upload, browse, download and moderation state changes.

use std::sync::Arc;

use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::db::Database;
use crate::error::{conflict_on_unique, AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::{
    Document, DocumentFilters, DocumentMetadata, DocumentStatus, DocumentSummary, DocumentType,
    NewDocument, UpdateDocument,
};
use crate::parser;
use crate::services::achievement_service::AchievementService;
use crate::services::gamification::{GamificationService, PointEvent};
use crate::storage::{document_key, ObjectStore};
use crate::utils::{like_pattern, Page, Pagination};

const DUPLICATE_MESSAGE: &str = "Este documento ya fue subido a StudyDocu";

/// Listing columns shared by browse, favorites, own uploads and the
/// moderation queue. Callers append the WHERE clause.
pub(crate) const SUMMARY_SELECT: &str = r#"
    SELECT
        d.id, d.owner_id, p.full_name AS owner_name, d.title, d.subject,
        d.university, d.career, d.document_type, d.page_count, d.status,
        d.is_premium, d.views_count, d.downloads_count,
        (SELECT COUNT(*) FROM reactions r WHERE r.document_id = d.id AND r.kind = 'like') AS likes_count,
        (SELECT COUNT(*) FROM comments c WHERE c.document_id = d.id) AS comments_count,
        d.created_at
    FROM documents d
    JOIN profiles p ON p.id = d.owner_id
"#;

pub struct DocumentService {
    db: Database,
    storage: Arc<dyn ObjectStore>,
}

#[derive(Debug, Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: Document,
    pub owner_name: String,
    pub likes_count: i64,
    pub dislikes_count: i64,
    pub comments_count: i64,
    pub favorites_count: i64,
}

#[derive(Debug, Serialize)]
pub struct DownloadLink {
    pub url: String,
    pub file_name: String,
}

pub fn check_size(len: usize, max_bytes: usize) -> Result<()> {
    if len == 0 {
        return Err(AppError::BadRequest("El archivo está vacío".to_string()));
    }
    if len > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "El archivo supera el máximo de {} MB",
            max_bytes / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Approved documents are public; anything else only to its owner and admins.
pub fn can_view(is_approved: bool, owner_id: Uuid, viewer: Option<&CurrentUser>) -> bool {
    is_approved || viewer.map(|v| v.can_manage(owner_id)).unwrap_or(false)
}

/// Admin uploads skip the moderation queue.
pub fn initial_status(uploader: &CurrentUser) -> DocumentStatus {
    if uploader.is_admin() {
        DocumentStatus::Approved
    } else {
        DocumentStatus::Pending
    }
}

fn push_browse_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &DocumentFilters) {
    qb.push(" WHERE d.status = ").push_bind(DocumentStatus::Approved.as_str());

    if let Some(subject) = filters.subject.as_deref().filter(|s| !s.trim().is_empty()) {
        qb.push(" AND d.subject ILIKE ")
            .push_bind(like_pattern(subject))
            .push(" ESCAPE '\\'");
    }
    if let Some(university) = filters.university.as_deref().filter(|s| !s.trim().is_empty()) {
        qb.push(" AND LOWER(d.university) = LOWER(")
            .push_bind(university.trim().to_string())
            .push(")");
    }
    if let Some(career) = filters.career.as_deref().filter(|s| !s.trim().is_empty()) {
        qb.push(" AND LOWER(d.career) = LOWER(")
            .push_bind(career.trim().to_string())
            .push(")");
    }
    if let Some(document_type) = filters.document_type {
        qb.push(" AND d.document_type = ").push_bind(document_type.as_str());
    }
    if let Some(search) = filters.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        qb.push(" AND (d.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR d.description ILIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

impl DocumentService {
    pub fn new(db: Database, storage: Arc<dyn ObjectStore>) -> Self {
        Self { db, storage }
    }

    pub async fn upload(
        &self,
        uploader: &CurrentUser,
        metadata: DocumentMetadata,
        file_name: &str,
        bytes: Vec<u8>,
        max_bytes: usize,
    ) -> Result<Document> {
        metadata.validate()?;
        check_size(bytes.len(), max_bytes)?;

        let (parsed, bytes) = parser::parse_owned(file_name.to_string(), bytes).await?;

        let duplicate: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM documents WHERE file_hash = $1)")
                .bind(&parsed.sha256)
                .fetch_one(&self.db.pg)
                .await?;
        if duplicate {
            return Err(AppError::Conflict(DUPLICATE_MESSAGE.to_string()));
        }

        let key = document_key(
            uploader.id,
            &parsed.sha256,
            Uuid::new_v4(),
            parsed.kind.extension(),
        );
        self.storage
            .put(&key, bytes, parsed.kind.content_type())
            .await?;

        let new_document = NewDocument {
            owner_id: uploader.id,
            metadata,
            file_key: key.clone(),
            file_name: file_name.to_string(),
            content_type: parsed.kind.content_type().to_string(),
            file_size: parsed.size_bytes as i64,
            file_hash: parsed.sha256.clone(),
            page_count: parsed.page_count.map(|p| p as i32),
            status: initial_status(uploader),
        };

        let document = match self.insert(&new_document).await {
            Ok(document) => document,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&key).await {
                    tracing::warn!(key = %key, error = %cleanup, "Failed to remove orphaned upload");
                }
                return Err(e);
            }
        };

        tracing::info!(
            document_id = %document.id,
            owner_id = %uploader.id,
            status = %document.status,
            size = document.file_size,
            "Document uploaded"
        );

        GamificationService::new(self.db.clone())
            .award_or_log(uploader.id, PointEvent::DocumentUploaded)
            .await;
        AchievementService::new(self.db.clone())
            .check_and_grant_or_log(uploader.id)
            .await;

        Ok(document)
    }

    async fn insert(&self, new: &NewDocument) -> Result<Document> {
        let document_type = new.metadata.document_type.unwrap_or(DocumentType::Otro);

        sqlx::query_as(
            r#"
            INSERT INTO documents (
                owner_id, title, description, subject, university, career, document_type,
                file_key, file_name, content_type, file_size, file_hash, page_count, status, is_premium
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(new.owner_id)
        .bind(new.metadata.title.trim())
        .bind(&new.metadata.description)
        .bind(new.metadata.subject.trim())
        .bind(&new.metadata.university)
        .bind(&new.metadata.career)
        .bind(document_type.as_str())
        .bind(&new.file_key)
        .bind(&new.file_name)
        .bind(&new.content_type)
        .bind(new.file_size)
        .bind(&new.file_hash)
        .bind(new.page_count)
        .bind(new.status.as_str())
        .bind(new.metadata.is_premium)
        .fetch_one(&self.db.pg)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_MESSAGE))
    }

    /// Approved documents only.
    pub async fn browse(
        &self,
        filters: &DocumentFilters,
        pagination: &Pagination,
    ) -> Result<Page<DocumentSummary>> {
        let mut qb = QueryBuilder::<Postgres>::new(SUMMARY_SELECT);
        push_browse_filters(&mut qb, filters);
        qb.push(" ORDER BY ")
            .push(filters.sort.order_by())
            .push(" LIMIT ")
            .push_bind(pagination.limit() as i64)
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let items: Vec<DocumentSummary> = qb.build_query_as().fetch_all(&self.db.pg).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents d");
        push_browse_filters(&mut count, filters);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db.pg).await?;

        Ok(Page::new(items, total, pagination))
    }

    pub async fn find(&self, id: Uuid) -> Result<Document> {
        sqlx::query_as("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db.pg)
            .await?
            .ok_or_else(|| AppError::not_found("Documento"))
    }

    /// Unapproved documents are only visible to their owner and admins.
    pub async fn find_visible(&self, id: Uuid, viewer: Option<&CurrentUser>) -> Result<Document> {
        let document = self.find(id).await?;
        if !can_view(document.is_approved(), document.owner_id, viewer) {
            return Err(AppError::not_found("Documento"));
        }
        Ok(document)
    }

    pub async fn detail(&self, id: Uuid, viewer: Option<&CurrentUser>) -> Result<DocumentDetail> {
        let mut document = self.find_visible(id, viewer).await?;

        document.views_count = sqlx::query_scalar(
            "UPDATE documents SET views_count = views_count + 1 WHERE id = $1 RETURNING views_count",
        )
        .bind(id)
        .fetch_one(&self.db.pg)
        .await?;

        let (owner_name, likes_count, dislikes_count, comments_count, favorites_count): (
            String,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                (SELECT full_name FROM profiles WHERE id = $2),
                (SELECT COUNT(*) FROM reactions WHERE document_id = $1 AND kind = 'like'),
                (SELECT COUNT(*) FROM reactions WHERE document_id = $1 AND kind = 'dislike'),
                (SELECT COUNT(*) FROM comments WHERE document_id = $1),
                (SELECT COUNT(*) FROM favorites WHERE document_id = $1)
            "#,
        )
        .bind(id)
        .bind(document.owner_id)
        .fetch_one(&self.db.pg)
        .await?;

        Ok(DocumentDetail {
            document,
            owner_name,
            likes_count,
            dislikes_count,
            comments_count,
            favorites_count,
        })
    }

    pub async fn download(&self, id: Uuid, viewer: Option<&CurrentUser>) -> Result<DownloadLink> {
        let document = self.find_visible(id, viewer).await?;

        if document.is_premium {
            let viewer = viewer.ok_or(AppError::Unauthorized)?;
            if !viewer.can_manage(document.owner_id) {
                let is_premium: bool =
                    sqlx::query_scalar("SELECT is_premium FROM profiles WHERE id = $1")
                        .bind(viewer.id)
                        .fetch_optional(&self.db.pg)
                        .await?
                        .unwrap_or(false);
                if !is_premium {
                    return Err(AppError::Forbidden);
                }
            }
        }

        let url = self
            .storage
            .download_url(&document.file_key, &document.file_name)
            .await?;

        sqlx::query("UPDATE documents SET downloads_count = downloads_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.db.pg)
            .await?;

        Ok(DownloadLink {
            url,
            file_name: document.file_name,
        })
    }

    pub async fn update(
        &self,
        id: Uuid,
        editor: &CurrentUser,
        input: &UpdateDocument,
    ) -> Result<Document> {
        let document = self.find(id).await?;
        if !editor.can_manage(document.owner_id) {
            return Err(AppError::Forbidden);
        }

        let updated: Document = sqlx::query_as(
            r#"
            UPDATE documents SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                subject = COALESCE($4, subject),
                university = COALESCE($5, university),
                career = COALESCE($6, career),
                document_type = COALESCE($7, document_type),
                is_premium = COALESCE($8, is_premium),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.title.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.subject.as_deref().map(str::trim))
        .bind(&input.university)
        .bind(&input.career)
        .bind(input.document_type.map(|t| t.as_str()))
        .bind(input.is_premium)
        .fetch_one(&self.db.pg)
        .await?;

        Ok(updated)
    }

    /// Row first, then the stored file; a failed file delete is only logged.
    pub async fn delete(&self, id: Uuid, actor: &CurrentUser) -> Result<()> {
        let document = self.find(id).await?;
        if !actor.can_manage(document.owner_id) {
            return Err(AppError::Forbidden);
        }

        sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.db.pg)
            .await?;

        if let Err(e) = self.storage.delete(&document.file_key).await {
            tracing::warn!(document_id = %id, key = %document.file_key, error = %e, "Failed to delete stored file");
        }

        tracing::info!(document_id = %id, actor_id = %actor.id, "Document deleted");
        Ok(())
    }

    /// Own uploads in every status.
    pub async fn list_own(
        &self,
        owner_id: Uuid,
        pagination: &Pagination,
    ) -> Result<Page<DocumentSummary>> {
        let query = format!(
            "{} WHERE d.owner_id = $1 ORDER BY d.created_at DESC LIMIT $2 OFFSET $3",
            SUMMARY_SELECT
        );
        let items: Vec<DocumentSummary> = sqlx::query_as(&query)
            .bind(owner_id)
            .bind(pagination.limit() as i64)
            .bind(pagination.offset())
            .fetch_all(&self.db.pg)
            .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.db.pg)
            .await?;

        Ok(Page::new(items, total, pagination))
    }

    /// Moderation queue; oldest first so nothing waits forever.
    pub async fn moderation_queue(
        &self,
        status: DocumentStatus,
        pagination: &Pagination,
    ) -> Result<Page<DocumentSummary>> {
        let query = format!(
            "{} WHERE d.status = $1 ORDER BY d.created_at ASC LIMIT $2 OFFSET $3",
            SUMMARY_SELECT
        );
        let items: Vec<DocumentSummary> = sqlx::query_as(&query)
            .bind(status.as_str())
            .bind(pagination.limit() as i64)
            .bind(pagination.offset())
            .fetch_all(&self.db.pg)
            .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.db.pg)
            .await?;

        Ok(Page::new(items, total, pagination))
    }

    /// Moves a document to `next`, returning it with the status it had before.
    async fn transition(
        &self,
        id: Uuid,
        next: DocumentStatus,
        reason: Option<&str>,
        required_from: Option<DocumentStatus>,
    ) -> Result<(Document, String)> {
        let mut tx = self.db.pg.begin().await?;

        let previous: String = sqlx::query_scalar("SELECT status FROM documents WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Documento"))?;

        if let Some(required) = required_from {
            if previous != required.as_str() {
                return Err(AppError::BadRequest(format!(
                    "El documento está en estado {}",
                    previous
                )));
            }
        }

        let document: Document = sqlx::query_as(
            r#"
            UPDATE documents SET status = $2, rejection_reason = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(next.as_str())
        .bind(reason)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(document_id = %id, from = %previous, to = next.as_str(), "Document status changed");
        Ok((document, previous))
    }

    pub async fn approve(&self, id: Uuid) -> Result<Document> {
        let (document, previous) = self
            .transition(id, DocumentStatus::Approved, None, None)
            .await?;

        if previous != DocumentStatus::Approved.as_str() {
            GamificationService::new(self.db.clone())
                .award_or_log(document.owner_id, PointEvent::DocumentApproved)
                .await;
        }
        Ok(document)
    }

    pub async fn reject(&self, id: Uuid, reason: &str) -> Result<Document> {
        let (document, _) = self
            .transition(id, DocumentStatus::Rejected, Some(reason), None)
            .await?;
        Ok(document)
    }

    pub async fn remove(&self, id: Uuid) -> Result<Document> {
        let (document, _) = self
            .transition(id, DocumentStatus::Removed, None, None)
            .await?;
        Ok(document)
    }

    /// Only removed documents can be restored; they return to the catalog.
    pub async fn restore(&self, id: Uuid) -> Result<Document> {
        let (document, _) = self
            .transition(id, DocumentStatus::Approved, None, Some(DocumentStatus::Removed))
            .await?;
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::UserRole;

    fn user(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "ana@uni.edu.pe".into(),
            role,
        }
    }

    #[test]
    fn size_limits() {
        assert!(matches!(check_size(0, 10), Err(AppError::BadRequest(_))));
        assert!(matches!(check_size(11, 10), Err(AppError::PayloadTooLarge(_))));
        assert!(check_size(10, 10).is_ok());
    }

    #[test]
    fn admin_uploads_are_published_immediately() {
        assert_eq!(initial_status(&user(UserRole::Admin)), DocumentStatus::Approved);
        assert_eq!(initial_status(&user(UserRole::User)), DocumentStatus::Pending);
    }

    #[test]
    fn unapproved_documents_are_hidden_from_strangers() {
        let owner = user(UserRole::User);
        let stranger = user(UserRole::User);
        let admin = user(UserRole::Admin);

        assert!(can_view(true, owner.id, None));
        assert!(!can_view(false, owner.id, None));
        assert!(!can_view(false, owner.id, Some(&stranger)));
        assert!(can_view(false, owner.id, Some(&owner)));
        assert!(can_view(false, owner.id, Some(&admin)));
    }

    #[test]
    fn browse_always_restricts_to_approved() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents d");
        push_browse_filters(&mut qb, &DocumentFilters::default());
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM documents d WHERE d.status = $1");
    }

    #[test]
    fn browse_filters_are_bound_in_order() {
        let filters = DocumentFilters {
            subject: Some("Cálculo".into()),
            document_type: Some(DocumentType::Examen),
            search: Some("integrales".into()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents d");
        push_browse_filters(&mut qb, &filters);
        let sql = qb.sql();
        assert!(sql.contains("d.subject ILIKE $2"));
        assert!(sql.contains("d.document_type = $3"));
        assert!(sql.contains("d.title ILIKE $4"));
        assert!(sql.contains("d.description ILIKE $5"));
    }
}
