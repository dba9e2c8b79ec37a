use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::db::Database;
use crate::error::{conflict_on_unique, AppError, Result};
use crate::models::{CreateReport, DocumentStatus, Report, ReportStatus, ReportWithDocument};
use crate::utils::{Page, Pagination};

pub struct ReportService {
    db: Database,
}

#[derive(Debug, Deserialize)]
pub struct ResolveReport {
    pub status: ReportStatus,
    #[serde(default)]
    pub remove_document: bool,
}

impl ReportService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// One open report per reporter and document.
    pub async fn create(
        &self,
        document_id: Uuid,
        reporter_id: Uuid,
        input: &CreateReport,
    ) -> Result<Report> {
        input.validate()?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM documents WHERE id = $1)")
            .bind(document_id)
            .fetch_one(&self.db.pg)
            .await?;
        if !exists {
            return Err(AppError::not_found("Documento"));
        }

        let report: Report = sqlx::query_as(
            r#"
            INSERT INTO reports (document_id, reporter_id, reason, details)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(document_id)
        .bind(reporter_id)
        .bind(input.reason.as_str())
        .bind(&input.details)
        .fetch_one(&self.db.pg)
        .await
        .map_err(|e| conflict_on_unique(e, "Ya reportaste este documento"))?;

        tracing::info!(
            report_id = %report.id,
            document_id = %document_id,
            reason = input.reason.as_str(),
            "Document reported"
        );
        Ok(report)
    }

    pub async fn list(
        &self,
        status: Option<ReportStatus>,
        pagination: &Pagination,
    ) -> Result<Page<ReportWithDocument>> {
        let status = status.map(|s| s.as_str());

        let reports: Vec<ReportWithDocument> = sqlx::query_as(
            r#"
            SELECT r.id, r.document_id, d.title AS document_title, d.status AS document_status,
                   r.reporter_id, p.full_name AS reporter_name, r.reason, r.details,
                   r.status, r.created_at
            FROM reports r
            JOIN documents d ON d.id = r.document_id
            JOIN profiles p ON p.id = r.reporter_id
            WHERE ($1::text IS NULL OR r.status = $1)
            ORDER BY r.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset())
        .fetch_all(&self.db.pg)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE ($1::text IS NULL OR status = $1)")
                .bind(status)
                .fetch_one(&self.db.pg)
                .await?;

        Ok(Page::new(reports, total, pagination))
    }

    /// Closes a pending report and optionally takes the document down in the
    /// same transaction.
    pub async fn resolve(&self, report_id: Uuid, admin_id: Uuid, input: &ResolveReport) -> Result<Report> {
        if input.status == ReportStatus::Pending {
            return Err(AppError::BadRequest(
                "El reporte debe resolverse o descartarse".to_string(),
            ));
        }

        let mut tx = self.db.pg.begin().await?;

        let report: Report = sqlx::query_as(
            r#"
            UPDATE reports SET status = $2, resolved_by = $3, resolved_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(report_id)
        .bind(input.status.as_str())
        .bind(admin_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Reporte pendiente"))?;

        if input.remove_document {
            sqlx::query("UPDATE documents SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(report.document_id)
                .bind(DocumentStatus::Removed.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            report_id = %report_id,
            admin_id = %admin_id,
            status = input.status.as_str(),
            removed = input.remove_document,
            "Report closed"
        );
        Ok(report)
    }

    pub async fn count_pending(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE status = 'pending'")
            .fetch_one(&self.db.pg)
            .await?;
        Ok(count)
    }
}
