use serde::Deserialize;
use uuid::Uuid;

use crate::db::Database;
use crate::error::Result;
use crate::models::{AuditLog, CreateAuditLog};
use crate::utils::{Page, Pagination};

pub struct AuditService {
    db: Database,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogFilters {
    pub admin_id: Option<Uuid>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
}

impl AuditService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn log(&self, entry: CreateAuditLog) -> Result<AuditLog> {
        let log: AuditLog = sqlx::query_as(
            r#"
            INSERT INTO audit_logs (id, admin_id, action, resource_type, resource_id, details, ip_address, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(entry.admin_id)
        .bind(entry.action.as_str())
        .bind(entry.resource_type.as_str())
        .bind(entry.resource_id)
        .bind(entry.details)
        .bind(entry.ip_address)
        .bind(entry.user_agent)
        .fetch_one(&self.db.pg)
        .await?;

        Ok(log)
    }

    /// Audit writes never fail the admin action they describe.
    pub async fn record(&self, entry: CreateAuditLog) {
        let action = entry.action.as_str().to_string();
        if let Err(e) = self.log(entry).await {
            tracing::warn!(%action, error = %e, "[audit] failed to write audit log");
        }
    }

    pub async fn list(
        &self,
        filters: &AuditLogFilters,
        pagination: &Pagination,
    ) -> Result<Page<AuditLog>> {
        let logs: Vec<AuditLog> = sqlx::query_as(
            r#"
            SELECT * FROM audit_logs
            WHERE ($1::uuid IS NULL OR admin_id = $1)
              AND ($2::text IS NULL OR resource_type = $2)
              AND ($3::text IS NULL OR resource_id = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filters.admin_id)
        .bind(&filters.resource_type)
        .bind(&filters.resource_id)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset())
        .fetch_all(&self.db.pg)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM audit_logs
            WHERE ($1::uuid IS NULL OR admin_id = $1)
              AND ($2::text IS NULL OR resource_type = $2)
              AND ($3::text IS NULL OR resource_id = $3)
            "#,
        )
        .bind(filters.admin_id)
        .bind(&filters.resource_type)
        .bind(&filters.resource_id)
        .fetch_one(&self.db.pg)
        .await?;

        Ok(Page::new(logs, total, pagination))
    }

    pub async fn count_since_midnight(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_logs WHERE created_at >= date_trunc('day', NOW())",
        )
        .fetch_one(&self.db.pg)
        .await?;

        Ok(count)
    }
}
