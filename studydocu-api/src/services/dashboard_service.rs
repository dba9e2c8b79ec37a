// Dashboard service - moderation and revenue statistics for the admin panel
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

use crate::db::Database;
use crate::error::Result;
use crate::services::audit_service::AuditService;
use crate::services::report_service::ReportService;

pub struct DashboardService {
    db: Database,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub premium_users: i64,
    pub banned_users: i64,
    pub new_users_today: i64,
    pub documents_by_status: BTreeMap<String, i64>,
    pub uploads_today: i64,
    pub pending_reports: i64,
    pub pending_payments: i64,
    pub revenue_this_month_cents: i64,
    pub admin_actions_today: i64,
}

#[derive(Debug, FromRow, Serialize)]
pub struct ChartDataPoint {
    pub date: NaiveDate,
    pub value: i64,
}

impl DashboardService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn get_stats(&self) -> Result<DashboardStats> {
        let (total_users, premium_users, banned_users, new_users_today): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE is_premium),
                    COUNT(*) FILTER (WHERE is_banned),
                    COUNT(*) FILTER (WHERE created_at >= date_trunc('day', NOW()))
                FROM profiles
                "#,
            )
            .fetch_one(&self.db.pg)
            .await?;

        let by_status: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM documents GROUP BY status")
                .fetch_all(&self.db.pg)
                .await?;

        let mut documents_by_status: BTreeMap<String, i64> = ["pending", "approved", "rejected", "removed"]
            .into_iter()
            .map(|s| (s.to_string(), 0))
            .collect();
        documents_by_status.extend(by_status);

        let uploads_today: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM documents WHERE created_at >= date_trunc('day', NOW())",
        )
        .fetch_one(&self.db.pg)
        .await?;

        let (pending_payments, revenue_this_month_cents): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending'),
                COALESCE(SUM(amount_cents) FILTER (
                    WHERE status = 'approved' AND created_at >= date_trunc('month', NOW())
                ), 0)::BIGINT
            FROM payments
            "#,
        )
        .fetch_one(&self.db.pg)
        .await?;

        Ok(DashboardStats {
            total_users,
            premium_users,
            banned_users,
            new_users_today,
            documents_by_status,
            uploads_today,
            pending_reports: ReportService::new(self.db.clone()).count_pending().await?,
            pending_payments,
            revenue_this_month_cents,
            admin_actions_today: AuditService::new(self.db.clone()).count_since_midnight().await?,
        })
    }

    /// Uploads per day for the last `days` days, zero-filled.
    pub async fn uploads_chart(&self, days: i32) -> Result<Vec<ChartDataPoint>> {
        let days = days.clamp(1, 90);

        let points: Vec<ChartDataPoint> = sqlx::query_as(
            r#"
            SELECT day::date AS date, COUNT(d.id) AS value
            FROM generate_series(
                date_trunc('day', NOW()) - ($1 - 1) * INTERVAL '1 day',
                date_trunc('day', NOW()),
                INTERVAL '1 day'
            ) AS day
            LEFT JOIN documents d
                ON d.created_at >= day AND d.created_at < day + INTERVAL '1 day'
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(days)
        .fetch_all(&self.db.pg)
        .await?;

        Ok(points)
    }
}
