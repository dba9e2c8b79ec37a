// Payment service - plan catalog, manual/Stripe payments and premium memberships
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

use crate::db::Database;
use crate::error::{conflict_on_unique, AppError, Result};
use crate::models::{
    membership_window, ManualPaymentRequest, Membership, MembershipPlan, Payment, PaymentChannel,
    PaymentStatus,
};
use crate::utils::{Page, Pagination};

pub const DEFAULT_GRANT_DAYS: i32 = 30;

pub struct PaymentService {
    db: Database,
}

#[derive(Debug, Serialize)]
pub struct MembershipStatus {
    pub is_premium: bool,
    pub premium_until: Option<DateTime<Utc>>,
    pub membership: Option<Membership>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentFilters {
    pub status: Option<PaymentStatus>,
}

/// Inserts a membership and pushes the profile's paid-up date forward.
/// Runs on the caller's transaction.
async fn activate(
    conn: &mut PgConnection,
    user_id: Uuid,
    plan_code: Option<&str>,
    payment_id: Option<Uuid>,
    duration_days: i32,
) -> Result<Membership> {
    let current_until: Option<DateTime<Utc>> = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT premium_until FROM profiles WHERE id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Usuario"))?;

    let (starts_at, ends_at) = membership_window(Utc::now(), current_until, duration_days);

    let membership: Membership = sqlx::query_as(
        r#"
        INSERT INTO memberships (user_id, plan_code, payment_id, starts_at, ends_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(plan_code)
    .bind(payment_id)
    .bind(starts_at)
    .bind(ends_at)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE profiles SET is_premium = true, premium_until = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(user_id)
    .bind(ends_at)
    .execute(&mut *conn)
    .await?;

    tracing::info!(user_id = %user_id, ends_at = %ends_at, "Premium membership activated");
    Ok(membership)
}

async fn plan_in(conn: &mut PgConnection, code: &str) -> Result<MembershipPlan> {
    sqlx::query_as("SELECT * FROM membership_plans WHERE code = $1")
        .bind(code)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Plan"))
}

impl PaymentService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn plans(&self) -> Result<Vec<MembershipPlan>> {
        let plans: Vec<MembershipPlan> =
            sqlx::query_as("SELECT * FROM membership_plans ORDER BY duration_days ASC")
                .fetch_all(&self.db.pg)
                .await?;
        Ok(plans)
    }

    /// Records a bank transfer or wallet payment for an admin to review.
    pub async fn create_manual(&self, user_id: Uuid, input: &ManualPaymentRequest) -> Result<Payment> {
        input.validate()?;

        let mut conn = self.db.pg.acquire().await?;
        let plan = plan_in(&mut conn, &input.plan_code).await?;

        let payment: Payment = sqlx::query_as(
            r#"
            INSERT INTO payments (user_id, plan_code, channel, amount_cents, currency, status, external_reference, proof_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&plan.code)
        .bind(PaymentChannel::Manual.as_str())
        .bind(plan.price_cents)
        .bind(&plan.currency)
        .bind(PaymentStatus::Pending.as_str())
        .bind(input.reference.trim())
        .bind(&input.proof_url)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| conflict_on_unique(e, "Esta referencia de pago ya fue registrada"))?;

        tracing::info!(payment_id = %payment.id, user_id = %user_id, plan = %plan.code, "Manual payment submitted");
        Ok(payment)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Payment>> {
        let payments: Vec<Payment> =
            sqlx::query_as("SELECT * FROM payments WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.db.pg)
                .await?;
        Ok(payments)
    }

    pub async fn membership_status(&self, user_id: Uuid) -> Result<MembershipStatus> {
        let (is_premium, premium_until): (bool, Option<DateTime<Utc>>) =
            sqlx::query_as("SELECT is_premium, premium_until FROM profiles WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.db.pg)
                .await?
                .ok_or_else(|| AppError::not_found("Usuario"))?;

        let membership: Option<Membership> = sqlx::query_as(
            r#"
            SELECT * FROM memberships
            WHERE user_id = $1 AND is_active = true
            ORDER BY ends_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db.pg)
        .await?;

        Ok(MembershipStatus {
            is_premium,
            premium_until,
            membership,
        })
    }

    pub async fn list(&self, filters: &PaymentFilters, pagination: &Pagination) -> Result<Page<Payment>> {
        let status = filters.status.map(|s| s.as_str());

        let payments: Vec<Payment> = sqlx::query_as(
            r#"
            SELECT * FROM payments
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset())
        .fetch_all(&self.db.pg)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE ($1::text IS NULL OR status = $1)")
                .bind(status)
                .fetch_one(&self.db.pg)
                .await?;

        Ok(Page::new(payments, total, pagination))
    }

    /// Payment approval, membership insert and profile update commit together.
    pub async fn approve(&self, payment_id: Uuid, admin_id: Uuid) -> Result<(Payment, Membership)> {
        let mut tx = self.db.pg.begin().await?;

        let pending: Payment = sqlx::query_as("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
            .bind(payment_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Pago"))?;

        if pending.status != PaymentStatus::Pending.as_str() {
            return Err(AppError::BadRequest(format!("El pago ya está {}", pending.status)));
        }

        let plan = plan_in(&mut tx, &pending.plan_code).await?;

        let payment: Payment = sqlx::query_as(
            r#"
            UPDATE payments SET status = $2, reviewed_by = $3, reviewed_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(PaymentStatus::Approved.as_str())
        .bind(admin_id)
        .fetch_one(&mut *tx)
        .await?;

        let membership = activate(
            &mut tx,
            payment.user_id,
            Some(&plan.code),
            Some(payment.id),
            plan.duration_days,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(payment_id = %payment_id, admin_id = %admin_id, "Payment approved");
        Ok((payment, membership))
    }

    pub async fn reject(&self, payment_id: Uuid, admin_id: Uuid, reason: Option<&str>) -> Result<Payment> {
        let payment: Payment = sqlx::query_as(
            r#"
            UPDATE payments
            SET status = $2, reviewed_by = $3, reviewed_at = NOW(), rejection_reason = $4
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(PaymentStatus::Rejected.as_str())
        .bind(admin_id)
        .bind(reason)
        .fetch_optional(&self.db.pg)
        .await?
        .ok_or_else(|| AppError::not_found("Pago pendiente"))?;

        tracing::info!(payment_id = %payment_id, admin_id = %admin_id, "Payment rejected");
        Ok(payment)
    }

    /// Admin grant with no payment behind it.
    pub async fn grant_premium(&self, user_id: Uuid, days: i32) -> Result<Membership> {
        if days <= 0 {
            return Err(AppError::BadRequest("La duración debe ser mayor a cero".to_string()));
        }

        let mut tx = self.db.pg.begin().await?;
        let membership = activate(&mut tx, user_id, None, None, days).await?;
        tx.commit().await?;

        Ok(membership)
    }

    pub async fn revoke_premium(&self, user_id: Uuid) -> Result<()> {
        let mut tx = self.db.pg.begin().await?;

        let updated = sqlx::query(
            "UPDATE profiles SET is_premium = false, premium_until = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(AppError::not_found("Usuario"));
        }

        sqlx::query("UPDATE memberships SET is_active = false WHERE user_id = $1 AND is_active = true")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, "Premium revoked");
        Ok(())
    }

    /// Returns `None` when this checkout reference was already processed.
    pub async fn record_stripe_checkout(
        &self,
        reference: &str,
        user_id: Uuid,
        plan_code: &str,
        amount_cents: Option<i64>,
        currency: Option<&str>,
    ) -> Result<Option<Membership>> {
        let mut tx = self.db.pg.begin().await?;
        let plan = plan_in(&mut tx, plan_code).await?;

        let payment_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO payments (user_id, plan_code, channel, amount_cents, currency, status, external_reference, reviewed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (external_reference) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(&plan.code)
        .bind(PaymentChannel::Stripe.as_str())
        .bind(amount_cents.unwrap_or(plan.price_cents))
        .bind(currency.unwrap_or(plan.currency.as_str()))
        .bind(PaymentStatus::Approved.as_str())
        .bind(reference)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(payment_id) = payment_id else {
            tracing::info!(reference = %reference, "Stripe checkout already recorded");
            return Ok(None);
        };

        let membership = activate(
            &mut tx,
            user_id,
            Some(&plan.code),
            Some(payment_id),
            plan.duration_days,
        )
        .await?;

        tx.commit().await?;
        Ok(Some(membership))
    }

    /// Clears premium for every profile whose paid-up date has passed.
    pub async fn expire_memberships(&self) -> Result<u64> {
        let mut tx = self.db.pg.begin().await?;

        sqlx::query("UPDATE memberships SET is_active = false WHERE is_active = true AND ends_at < NOW()")
            .execute(&mut *tx)
            .await?;

        let expired = sqlx::query(
            r#"
            UPDATE profiles SET is_premium = false, updated_at = NOW()
            WHERE is_premium = true AND premium_until IS NOT NULL AND premium_until < NOW()
            "#,
        )
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(expired)
    }
}

/// Background job: periodically expires lapsed memberships.
pub async fn run_expiry_sweep(db: Database, interval: Duration) {
    tracing::info!(interval_secs = interval.as_secs(), "Starting membership expiry sweep");

    let service = PaymentService::new(db);
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;
        match service.expire_memberships().await {
            Ok(0) => tracing::debug!("Membership sweep: nothing expired"),
            Ok(count) => tracing::info!(count, "Membership sweep: premium expired"),
            Err(e) => tracing::warn!(error = %e, "Membership sweep failed"),
        }
    }
}
