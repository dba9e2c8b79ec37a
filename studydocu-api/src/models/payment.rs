use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MembershipPlan {
    pub code: String,
    pub name: String,
    pub price_cents: i64,
    pub currency: String,
    pub duration_days: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    Stripe,
    Manual,
}

impl PaymentChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentChannel::Stripe => "stripe",
            PaymentChannel::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_code: String,
    pub channel: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub external_reference: Option<String>,
    pub proof_url: Option<String>,
    pub rejection_reason: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_code: Option<String>,
    pub payment_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ManualPaymentRequest {
    #[validate(length(min = 1, max = 40))]
    pub plan_code: String,
    #[validate(length(min = 4, max = 80, message = "Ingresa el número de operación"))]
    pub reference: String,
    #[validate(url)]
    pub proof_url: Option<String>,
}

/// Extends from whichever is later, now or the current paid-up date, so an
/// early renewal never eats remaining days.
pub fn membership_window(
    now: DateTime<Utc>,
    current_until: Option<DateTime<Utc>>,
    duration_days: i32,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let starts_at = match current_until {
        Some(until) if until > now => until,
        _ => now,
    };
    (starts_at, starts_at + Duration::days(duration_days as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fresh_membership_starts_now() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let (start, end) = membership_window(now, None, 30);
        assert_eq!(start, now);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap());
    }

    #[test]
    fn renewal_stacks_on_remaining_time() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap();
        let (start, end) = membership_window(now, Some(until), 90);
        assert_eq!(start, until);
        assert_eq!(end, until + Duration::days(90));
    }

    #[test]
    fn expired_membership_restarts_from_now() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let (start, _) = membership_window(now, Some(until), 30);
        assert_eq!(start, now);
    }
}
