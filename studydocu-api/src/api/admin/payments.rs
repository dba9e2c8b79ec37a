use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::api::RequestMeta;
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::models::{AuditAction, Membership, Payment, ResourceType};
use crate::services::{AuditService, PaymentFilters, PaymentService};
use crate::utils::{Page, Pagination};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payments))
        .route("/:id/approve", post(approve_payment))
        .route("/:id/reject", post(reject_payment))
}

#[derive(Debug, Serialize)]
pub struct ApprovedPayment {
    pub payment: Payment,
    pub membership: Membership,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RejectPaymentRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

async fn list_payments(
    State(state): State<AppState>,
    Query(filters): Query<PaymentFilters>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<Payment>>> {
    let service = PaymentService::new(state.db.clone());
    Ok(Json(service.list(&filters, &pagination).await?))
}

async fn approve_payment(
    State(state): State<AppState>,
    admin: CurrentUser,
    meta: RequestMeta,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<ApprovedPayment>> {
    let (payment, membership) = PaymentService::new(state.db.clone())
        .approve(payment_id, admin.id)
        .await?;

    AuditService::new(state.db.clone())
        .record(meta.audit(
            admin.id,
            AuditAction::ApprovePayment,
            ResourceType::Payment,
            payment_id,
            Some(json!({
                "user_id": payment.user_id,
                "amount_cents": payment.amount_cents,
                "ends_at": membership.ends_at,
            })),
        ))
        .await;

    Ok(Json(ApprovedPayment { payment, membership }))
}

async fn reject_payment(
    State(state): State<AppState>,
    admin: CurrentUser,
    meta: RequestMeta,
    Path(payment_id): Path<Uuid>,
    payload: Option<Json<RejectPaymentRequest>>,
) -> Result<Json<Payment>> {
    let Json(payload) = payload.unwrap_or_default();
    payload.validate()?;

    let reason = payload.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
    let payment = PaymentService::new(state.db.clone())
        .reject(payment_id, admin.id, reason)
        .await?;

    AuditService::new(state.db.clone())
        .record(meta.audit(
            admin.id,
            AuditAction::RejectPayment,
            ResourceType::Payment,
            payment_id,
            Some(json!({ "user_id": payment.user_id, "reason": reason })),
        ))
        .await;

    Ok(Json(payment))
}
