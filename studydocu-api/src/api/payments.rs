use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::{ManualPaymentRequest, MembershipPlan, Payment};
use crate::services::stripe::{self, StripeEvent, WebhookAction};
use crate::services::PaymentService;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/payments/manual", post(create_manual_payment))
        .route("/webhooks/stripe", post(stripe_webhook))
}

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub plans: Vec<MembershipPlan>,
    pub manual_instructions: String,
}

async fn list_plans(State(state): State<AppState>) -> Result<Json<PlansResponse>> {
    let plans = PaymentService::new(state.db.clone()).plans().await?;
    Ok(Json(PlansResponse {
        plans,
        manual_instructions: state.config.payments.manual_instructions.clone(),
    }))
}

async fn create_manual_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<ManualPaymentRequest>,
) -> Result<(StatusCode, Json<Payment>)> {
    let payment = PaymentService::new(state.db.clone())
        .create_manual(user.id, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Acknowledges every verified event; failures while applying one are logged
/// so Stripe does not retry events we can never process.
async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(stripe::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    stripe::verify_signature(
        &state.config.stripe.webhook_secret,
        signature,
        &body,
        chrono::Utc::now().timestamp(),
        state.config.stripe.tolerance_secs,
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "[stripe] rejected webhook");
        AppError::BadRequest(format!("Firma de webhook inválida: {}", e))
    })?;

    let event: StripeEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "[stripe] signed payload is not an event, acknowledged");
            return Ok(Json(json!({ "received": true })));
        }
    };
    let event_id = event.id.clone();

    let service = PaymentService::new(state.db.clone());
    match event.action() {
        WebhookAction::CheckoutCompleted {
            reference,
            user_id,
            plan_code,
            amount_cents,
            currency,
        } => {
            match service
                .record_stripe_checkout(&reference, user_id, &plan_code, amount_cents, currency.as_deref())
                .await
            {
                Ok(Some(membership)) => tracing::info!(
                    %event_id,
                    user_id = %user_id,
                    ends_at = %membership.ends_at,
                    "[stripe] checkout activated membership"
                ),
                Ok(None) => tracing::info!(%event_id, "[stripe] duplicate checkout ignored"),
                Err(e) => tracing::error!(%event_id, error = %e, "[stripe] failed to record checkout"),
            }
        }
        WebhookAction::SubscriptionDeleted { user_id } => {
            if let Err(e) = service.revoke_premium(user_id).await {
                tracing::error!(%event_id, user_id = %user_id, error = %e, "[stripe] failed to cancel membership");
            }
        }
        WebhookAction::Ignored { event_type, reason } => {
            tracing::debug!(%event_id, %event_type, reason, "[stripe] event ignored");
        }
    }

    Ok(Json(json!({ "received": true })))
}
