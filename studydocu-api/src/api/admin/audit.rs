use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::api::RequestMeta;
use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::{AuditAction, AuditLog, CreateAuditLog, ResourceType};
use crate::services::{AuditLogFilters, AuditService};
use crate::utils::{Page, Pagination};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/audit-logs", get(list_audit_logs))
        .route("/audit-events", post(record_event))
}

/// Action reported by the admin front end, e.g. an export or a settings view.
#[derive(Debug, Deserialize, Validate)]
pub struct AuditEventRequest {
    pub action: String,
    pub resource_type: ResourceType,
    #[validate(length(max = 128))]
    pub resource_id: Option<String>,
    pub details: Option<Value>,
}

async fn list_audit_logs(
    State(state): State<AppState>,
    Query(filters): Query<AuditLogFilters>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<AuditLog>>> {
    let service = AuditService::new(state.db.clone());
    Ok(Json(service.list(&filters, &pagination).await?))
}

async fn record_event(
    State(state): State<AppState>,
    admin: CurrentUser,
    meta: RequestMeta,
    Json(payload): Json<AuditEventRequest>,
) -> Result<(StatusCode, Json<AuditLog>)> {
    payload.validate()?;

    let action = AuditAction::custom(&payload.action).ok_or_else(|| {
        AppError::BadRequest(format!("Acción de auditoría inválida: {}", payload.action))
    })?;

    let entry = CreateAuditLog {
        admin_id: admin.id,
        action,
        resource_type: payload.resource_type,
        resource_id: payload.resource_id,
        details: payload.details,
        ip_address: meta.ip_address,
        user_agent: meta.user_agent,
    };

    let log = AuditService::new(state.db.clone()).log(entry).await?;
    Ok((StatusCode::CREATED, Json(log)))
}
