use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::RequestMeta;
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::models::{AuditAction, Report, ReportStatus, ReportWithDocument, ResourceType};
use crate::services::{AuditService, ReportService, ResolveReport};
use crate::utils::{Page, Pagination};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reports))
        .route("/:id/resolve", post(resolve_report))
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
}

async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<ReportWithDocument>>> {
    let service = ReportService::new(state.db.clone());
    Ok(Json(service.list(query.status, &pagination).await?))
}

async fn resolve_report(
    State(state): State<AppState>,
    admin: CurrentUser,
    meta: RequestMeta,
    Path(report_id): Path<Uuid>,
    Json(payload): Json<ResolveReport>,
) -> Result<Json<Report>> {
    let report = ReportService::new(state.db.clone())
        .resolve(report_id, admin.id, &payload)
        .await?;

    let action = match payload.status {
        ReportStatus::Dismissed => AuditAction::DismissReport,
        _ => AuditAction::ResolveReport,
    };
    AuditService::new(state.db.clone())
        .record(meta.audit(
            admin.id,
            action,
            ResourceType::Report,
            report_id,
            Some(json!({
                "document_id": report.document_id,
                "document_removed": payload.remove_document,
            })),
        ))
        .await;

    Ok(Json(report))
}
