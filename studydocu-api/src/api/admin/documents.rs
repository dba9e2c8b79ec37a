use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::api::RequestMeta;
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::models::{AuditAction, Document, DocumentStatus, DocumentSummary, ResourceType};
use crate::services::{AuditService, DocumentService};
use crate::utils::{Page, Pagination};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(moderation_queue))
        .route("/:id/approve", post(approve_document))
        .route("/:id/reject", post(reject_document))
        .route("/:id/remove", post(remove_document))
        .route("/:id/restore", post(restore_document))
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub status: Option<DocumentStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectRequest {
    #[validate(length(min = 3, max = 500, message = "Indica el motivo del rechazo"))]
    pub reason: String,
}

async fn moderation_queue(
    State(state): State<AppState>,
    Query(query): Query<QueueQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<DocumentSummary>>> {
    let status = query.status.unwrap_or(DocumentStatus::Pending);
    let service = DocumentService::new(state.db.clone(), state.storage.clone());
    Ok(Json(service.moderation_queue(status, &pagination).await?))
}

async fn approve_document(
    State(state): State<AppState>,
    admin: CurrentUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>> {
    let document = DocumentService::new(state.db.clone(), state.storage.clone())
        .approve(id)
        .await?;

    AuditService::new(state.db.clone())
        .record(meta.audit(
            admin.id,
            AuditAction::ApproveDocument,
            ResourceType::Document,
            id,
            Some(json!({ "owner_id": document.owner_id })),
        ))
        .await;

    Ok(Json(document))
}

async fn reject_document(
    State(state): State<AppState>,
    admin: CurrentUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectRequest>,
) -> Result<Json<Document>> {
    payload.validate()?;

    let reason = payload.reason.trim();
    let document = DocumentService::new(state.db.clone(), state.storage.clone())
        .reject(id, reason)
        .await?;

    AuditService::new(state.db.clone())
        .record(meta.audit(
            admin.id,
            AuditAction::RejectDocument,
            ResourceType::Document,
            id,
            Some(json!({ "reason": reason })),
        ))
        .await;

    Ok(Json(document))
}

async fn remove_document(
    State(state): State<AppState>,
    admin: CurrentUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>> {
    let document = DocumentService::new(state.db.clone(), state.storage.clone())
        .remove(id)
        .await?;

    AuditService::new(state.db.clone())
        .record(meta.audit(admin.id, AuditAction::RemoveDocument, ResourceType::Document, id, None))
        .await;

    Ok(Json(document))
}

async fn restore_document(
    State(state): State<AppState>,
    admin: CurrentUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>> {
    let document = DocumentService::new(state.db.clone(), state.storage.clone())
        .restore(id)
        .await?;

    AuditService::new(state.db.clone())
        .record(meta.audit(admin.id, AuditAction::RestoreDocument, ResourceType::Document, id, None))
        .await;

    Ok(Json(document))
}
