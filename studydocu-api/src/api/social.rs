use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::models::{Comment, CreateComment, CreateReport, ReactionKind, ReactionState, Report};
use crate::services::{CommentService, FavoriteService, FavoriteState, ReactionService, ReportService};
use crate::utils::{Page, Pagination};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/documents/:id/comments",
            get(list_comments).post(create_comment),
        )
        .route("/comments/:id", delete(delete_comment))
        .route(
            "/documents/:id/reaction",
            get(get_reaction).put(put_reaction).delete(delete_reaction),
        )
        .route(
            "/documents/:id/favorite",
            put(add_favorite).delete(remove_favorite),
        )
        .route("/documents/:id/reports", post(create_report))
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    pub kind: ReactionKind,
}

async fn list_comments(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Path(document_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<Comment>>> {
    let service = CommentService::new(state.db.clone());
    Ok(Json(service.list(document_id, user.as_ref(), &pagination).await?))
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<CreateComment>,
) -> Result<(StatusCode, Json<Comment>)> {
    let service = CommentService::new(state.db.clone());
    let comment = service.create(document_id, &user, &payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(comment_id): Path<Uuid>,
) -> Result<StatusCode> {
    CommentService::new(state.db.clone())
        .delete(comment_id, &user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_reaction(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<ReactionState>> {
    let service = ReactionService::new(state.db.clone());
    Ok(Json(service.state(document_id, user.map(|u| u.id)).await?))
}

async fn put_reaction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<ReactionRequest>,
) -> Result<Json<ReactionState>> {
    let service = ReactionService::new(state.db.clone());
    Ok(Json(service.react(document_id, user.id, payload.kind).await?))
}

async fn delete_reaction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(document_id): Path<Uuid>,
) -> Result<Json<ReactionState>> {
    let service = ReactionService::new(state.db.clone());
    Ok(Json(service.remove(document_id, user.id).await?))
}

async fn add_favorite(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(document_id): Path<Uuid>,
) -> Result<Json<FavoriteState>> {
    let service = FavoriteService::new(state.db.clone());
    Ok(Json(service.add(document_id, user.id).await?))
}

async fn remove_favorite(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(document_id): Path<Uuid>,
) -> Result<Json<FavoriteState>> {
    let service = FavoriteService::new(state.db.clone());
    Ok(Json(service.remove(document_id, user.id).await?))
}

async fn create_report(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<CreateReport>,
) -> Result<(StatusCode, Json<Report>)> {
    let service = ReportService::new(state.db.clone());
    let report = service.create(document_id, user.id, &payload).await?;
    Ok((StatusCode::CREATED, Json(report)))
}
