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
use crate::models::{AuditAction, ProfileView, ResourceType};
use crate::services::{
    AuditService, DeletedUser, ListUsersParams, MembershipStatus, PaymentService, UserService,
    DEFAULT_GRANT_DAYS,
};
use crate::utils::{Page, Pagination};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/:id", get(get_user).delete(delete_user))
        .route("/:id/ban", post(ban_user))
        .route("/:id/unban", post(unban_user))
        .route("/:id/premium", post(set_premium))
}

#[derive(Debug, Serialize)]
pub struct UserDetailResponse {
    #[serde(flatten)]
    pub profile: ProfileView,
    pub ban_reason: Option<String>,
    pub membership: MembershipStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BanUserRequest {
    #[validate(length(min = 3, max = 500, message = "Indica el motivo de la suspensión"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetPremiumRequest {
    pub is_premium: bool,
    #[validate(range(min = 1, max = 3650))]
    pub days: Option<i32>,
}

async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListUsersParams>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<ProfileView>>> {
    let service = UserService::new(state.db.clone());
    Ok(Json(service.list_users(&params, &pagination).await?))
}

async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserDetailResponse>> {
    let profile = UserService::new(state.db.clone()).get_profile(user_id).await?;
    let membership = PaymentService::new(state.db.clone())
        .membership_status(user_id)
        .await?;

    Ok(Json(UserDetailResponse {
        ban_reason: profile.ban_reason.clone(),
        profile: ProfileView::from(profile),
        membership,
    }))
}

async fn ban_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    meta: RequestMeta,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<BanUserRequest>,
) -> Result<Json<ProfileView>> {
    payload.validate()?;

    let profile = UserService::new(state.db.clone())
        .ban(user_id, admin.id, payload.reason.trim())
        .await?;

    AuditService::new(state.db.clone())
        .record(meta.audit(
            admin.id,
            AuditAction::BanUser,
            ResourceType::User,
            user_id,
            Some(json!({ "reason": payload.reason })),
        ))
        .await;

    Ok(Json(ProfileView::from(profile)))
}

async fn unban_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    meta: RequestMeta,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ProfileView>> {
    let profile = UserService::new(state.db.clone()).unban(user_id).await?;

    AuditService::new(state.db.clone())
        .record(meta.audit(admin.id, AuditAction::UnbanUser, ResourceType::User, user_id, None))
        .await;

    Ok(Json(ProfileView::from(profile)))
}

async fn set_premium(
    State(state): State<AppState>,
    admin: CurrentUser,
    meta: RequestMeta,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<SetPremiumRequest>,
) -> Result<Json<MembershipStatus>> {
    payload.validate()?;

    let payments = PaymentService::new(state.db.clone());
    let audit = AuditService::new(state.db.clone());

    if payload.is_premium {
        let days = payload.days.unwrap_or(DEFAULT_GRANT_DAYS);
        let membership = payments.grant_premium(user_id, days).await?;
        audit
            .record(meta.audit(
                admin.id,
                AuditAction::SetPremium,
                ResourceType::User,
                user_id,
                Some(json!({ "days": days, "ends_at": membership.ends_at })),
            ))
            .await;
    } else {
        payments.revoke_premium(user_id).await?;
        audit
            .record(meta.audit(admin.id, AuditAction::RevokePremium, ResourceType::User, user_id, None))
            .await;
    }

    Ok(Json(payments.membership_status(user_id).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    meta: RequestMeta,
    Path(user_id): Path<Uuid>,
) -> Result<Json<DeletedUser>> {
    let deleted = UserService::new(state.db.clone())
        .delete_user(user_id, admin.id, state.storage.as_ref())
        .await?;

    AuditService::new(state.db.clone())
        .record(meta.audit(
            admin.id,
            AuditAction::DeleteUser,
            ResourceType::User,
            user_id,
            Some(json!({
                "documents_deleted": deleted.documents_deleted,
                "objects_failed": deleted.objects_failed,
            })),
        ))
        .await;

    Ok(Json(deleted))
}
