use axum::{
    extract::{Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::models::{AchievementStatus, DocumentSummary, Payment, ProfileView, UpdateProfile};
use crate::services::{
    AchievementService, DocumentService, FavoriteService, LeaderboardEntry, MembershipStatus,
    PaymentService, UserDashboard, UserService,
};
use crate::utils::{Page, Pagination};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me/dashboard", get(get_dashboard))
        .route("/me/profile", patch(update_profile))
        .route("/me/onboarding", post(complete_onboarding))
        .route("/me/documents", get(list_my_documents))
        .route("/me/favorites", get(list_my_favorites))
        .route("/me/achievements", get(list_my_achievements))
        .route("/me/payments", get(list_my_payments))
        .route("/me/membership", get(get_my_membership))
        .route("/leaderboard", get(get_leaderboard))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<u32>,
}

async fn get_dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<UserDashboard>> {
    let service = UserService::new(state.db.clone());
    Ok(Json(service.dashboard(user.id).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<UpdateProfile>,
) -> Result<Json<ProfileView>> {
    payload.validate()?;

    let profile = UserService::new(state.db.clone())
        .update_profile(user.id, &payload)
        .await?;
    Ok(Json(ProfileView::from(profile)))
}

async fn complete_onboarding(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ProfileView>> {
    let profile = UserService::new(state.db.clone())
        .complete_onboarding(user.id)
        .await?;
    Ok(Json(ProfileView::from(profile)))
}

async fn list_my_documents(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<DocumentSummary>>> {
    let service = DocumentService::new(state.db.clone(), state.storage.clone());
    Ok(Json(service.list_own(user.id, &pagination).await?))
}

async fn list_my_favorites(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<DocumentSummary>>> {
    let service = FavoriteService::new(state.db.clone());
    Ok(Json(service.list(user.id, &pagination).await?))
}

async fn list_my_achievements(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<AchievementStatus>>> {
    let service = AchievementService::new(state.db.clone());
    Ok(Json(service.list_for_user(user.id).await?))
}

async fn list_my_payments(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<Payment>>> {
    let service = PaymentService::new(state.db.clone());
    Ok(Json(service.list_for_user(user.id).await?))
}

async fn get_my_membership(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<MembershipStatus>> {
    let service = PaymentService::new(state.db.clone());
    Ok(Json(service.membership_status(user.id).await?))
}

async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    let limit = query.limit.unwrap_or(10);
    let service = UserService::new(state.db.clone());
    Ok(Json(service.leaderboard(limit).await?))
}
