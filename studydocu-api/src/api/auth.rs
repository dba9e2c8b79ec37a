use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::RequestMeta;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::middleware::auth::{bearer_token, decode_claims};
use crate::middleware::gate::SESSION_COOKIE;
use crate::middleware::CurrentUser;
use crate::models::{AuditAction, ProfileView, RegisterProfile, ResourceType};
use crate::services::{AuditService, AuthService, IssuedTokens, UserService};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh_token))
        .route("/me", get(get_current_user))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub profile: ProfileView,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

/// The page gate reads the same access token from this cookie.
fn session_cookie(config: &Config, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(config.server.public_url.starts_with("https://"))
        .same_site(SameSite::Lax)
        .build()
}

fn auth_response(config: &Config, tokens: IssuedTokens, profile: ProfileView) -> AuthResponse {
    AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: "Bearer",
        expires_in: config.jwt.expiry_hours * 3600,
        profile,
    }
}

async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterProfile>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>)> {
    payload.validate()?;

    let auth_service = AuthService::new(state.db.clone(), state.config.clone());
    let (profile, tokens) = auth_service.register(&payload).await?;

    let jar = jar.add(session_cookie(&state.config, tokens.access_token.clone()));
    let response = auth_response(&state.config, tokens, ProfileView::from(profile));

    Ok((StatusCode::CREATED, jar, Json(response)))
}

async fn login(
    State(state): State<AppState>,
    meta: RequestMeta,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    payload.validate()?;

    let auth_service = AuthService::new(state.db.clone(), state.config.clone());
    let (profile, tokens) = auth_service
        .authenticate(&payload.email, &payload.password)
        .await?;

    if profile.is_admin() {
        AuditService::new(state.db.clone())
            .record(meta.audit(
                profile.id,
                AuditAction::Login,
                ResourceType::Session,
                profile.id,
                Some(serde_json::json!({ "email": profile.email })),
            ))
            .await;
    }

    tracing::info!(user_id = %profile.id, "Login succeeded");

    let jar = jar.add(session_cookie(&state.config, tokens.access_token.clone()));
    let response = auth_response(&state.config, tokens, ProfileView::from(profile));

    Ok((jar, Json(response)))
}

async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
    meta: RequestMeta,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode)> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    let claims = decode_claims(&state.config.jwt.secret, token)?;

    AuthService::new(state.db.clone(), state.config.clone())
        .revoke(token, claims.exp)
        .await?;

    if user.is_admin() {
        AuditService::new(state.db.clone())
            .record(meta.audit(user.id, AuditAction::Logout, ResourceType::Session, user.id, None))
            .await;
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, StatusCode::NO_CONTENT))
}

async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>> {
    let auth_service = AuthService::new(state.db.clone(), state.config.clone());
    let access_token = auth_service.refresh(&payload.refresh_token).await?;

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.config.jwt.expiry_hours * 3600,
    }))
}

async fn get_current_user(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ProfileView>> {
    let profile = UserService::new(state.db.clone()).get_profile(user.id).await?;
    Ok(Json(ProfileView::from(profile)))
}
