//! Page gate: maps page path prefixes to the session, role and subscription a
//! visitor needs, and redirects when the requirement is not met.
//!
//! API routes are not gated here; they rely on `attach_user` and per-handler
//! extractors instead.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use crate::middleware::auth::{bearer_token, decode_claims, TokenKind};
use crate::models::SessionProfile;
use crate::services::{AuthService, UserService};
use crate::AppState;

pub const SESSION_COOKIE: &str = "sd_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Public,
    GuestOnly,
    Authenticated,
    Admin,
    Premium,
}

pub const ROUTE_TABLE: &[(&str, Requirement)] = &[
    ("/login", Requirement::GuestOnly),
    ("/register", Requirement::GuestOnly),
    ("/dashboard", Requirement::Authenticated),
    ("/upload", Requirement::Authenticated),
    ("/profile", Requirement::Authenticated),
    ("/favorites", Requirement::Authenticated),
    ("/documents/new", Requirement::Authenticated),
    ("/onboarding", Requirement::Authenticated),
    ("/admin", Requirement::Admin),
    ("/premium", Requirement::Premium),
];

/// Paths never gated: the API, assets and the pages redirects point to.
const UNGATED_PREFIXES: &[&str] = &["/api", "/static", "/health", "/sw.js", "/offline.html"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Allow,
    Redirect { location: String },
}

impl GateDecision {
    fn redirect(location: impl Into<String>) -> Self {
        GateDecision::Redirect {
            location: location.into(),
        }
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

/// Longest matching prefix wins; unknown paths are public.
pub fn requirement_for(path: &str) -> Requirement {
    ROUTE_TABLE
        .iter()
        .filter(|(prefix, _)| matches_prefix(path, prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, requirement)| *requirement)
        .unwrap_or(Requirement::Public)
}

pub fn is_gated(path: &str) -> bool {
    !UNGATED_PREFIXES.iter().any(|p| matches_prefix(path, p))
}

pub fn decide(path: &str, session: Option<&SessionProfile>) -> GateDecision {
    let requirement = requirement_for(path);

    let Some(profile) = session else {
        return match requirement {
            Requirement::Public | Requirement::GuestOnly => GateDecision::Allow,
            _ => GateDecision::redirect(format!("/login?redirect={}", urlencoding::encode(path))),
        };
    };

    if profile.is_banned {
        return if matches_prefix(path, "/banned") {
            GateDecision::Allow
        } else {
            GateDecision::redirect("/banned")
        };
    }

    if requirement == Requirement::GuestOnly {
        return GateDecision::redirect("/dashboard");
    }

    if requirement != Requirement::Public
        && !profile.onboarding_completed
        && !matches_prefix(path, "/onboarding")
    {
        return GateDecision::redirect("/onboarding");
    }

    match requirement {
        Requirement::Admin if !profile.is_admin() => GateDecision::redirect("/dashboard"),
        Requirement::Premium if !(profile.is_premium || profile.is_admin()) => {
            GateDecision::redirect("/pricing")
        }
        _ => GateDecision::Allow,
    }
}

/// Session token from the bearer header, falling back to the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token.to_string());
    }
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn load_session(state: &AppState, token: &str) -> Option<SessionProfile> {
    let claims = decode_claims(&state.config.jwt.secret, token).ok()?;
    if claims.kind != TokenKind::Access {
        return None;
    }
    let user_id = uuid::Uuid::parse_str(&claims.sub).ok()?;

    // Logged-out tokens and an unreachable revocation list both mean signed out
    match AuthService::new(state.db.clone(), state.config.clone())
        .is_revoked(token)
        .await
    {
        Ok(false) => {}
        Ok(true) => return None,
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "[gate] revocation check failed");
            return None;
        }
    }

    match UserService::new(state.db.clone()).session_profile(user_id).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "[gate] failed to load session profile");
            None
        }
    }
}

pub async fn page_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if !is_gated(&path) {
        return next.run(request).await;
    }

    let session = match session_token(request.headers()) {
        Some(token) => load_session(&state, &token).await,
        None => None,
    };

    match decide(&path, session.as_ref()) {
        GateDecision::Allow => next.run(request).await,
        GateDecision::Redirect { location } => {
            tracing::debug!(%path, %location, "[gate] redirecting");
            Redirect::to(&location).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: &str, banned: bool, premium: bool, onboarded: bool) -> SessionProfile {
        SessionProfile {
            role: role.to_string(),
            is_banned: banned,
            is_premium: premium,
            onboarding_completed: onboarded,
        }
    }

    #[test]
    fn prefix_matching_respects_segments() {
        assert_eq!(requirement_for("/admin"), Requirement::Admin);
        assert_eq!(requirement_for("/admin/users/1"), Requirement::Admin);
        assert_eq!(requirement_for("/administrator"), Requirement::Public);
        assert_eq!(requirement_for("/documents/new"), Requirement::Authenticated);
        assert_eq!(requirement_for("/documents/123"), Requirement::Public);
        assert_eq!(requirement_for("/"), Requirement::Public);
    }

    #[test]
    fn anonymous_visitors_go_to_login_with_return_path() {
        assert_eq!(
            decide("/dashboard", None),
            GateDecision::redirect("/login?redirect=%2Fdashboard")
        );
        assert_eq!(
            decide("/admin/reports", None),
            GateDecision::redirect("/login?redirect=%2Fadmin%2Freports")
        );
        assert_eq!(decide("/login", None), GateDecision::Allow);
        assert_eq!(decide("/documents/abc", None), GateDecision::Allow);
    }

    #[test]
    fn banned_users_are_parked() {
        let banned = session("user", true, true, true);
        assert_eq!(decide("/dashboard", Some(&banned)), GateDecision::redirect("/banned"));
        assert_eq!(decide("/", Some(&banned)), GateDecision::redirect("/banned"));
        assert_eq!(decide("/banned", Some(&banned)), GateDecision::Allow);
    }

    #[test]
    fn signed_in_users_skip_guest_pages() {
        let user = session("user", false, false, true);
        assert_eq!(decide("/login", Some(&user)), GateDecision::redirect("/dashboard"));
        assert_eq!(decide("/register", Some(&user)), GateDecision::redirect("/dashboard"));
    }

    #[test]
    fn onboarding_comes_first() {
        let fresh = session("user", false, false, false);
        assert_eq!(decide("/dashboard", Some(&fresh)), GateDecision::redirect("/onboarding"));
        assert_eq!(decide("/onboarding", Some(&fresh)), GateDecision::Allow);
        assert_eq!(decide("/documents/abc", Some(&fresh)), GateDecision::Allow);
    }

    #[test]
    fn role_and_subscription_checks() {
        let user = session("user", false, false, true);
        let premium = session("user", false, true, true);
        let admin = session("admin", false, false, true);

        assert_eq!(decide("/admin", Some(&user)), GateDecision::redirect("/dashboard"));
        assert_eq!(decide("/admin", Some(&admin)), GateDecision::Allow);

        assert_eq!(decide("/premium/library", Some(&user)), GateDecision::redirect("/pricing"));
        assert_eq!(decide("/premium/library", Some(&premium)), GateDecision::Allow);
        assert_eq!(decide("/premium/library", Some(&admin)), GateDecision::Allow);
    }

    fn access_token(secret: &str) -> String {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let now = chrono::Utc::now().timestamp();
        let claims = crate::middleware::Claims {
            sub: uuid::Uuid::new_v4().to_string(),
            email: "rosa@unmsm.edu.pe".into(),
            role: crate::middleware::UserRole::User,
            kind: TokenKind::Access,
            iat: now as usize,
            exp: (now + 3600) as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[tokio::test]
    async fn unverifiable_revocation_means_signed_out() {
        let mut config = crate::config::Config::load().unwrap();
        // nothing listens on port 1
        config.redis.url = "redis://127.0.0.1:1/".to_string();
        let state = AppState {
            db: crate::db::Database::connect_lazy(&config).unwrap(),
            storage: std::sync::Arc::new(crate::storage::MemoryObjectStore::new("http://localhost")),
            config,
        };

        let token = access_token(&state.config.jwt.secret);
        assert!(load_session(&state, &token).await.is_none());
        assert!(load_session(&state, "not-a-jwt").await.is_none());
    }

    #[test]
    fn api_and_assets_are_not_gated() {
        assert!(!is_gated("/api/v1/documents"));
        assert!(!is_gated("/static/app.js"));
        assert!(!is_gated("/sw.js"));
        assert!(is_gated("/dashboard"));
        assert!(is_gated("/apiary"));
    }
}
