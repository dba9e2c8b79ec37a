use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::AuthService;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Profile ID
    pub email: String,
    pub role: UserRole,
    pub kind: TokenKind,
    pub exp: usize, // Expiration time
    pub iat: usize, // Issued at
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Owners and admins may manage a resource.
    pub fn can_manage(&self, owner_id: Uuid) -> bool {
        self.id == owner_id || self.is_admin()
    }
}

impl TryFrom<Claims> for CurrentUser {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?,
            email: claims.email,
            role: claims.role,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

pub fn decode_claims(secret: &str, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Endpoints that hand out tokens; a stale bearer header must not lock the
/// client out of them.
const CREDENTIAL_PATHS: &[&str] = &["/auth/login", "/auth/register", "/auth/refresh"];

/// Matches with or without the `/api/v1` prefix, which nesting strips.
pub fn is_credential_path(path: &str) -> bool {
    let path = path.strip_prefix("/api/v1").unwrap_or(path);
    CREDENTIAL_PATHS.contains(&path.trim_end_matches('/'))
}

/// Resolves the bearer token, when present, into a `CurrentUser` extension.
/// Requests without a token pass through anonymously; a bad or revoked token
/// is rejected outright, except on the credential endpoints.
pub async fn attach_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if is_credential_path(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let Some(token) = bearer_token(request.headers()).map(str::to_owned) else {
        return Ok(next.run(request).await);
    };

    let claims = decode_claims(&state.config.jwt.secret, &token)?;
    if claims.kind != TokenKind::Access {
        return Err(AppError::Unauthorized);
    }

    let auth_service = AuthService::new(state.db.clone(), state.config.clone());
    if auth_service.is_revoked(&token).await? {
        return Err(AppError::Unauthorized);
    }

    let current_user = CurrentUser::try_from(claims)?;
    request.extensions_mut().insert(current_user);

    Ok(next.run(request).await)
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let current_user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::Unauthorized)?;

    if !current_user.is_admin() {
        tracing::warn!(user_id = %current_user.id, path = %request.uri().path(), "Non-admin hit admin route");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, kind: TokenKind, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "luis@uni.edu.pe".into(),
            role: UserRole::User,
            kind,
            iat: now as usize,
            exp: (now + exp_offset) as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn decodes_valid_tokens() {
        let claims = decode_claims("s3cret", &token("s3cret", TokenKind::Access, 3600)).unwrap();
        assert_eq!(claims.kind, TokenKind::Access);
        assert!(CurrentUser::try_from(claims).is_ok());
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        assert!(decode_claims("other", &token("s3cret", TokenKind::Access, 3600)).is_err());
        assert!(decode_claims("s3cret", &token("s3cret", TokenKind::Access, -3600)).is_err());
    }

    #[test]
    fn credential_paths_skip_token_checks() {
        assert!(is_credential_path("/auth/login"));
        assert!(is_credential_path("/api/v1/auth/refresh"));
        assert!(is_credential_path("/auth/register/"));
        assert!(!is_credential_path("/auth/me"));
        assert!(!is_credential_path("/auth/logout"));
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn owners_and_admins_can_manage() {
        let owner = Uuid::new_v4();
        let user = CurrentUser { id: owner, email: "a@b.pe".into(), role: UserRole::User };
        assert!(user.can_manage(owner));
        assert!(!user.can_manage(Uuid::new_v4()));

        let admin = CurrentUser { id: Uuid::new_v4(), email: "adm@b.pe".into(), role: UserRole::Admin };
        assert!(admin.can_manage(owner));
    }
}
