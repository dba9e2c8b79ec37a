mod admin;
mod auth;
mod documents;
mod gate;
mod payments;
mod profile;
mod social;

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts},
    middleware, Router,
};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{AuditAction, CreateAuditLog, ResourceType};
use crate::AppState;

pub fn routes(config: &Config) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::routes())
        .merge(documents::routes(config.storage.max_upload_bytes))
        .merge(social::routes())
        .merge(profile::routes())
        .merge(payments::routes())
        .merge(gate::routes())
        .nest(
            "/admin",
            admin::routes().route_layer(middleware::from_fn(crate::middleware::require_admin)),
        )
        .fallback(unknown_endpoint)
}

async fn unknown_endpoint() -> AppError {
    AppError::NotFound("Endpoint no encontrado".to_string())
}

/// Caller address and user agent, recorded on audit entries.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    fn from_parts(parts: &Parts) -> Self {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let ip_address = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self {
            ip_address,
            user_agent,
        }
    }

    pub fn audit(
        &self,
        admin_id: Uuid,
        action: AuditAction,
        resource_type: ResourceType,
        resource_id: impl ToString,
        details: Option<serde_json::Value>,
    ) -> CreateAuditLog {
        CreateAuditLog {
            admin_id,
            action,
            resource_type,
            resource_id: Some(resource_id.to_string()),
            details,
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}
