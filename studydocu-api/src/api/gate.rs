use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::middleware::gate::{self, GateDecision, Requirement};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/gate", get(check_gate))
}

#[derive(Debug, Deserialize)]
pub struct GateQuery {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct GateResponse {
    pub path: String,
    pub requirement: Requirement,
    #[serde(flatten)]
    pub decision: GateDecision,
}

/// Same decision the page gate would make, for front ends that route on the
/// client.
async fn check_gate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GateQuery>,
) -> Result<Json<GateResponse>> {
    if !query.path.starts_with('/') {
        return Err(AppError::BadRequest("La ruta debe empezar con '/'".to_string()));
    }

    let session = match gate::session_token(&headers) {
        Some(token) => gate::load_session(&state, &token).await,
        None => None,
    };

    Ok(Json(GateResponse {
        requirement: gate::requirement_for(&query.path),
        decision: gate::decide(&query.path, session.as_ref()),
        path: query.path,
    }))
}
