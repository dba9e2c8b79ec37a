pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod parser;
pub mod services;
pub mod static_assets;
pub mod storage;
pub mod utils;

use std::sync::Arc;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::db::Database;
use crate::storage::ObjectStore;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub storage: Arc<dyn ObjectStore>,
}

pub fn build_router(state: AppState) -> Router {
    let api = api::routes(&state.config).layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::attach_user,
    ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .merge(static_assets::routes(&state.config.server.static_dir))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::page_gate,
        ))
        .layer(axum_middleware::from_fn(static_assets::cache_headers))
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
