use std::net::SocketAddr;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studydocu_api::config::Config;
use studydocu_api::db::Database;
use studydocu_api::services::run_expiry_sweep;
use studydocu_api::{build_router, storage, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::load()?;
    tracing::info!("Configuration loaded successfully");

    let db = Database::connect(&config).await?;
    tracing::info!("Database connections established");

    db.run_migrations().await?;

    let storage = storage::connect(&config.storage).await?;

    tokio::spawn(run_expiry_sweep(
        db.clone(),
        Duration::from_secs(config.payments.expiry_sweep_secs),
    ));

    let state = AppState {
        db,
        config: config.clone(),
        storage,
    };
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "studydocu_api=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
