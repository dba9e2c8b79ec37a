use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::error::Result;
use crate::services::{ChartDataPoint, DashboardService, DashboardStats};
use crate::AppState;

const CHART_DAYS: i32 = 7;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(get_dashboard))
}

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub stats: DashboardStats,
    pub uploads_last_week: Vec<ChartDataPoint>,
}

async fn get_dashboard(State(state): State<AppState>) -> Result<Json<AdminDashboard>> {
    let service = DashboardService::new(state.db.clone());
    let stats = service.get_stats().await?;
    let uploads_last_week = service.uploads_chart(CHART_DAYS).await?;

    Ok(Json(AdminDashboard {
        stats,
        uploads_last_week,
    }))
}
