//! Admin panel API. Mounted behind `require_admin`; every mutation writes an
//! audit entry.

mod audit;
mod dashboard;
mod documents;
mod payments;
mod reports;
mod users;

use axum::Router;

use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/users", users::routes())
        .nest("/documents", documents::routes())
        .nest("/reports", reports::routes())
        .nest("/payments", payments::routes())
        .nest("/dashboard", dashboard::routes())
        .merge(audit::routes())
}
