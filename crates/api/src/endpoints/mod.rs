//! API endpoints.

mod admin;
mod forms;

use axum::{Router, routing::get};

use crate::middleware::AppState;

async fn health() -> &'static str {
    "ok"
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/forms", forms::router())
        .nest("/admin", admin::router())
}
