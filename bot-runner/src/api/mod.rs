//! Status HTTP API.

pub mod bots;
pub mod health;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the versioned API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().merge(bots::router())
}

/// Build the full application with health check and middleware.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/v1", router())
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
