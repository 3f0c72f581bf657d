//! Health check endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health - Health check with the deployed models and session count.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let deployed: Vec<&'static str> = state
        .deployment
        .deployed_models()
        .await
        .iter()
        .map(|m| m.as_str())
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "model_server": state.deployment.endpoint(),
            "deployed_models": deployed,
            "sessions": state.bots.len().await,
        })),
    )
}
