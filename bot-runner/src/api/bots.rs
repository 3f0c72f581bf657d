//! Bot session status endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::bot::SessionStatus;
use crate::error::{Error, Result};
use crate::state::AppState;

/// Build the bots router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bots", get(list_bots))
        .route("/bots/:session_id/reset", post(reset_bot))
}

#[derive(Debug, Serialize)]
struct BotsResponse {
    bots: Vec<SessionStatus>,
}

/// GET /v1/bots - Status of every running session.
async fn list_bots(State(state): State<Arc<AppState>>) -> Json<BotsResponse> {
    Json(BotsResponse {
        bots: state.bots.statuses().await,
    })
}

/// POST /v1/bots/:session_id/reset - Reset the action counter of a session.
async fn reset_bot(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatus>> {
    let session = state
        .bots
        .get(&session_id)
        .await
        .ok_or_else(|| Error::BotNotFound(session_id.clone()))?;

    let mut session = session.lock().await;
    session.reset_action_count();
    tracing::info!("Reset action count of session {}", session_id);
    Ok(Json(session.status()))
}
