//! Error types for the bot runner.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use labelbot_common::{ModelType, QueryType};

/// Error types for deployment, inference and bot management.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} query not supported")]
    QueryNotSupported(QueryType),

    #[error("{0} model not deployed")]
    ModelNotDeployed(ModelType),

    #[error("Deployment failed: {0}")]
    DeployFailed(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Model server communication error: {0}")]
    Communication(String),

    #[error("{0} timed out after {1}s")]
    Timeout(&'static str, u64),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Bot not found: {0}")]
    BotNotFound(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::QueryNotSupported(_) => (StatusCode::BAD_REQUEST, "query_not_supported"),
            Error::ModelNotDeployed(_) => (StatusCode::SERVICE_UNAVAILABLE, "model_not_deployed"),
            Error::DeployFailed(_) => (StatusCode::BAD_GATEWAY, "deploy_failed"),
            Error::InferenceFailed(_) => (StatusCode::BAD_GATEWAY, "inference_failed"),
            Error::Communication(_) => (StatusCode::BAD_GATEWAY, "communication_error"),
            Error::Timeout(..) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::Protocol(_) => (StatusCode::BAD_GATEWAY, "protocol_error"),
            Error::BotNotFound(_) => (StatusCode::NOT_FOUND, "bot_not_found"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string()
            }
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
