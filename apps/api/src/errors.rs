use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// User-visible message for every upstream and internal failure.
/// Diagnostic detail stays in the logs.
pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate questions. Check server logs.";

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// This is the only place error kinds are mapped to status codes.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream transport error: {0}")]
    UpstreamTransport(String),

    #[error("Upstream timed out after {0}s")]
    UpstreamTimeout(u64),

    #[error("Upstream returned an invalid payload: {0}")]
    UpstreamShape(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable kind name, used as the `kind` field of failure logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BadRequest",
            AppError::UpstreamTransport(_) => "UpstreamTransport",
            AppError::UpstreamTimeout(_) => "UpstreamTimeout",
            AppError::UpstreamShape(_) => "UpstreamShape",
            AppError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamTransport(_)
            | AppError::UpstreamTimeout(_)
            | AppError::UpstreamShape(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        let message = match &self {
            AppError::BadRequest(msg) => {
                tracing::warn!(kind, cause = %msg, "Rejected request");
                msg.clone()
            }
            AppError::Internal(e) => {
                tracing::error!(kind, cause = ?e, "Internal error");
                GENERATION_FAILED_MESSAGE.to_string()
            }
            upstream => {
                tracing::error!(kind, cause = %upstream, "Question generation failed");
                GENERATION_FAILED_MESSAGE.to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
