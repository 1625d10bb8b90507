use axum::{extract::State, Json};
use serde::Serialize;

use crate::llm_client::MODEL;
use crate::state::AppState;

/// Liveness payload. Reports which model backs question generation and how
/// long a request may wait on it; no upstream call is made.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub model: &'static str,
    pub upstream_timeout_secs: u64,
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "questions-api",
        version: env!("CARGO_PKG_VERSION"),
        model: MODEL,
        upstream_timeout_secs: state.generator.timeout().as_secs(),
    })
}
