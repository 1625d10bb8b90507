//! Question generation — build prompt → call model → parse → validate.
//!
//! Structured output is a hint to the model, not a guarantee. Every reply is
//! re-validated as a `QuestionSet` before it leaves this module.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::errors::AppError;
use crate::llm_client::{strip_json_fences, LlmError, ModelBackend};
use crate::questions::models::QuestionSet;
use crate::questions::prompts::QuestionPrompt;

/// Runs one structured-output call per request. Holds no per-request state,
/// so a single instance is shared by every handler.
pub struct QuestionGenerator {
    backend: Arc<dyn ModelBackend>,
    timeout: Duration,
}

impl QuestionGenerator {
    pub fn new(backend: Arc<dyn ModelBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Upper bound on a single upstream call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Generates six questions for an already-validated role.
    ///
    /// Errors:
    /// - `UpstreamTransport` — network, non-2xx, or provider block
    /// - `UpstreamTimeout` — no reply within the configured timeout
    /// - `UpstreamShape` — reply is not JSON or breaks a QuestionSet invariant
    pub async fn generate(&self, role: &str) -> Result<QuestionSet, AppError> {
        let prompt = QuestionPrompt::for_role(role);

        let request = prompt.as_request();
        let raw = tokio::time::timeout(self.timeout, self.backend.generate_json(&request))
            .await
            .map_err(|_| AppError::UpstreamTimeout(self.timeout.as_secs()))?
            .map_err(|e| self.classify(e))?;

        let questions = parse_question_set(&raw)?;
        info!(
            "Generated {} questions for role ({} chars)",
            questions.questions().len(),
            role.chars().count()
        );

        Ok(questions)
    }

    fn classify(&self, error: LlmError) -> AppError {
        match error {
            LlmError::Http(e) if e.is_timeout() => {
                AppError::UpstreamTimeout(self.timeout.as_secs())
            }
            LlmError::Http(e) if e.is_decode() => {
                AppError::UpstreamShape(format!("undecodable provider response: {e}"))
            }
            LlmError::EmptyContent => AppError::UpstreamShape(LlmError::EmptyContent.to_string()),
            other => AppError::UpstreamTransport(other.to_string()),
        }
    }
}

/// Parses the model's JSON text into a validated `QuestionSet`.
pub fn parse_question_set(raw: &str) -> Result<QuestionSet, AppError> {
    serde_json::from_str::<QuestionSet>(strip_json_fences(raw))
        .map_err(|e| AppError::UpstreamShape(e.to_string()))
}
