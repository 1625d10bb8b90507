use std::sync::Arc;

use crate::questions::generator::QuestionGenerator;

/// Shared application state injected into all route handlers via Axum extractors.
/// Everything here is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<QuestionGenerator>,
}
