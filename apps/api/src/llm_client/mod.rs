/// LLM Client — the single point of entry for all Gemini API calls.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// All LLM interactions MUST go through `ModelBackend`.
///
/// Model: gemini-2.5-flash (hardcoded — do not make configurable to prevent drift)
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// The model used for all LLM calls.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "gemini-2.5-flash";
const JSON_MIME_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Prompt blocked by provider: {0}")]
    Blocked(String),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// A provider-neutral structured-output request: one system instruction,
/// one user turn, and the JSON schema the reply must follow.
#[derive(Debug, Clone)]
pub struct StructuredRequest<'a> {
    pub system_instruction: &'a str,
    pub user_content: &'a str,
    pub response_schema: &'a Value,
}

/// The upstream model seam. `LlmClient` is the production implementation;
/// implementations must be safe to call from many requests at once.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Submits the request and returns the raw JSON text the model produced.
    async fn generate_json(&self, request: &StructuredRequest<'_>) -> Result<String, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    response_schema: &'a Value,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_structured(request: &StructuredRequest<'a>) -> Self {
        Self {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: request.system_instruction,
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart {
                    text: request.user_content,
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: JSON_MIME_TYPE,
                response_schema: request.response_schema,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl LlmResponse {
    /// Concatenates the text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The Gemini `generateContent` client. Cheap to clone; the inner
/// `reqwest::Client` pools connections and is shared across requests.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::with_http_client(client, api_key, base_url))
    }

    /// Wraps an already-configured `reqwest::Client`.
    pub fn with_http_client(client: Client, api_key: String, base_url: &str) -> Self {
        Self {
            client,
            api_key,
            endpoint: generate_content_url(base_url),
        }
    }

    /// Makes a single call to the Gemini API, returning the full response object.
    /// No retries: failures surface to the caller immediately.
    pub async fn call(&self, request: &StructuredRequest<'_>) -> Result<LlmResponse, LlmError> {
        let body = GenerateContentRequest::from_structured(request);

        // The key travels in a header so it never appears in URL-bearing errors.
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let llm_response: LlmResponse = response.json().await?;

        if let Some(usage) = &llm_response.usage_metadata {
            debug!(
                "LLM call succeeded: prompt_tokens={}, candidate_tokens={}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        Ok(llm_response)
    }
}

#[async_trait]
impl ModelBackend for LlmClient {
    async fn generate_json(&self, request: &StructuredRequest<'_>) -> Result<String, LlmError> {
        let response = self.call(request).await?;

        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Err(LlmError::Blocked(reason));
        }

        response.text().ok_or_else(|| {
            let finish_reason = response
                .candidates
                .first()
                .and_then(|c| c.finish_reason.as_deref())
                .unwrap_or("none");
            warn!("LLM returned no text (finish_reason: {finish_reason})");
            LlmError::EmptyContent
        })
    }
}

fn generate_content_url(base_url: &str) -> String {
    format!(
        "{}/v1beta/models/{MODEL}:generateContent",
        base_url.trim_end_matches('/')
    )
}

/// Unwraps a reply the model wrapped in a markdown code fence
/// (```` ```json ... ``` ```` or a bare ```` ``` ````). Unfenced text is only trimmed.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(fenced) = text.strip_prefix("```") else {
        return text;
    };
    let body = fenced.strip_prefix("json").unwrap_or(fenced);
    body.strip_suffix("```").unwrap_or(body).trim()
}


#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::mock_gemini::{local_client, refused_base_url, MockGemini};
    use super::*;
    use crate::questions::models::fixtures::valid_payload;

    const TEST_KEY: &str = "test-gemini-key";

    fn sample_request(schema: &Value) -> StructuredRequest<'_> {
        StructuredRequest {
            system_instruction: "be precise",
            user_content: "Role: Site Reliability Engineer",
            response_schema: schema,
        }
    }

    async fn generate_against(base_url: &str) -> Result<String, LlmError> {
        let schema = json!({ "type": "ARRAY" });
        let client = local_client(TEST_KEY, base_url);
        let request = sample_request(&schema);
        let result = client.generate_json(&request).await;
        result
    }

    #[test]
    fn test_strip_json_fences_unwraps_tagged_question_array() {
        let payload = valid_payload().to_string();
        let fenced = format!("```json\n{payload}\n```");
        assert_eq!(strip_json_fences(&fenced), payload);
    }

    #[test]
    fn test_strip_json_fences_unwraps_bare_fence() {
        let payload = valid_payload().to_string();
        let fenced = format!("```\n{payload}\n```\n");
        assert_eq!(strip_json_fences(&fenced), payload);
    }

    #[test]
    fn test_strip_json_fences_tolerates_missing_closing_fence() {
        let payload = valid_payload().to_string();
        let fenced = format!("```json {payload}");
        assert_eq!(strip_json_fences(&fenced), payload);
    }

    #[test]
    fn test_strip_json_fences_leaves_plain_json_alone() {
        let payload = valid_payload().to_string();
        assert_eq!(strip_json_fences(&format!("  {payload}\n")), payload);
    }

    #[test]
    fn test_new_client_targets_configured_base_url() {
        let client = LlmClient::new(TEST_KEY.to_string(), "http://127.0.0.1:8089/").unwrap();
        assert_eq!(
            client.endpoint,
            "http://127.0.0.1:8089/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_endpoint_url_uses_model_and_trims_slash() {
        assert_eq!(
            generate_content_url("https://generativelanguage.googleapis.com/"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_serializes_in_gemini_shape() {
        let schema = json!({ "type": "ARRAY" });
        let request = StructuredRequest {
            system_instruction: "be precise",
            user_content: "Role: Backend Engineer",
            response_schema: &schema,
        };

        let body = serde_json::to_value(GenerateContentRequest::from_structured(&request)).unwrap();

        assert_eq!(
            body,
            json!({
                "systemInstruction": { "parts": [{ "text": "be precise" }] },
                "contents": [{ "role": "user", "parts": [{ "text": "Role: Backend Engineer" }] }],
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": { "type": "ARRAY" }
                }
            })
        );
    }

    #[test]
    fn test_response_text_joins_parts_of_first_candidate() {
        let raw = json!({
            "candidates": [
                {
                    "content": { "role": "model", "parts": [{ "text": "[{\"id\":" }, { "text": "1}]" }] },
                    "finishReason": "STOP"
                },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ],
            "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 40 }
        });

        let response: LlmResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.text().as_deref(), Some("[{\"id\":1}]"));
        assert_eq!(response.usage_metadata.unwrap().candidates_token_count, 40);
    }

    #[test]
    fn test_response_without_candidates_has_no_text() {
        let response: LlmResponse =
            serde_json::from_value(json!({ "promptFeedback": { "blockReason": "SAFETY" } }))
                .unwrap();
        assert!(response.text().is_none());
        assert_eq!(
            response.prompt_feedback.unwrap().block_reason.as_deref(),
            Some("SAFETY")
        );
    }

    #[test]
    fn test_gemini_error_body_parses_message() {
        let raw = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        let parsed: GeminiError = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.error.message, "API key not valid");
    }

    #[tokio::test]
    async fn test_generate_json_returns_candidate_text() {
        let payload = valid_payload().to_string();
        let server = MockGemini::answering(&payload).await;

        let text = generate_against(&server.base_url).await.unwrap();

        assert_eq!(text, payload);
    }

    #[tokio::test]
    async fn test_key_travels_in_header_not_url() {
        let server = MockGemini::answering("[]").await;

        generate_against(&server.base_url).await.unwrap();

        let seen = server.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].api_key.as_deref(), Some(TEST_KEY));
        assert_eq!(
            seen[0].uri,
            "/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert!(!seen[0].uri.contains(TEST_KEY));
        assert_eq!(
            seen[0].body["contents"][0]["parts"][0]["text"],
            "Role: Site Reliability Engineer"
        );
        assert_eq!(
            seen[0].body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_gemini_error_body_becomes_api_error() {
        let body = json!({
            "error": { "code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT" }
        });
        let server = MockGemini::start(StatusCode::BAD_REQUEST, body.to_string()).await;

        let err = generate_against(&server.base_url).await.unwrap_err();

        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid.");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unstructured_error_body_is_kept_verbatim() {
        let server = MockGemini::start(StatusCode::SERVICE_UNAVAILABLE, "overloaded").await;

        let err = generate_against(&server.base_url).await.unwrap_err();

        assert!(matches!(
            err,
            LlmError::Api { status: 503, ref message } if message == "overloaded"
        ));
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_reported() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let server = MockGemini::start(StatusCode::OK, body.to_string()).await;

        let err = generate_against(&server.base_url).await.unwrap_err();

        assert!(matches!(err, LlmError::Blocked(ref reason) if reason == "SAFETY"));
    }

    #[tokio::test]
    async fn test_candidate_without_text_is_empty_content() {
        let body = json!({ "candidates": [{ "finishReason": "MAX_TOKENS" }] });
        let server = MockGemini::start(StatusCode::OK, body.to_string()).await;

        let err = generate_against(&server.base_url).await.unwrap_err();

        assert!(matches!(err, LlmError::EmptyContent));
    }

    #[tokio::test]
    async fn test_undecodable_envelope_is_decode_error() {
        let server = MockGemini::start(StatusCode::OK, "<html>gateway</html>").await;

        let err = generate_against(&server.base_url).await.unwrap_err();

        assert!(matches!(err, LlmError::Http(ref e) if e.is_decode()));
    }

    #[tokio::test]
    async fn test_connection_refused_is_http_error_without_key() {
        let base_url = refused_base_url().await;

        let err = generate_against(&base_url).await.unwrap_err();

        assert!(matches!(err, LlmError::Http(_)));
        assert!(!err.to_string().contains(TEST_KEY));
    }
}
