//! Axum route handlers for the Questions API.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::questions::models::QuestionSet;
use crate::state::AppState;

/// Longest accepted role, in characters, after trimming.
pub const MAX_ROLE_CHARS: usize = 200;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerateQuestionsResponse {
    pub questions: QuestionSet,
}

/// POST /api/generateQuestions
///
/// Returns six questions for the requested role.
/// Any body that is not a JSON object with a usable `role` is a 400.
pub async fn handle_generate_questions(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<GenerateQuestionsResponse>, AppError> {
    let Json(body) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let role = validate_role(role_field(&body)?)?;
    let questions = state.generator.generate(role).await?;

    Ok(Json(GenerateQuestionsResponse { questions }))
}

/// Reads `role` from a `{ "role": string }` body.
/// Absent or null yields `None`; arrays, scalars, and non-string roles are rejected.
pub fn role_field(body: &Value) -> Result<Option<&str>, AppError> {
    let Value::Object(fields) = body else {
        return Err(AppError::BadRequest(
            "request body must be a JSON object".to_string(),
        ));
    };

    match fields.get("role") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(role)) => Ok(Some(role.as_str())),
        Some(_) => Err(AppError::BadRequest("role must be a string".to_string())),
    }
}

/// Trims the role and enforces presence, length, and no control characters.
pub fn validate_role(role: Option<&str>) -> Result<&str, AppError> {
    let role = role.map(str::trim).unwrap_or_default();

    if role.is_empty() {
        return Err(AppError::BadRequest("role is required".to_string()));
    }
    if role.chars().count() > MAX_ROLE_CHARS {
        return Err(AppError::BadRequest(format!(
            "role must be at most {MAX_ROLE_CHARS} characters"
        )));
    }
    if role.chars().any(char::is_control) {
        return Err(AppError::BadRequest(
            "role must not contain control characters".to_string(),
        ));
    }

    Ok(role)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_role_field_reads_string_role() {
        let body = json!({ "role": "Backend Engineer" });
        assert_eq!(role_field(&body).unwrap(), Some("Backend Engineer"));
    }

    #[test]
    fn test_role_field_absent_or_null_is_none() {
        assert_eq!(role_field(&json!({})).unwrap(), None);
        assert_eq!(role_field(&json!({ "role": null })).unwrap(), None);
    }

    #[test]
    fn test_role_field_rejects_non_object_bodies() {
        for body in [json!(["Backend Engineer"]), json!("Backend Engineer"), json!(null), json!(7)] {
            let err = role_field(&body).unwrap_err();
            assert_eq!(err.kind(), "BadRequest", "body: {body}");
        }
    }

    #[test]
    fn test_role_field_rejects_non_string_role() {
        for role in [json!(42), json!(["SRE"]), json!({ "name": "SRE" })] {
            let body = json!({ "role": role });
            assert_eq!(role_field(&body).unwrap_err().kind(), "BadRequest");
        }
    }

    #[test]
    fn test_role_is_trimmed() {
        assert_eq!(
            validate_role(Some("  Backend Engineer \t")).unwrap(),
            "Backend Engineer"
        );
    }

    #[test]
    fn test_missing_or_blank_role_is_required() {
        for role in [None, Some(""), Some("   ")] {
            let err = validate_role(role).unwrap_err();
            assert_eq!(err.kind(), "BadRequest");
            assert_eq!(err.to_string(), "Bad request: role is required");
        }
    }

    #[test]
    fn test_role_length_limit_counts_chars() {
        let at_limit = "é".repeat(MAX_ROLE_CHARS);
        assert!(validate_role(Some(&at_limit)).is_ok());

        let over = "a".repeat(MAX_ROLE_CHARS + 1);
        assert_eq!(validate_role(Some(&over)).unwrap_err().kind(), "BadRequest");
    }

    #[test]
    fn test_control_characters_rejected() {
        let err = validate_role(Some("Backend\nEngineer")).unwrap_err();
        assert_eq!(err.kind(), "BadRequest");
        assert!(validate_role(Some("Back\u{0007}end")).is_err());
    }
}
