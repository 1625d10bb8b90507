// Prompt constants and the response schema for question generation.
// The role is only ever sent as user content, never spliced into the system instruction.

use std::sync::OnceLock;

use serde_json::{json, Value};

use crate::llm_client::StructuredRequest;

/// System instruction for question generation.
pub const QUESTIONS_SYSTEM: &str = "You are an expert interview question generator. \
    Generate exactly 6 interview questions for the role specified by the user. \
    The questions must be divided exactly into 2 easy (20s), 2 medium (60s), and 2 hard (120s). \
    Number the questions with ids 1 through 6. \
    Ensure the output strictly follows the provided JSON schema.";

/// Prefix of the user turn. The role follows verbatim.
pub const ROLE_PREFIX: &str = "Role: ";

/// The structured-output schema for a QuestionSet, in Gemini's OpenAPI subset.
/// Built once per process. It constrains shape only; counts per difficulty
/// are checked after parsing.
pub fn question_set_schema() -> &'static Value {
    static SCHEMA: OnceLock<Value> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        json!({
            "type": "ARRAY",
            "description": "An array of exactly six interview questions.",
            "minItems": 6,
            "maxItems": 6,
            "items": {
                "type": "OBJECT",
                "properties": {
                    "id": {
                        "type": "INTEGER",
                        "description": "A unique identifier for the question (1-6)."
                    },
                    "text": {
                        "type": "STRING",
                        "description": "The actual interview question text."
                    },
                    "difficulty": {
                        "type": "STRING",
                        "enum": ["easy", "medium", "hard"],
                        "description": "The difficulty level, must be 'easy', 'medium', or 'hard'."
                    },
                    "timer": {
                        "type": "INTEGER",
                        "description": "The allocated time in seconds (must be 20, 60, or 120)."
                    }
                },
                "required": ["id", "text", "difficulty", "timer"],
                "propertyOrdering": ["id", "text", "difficulty", "timer"]
            }
        })
    })
}

/// Everything the model needs for one generation call.
#[derive(Debug, Clone)]
pub struct QuestionPrompt {
    pub system_instruction: &'static str,
    pub user_content: String,
    pub response_schema: &'static Value,
}

impl QuestionPrompt {
    pub fn for_role(role: &str) -> Self {
        Self {
            system_instruction: QUESTIONS_SYSTEM,
            user_content: format!("{ROLE_PREFIX}{role}"),
            response_schema: question_set_schema(),
        }
    }

    pub fn as_request(&self) -> StructuredRequest<'_> {
        StructuredRequest {
            system_instruction: self.system_instruction,
            user_content: &self.user_content,
            response_schema: self.response_schema,
        }
    }
}
