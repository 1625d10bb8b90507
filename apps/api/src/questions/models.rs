//! Question data model and the QuestionSet shape contract.
//!
//! A `QuestionSet` can only exist in a valid state: both `TryFrom<Vec<Question>>`
//! and deserialization run the same checks.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of questions in every set.
pub const QUESTION_COUNT: usize = 6;
/// Questions required per difficulty level.
pub const PER_DIFFICULTY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Time budget in seconds: easy=20, medium=60, hard=120.
    pub fn timer_secs(self) -> u32 {
        match self {
            Difficulty::Easy => 20,
            Difficulty::Medium => 60,
            Difficulty::Hard => 120,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// A single interview question as produced by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    pub text: String,
    pub difficulty: Difficulty,
    pub timer: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("expected 6 questions, got {0}")]
    WrongCount(usize),

    #[error("question id {0} is outside 1..=6")]
    IdOutOfRange(u32),

    #[error("question id {0} appears more than once")]
    DuplicateId(u32),

    #[error("question {0} has empty text")]
    EmptyText(u32),

    #[error("question {id} is {difficulty} but has timer {timer}s (expected {expected}s)")]
    TimerMismatch {
        id: u32,
        difficulty: &'static str,
        timer: u32,
        expected: u32,
    },

    #[error("expected 2 {difficulty} questions, got {count}")]
    WrongDistribution {
        difficulty: &'static str,
        count: usize,
    },
}

/// Exactly six validated questions, in the order the model returned them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Question>", into = "Vec<Question>")]
pub struct QuestionSet(Vec<Question>);

impl QuestionSet {
    pub fn questions(&self) -> &[Question] {
        &self.0
    }
}

impl TryFrom<Vec<Question>> for QuestionSet {
    type Error = ShapeError;

    fn try_from(questions: Vec<Question>) -> Result<Self, Self::Error> {
        validate(&questions)?;
        Ok(Self(questions))
    }
}

impl From<QuestionSet> for Vec<Question> {
    fn from(set: QuestionSet) -> Self {
        set.0
    }
}

/// Checks every QuestionSet invariant, reporting the first violation.
fn validate(questions: &[Question]) -> Result<(), ShapeError> {
    if questions.len() != QUESTION_COUNT {
        return Err(ShapeError::WrongCount(questions.len()));
    }

    let mut seen_ids = BTreeSet::new();
    let mut per_difficulty: HashMap<Difficulty, usize> = HashMap::new();

    for question in questions {
        if !(1..=QUESTION_COUNT as u32).contains(&question.id) {
            return Err(ShapeError::IdOutOfRange(question.id));
        }
        if !seen_ids.insert(question.id) {
            return Err(ShapeError::DuplicateId(question.id));
        }
        if question.text.trim().is_empty() {
            return Err(ShapeError::EmptyText(question.id));
        }

        let expected = question.difficulty.timer_secs();
        if question.timer != expected {
            return Err(ShapeError::TimerMismatch {
                id: question.id,
                difficulty: question.difficulty.as_str(),
                timer: question.timer,
                expected,
            });
        }

        *per_difficulty.entry(question.difficulty).or_default() += 1;
    }

    // Six distinct ids in 1..=6 is exactly {1..6}; only the split remains.
    for difficulty in Difficulty::ALL {
        let count = per_difficulty.get(&difficulty).copied().unwrap_or(0);
        if count != PER_DIFFICULTY {
            return Err(ShapeError::WrongDistribution {
                difficulty: difficulty.as_str(),
                count,
            });
        }
    }

    Ok(())
}
