//! Aptitude question bank and quiz attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::difficulty::Difficulty;
use super::profile::UserStats;

/// A stored multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AptitudeQuestion {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: u8,
    pub category: String,
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
}

/// Question as shown to a quiz taker: no answer key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AptitudeQuestionView {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub category: String,
    pub difficulty: Difficulty,
}

impl From<AptitudeQuestion> for AptitudeQuestionView {
    fn from(q: AptitudeQuestion) -> Self {
        Self {
            id: q.id,
            question: q.question,
            options: q.options,
            category: q.category,
            difficulty: q.difficulty,
        }
    }
}

/// Response for listing questions.
#[derive(Debug, Clone, Serialize)]
pub struct ListQuestionsResponse {
    pub data: Vec<AptitudeQuestionView>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub question_id: Uuid,
    #[validate(range(max = 3, message = "Answer index must be between 0 and 3"))]
    pub answer_index: u8,
}

/// Request payload for submitting a quiz attempt.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptRequest {
    /// Label for the attempt; also recorded in the completed-tests list.
    #[validate(length(min = 1, max = 100, message = "Test id must be between 1 and 100 characters"))]
    pub test_id: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 answers are required"))]
    #[validate(nested)]
    pub answers: Vec<AnswerSubmission>,
}

/// Per-question grading detail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswer {
    pub question_id: Uuid,
    pub answer_index: u8,
    pub correct_answer: u8,
    pub correct: bool,
}

/// Response for a graded attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub test_id: String,
    pub correct: usize,
    pub total: usize,
    pub score: u32,
    pub answers: Vec<GradedAnswer>,
    pub stats: UserStats,
}
