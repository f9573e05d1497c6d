//! Generated discussion topics and quiz items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::difficulty::Difficulty;

/// Most supporting points kept for a topic.
pub const MAX_SUPPORTING_POINTS: usize = 3;

/// Quiz items requested when the caller does not say.
pub const DEFAULT_QUIZ_ITEM_COUNT: u32 = 10;

/// Options every quiz item must carry.
pub const QUIZ_OPTION_COUNT: usize = 4;

/// Request payload for generating a discussion topic.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateTopicRequest {
    #[validate(
        length(max = 100, message = "Category must be at most 100 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub category: String,

    pub difficulty: Difficulty,
}

/// A discussion topic with its talking points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTopic {
    pub topic: String,
    pub supporting_points: Vec<String>,
    pub category: String,
    pub difficulty: Difficulty,
    pub generated_at: DateTime<Utc>,
}

/// Request payload for generating quiz items.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuizItemsRequest {
    #[validate(range(min = 1, max = 20, message = "Count must be between 1 and 20"))]
    pub count: Option<u32>,

    /// Store accepted items in the question bank.
    #[serde(default)]
    pub persist: bool,
}

impl GenerateQuizItemsRequest {
    pub fn effective_count(&self) -> u32 {
        self.count.unwrap_or(DEFAULT_QUIZ_ITEM_COUNT)
    }
}

/// A validated multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizItem {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`, 0..=3.
    pub correct_answer: u8,
    pub category: String,
    pub difficulty: Difficulty,
}

/// Response for quiz generation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuizItemsResponse {
    pub data: Vec<QuizItem>,
    pub count: usize,
    /// Items dropped because they failed validation.
    pub rejected: usize,
    pub persisted: bool,
}
