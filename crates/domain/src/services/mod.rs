//! Domain services for Placement Prep.
//!
//! Pure functions over domain models: no I/O.

pub mod evaluation_parser;
pub mod prompts;
pub mod quiz_validation;
pub mod scoring;
pub mod topic_parser;

pub use evaluation_parser::{
    attribute_participation, extract_json_object, parse_evaluation, EvaluationParseError,
};
pub use quiz_validation::{parse_quiz_items, QuizParseError, ValidatedQuiz};
pub use scoring::{quiz_score, recent_history, recompute_stats, stats_after_append, total_score};
pub use topic_parser::{parse_topic, ParsedTopic, TopicParseError};
