//! Validation of generated quiz items.

use serde_json::Value;
use thiserror::Error;

use crate::models::difficulty::Difficulty;
use crate::models::generation::{QuizItem, QUIZ_OPTION_COUNT};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuizParseError {
    #[error("Generated quiz is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("Generated quiz is not a list of items")]
    NotAList,

    #[error("Generated quiz contains no valid items")]
    NoValidItems,
}

/// Items that passed validation and how many were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuiz {
    pub items: Vec<QuizItem>,
    pub rejected: usize,
}

/// Parses generated quiz JSON, keeping only well-formed items.
///
/// Accepts a bare array or an object with a `questions` array, optionally
/// inside a code fence.
pub fn parse_quiz_items(raw: &str) -> Result<ValidatedQuiz, QuizParseError> {
    let body = strip_code_fence(raw);
    let value: Value =
        serde_json::from_str(body).map_err(|e| QuizParseError::MalformedJson(e.to_string()))?;

    let entries = match &value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("questions") {
            Some(Value::Array(items)) => items,
            _ => return Err(QuizParseError::NotAList),
        },
        _ => return Err(QuizParseError::NotAList),
    };

    let items: Vec<QuizItem> = entries.iter().filter_map(validate_item).collect();
    let rejected = entries.len() - items.len();

    if items.is_empty() {
        return Err(QuizParseError::NoValidItems);
    }

    Ok(ValidatedQuiz { items, rejected })
}

/// Checks one item: non-empty question, exactly four non-empty options and
/// an answer index within them.
pub fn validate_item(value: &Value) -> Option<QuizItem> {
    let question = value.get("question")?.as_str()?.trim();
    if question.is_empty() {
        return None;
    }

    let options: Vec<String> = value
        .get("options")?
        .as_array()?
        .iter()
        .map(|o| o.as_str().map(|s| s.trim().to_string()))
        .collect::<Option<Vec<_>>>()?;
    if options.len() != QUIZ_OPTION_COUNT || options.iter().any(String::is_empty) {
        return None;
    }

    let answer = value.get("correctAnswer")?.as_f64()?;
    if answer.fract() != 0.0 || !(0.0..QUIZ_OPTION_COUNT as f64).contains(&answer) {
        return None;
    }

    let category = value
        .get("category")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("General")
        .to_string();

    let difficulty = value
        .get("difficulty")
        .and_then(Value::as_str)
        .and_then(|d| d.parse::<Difficulty>().ok())
        .unwrap_or_default();

    Some(QuizItem {
        question: question.to_string(),
        options,
        correct_answer: answer as u8,
        category,
        difficulty,
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_item() -> Value {
        json!({
            "question": "What is 15% of 200?",
            "options": ["20", "30", "35", "40"],
            "correctAnswer": 1,
            "category": "Quantitative",
            "difficulty": "easy"
        })
    }

    #[test]
    fn test_accepts_valid_item() {
        let item = validate_item(&valid_item()).unwrap();
        assert_eq!(item.correct_answer, 1);
        assert_eq!(item.difficulty, Difficulty::Easy);
        assert_eq!(item.category, "Quantitative");
    }

    #[test]
    fn test_rejects_wrong_option_count() {
        let mut item = valid_item();
        item["options"] = json!(["a", "b", "c"]);
        assert!(validate_item(&item).is_none());
    }

    #[test]
    fn test_rejects_answer_out_of_range() {
        let mut item = valid_item();
        item["correctAnswer"] = json!(4);
        assert!(validate_item(&item).is_none());

        item["correctAnswer"] = json!(-1);
        assert!(validate_item(&item).is_none());

        item["correctAnswer"] = json!(1.5);
        assert!(validate_item(&item).is_none());
    }

    #[test]
    fn test_rejects_blank_question() {
        let mut item = valid_item();
        item["question"] = json!("  ");
        assert!(validate_item(&item).is_none());
    }

    #[test]
    fn test_defaults_for_missing_category_and_difficulty() {
        let item = validate_item(&json!({
            "question": "Odd one out?",
            "options": ["a", "b", "c", "d"],
            "correctAnswer": 3
        }))
        .unwrap();
        assert_eq!(item.category, "General");
        assert_eq!(item.difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_drops_invalid_items_and_counts_them() {
        let raw = json!([
            valid_item(),
            { "question": "Broken", "options": ["x"], "correctAnswer": 0 },
            valid_item()
        ])
        .to_string();

        let quiz = parse_quiz_items(&raw).unwrap();
        assert_eq!(quiz.items.len(), 2);
        assert_eq!(quiz.rejected, 1);
    }

    #[test]
    fn test_accepts_fenced_questions_object() {
        let raw = format!("```json\n{}\n```", json!({ "questions": [valid_item()] }));
        let quiz = parse_quiz_items(&raw).unwrap();
        assert_eq!(quiz.items.len(), 1);
    }

    #[test]
    fn test_all_invalid_is_an_error() {
        let raw = json!([{ "question": "" }]).to_string();
        assert_eq!(parse_quiz_items(&raw), Err(QuizParseError::NoValidItems));
    }

    #[test]
    fn test_not_a_list() {
        assert_eq!(parse_quiz_items("42"), Err(QuizParseError::NotAList));
        assert!(matches!(
            parse_quiz_items("not json"),
            Err(QuizParseError::MalformedJson(_))
        ));
    }
}
