//! Extraction and validation of evaluator output.
//!
//! The evaluator is asked for a JSON object but routinely wraps it in prose
//! or code fences. The first balanced `{...}` block is taken, parsed and
//! checked field by field before anything is persisted.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::models::submission::{Evaluation, Participation, RosterEntry};

/// Why evaluator output was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvaluationParseError {
    #[error("Evaluator output contains no JSON object")]
    NoJsonBlock,

    #[error("Evaluator output is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("Evaluator output has an unexpected shape: {0}")]
    SchemaMismatch(String),
}

impl EvaluationParseError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EvaluationParseError::NoJsonBlock => "no_json_block",
            EvaluationParseError::MalformedJson(_) => "malformed_json",
            EvaluationParseError::SchemaMismatch(_) => "schema_mismatch",
        }
    }
}

/// Returns the first balanced `{...}` block in `text`.
///
/// Braces inside JSON string literals are ignored. An opening brace that is
/// never closed is skipped and the search resumes after it.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if in_string {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_string = false;
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..=i]);
                    }
                }
                _ => {}
            }
        }

        search_from = start + 1;
    }

    None
}

/// Parses raw evaluator text into a validated [`Evaluation`].
pub fn parse_evaluation(raw: &str) -> Result<Evaluation, EvaluationParseError> {
    let block = extract_json_object(raw).ok_or(EvaluationParseError::NoJsonBlock)?;
    let value: Value = serde_json::from_str(block)
        .map_err(|e| EvaluationParseError::MalformedJson(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| EvaluationParseError::SchemaMismatch("expected an object".into()))?;

    let score = parse_score(object.get("score"))?;

    let feedback = match object.get("feedback") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => return Err(mismatch("feedback must be a string")),
        None => return Err(mismatch("feedback is missing")),
    };

    let participation = match object.get("participation") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(entries)) => parse_participation(entries)?,
        Some(_) => return Err(mismatch("participation must be an object")),
    };

    Ok(Evaluation {
        score,
        feedback,
        participation,
    })
}

/// Re-keys participation notes by uid.
///
/// Keys that are already roster uids win. Other keys are matched against
/// usernames and display names, then by the entry's `name`. Notes that match
/// nobody on the roster, or a member who already has notes, are dropped.
pub fn attribute_participation(
    participation: BTreeMap<String, Participation>,
    roster: &[RosterEntry<'_>],
) -> BTreeMap<String, Participation> {
    let (exact, guessed): (Vec<_>, Vec<_>) = participation
        .into_iter()
        .partition(|(key, _)| roster.iter().any(|member| member.uid == key.as_str()));

    let mut attributed: BTreeMap<String, Participation> = exact.into_iter().collect();

    for (key, notes) in guessed {
        let member = roster
            .iter()
            .find(|member| member.is_named_by(&key))
            .or_else(|| roster.iter().find(|member| member.is_named_by(&notes.name)));
        if let Some(member) = member {
            attributed.entry(member.uid.to_string()).or_insert(notes);
        }
    }

    attributed
}

fn parse_score(value: Option<&Value>) -> Result<u8, EvaluationParseError> {
    let score = match value {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| mismatch("score is not a finite number"))?,
        Some(_) => return Err(mismatch("score must be a number")),
        None => return Err(mismatch("score is missing")),
    };

    if !score.is_finite() || !(0.0..=100.0).contains(&score) {
        return Err(mismatch(&format!("score {} is outside 0-100", score)));
    }

    Ok(score.round() as u8)
}

fn parse_participation(
    entries: &Map<String, Value>,
) -> Result<BTreeMap<String, Participation>, EvaluationParseError> {
    let mut participation = BTreeMap::new();

    for (uid, entry) in entries {
        let name = entry.get("name").and_then(Value::as_str);
        let summary = entry.get("summary").and_then(Value::as_str);
        match (name, summary) {
            (Some(name), Some(summary)) => {
                participation.insert(
                    uid.clone(),
                    Participation {
                        name: name.to_string(),
                        summary: summary.to_string(),
                    },
                );
            }
            _ => {
                return Err(mismatch(&format!(
                    "participation entry '{}' needs string name and summary",
                    uid
                )))
            }
        }
    }

    Ok(participation)
}

fn mismatch(detail: &str) -> EvaluationParseError {
    EvaluationParseError::SchemaMismatch(detail.to_string())
}
