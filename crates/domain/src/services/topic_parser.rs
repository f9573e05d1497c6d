//! Parser for generated discussion topics.
//!
//! Expected shape (plain text, emphasis and fences tolerated):
//!
//! ```text
//! Topic: Should remote work be the default?
//! 1. Productivity data is mixed
//! 2. Office real estate costs
//! 3. Team culture
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::models::generation::MAX_SUPPORTING_POINTS;

lazy_static! {
    static ref TOPIC_LINE: Regex =
        Regex::new(r"(?i)^[\s*_#>]*topic[\s*_]*:[\s*_]*(.*)$").unwrap();
    static ref POINT_LINE: Regex = Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s+(.+)$").unwrap();
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopicParseError {
    #[error("Generated text has no topic line")]
    NoTopicLine,
}

/// Topic and talking points recovered from generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    pub topic: String,
    pub supporting_points: Vec<String>,
}

/// Parses the first non-empty `Topic:` line and up to three list items
/// after it. A bare `Topic:` label may carry its topic on the next line.
pub fn parse_topic(raw: &str) -> Result<ParsedTopic, TopicParseError> {
    let lines: Vec<&str> = raw
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect();

    let (index, topic) = find_topic(&lines).ok_or(TopicParseError::NoTopicLine)?;

    let supporting_points = lines[index + 1..]
        .iter()
        .filter_map(|line| POINT_LINE.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| clean(m.as_str())))
        .filter(|point| !point.is_empty())
        .take(MAX_SUPPORTING_POINTS)
        .collect();

    Ok(ParsedTopic {
        topic,
        supporting_points,
    })
}

/// Index of the line holding the topic, and the topic itself.
fn find_topic(lines: &[&str]) -> Option<(usize, String)> {
    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = TOPIC_LINE.captures(line) else {
            continue;
        };

        let inline = clean(caps.get(1).map_or("", |m| m.as_str()));
        if !inline.is_empty() {
            return Some((i, inline));
        }

        let next = lines
            .iter()
            .enumerate()
            .skip(i + 1)
            .find(|(_, next)| !next.trim().is_empty());
        if let Some((j, next)) = next {
            if !TOPIC_LINE.is_match(next) && !POINT_LINE.is_match(next) {
                let topic = clean(next);
                if !topic.is_empty() {
                    return Some((j, topic));
                }
            }
        }
    }

    None
}

/// Strips markdown emphasis and wrapping quotes.
fn clean(text: &str) -> String {
    text.trim()
        .trim_matches(|c| c == '*' || c == '_')
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}
