//! Prompt construction for the text generator.

use serde_json::{json, Value};

use crate::models::difficulty::Difficulty;
use crate::models::submission::RosterEntry;

/// Sampling temperature for discussion evaluation.
pub const EVALUATION_TEMPERATURE: f32 = 0.2;

/// Output token cap for discussion evaluation.
pub const EVALUATION_MAX_OUTPUT_TOKENS: u32 = 1024;

/// Sampling temperature for topic generation.
pub const TOPIC_TEMPERATURE: f32 = 0.9;

/// Output token cap for topic generation.
pub const TOPIC_MAX_OUTPUT_TOKENS: u32 = 512;

/// Output token cap for quiz generation.
pub const QUIZ_MAX_OUTPUT_TOKENS: u32 = 4096;

/// Builds the evaluation prompt from the roster and transcript lines
/// (`Sender: text`). Participation must come back keyed by the uids shown in
/// the roster.
pub fn evaluation_prompt(
    group_name: &str,
    topic: &str,
    roster: &[RosterEntry<'_>],
    transcript: &[String],
) -> String {
    let members: Vec<String> = roster.iter().map(RosterEntry::label).collect();
    format!(
        "You are an expert group discussion evaluator.\n\n\
         Group Name: {group_name}\n\
         Topic: {topic}\n\
         Members: {members}\n\n\
         Chat Transcript:\n{transcript}\n\n\
         Evaluate the group discussion as follows:\n\
         1. Score the group out of 100 based on participation, relevance, and quality.\n\
         2. Give a short feedback summary.\n\
         3. For each member, summarize their participation and contribution.\n\n\
         Respond with a single JSON object in this format, using each member's uid \
         from the Members list as the participation key:\n\
         {{\n  \"score\": number,\n  \"feedback\": string,\n  \
         \"participation\": {{ \"<uid>\": {{ \"name\": string, \"summary\": string }} }}\n}}",
        members = members.join(", "),
        transcript = transcript.join("\n"),
    )
}

/// Builds the topic prompt. The answer must follow the `Topic:` line format.
pub fn topic_prompt(category: &str, difficulty: Difficulty) -> String {
    format!(
        "Generate one group discussion topic for a campus placement interview.\n\
         Category: {category}\n\
         Difficulty: {difficulty}\n\n\
         Reply in plain text using exactly this format:\n\
         Topic: <the topic as a single sentence>\n\
         1. <first supporting point>\n\
         2. <second supporting point>\n\
         3. <third supporting point>"
    )
}

/// Builds the quiz prompt.
pub fn quiz_prompt(count: u32) -> String {
    format!(
        "Generate an array of {count} aptitude test questions in JSON format. \
         The questions should cover Logical Reasoning, Quantitative, and Verbal categories. \
         The difficulties should be a mix of easy, medium, and hard. \
         For each question, include the following fields:\n\
         - question (string): The question text.\n\
         - options (array of strings): Exactly 4 answer options.\n\
         - correctAnswer (number): The 0-based index of the correct answer within the options array.\n\
         - category (string): The category of the question (e.g., \"Logical Reasoning\", \"Quantitative\", or \"Verbal\").\n\
         - difficulty (string): The difficulty of the question (\"easy\", \"medium\", or \"hard\")."
    )
}

/// Response schema constraining quiz output to an array of items.
pub fn quiz_response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "question": { "type": "STRING" },
                "options": { "type": "ARRAY", "items": { "type": "STRING" } },
                "correctAnswer": { "type": "NUMBER" },
                "category": { "type": "STRING" },
                "difficulty": { "type": "STRING" }
            },
            "propertyOrdering": ["question", "options", "correctAnswer", "category", "difficulty"]
        }
    })
}
