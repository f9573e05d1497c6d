//! Chat message models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Longest accepted message body, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// A message in a room's transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessage {
    pub id: Uuid,
    pub group_id: Uuid,
    /// Tie-breaker for messages sharing a timestamp.
    pub seq: i64,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_photo: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl GroupMessage {
    /// Transcript line, e.g. `Asha: I think...`.
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.sender_name, self.text)
    }
}

/// Request payload for posting a message.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PostMessageRequest {
    #[validate(
        length(max = 2000, message = "Message must be at most 2000 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub text: String,
}

impl PostMessageRequest {
    /// Body as stored: trimmed.
    pub fn normalized_text(&self) -> String {
        self.text.trim().to_string()
    }
}

/// Response for a transcript read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    pub data: Vec<GroupMessage>,
    pub count: usize,
    /// Cursor of the last message, for incremental reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Query parameters for a transcript read.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListMessagesQuery {
    /// Only return messages after this position.
    pub after: Option<String>,
}
