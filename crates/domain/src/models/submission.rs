//! Evaluation results and the immutable submission snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use super::discussion_group::GroupMember;

/// Per-participant notes returned by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participation {
    pub name: String,
    pub summary: String,
}

/// Parsed evaluator verdict for a whole discussion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Integer in 0..=100.
    pub score: u8,
    pub feedback: String,
    /// Keyed by user id.
    #[serde(default)]
    pub participation: BTreeMap<String, Participation>,
}

/// A participant as presented to the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterEntry<'a> {
    pub uid: &'a str,
    pub display_name: &'a str,
    pub username: Option<&'a str>,
}

impl RosterEntry<'_> {
    /// Roster line, e.g. `Asha K (@asha_k) [uid: u1]`.
    pub fn label(&self) -> String {
        match self.username {
            Some(username) => format!("{} (@{}) [uid: {}]", self.display_name, username, self.uid),
            None => format!("{} [uid: {}]", self.display_name, self.uid),
        }
    }

    /// Whether an evaluator-chosen key refers to this participant. The uid
    /// must match exactly; username and display name ignore case and a
    /// leading `@`.
    pub fn is_named_by(&self, key: &str) -> bool {
        if key == self.uid {
            return true;
        }
        let key = key.trim().trim_start_matches('@');
        self.username
            .is_some_and(|username| username.eq_ignore_ascii_case(key))
            || self.display_name.trim().eq_ignore_ascii_case(key)
    }
}

/// Transcript line as captured in a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedMessage {
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    /// RFC 3339.
    pub created_at: String,
}

/// Snapshot of a discussion at the time it was scored. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSubmission {
    pub id: Uuid,
    pub group_id: Uuid,
    pub group_name: String,
    pub topic: String,
    pub members: Vec<GroupMember>,
    pub messages: Vec<SubmittedMessage>,
    pub evaluation: Evaluation,
    pub submitted_at: DateTime<Utc>,
}

impl GroupSubmission {
    /// Id of the history entry written for each member.
    pub fn history_entry_id(&self) -> String {
        format!("{}-{}", self.group_id, self.submitted_at.timestamp_millis())
    }

    /// Title of the history entry written for each member.
    pub fn history_entry_title(&self) -> String {
        format!("GD: {}", self.topic)
    }
}

/// Response for a scored submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitDiscussionResponse {
    pub submission: GroupSubmission,
    /// Members whose history could not be updated.
    pub failed_members: Vec<String>,
}

/// Response for listing a user's submissions.
#[derive(Debug, Clone, Serialize)]
pub struct ListSubmissionsResponse {
    pub data: Vec<GroupSubmission>,
    pub count: usize,
}

/// Roster entry for the stateless evaluation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateMember {
    #[validate(length(min = 1, message = "Member uid is required"))]
    pub uid: String,
    pub display_name: String,
    pub username: Option<String>,
}

impl EvaluateMember {
    pub fn roster_entry(&self) -> RosterEntry<'_> {
        RosterEntry {
            uid: &self.uid,
            display_name: &self.display_name,
            username: self.username.as_deref(),
        }
    }
}

/// Transcript entry for the stateless evaluation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateMessage {
    pub sender_name: String,
    #[validate(length(max = 2000, message = "Message must be at most 2000 characters"))]
    pub text: String,
}

/// Request payload for evaluating a transcript without persisting it.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateDiscussionRequest {
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub group_name: String,

    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub topic: String,

    #[validate(length(min = 1, max = 10, message = "Between 1 and 10 members are required"))]
    #[validate(nested)]
    pub members: Vec<EvaluateMember>,

    #[validate(length(min = 1, message = "Transcript must not be empty"))]
    #[validate(nested)]
    pub messages: Vec<EvaluateMessage>,
}
