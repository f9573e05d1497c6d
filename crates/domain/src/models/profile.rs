//! User profile domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Kind of activity recorded in a user's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryKind {
    #[serde(rename = "aptitude")]
    Aptitude,
    /// Individually prepared discussion topic.
    #[serde(rename = "gd")]
    Gd,
    /// Scored group discussion session.
    #[serde(rename = "group-discussion")]
    GroupDiscussion,
    #[serde(rename = "coding")]
    Coding,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Aptitude => "aptitude",
            HistoryKind::Gd => "gd",
            HistoryKind::GroupDiscussion => "group-discussion",
            HistoryKind::Coding => "coding",
        }
    }

    /// Returns true for either flavour of group discussion entry.
    pub fn is_discussion(&self) -> bool {
        matches!(self, HistoryKind::Gd | HistoryKind::GroupDiscussion)
    }
}

impl FromStr for HistoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aptitude" => Ok(HistoryKind::Aptitude),
            "gd" => Ok(HistoryKind::Gd),
            "group-discussion" => Ok(HistoryKind::GroupDiscussion),
            "coding" => Ok(HistoryKind::Coding),
            _ => Err(format!("Invalid history type: {}", s)),
        }
    }
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One completed activity attached to a profile. Never edited once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub title: String,
    /// Kept as raw JSON: entries written by older clients may carry
    /// non-numeric scores, which scoring ignores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl HistoryItem {
    /// Numeric score, if the entry has one.
    pub fn numeric_score(&self) -> Option<f64> {
        self.score
            .as_ref()
            .and_then(|v| v.as_f64())
            .filter(|s| s.is_finite())
    }
}

/// Aggregate counters on a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    #[serde(default)]
    pub aptitude_tests_completed: i64,
    #[serde(default)]
    pub gd_topics_prepared: i64,
    #[serde(default)]
    pub coding_challenges_completed: i64,
    #[serde(default)]
    pub gd_count: i64,
    #[serde(default)]
    pub total_score: f64,
}

/// Per-user profile record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub username: Option<String>,
    pub photo_url: Option<String>,
    pub has_set_username: bool,
    pub stats: UserStats,
    pub history: Vec<HistoryItem>,
    pub completed_coding_challenges: Vec<String>,
    pub completed_aptitude_tests: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity fields used when a profile is first created.
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
}

impl NewProfile {
    /// Derives a display name the same way sign-in does: explicit name, else
    /// the local part of the email, else a placeholder.
    pub fn new(uid: &str, email: Option<&str>, name: Option<&str>, picture: Option<&str>) -> Self {
        let email = email.unwrap_or_default().to_string();
        let display_name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| {
                email
                    .split('@')
                    .next()
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Unknown User".to_string());

        Self {
            uid: uid.to_string(),
            email,
            display_name,
            photo_url: picture.map(str::to_string).filter(|p| !p.is_empty()),
        }
    }
}

/// Request payload for setting a username.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetUsernameRequest {
    #[validate(custom(function = "shared::validation::validate_username"))]
    pub username: String,
}

/// Request payload for updating profile fields.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Display name must be between 1 and 100 characters"
    ))]
    pub display_name: Option<String>,

    #[validate(length(max = 2048, message = "Photo URL must be at most 2048 characters"))]
    pub photo_url: Option<String>,
}

/// Request payload for recording an activity.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddHistoryRequest {
    #[serde(rename = "type")]
    pub kind: HistoryKind,

    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(custom(function = "shared::validation::validate_score"))]
    pub score: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_score"))]
    pub percentage: Option<f64>,

    pub details: Option<serde_json::Value>,
}

impl AddHistoryRequest {
    /// Problem id of a coding entry, used to track completed challenges.
    pub fn coding_problem_id(&self) -> Option<String> {
        if self.kind != HistoryKind::Coding {
            return None;
        }
        self.details
            .as_ref()
            .and_then(|d| d.get("problemId"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .filter(|s| !s.is_empty())
    }
}

/// Query parameters for recent history.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RecentHistoryQuery {
    #[serde(rename = "type")]
    pub kind: Option<HistoryKind>,
    pub limit: Option<usize>,
}

/// Response for recent history.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub data: Vec<HistoryItem>,
    pub count: usize,
}

/// Change notification published after every profile mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProfileEvent {
    Created { profile: UserProfile },
    Updated { profile: UserProfile },
    HistoryAdded { uid: String, item: HistoryItem, stats: UserStats },
}

impl ProfileEvent {
    /// The user this event belongs to.
    pub fn uid(&self) -> &str {
        match self {
            ProfileEvent::Created { profile } | ProfileEvent::Updated { profile } => &profile.uid,
            ProfileEvent::HistoryAdded { uid, .. } => uid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_kind_serde_names() {
        assert_eq!(
            serde_json::to_value(HistoryKind::GroupDiscussion).unwrap(),
            json!("group-discussion")
        );
        let kind: HistoryKind = serde_json::from_value(json!("gd")).unwrap();
        assert_eq!(kind, HistoryKind::Gd);
    }

    #[test]
    fn test_history_kind_from_str() {
        assert_eq!("Coding".parse::<HistoryKind>().unwrap(), HistoryKind::Coding);
        assert!("essay".parse::<HistoryKind>().is_err());
    }

    #[test]
    fn test_history_kind_is_discussion() {
        assert!(HistoryKind::Gd.is_discussion());
        assert!(HistoryKind::GroupDiscussion.is_discussion());
        assert!(!HistoryKind::Aptitude.is_discussion());
    }

    #[test]
    fn test_history_item_numeric_score() {
        let item: HistoryItem = serde_json::from_value(json!({
            "id": "h1",
            "type": "aptitude",
            "title": "Quiz",
            "score": 70,
            "completedAt": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(item.numeric_score(), Some(70.0));

        let text_score = HistoryItem {
            score: Some(json!("70")),
            ..item.clone()
        };
        assert_eq!(text_score.numeric_score(), None);

        let no_score = HistoryItem { score: None, ..item };
        assert_eq!(no_score.numeric_score(), None);
    }

    #[test]
    fn test_new_profile_display_name_fallbacks() {
        let named = NewProfile::new("u1", Some("asha@example.com"), Some("Asha K"), None);
        assert_eq!(named.display_name, "Asha K");

        let from_email = NewProfile::new("u2", Some("ravi@example.com"), Some("  "), None);
        assert_eq!(from_email.display_name, "ravi");

        let anonymous = NewProfile::new("u3", None, None, Some(""));
        assert_eq!(anonymous.display_name, "Unknown User");
        assert!(anonymous.photo_url.is_none());
    }

    #[test]
    fn test_set_username_request_validation() {
        let ok = SetUsernameRequest {
            username: "asha_k".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad = SetUsernameRequest {
            username: "a!".to_string(),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_add_history_request_rejects_out_of_range_score() {
        let request: AddHistoryRequest = serde_json::from_value(json!({
            "type": "coding",
            "title": "Two Sum",
            "score": 140
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_coding_problem_id() {
        let request: AddHistoryRequest = serde_json::from_value(json!({
            "type": "coding",
            "title": "Two Sum",
            "score": 10,
            "details": { "problemId": "two-sum" }
        }))
        .unwrap();
        assert_eq!(request.coding_problem_id().as_deref(), Some("two-sum"));

        let aptitude = AddHistoryRequest {
            kind: HistoryKind::Aptitude,
            ..request
        };
        assert!(aptitude.coding_problem_id().is_none());
    }

    #[test]
    fn test_profile_event_tagging() {
        let event = ProfileEvent::HistoryAdded {
            uid: "u1".to_string(),
            item: HistoryItem {
                id: "h1".to_string(),
                kind: HistoryKind::Coding,
                title: "Two Sum".to_string(),
                score: Some(json!(10)),
                percentage: None,
                completed_at: Utc::now(),
                details: None,
            },
            stats: UserStats::default(),
        };
        assert_eq!(event.uid(), "u1");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "history_added");
    }
}
