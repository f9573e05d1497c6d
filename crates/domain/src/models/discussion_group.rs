//! Group discussion room models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::difficulty::Difficulty;
use super::submission::RosterEntry;

/// Smallest allowed room size.
pub const MIN_GROUP_SIZE: i32 = 2;

/// Largest allowed room size.
pub const MAX_GROUP_SIZE: i32 = 10;

/// Room size used when the creator does not pick one.
pub const DEFAULT_GROUP_SIZE: i32 = 5;

/// Lifecycle status of a discussion room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    /// Fewer than two members.
    Waiting,
    Active,
    /// Closed by the creator. Members are free to join other rooms.
    Completed,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Waiting => "waiting",
            GroupStatus::Active => "active",
            GroupStatus::Completed => "completed",
        }
    }

    /// Status of an open room holding `member_count` members.
    pub fn for_member_count(member_count: i32) -> Self {
        if member_count >= MIN_GROUP_SIZE {
            GroupStatus::Active
        } else {
            GroupStatus::Waiting
        }
    }
}

impl FromStr for GroupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "waiting" => Ok(GroupStatus::Waiting),
            "active" => Ok(GroupStatus::Active),
            "completed" => Ok(GroupStatus::Completed),
            _ => Err(format!("Invalid group status: {}", s)),
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a room is in its evaluation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationState {
    Open,
    /// An evaluation is in flight.
    Submitted,
    Scored,
    Failed,
}

impl EvaluationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationState::Open => "open",
            EvaluationState::Submitted => "submitted",
            EvaluationState::Scored => "scored",
            EvaluationState::Failed => "failed",
        }
    }

    /// Returns true if a new submission may start from this state.
    pub fn accepts_submission(&self) -> bool {
        !matches!(self, EvaluationState::Submitted)
    }
}

impl fmt::Display for EvaluationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A participant in a discussion room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub uid: String,
    pub username: Option<String>,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl GroupMember {
    pub fn roster_entry(&self) -> RosterEntry<'_> {
        RosterEntry {
            uid: &self.uid,
            display_name: &self.display_name,
            username: self.username.as_deref(),
        }
    }
}

/// A discussion room with its ordered member list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionGroup {
    pub id: Uuid,
    pub name: String,
    pub topic: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub created_by: String,
    pub members: Vec<GroupMember>,
    pub max_members: i32,
    pub member_count: i32,
    pub status: GroupStatus,
    pub evaluation_state: EvaluationState,
    pub created_at: DateTime<Utc>,
}

impl DiscussionGroup {
    pub fn is_member(&self, uid: &str) -> bool {
        self.members.iter().any(|m| m.uid == uid)
    }

    pub fn is_creator(&self, uid: &str) -> bool {
        self.created_by == uid
    }

    pub fn is_full(&self) -> bool {
        self.member_count >= self.max_members
    }

    pub fn member(&self, uid: &str) -> Option<&GroupMember> {
        self.members.iter().find(|m| m.uid == uid)
    }
}

/// Request payload for creating a discussion room.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_roster_fits"))]
pub struct CreateGroupRequest {
    #[validate(
        length(max = 100, message = "Name must be at most 100 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub name: String,

    #[validate(
        length(max = 500, message = "Topic must be at most 500 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub topic: String,

    #[serde(default = "default_category")]
    #[validate(length(min = 1, max = 100, message = "Category must be between 1 and 100 characters"))]
    pub category: String,

    #[serde(default)]
    pub difficulty: Difficulty,

    #[validate(range(min = 2, max = 10, message = "Max members must be between 2 and 10"))]
    pub max_members: Option<i32>,

    /// User ids to add alongside the creator.
    #[serde(default)]
    pub invitees: Vec<String>,
}

fn default_category() -> String {
    "General".to_string()
}

impl CreateGroupRequest {
    pub fn effective_max_members(&self) -> i32 {
        self.max_members.unwrap_or(DEFAULT_GROUP_SIZE)
    }

    /// Invitees with blanks, duplicates and the creator removed, in request order.
    pub fn distinct_invitees(&self, creator: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.invitees
            .iter()
            .map(|uid| uid.trim())
            .filter(|uid| !uid.is_empty() && *uid != creator)
            .filter(|uid| seen.insert(uid.to_string()))
            .map(str::to_string)
            .collect()
    }
}

fn validate_roster_fits(request: &CreateGroupRequest) -> Result<(), ValidationError> {
    if request.invitees.len() as i64 + 1 > request.effective_max_members() as i64 {
        let mut err = ValidationError::new("too_many_invitees");
        err.message = Some("Creator plus invitees exceed the group size".into());
        return Err(err);
    }
    Ok(())
}

/// Query parameters for listing rooms.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListGroupsQuery {
    pub status: Option<GroupStatus>,
}

/// Response for listing rooms.
#[derive(Debug, Clone, Serialize)]
pub struct ListGroupsResponse {
    pub data: Vec<DiscussionGroup>,
    pub count: usize,
}

/// Response for creating a room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupResponse {
    pub group: DiscussionGroup,
    /// Invitees that were not added, with the reason.
    pub skipped_invitees: Vec<SkippedInvitee>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedInvitee {
    pub uid: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoProfile,
    InAnotherGroup,
    GroupFull,
}

/// Outcome of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
}

impl JoinOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinOutcome::Joined => "joined",
            JoinOutcome::AlreadyMember => "already_member",
        }
    }
}

/// Outcome of a leave request. Leaving a room one is not in is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveOutcome {
    Left,
    NotMember,
}

impl LeaveOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveOutcome::Left => "left",
            LeaveOutcome::NotMember => "not_member",
        }
    }
}

/// Response for join and leave requests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipChangeResponse {
    pub group_id: Uuid,
    pub outcome: String,
    pub member_count: i32,
    pub status: GroupStatus,
}
