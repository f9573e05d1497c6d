//! Discussion group entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::discussion_group::{
    DiscussionGroup, EvaluationState, GroupMember, GroupStatus,
};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for group_status that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "group_status", rename_all = "lowercase")]
pub enum GroupStatusDb {
    Waiting,
    Active,
    Completed,
}

impl From<GroupStatusDb> for GroupStatus {
    fn from(db_status: GroupStatusDb) -> Self {
        match db_status {
            GroupStatusDb::Waiting => GroupStatus::Waiting,
            GroupStatusDb::Active => GroupStatus::Active,
            GroupStatusDb::Completed => GroupStatus::Completed,
        }
    }
}

impl From<GroupStatus> for GroupStatusDb {
    fn from(status: GroupStatus) -> Self {
        match status {
            GroupStatus::Waiting => GroupStatusDb::Waiting,
            GroupStatus::Active => GroupStatusDb::Active,
            GroupStatus::Completed => GroupStatusDb::Completed,
        }
    }
}

/// Database enum for evaluation_state that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "evaluation_state", rename_all = "lowercase")]
pub enum EvaluationStateDb {
    Open,
    Submitted,
    Scored,
    Failed,
}

impl From<EvaluationStateDb> for EvaluationState {
    fn from(db_state: EvaluationStateDb) -> Self {
        match db_state {
            EvaluationStateDb::Open => EvaluationState::Open,
            EvaluationStateDb::Submitted => EvaluationState::Submitted,
            EvaluationStateDb::Scored => EvaluationState::Scored,
            EvaluationStateDb::Failed => EvaluationState::Failed,
        }
    }
}

impl From<EvaluationState> for EvaluationStateDb {
    fn from(state: EvaluationState) -> Self {
        match state {
            EvaluationState::Open => EvaluationStateDb::Open,
            EvaluationState::Submitted => EvaluationStateDb::Submitted,
            EvaluationState::Scored => EvaluationStateDb::Scored,
            EvaluationState::Failed => EvaluationStateDb::Failed,
        }
    }
}

/// Database row mapping for the discussion_groups table.
#[derive(Debug, Clone, FromRow)]
pub struct DiscussionGroupEntity {
    pub id: Uuid,
    pub name: String,
    pub topic: String,
    pub category: String,
    pub difficulty: String,
    pub created_by: String,
    pub max_members: i32,
    pub member_count: i32,
    pub status: GroupStatusDb,
    pub evaluation_state: EvaluationStateDb,
    pub evaluation_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DiscussionGroupEntity {
    /// Builds the domain group from this row and its ordered member rows.
    pub fn into_domain(self, members: Vec<GroupMemberEntity>) -> DiscussionGroup {
        DiscussionGroup {
            id: self.id,
            name: self.name,
            topic: self.topic,
            category: self.category,
            difficulty: self.difficulty.parse().unwrap_or_default(),
            created_by: self.created_by,
            members: members.into_iter().map(GroupMember::from).collect(),
            max_members: self.max_members,
            member_count: self.member_count,
            status: self.status.into(),
            evaluation_state: self.evaluation_state.into(),
            created_at: self.created_at,
        }
    }
}

/// Member row joined with the member's profile.
#[derive(Debug, Clone, FromRow)]
pub struct GroupMemberEntity {
    pub group_id: Uuid,
    pub uid: String,
    pub username: Option<String>,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl From<GroupMemberEntity> for GroupMember {
    fn from(entity: GroupMemberEntity) -> Self {
        Self {
            uid: entity.uid,
            username: entity.username,
            display_name: entity.display_name,
            photo_url: entity.photo_url,
            joined_at: entity.joined_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [GroupStatus::Waiting, GroupStatus::Active, GroupStatus::Completed] {
            assert_eq!(GroupStatus::from(GroupStatusDb::from(status)), status);
        }
    }

    #[test]
    fn test_into_domain_keeps_member_order() {
        let group_id = Uuid::new_v4();
        let entity = DiscussionGroupEntity {
            id: group_id,
            name: "Batch A".to_string(),
            topic: "AI Ethics".to_string(),
            category: "Technology".to_string(),
            difficulty: "unknown".to_string(),
            created_by: "u1".to_string(),
            max_members: 5,
            member_count: 2,
            status: GroupStatusDb::Active,
            evaluation_state: EvaluationStateDb::Open,
            evaluation_started_at: None,
            created_at: Utc::now(),
        };
        let members = ["u1", "u2"]
            .iter()
            .map(|uid| GroupMemberEntity {
                group_id,
                uid: uid.to_string(),
                username: None,
                display_name: uid.to_uppercase(),
                photo_url: None,
                joined_at: Utc::now(),
            })
            .collect();

        let group = entity.into_domain(members);
        assert_eq!(group.members[0].uid, "u1");
        assert_eq!(group.members[1].uid, "u2");
        assert_eq!(group.status, GroupStatus::Active);
        assert_eq!(group.difficulty, domain::models::Difficulty::Medium);
    }
}
