//! Group submission entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::discussion_group::GroupMember;
use domain::models::submission::{Evaluation, GroupSubmission, SubmittedMessage};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the group_submissions table.
#[derive(Debug, Clone, FromRow)]
pub struct GroupSubmissionEntity {
    pub id: Uuid,
    pub group_id: Uuid,
    pub group_name: String,
    pub topic: String,
    pub members: Json<Vec<GroupMember>>,
    pub messages: Json<Vec<SubmittedMessage>>,
    pub evaluation: Json<Evaluation>,
    pub member_ids: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

impl From<GroupSubmissionEntity> for GroupSubmission {
    fn from(entity: GroupSubmissionEntity) -> Self {
        Self {
            id: entity.id,
            group_id: entity.group_id,
            group_name: entity.group_name,
            topic: entity.topic,
            members: entity.members.0,
            messages: entity.messages.0,
            evaluation: entity.evaluation.0,
            submitted_at: entity.submitted_at,
        }
    }
}
