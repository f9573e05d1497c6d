//! Group message entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::message::GroupMessage;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the group_messages table.
#[derive(Debug, Clone, FromRow)]
pub struct GroupMessageEntity {
    pub id: Uuid,
    pub group_id: Uuid,
    pub seq: i64,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_photo: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl From<GroupMessageEntity> for GroupMessage {
    fn from(entity: GroupMessageEntity) -> Self {
        Self {
            id: entity.id,
            group_id: entity.group_id,
            seq: entity.seq,
            sender_id: entity.sender_id,
            sender_name: entity.sender_name,
            sender_photo: entity.sender_photo,
            text: entity.text,
            created_at: entity.created_at,
        }
    }
}
