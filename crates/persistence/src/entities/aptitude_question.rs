//! Aptitude question entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::aptitude::AptitudeQuestion;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the aptitude_questions table.
#[derive(Debug, Clone, FromRow)]
pub struct AptitudeQuestionEntity {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: i16,
    pub category: String,
    pub difficulty: String,
    pub created_at: DateTime<Utc>,
}

impl From<AptitudeQuestionEntity> for AptitudeQuestion {
    fn from(entity: AptitudeQuestionEntity) -> Self {
        Self {
            id: entity.id,
            question: entity.question,
            options: entity.options,
            correct_answer: entity.correct_answer.clamp(0, 3) as u8,
            category: entity.category,
            difficulty: entity.difficulty.parse().unwrap_or_default(),
            created_at: entity.created_at,
        }
    }
}
