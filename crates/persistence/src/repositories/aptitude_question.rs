//! Aptitude question repository for database operations.

use domain::models::generation::QuizItem;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::AptitudeQuestionEntity;
use crate::metrics::QueryTimer;

/// Repository for the aptitude question bank.
#[derive(Clone)]
pub struct AptitudeQuestionRepository {
    pool: PgPool,
}

impl AptitudeQuestionRepository {
    /// Creates a new AptitudeQuestionRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All questions, oldest first.
    pub async fn list(&self) -> Result<Vec<AptitudeQuestionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_aptitude_questions");
        let result = sqlx::query_as::<_, AptitudeQuestionEntity>(
            r#"
            SELECT id, question, options, correct_answer, category, difficulty, created_at
            FROM aptitude_questions
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Questions with the given ids. Unknown ids are ignored.
    pub async fn find_by_ids(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<AptitudeQuestionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_aptitude_questions_by_ids");
        let result = sqlx::query_as::<_, AptitudeQuestionEntity>(
            r#"
            SELECT id, question, options, correct_answer, category, difficulty, created_at
            FROM aptitude_questions
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Adds validated items to the bank in one transaction.
    pub async fn insert_many(
        &self,
        items: &[QuizItem],
    ) -> Result<Vec<AptitudeQuestionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("insert_aptitude_questions");
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(items.len());

        for item in items {
            let entity = sqlx::query_as::<_, AptitudeQuestionEntity>(
                r#"
                INSERT INTO aptitude_questions (question, options, correct_answer, category, difficulty)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, question, options, correct_answer, category, difficulty, created_at
                "#,
            )
            .bind(&item.question)
            .bind(&item.options)
            .bind(item.correct_answer as i16)
            .bind(&item.category)
            .bind(item.difficulty.as_str())
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(entity);
        }

        tx.commit().await?;
        timer.record();
        Ok(inserted)
    }
}
