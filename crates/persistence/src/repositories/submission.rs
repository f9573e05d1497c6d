//! Group submission repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::discussion_group::GroupMember;
use domain::models::submission::{Evaluation, SubmittedMessage};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::GroupSubmissionEntity;
use crate::metrics::QueryTimer;

/// Snapshot to store.
#[derive(Debug, Clone)]
pub struct NewSubmission<'a> {
    pub group_id: Uuid,
    pub group_name: &'a str,
    pub topic: &'a str,
    pub members: &'a [GroupMember],
    pub messages: &'a [SubmittedMessage],
    pub evaluation: &'a Evaluation,
    pub submitted_at: DateTime<Utc>,
}

/// Repository for submission database operations.
#[derive(Clone)]
pub struct SubmissionRepository {
    pool: PgPool,
}

impl SubmissionRepository {
    /// Creates a new SubmissionRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores a scored discussion. Written once, never updated.
    pub async fn insert(
        &self,
        submission: &NewSubmission<'_>,
    ) -> Result<GroupSubmissionEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_group_submission");
        let member_ids: Vec<String> = submission.members.iter().map(|m| m.uid.clone()).collect();

        let result = sqlx::query_as::<_, GroupSubmissionEntity>(
            r#"
            INSERT INTO group_submissions
                (group_id, group_name, topic, members, messages, evaluation, member_ids, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, group_id, group_name, topic, members, messages, evaluation, member_ids, submitted_at
            "#,
        )
        .bind(submission.group_id)
        .bind(submission.group_name)
        .bind(submission.topic)
        .bind(Json(submission.members))
        .bind(Json(submission.messages))
        .bind(Json(submission.evaluation))
        .bind(&member_ids)
        .bind(submission.submitted_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Submissions that include the user, newest first.
    pub async fn list_for_member(
        &self,
        uid: &str,
    ) -> Result<Vec<GroupSubmissionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_submissions_for_member");
        let result = sqlx::query_as::<_, GroupSubmissionEntity>(
            r#"
            SELECT id, group_id, group_name, topic, members, messages, evaluation, member_ids, submitted_at
            FROM group_submissions
            WHERE member_ids @> ARRAY[$1]::text[]
            ORDER BY submitted_at DESC
            "#,
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Submissions for a room, newest first.
    pub async fn list_for_group(
        &self,
        group_id: Uuid,
    ) -> Result<Vec<GroupSubmissionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_submissions_for_group");
        let result = sqlx::query_as::<_, GroupSubmissionEntity>(
            r#"
            SELECT id, group_id, group_name, topic, members, messages, evaluation, member_ids, submitted_at
            FROM group_submissions
            WHERE group_id = $1
            ORDER BY submitted_at DESC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
