//! Discussion scoring.
//!
//! A submission moves the room `open|scored|failed -> submitted` with a
//! compare-and-set, asks the generator for a verdict, stores an immutable
//! snapshot and then writes one history entry per member. Member updates are
//! independent: one failing does not undo the others or the submission.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domain::models::discussion_group::{DiscussionGroup, GroupMember};
use domain::models::message::GroupMessage;
use domain::models::profile::{HistoryItem, HistoryKind};
use domain::models::submission::{
    EvaluateDiscussionRequest, EvaluateMember, Evaluation, GroupSubmission, RosterEntry,
    SubmitDiscussionResponse, SubmittedMessage,
};
use domain::services::prompts::{
    evaluation_prompt, EVALUATION_MAX_OUTPUT_TOKENS, EVALUATION_TEMPERATURE,
};
use domain::services::{attribute_participation, parse_evaluation, EvaluationParseError};
use futures::future::join_all;
use persistence::entities::EvaluationStateDb;
use persistence::repositories::{
    DiscussionGroupRepository, HistoryAppend, MessageRepository, NewSubmission,
    SubmissionRepository,
};
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::generator::{GenerationError, GenerationParams, TextGenerator};
use super::profile::ProfileService;
use crate::config::EvaluationConfig;
use crate::middleware::metrics::record_evaluation;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Group not found")]
    GroupNotFound,

    #[error("Only group members can submit the discussion")]
    NotMember,

    #[error("The discussion has no messages to evaluate")]
    EmptyTranscript,

    #[error("An evaluation is already in progress for this group")]
    InProgress,

    #[error("Evaluation timed out after {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The evaluator answered with something that is not a verdict.
    #[error("{source}")]
    Parse {
        source: EvaluationParseError,
        raw: String,
    },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl EvaluationError {
    /// Label for the `evaluations_total` counter.
    pub fn outcome(&self) -> &'static str {
        match self {
            EvaluationError::Timeout(_) => "timeout",
            EvaluationError::Generation(GenerationError::NotConfigured) => "not_configured",
            EvaluationError::Generation(_) => "upstream_error",
            EvaluationError::Parse { source, .. } => source.kind(),
            EvaluationError::Database(_) => "database_error",
            EvaluationError::GroupNotFound
            | EvaluationError::NotMember
            | EvaluationError::EmptyTranscript
            | EvaluationError::InProgress => "rejected",
        }
    }
}

pub struct EvaluationService {
    pool: PgPool,
    generator: Option<Arc<dyn TextGenerator>>,
    profiles: ProfileService,
    timeout: Duration,
    stale_after_secs: i64,
}

impl EvaluationService {
    pub fn new(
        pool: PgPool,
        generator: Option<Arc<dyn TextGenerator>>,
        profiles: ProfileService,
        config: &EvaluationConfig,
    ) -> Self {
        Self {
            pool,
            generator,
            profiles,
            timeout: Duration::from_secs(config.timeout_secs),
            stale_after_secs: config.stale_after_secs(),
        }
    }

    /// Scores a room's discussion on behalf of one of its members.
    pub async fn submit(
        &self,
        group_id: Uuid,
        requester: &str,
    ) -> Result<SubmitDiscussionResponse, EvaluationError> {
        let groups = DiscussionGroupRepository::new(self.pool.clone());

        let (entity, members) = groups
            .find_with_members(group_id)
            .await?
            .ok_or(EvaluationError::GroupNotFound)?;
        let group = entity.into_domain(members);

        if !group.is_member(requester) {
            return Err(EvaluationError::NotMember);
        }

        let generator = self
            .generator
            .clone()
            .ok_or(GenerationError::NotConfigured)?;

        let messages: Vec<GroupMessage> = MessageRepository::new(self.pool.clone())
            .list_for_group(group_id, None)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        if messages.is_empty() {
            return Err(EvaluationError::EmptyTranscript);
        }

        if !groups
            .begin_evaluation(group_id, self.stale_after_secs)
            .await?
        {
            return Err(EvaluationError::InProgress);
        }

        info!(
            group_id = %group_id,
            user_id = %requester,
            members = group.members.len(),
            messages = messages.len(),
            "Evaluation started"
        );

        let submission = match self
            .evaluate_and_store(generator.as_ref(), &group, &messages)
            .await
        {
            Ok(submission) => submission,
            Err(e) => {
                if let Err(db_err) = groups
                    .finish_evaluation(group_id, EvaluationStateDb::Failed)
                    .await
                {
                    warn!(group_id = %group_id, error = %db_err, "Failed to mark evaluation as failed");
                }
                warn!(group_id = %group_id, outcome = e.outcome(), error = %e, "Evaluation failed");
                record_evaluation(e.outcome());
                return Err(e);
            }
        };

        // The snapshot is stored; a lost state write must not skip the members.
        match groups
            .finish_evaluation(group_id, EvaluationStateDb::Scored)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(group_id = %group_id, "Evaluation state changed while scoring");
            }
            Err(db_err) => {
                warn!(group_id = %group_id, error = %db_err, "Failed to mark evaluation as scored");
            }
        }

        let failed_members = self.record_member_history(&submission).await;

        info!(
            group_id = %group_id,
            submission_id = %submission.id,
            score = submission.evaluation.score,
            failed_members = failed_members.len(),
            "Evaluation scored"
        );
        record_evaluation("scored");

        Ok(SubmitDiscussionResponse {
            submission,
            failed_members,
        })
    }

    /// Scores a caller-supplied transcript. Nothing is stored.
    pub async fn evaluate_transcript(
        &self,
        request: &EvaluateDiscussionRequest,
    ) -> Result<Evaluation, EvaluationError> {
        let generator = self
            .generator
            .clone()
            .ok_or(GenerationError::NotConfigured)?;

        let roster: Vec<RosterEntry<'_>> =
            request.members.iter().map(EvaluateMember::roster_entry).collect();
        let transcript: Vec<String> = request
            .messages
            .iter()
            .map(|m| format!("{}: {}", m.sender_name, m.text))
            .collect();

        let result = self
            .score(
                generator.as_ref(),
                &request.group_name,
                &request.topic,
                &roster,
                &transcript,
            )
            .await;
        record_evaluation(match &result {
            Ok(_) => "scored",
            Err(e) => e.outcome(),
        });
        result
    }

    async fn evaluate_and_store(
        &self,
        generator: &dyn TextGenerator,
        group: &DiscussionGroup,
        messages: &[GroupMessage],
    ) -> Result<GroupSubmission, EvaluationError> {
        let roster: Vec<RosterEntry<'_>> =
            group.members.iter().map(GroupMember::roster_entry).collect();
        let transcript: Vec<String> = messages.iter().map(GroupMessage::transcript_line).collect();

        let evaluation = self
            .score(generator, &group.name, &group.topic, &roster, &transcript)
            .await?;

        let snapshot: Vec<SubmittedMessage> = messages
            .iter()
            .map(|m| SubmittedMessage {
                sender_id: m.sender_id.clone(),
                sender_name: m.sender_name.clone(),
                text: m.text.clone(),
                created_at: m.created_at.to_rfc3339(),
            })
            .collect();

        let entity = SubmissionRepository::new(self.pool.clone())
            .insert(&NewSubmission {
                group_id: group.id,
                group_name: &group.name,
                topic: &group.topic,
                members: &group.members,
                messages: &snapshot,
                evaluation: &evaluation,
                submitted_at: Utc::now(),
            })
            .await?;

        Ok(entity.into())
    }

    async fn score(
        &self,
        generator: &dyn TextGenerator,
        group_name: &str,
        topic: &str,
        roster: &[RosterEntry<'_>],
        transcript: &[String],
    ) -> Result<Evaluation, EvaluationError> {
        let prompt = evaluation_prompt(group_name, topic, roster, transcript);
        let params = GenerationParams::text(EVALUATION_TEMPERATURE, EVALUATION_MAX_OUTPUT_TOKENS);

        let raw = tokio::time::timeout(self.timeout, generator.generate(&prompt, &params))
            .await
            .map_err(|_| EvaluationError::Timeout(self.timeout.as_secs()))??;

        let mut evaluation =
            parse_evaluation(&raw).map_err(|source| EvaluationError::Parse { source, raw })?;
        evaluation.participation = attribute_participation(evaluation.participation, roster);
        Ok(evaluation)
    }

    /// Prepends the shared score to every member's history. Returns the
    /// members whose profile could not be updated.
    async fn record_member_history(&self, submission: &GroupSubmission) -> Vec<String> {
        let item = HistoryItem {
            id: submission.history_entry_id(),
            kind: HistoryKind::GroupDiscussion,
            title: submission.history_entry_title(),
            score: Some(json!(submission.evaluation.score)),
            percentage: None,
            completed_at: submission.submitted_at,
            details: Some(json!({
                "groupId": submission.group_id,
                "submissionId": submission.id,
                "feedback": submission.evaluation.feedback,
            })),
        };
        let append = HistoryAppend::new(item);

        let updates = submission.members.iter().map(|member| {
            let append = &append;
            async move {
                match self.profiles.append_history(&member.uid, append).await {
                    Ok(Some(_)) => None,
                    Ok(None) => {
                        warn!(
                            group_id = %submission.group_id,
                            user_id = %member.uid,
                            "Member has no profile, history not updated"
                        );
                        Some(member.uid.clone())
                    }
                    Err(e) => {
                        warn!(
                            group_id = %submission.group_id,
                            user_id = %member.uid,
                            error = %e,
                            "Failed to update member history"
                        );
                        Some(member.uid.clone())
                    }
                }
            }
        });

        join_all(updates).await.into_iter().flatten().collect()
    }
}
