//! Discussion scoring routes.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::submission::{
    EvaluateDiscussionRequest, Evaluation, GroupSubmission, ListSubmissionsResponse,
    SubmitDiscussionResponse,
};
use persistence::repositories::SubmissionRepository;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

/// Score the room's discussion and record it for every member.
///
/// POST /api/v1/groups/:group_id/submit
///
/// Requires JWT authentication. Members only. 409 while another evaluation
/// of the same room is in flight.
pub async fn submit_discussion(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<SubmitDiscussionResponse>, ApiError> {
    let response = state
        .evaluation_service()
        .submit(group_id, &user_auth.uid)
        .await?;

    info!(
        group_id = %group_id,
        user_id = %user_auth.uid,
        submission_id = %response.submission.id,
        score = response.submission.evaluation.score,
        "Discussion submitted"
    );

    Ok(Json(response))
}

/// Scored discussions the caller took part in, newest first.
///
/// GET /api/v1/submissions
///
/// Requires JWT authentication.
pub async fn list_submissions(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<Json<ListSubmissionsResponse>, ApiError> {
    let data: Vec<GroupSubmission> = SubmissionRepository::new(state.pool.clone())
        .list_for_member(&user_auth.uid)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(ListSubmissionsResponse {
        count: data.len(),
        data,
    }))
}

/// Score a caller-supplied transcript without storing anything.
///
/// POST /api/v1/evaluate-discussion
///
/// Requires JWT authentication. Rate limited per user.
pub async fn evaluate_discussion(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<EvaluateDiscussionRequest>,
) -> Result<Json<Evaluation>, ApiError> {
    request.validate()?;

    let evaluation = state
        .evaluation_service()
        .evaluate_transcript(&request)
        .await?;

    info!(
        user_id = %user_auth.uid,
        members = request.members.len(),
        messages = request.messages.len(),
        score = evaluation.score,
        "Transcript evaluated"
    );

    Ok(Json(evaluation))
}
