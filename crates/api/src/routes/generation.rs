//! Generated practice content.

use axum::{extract::State, Json};
use domain::models::generation::{
    GenerateQuizItemsRequest, GenerateQuizItemsResponse, GenerateTopicRequest, GeneratedTopic,
};
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

/// Generate a discussion topic with talking points.
///
/// POST /api/v1/generate-topic
///
/// Requires JWT authentication. Rate limited per user.
pub async fn generate_topic(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<GenerateTopicRequest>,
) -> Result<Json<GeneratedTopic>, ApiError> {
    request.validate()?;

    let topic = state
        .content_generator()
        .topic(&request.category, request.difficulty)
        .await?;

    info!(
        user_id = %user_auth.uid,
        category = %topic.category,
        difficulty = %topic.difficulty,
        points = topic.supporting_points.len(),
        "Topic generated"
    );

    Ok(Json(topic))
}

/// Generate multiple-choice aptitude questions.
///
/// POST /api/v1/generate-quiz-items
///
/// Requires JWT authentication. Rate limited per user.
pub async fn generate_quiz_items(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<GenerateQuizItemsRequest>,
) -> Result<Json<GenerateQuizItemsResponse>, ApiError> {
    request.validate()?;

    let response = state
        .content_generator()
        .quiz_items(request.effective_count(), request.persist)
        .await?;

    info!(
        user_id = %user_auth.uid,
        requested = request.effective_count(),
        accepted = response.count,
        rejected = response.rejected,
        persisted = response.persisted,
        "Quiz items generated"
    );

    Ok(Json(response))
}
