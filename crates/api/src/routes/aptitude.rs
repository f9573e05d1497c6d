//! Aptitude question bank and graded quiz attempts.

use std::collections::{HashMap, HashSet};

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use domain::models::aptitude::{
    AptitudeQuestion, AptitudeQuestionView, AttemptResult, GradedAnswer, ListQuestionsResponse,
    SubmitAttemptRequest,
};
use domain::models::profile::{HistoryItem, HistoryKind};
use domain::services::quiz_score;
use persistence::repositories::{AptitudeQuestionRepository, HistoryAppend};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

/// Questions in the bank, without answer keys.
///
/// GET /api/v1/aptitude/questions
///
/// Requires JWT authentication.
pub async fn list_questions(
    State(state): State<AppState>,
    _user_auth: UserAuth,
) -> Result<Json<ListQuestionsResponse>, ApiError> {
    let data: Vec<AptitudeQuestionView> = AptitudeQuestionRepository::new(state.pool.clone())
        .list()
        .await?
        .into_iter()
        .map(|entity| AptitudeQuestion::from(entity).into())
        .collect();

    Ok(Json(ListQuestionsResponse {
        count: data.len(),
        data,
    }))
}

/// Grade a quiz attempt and record it in the caller's history.
///
/// POST /api/v1/aptitude/attempts
///
/// Requires JWT authentication. The score is the rounded percentage of
/// correct answers among those submitted.
pub async fn submit_attempt(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<SubmitAttemptRequest>,
) -> Result<(StatusCode, Json<AttemptResult>), ApiError> {
    request.validate()?;

    let mut seen = HashSet::new();
    if let Some(duplicate) = request
        .answers
        .iter()
        .find(|a| !seen.insert(a.question_id))
    {
        return Err(ApiError::Validation(format!(
            "answers: Question {} answered more than once",
            duplicate.question_id
        )));
    }

    let ids: Vec<Uuid> = request.answers.iter().map(|a| a.question_id).collect();
    let questions: HashMap<Uuid, AptitudeQuestion> =
        AptitudeQuestionRepository::new(state.pool.clone())
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|entity| (entity.id, entity.into()))
            .collect();

    let answers = request
        .answers
        .iter()
        .map(|answer| {
            let question = questions.get(&answer.question_id).ok_or_else(|| {
                ApiError::Validation(format!("answers: Unknown question {}", answer.question_id))
            })?;
            Ok(GradedAnswer {
                question_id: answer.question_id,
                answer_index: answer.answer_index,
                correct_answer: question.correct_answer,
                correct: answer.answer_index == question.correct_answer,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let correct = answers.iter().filter(|a| a.correct).count();
    let total = answers.len();
    let score = quiz_score(correct, total);

    let completed_at = Utc::now();
    let test_id = request
        .test_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("quiz-{}", completed_at.timestamp_millis()));

    let service = state.profile_service();
    service.ensure(&user_auth.new_profile()).await?;

    let append = HistoryAppend {
        item: HistoryItem {
            id: Uuid::new_v4().to_string(),
            kind: HistoryKind::Aptitude,
            title: format!("Aptitude Test: {}", test_id),
            score: Some(json!(score)),
            percentage: Some(score as f64),
            completed_at,
            details: Some(json!({
                "testId": test_id,
                "correct": correct,
                "total": total,
            })),
        },
        coding_problem_id: None,
        aptitude_test_id: Some(test_id.clone()),
    };

    let profile = service
        .append_history(&user_auth.uid, &append)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    info!(
        user_id = %user_auth.uid,
        test_id = %test_id,
        correct,
        total,
        score,
        "Aptitude attempt graded"
    );

    Ok((
        StatusCode::CREATED,
        Json(AttemptResult {
            test_id,
            correct,
            total,
            score,
            answers,
            stats: profile.stats,
        }),
    ))
}
