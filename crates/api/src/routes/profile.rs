//! Profile routes: the caller's own profile, history and change feed.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::Utc;
use domain::models::profile::{
    AddHistoryRequest, HistoryItem, HistoryResponse, RecentHistoryQuery, SetUsernameRequest,
    UpdateProfileRequest, UserProfile,
};
use domain::services::recent_history;
use futures::{Stream, StreamExt};
use persistence::repositories::HistoryAppend;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

/// Entries returned by the history endpoint when no limit is given.
const DEFAULT_HISTORY_LIMIT: usize = 5;

const MAX_HISTORY_LIMIT: usize = 50;

/// Get the caller's profile, creating it on first access.
///
/// GET /api/v1/profile/me
///
/// Requires JWT authentication.
pub async fn get_me(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = state.profile_service().ensure(&user_auth.new_profile()).await?;
    Ok(Json(profile))
}

/// Update display name and photo.
///
/// PUT /api/v1/profile/me
///
/// Requires JWT authentication.
pub async fn update_me(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    request.validate()?;

    let service = state.profile_service();
    service.ensure(&user_auth.new_profile()).await?;

    let display_name = request.display_name.as_deref().map(str::trim);
    if display_name == Some("") {
        return Err(ApiError::Validation(
            "display_name: Display name must not be blank".to_string(),
        ));
    }

    let profile = service
        .update(&user_auth.uid, display_name, request.photo_url.as_deref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    info!(user_id = %user_auth.uid, "Profile updated");

    Ok(Json(profile))
}

/// Set the caller's username.
///
/// PUT /api/v1/profile/me/username
///
/// Requires JWT authentication. Usernames are unique.
pub async fn set_username(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<SetUsernameRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    request.validate()?;

    let service = state.profile_service();
    service.ensure(&user_auth.new_profile()).await?;

    let profile = service
        .set_username(&user_auth.uid, &request.username)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::Conflict("Username is already taken".to_string()),
            other => other,
        })?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    info!(user_id = %user_auth.uid, username = %request.username, "Username set");

    Ok(Json(profile))
}

/// Most recent history entries, optionally filtered by type.
///
/// GET /api/v1/profile/me/history?type=aptitude&limit=5
///
/// Requires JWT authentication.
pub async fn get_history(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Query(query): Query<RecentHistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let data = match state.profile_service().find(&user_auth.uid).await? {
        Some(profile) => recent_history(&profile.history, query.kind, limit),
        None => Vec::new(),
    };

    Ok(Json(HistoryResponse {
        count: data.len(),
        data,
    }))
}

/// Record a completed activity.
///
/// POST /api/v1/profile/me/history
///
/// Requires JWT authentication. The server assigns the entry id and
/// completion time and recomputes the caller's stats.
pub async fn add_history(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<AddHistoryRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    request.validate()?;

    let service = state.profile_service();
    service.ensure(&user_auth.new_profile()).await?;

    let append = HistoryAppend {
        coding_problem_id: request.coding_problem_id(),
        aptitude_test_id: None,
        item: HistoryItem {
            id: Uuid::new_v4().to_string(),
            kind: request.kind,
            title: request.title.trim().to_string(),
            score: request.score.map(serde_json::Value::from),
            percentage: request.percentage,
            completed_at: Utc::now(),
            details: request.details,
        },
    };

    let profile = service
        .append_history(&user_auth.uid, &append)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    info!(
        user_id = %user_auth.uid,
        kind = %append.item.kind,
        total_score = profile.stats.total_score,
        "History entry recorded"
    );

    Ok((StatusCode::CREATED, Json(profile)))
}

/// Live feed of changes to the caller's profile.
///
/// GET /api/v1/profile/me/events
///
/// Requires JWT authentication. Server-sent events named `profile`.
pub async fn profile_events(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    info!(user_id = %user_auth.uid, "Profile event stream opened");

    let stream = state
        .profile_events
        .subscribe(&user_auth.uid)
        .map(|event| Event::default().event("profile").json_data(event.as_ref()));

    Sse::new(stream).keep_alive(KeepAlive::default())
}
