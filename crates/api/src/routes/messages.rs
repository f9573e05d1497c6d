//! Chat routes: transcript reads, posting and the live feed.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use domain::models::discussion_group::GroupStatus;
use domain::models::message::{
    GroupMessage, ListMessagesQuery, ListMessagesResponse, PostMessageRequest,
};
use futures::{Stream, StreamExt};
use persistence::repositories::{DiscussionGroupRepository, MessageRepository};
use shared::pagination::MessageCursor;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::middleware::metrics::record_message_posted;

/// 404 if the room is missing, 403 if the caller is not a member.
async fn require_member(
    repo: &DiscussionGroupRepository,
    group_id: Uuid,
    uid: &str,
) -> Result<(), ApiError> {
    if repo.is_member(group_id, uid).await? {
        return Ok(());
    }
    match repo.find_by_id(group_id).await? {
        Some(_) => Err(ApiError::Forbidden(
            "Only group members can read the discussion".to_string(),
        )),
        None => Err(ApiError::NotFound("Group not found".to_string())),
    }
}

/// Transcript in server order.
///
/// GET /api/v1/groups/:group_id/messages?after=<cursor>
///
/// Requires JWT authentication. Members only.
pub async fn list_messages(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<ListMessagesResponse>, ApiError> {
    let groups = DiscussionGroupRepository::new(state.pool.clone());
    require_member(&groups, group_id, &user_auth.uid).await?;

    let after = query
        .after
        .as_deref()
        .map(MessageCursor::decode)
        .transpose()
        .map_err(|e| ApiError::Validation(format!("after: {}", e)))?;

    let data: Vec<GroupMessage> = MessageRepository::new(state.pool.clone())
        .list_for_group(group_id, after.as_ref())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let next_cursor = data
        .last()
        .map(|m| MessageCursor::new(m.created_at, m.seq).encode());

    Ok(Json(ListMessagesResponse {
        count: data.len(),
        data,
        next_cursor,
    }))
}

/// Post a message to a room.
///
/// POST /api/v1/groups/:group_id/messages
///
/// Requires JWT authentication. Members only; the room must not be completed.
pub async fn post_message(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Json(request): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<GroupMessage>), ApiError> {
    request.validate()?;
    let text = request.normalized_text();

    let inserted = MessageRepository::new(state.pool.clone())
        .insert_as_member(group_id, &user_auth.uid, &text)
        .await?;

    let Some(message) = inserted else {
        // The insert checks membership and status together; find out which failed.
        let groups = DiscussionGroupRepository::new(state.pool.clone());
        return Err(match groups.find_by_id(group_id).await? {
            None => ApiError::NotFound("Group not found".to_string()),
            Some(group) if GroupStatus::from(group.status) == GroupStatus::Completed => {
                ApiError::Conflict("Group is already completed".to_string())
            }
            Some(_) => ApiError::Forbidden("Only group members can post messages".to_string()),
        });
    };

    record_message_posted();
    state.chat_hub.publish(group_id).await;

    info!(
        group_id = %group_id,
        user_id = %user_auth.uid,
        message_id = %message.id,
        "Message posted"
    );

    Ok((StatusCode::CREATED, Json(message.into())))
}

/// Live transcript feed.
///
/// GET /api/v1/groups/:group_id/messages/stream
///
/// Requires JWT authentication. Members only. Server-sent events named
/// `messages`, each carrying the full ordered transcript. The feed ends when
/// the caller leaves or the room is deleted.
pub async fn stream_messages(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let groups = DiscussionGroupRepository::new(state.pool.clone());
    require_member(&groups, group_id, &user_auth.uid).await?;

    info!(group_id = %group_id, user_id = %user_auth.uid, "Transcript stream opened");

    let stream = state
        .chat_hub
        .subscribe(group_id, &user_auth.uid)
        .into_stream()
        .map(|snapshot| Event::default().event("messages").json_data(&snapshot));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
