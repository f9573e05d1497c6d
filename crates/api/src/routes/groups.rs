//! Discussion room routes: creation, membership and lifecycle.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::discussion_group::{
    CreateGroupRequest, CreateGroupResponse, DiscussionGroup, JoinOutcome, LeaveOutcome,
    ListGroupsQuery, ListGroupsResponse, MembershipChangeResponse, SkipReason, SkippedInvitee,
};
use persistence::entities::GroupMemberEntity;
use persistence::repositories::{
    CreateGroupResult, DiscussionGroupRepository, InviteeSkip, JoinResult, LeaveResult, NewGroup,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

/// Loads a room with its ordered members, or 404.
pub(crate) async fn load_group(
    repo: &DiscussionGroupRepository,
    group_id: Uuid,
) -> Result<DiscussionGroup, ApiError> {
    let (entity, members) = repo
        .find_with_members(group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?;
    Ok(entity.into_domain(members))
}

/// Create a discussion room with the caller as first member.
///
/// POST /api/v1/groups
///
/// Requires JWT authentication. Invitees without a profile or already in
/// another room are skipped and listed in the response.
pub async fn create_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<CreateGroupResponse>), ApiError> {
    request.validate()?;

    state
        .profile_service()
        .ensure(&user_auth.new_profile())
        .await?;

    let repo = DiscussionGroupRepository::new(state.pool.clone());
    let invitees = request.distinct_invitees(&user_auth.uid);

    let result = repo
        .create_group(
            &NewGroup {
                name: request.name.trim(),
                topic: request.topic.trim(),
                category: request.category.trim(),
                difficulty: request.difficulty.as_str(),
                max_members: request.effective_max_members(),
                created_by: &user_auth.uid,
            },
            &invitees,
        )
        .await?;

    let (group_id, skipped) = match result {
        CreateGroupResult::Created { group_id, skipped } => (group_id, skipped),
        CreateGroupResult::CreatorInAnotherGroup => {
            return Err(ApiError::Conflict(
                "You are already a member of another group".to_string(),
            ))
        }
    };

    let group = load_group(&repo, group_id).await?;
    let skipped_invitees: Vec<SkippedInvitee> = skipped
        .into_iter()
        .map(|(uid, skip)| SkippedInvitee {
            uid,
            reason: match skip {
                InviteeSkip::NoProfile => SkipReason::NoProfile,
                InviteeSkip::InAnotherGroup => SkipReason::InAnotherGroup,
                InviteeSkip::GroupFull => SkipReason::GroupFull,
            },
        })
        .collect();

    info!(
        group_id = %group.id,
        group_name = %group.name,
        user_id = %user_auth.uid,
        member_count = group.member_count,
        skipped = skipped_invitees.len(),
        "Group created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateGroupResponse {
            group,
            skipped_invitees,
        }),
    ))
}

/// List rooms, newest first.
///
/// GET /api/v1/groups?status=waiting
///
/// Requires JWT authentication.
pub async fn list_groups(
    State(state): State<AppState>,
    _user_auth: UserAuth,
    Query(query): Query<ListGroupsQuery>,
) -> Result<Json<ListGroupsResponse>, ApiError> {
    let repo = DiscussionGroupRepository::new(state.pool.clone());

    let groups = repo.list(query.status.map(Into::into)).await?;
    let ids: Vec<Uuid> = groups.iter().map(|g| g.id).collect();

    let mut members_by_group: HashMap<Uuid, Vec<GroupMemberEntity>> = HashMap::new();
    for member in repo.find_members(&ids).await? {
        members_by_group
            .entry(member.group_id)
            .or_default()
            .push(member);
    }

    let data: Vec<DiscussionGroup> = groups
        .into_iter()
        .map(|g| {
            let members = members_by_group.remove(&g.id).unwrap_or_default();
            g.into_domain(members)
        })
        .collect();

    Ok(Json(ListGroupsResponse {
        count: data.len(),
        data,
    }))
}

/// The open room the caller belongs to.
///
/// GET /api/v1/groups/current
///
/// Requires JWT authentication. 404 when the caller is in no open room.
pub async fn current_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<Json<DiscussionGroup>, ApiError> {
    let repo = DiscussionGroupRepository::new(state.pool.clone());

    let group_id = repo
        .current_group_id(&user_auth.uid)
        .await?
        .ok_or_else(|| ApiError::NotFound("You are not in a group".to_string()))?;

    Ok(Json(load_group(&repo, group_id).await?))
}

/// Get a room with its members.
///
/// GET /api/v1/groups/:group_id
///
/// Requires JWT authentication.
pub async fn get_group(
    State(state): State<AppState>,
    _user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<DiscussionGroup>, ApiError> {
    let repo = DiscussionGroupRepository::new(state.pool.clone());
    Ok(Json(load_group(&repo, group_id).await?))
}

/// Delete a room and its transcript.
///
/// DELETE /api/v1/groups/:group_id
///
/// Requires JWT authentication. Creator only.
pub async fn delete_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = DiscussionGroupRepository::new(state.pool.clone());

    let group = repo
        .find_by_id(group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?;

    if group.created_by != user_auth.uid {
        return Err(ApiError::Forbidden(
            "Only the group creator can delete the group".to_string(),
        ));
    }

    if !repo.delete_group(group_id).await? {
        return Err(ApiError::NotFound("Group not found".to_string()));
    }

    state.chat_hub.publish(group_id).await;

    info!(group_id = %group_id, user_id = %user_auth.uid, "Group deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Join a room.
///
/// POST /api/v1/groups/:group_id/join
///
/// Requires JWT authentication. Joining a room one is already in is a no-op.
pub async fn join_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<MembershipChangeResponse>, ApiError> {
    state
        .profile_service()
        .ensure(&user_auth.new_profile())
        .await?;

    let repo = DiscussionGroupRepository::new(state.pool.clone());

    let outcome = match repo.join_group(group_id, &user_auth.uid).await? {
        JoinResult::Joined => JoinOutcome::Joined,
        JoinResult::AlreadyMember => JoinOutcome::AlreadyMember,
        JoinResult::GroupFull => return Err(ApiError::Conflict("Group is full".to_string())),
        JoinResult::InAnotherGroup => {
            return Err(ApiError::Conflict(
                "You are already a member of another group".to_string(),
            ))
        }
        JoinResult::Completed => {
            return Err(ApiError::Conflict("Group is already completed".to_string()))
        }
        JoinResult::NotFound => return Err(ApiError::NotFound("Group not found".to_string())),
    };

    if outcome == JoinOutcome::Joined {
        state.chat_hub.publish(group_id).await;
        info!(group_id = %group_id, user_id = %user_auth.uid, "Joined group");
    }

    let group = repo
        .find_by_id(group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?;

    Ok(Json(MembershipChangeResponse {
        group_id,
        outcome: outcome.as_str().to_string(),
        member_count: group.member_count,
        status: group.status.into(),
    }))
}

/// Leave a room. The room is kept even when its last member leaves.
///
/// POST /api/v1/groups/:group_id/leave
///
/// Requires JWT authentication.
pub async fn leave_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<MembershipChangeResponse>, ApiError> {
    let repo = DiscussionGroupRepository::new(state.pool.clone());

    let outcome = match repo.leave_group(group_id, &user_auth.uid).await? {
        LeaveResult::Left => LeaveOutcome::Left,
        LeaveResult::NotMember => LeaveOutcome::NotMember,
    };

    let group = repo
        .find_by_id(group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?;

    if outcome == LeaveOutcome::Left {
        // Ends the leaver's live transcript feed.
        state.chat_hub.publish(group_id).await;
        info!(group_id = %group_id, user_id = %user_auth.uid, "Left group");
    }

    Ok(Json(MembershipChangeResponse {
        group_id,
        outcome: outcome.as_str().to_string(),
        member_count: group.member_count,
        status: group.status.into(),
    }))
}

/// Close a room. Members become free to join other rooms.
///
/// POST /api/v1/groups/:group_id/complete
///
/// Requires JWT authentication. Creator only.
pub async fn complete_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<DiscussionGroup>, ApiError> {
    let repo = DiscussionGroupRepository::new(state.pool.clone());

    let group = load_group(&repo, group_id).await?;
    if !group.is_creator(&user_auth.uid) {
        return Err(ApiError::Forbidden(
            "Only the group creator can complete the group".to_string(),
        ));
    }

    if !repo.complete_group(group_id).await? {
        return Err(ApiError::Conflict("Group is already completed".to_string()));
    }

    state.chat_hub.publish(group_id).await;

    info!(group_id = %group_id, user_id = %user_auth.uid, "Group completed");

    Ok(Json(load_group(&repo, group_id).await?))
}
