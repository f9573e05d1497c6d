//! Discussion group repository for database operations.
//!
//! Capacity and the one-room-per-user rule are enforced by the database:
//! `member_count` only moves through a conditional update guarded by
//! `max_members`, and `membership_index` holds at most one row per user.

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::entities::{
    DiscussionGroupEntity, EvaluationStateDb, GroupMemberEntity, GroupStatusDb,
};
use crate::metrics::QueryTimer;

const GROUP_COLUMNS: &str = "id, name, topic, category, difficulty, created_by, max_members, \
    member_count, status, evaluation_state, evaluation_started_at, created_at";

/// Fields for a new room.
#[derive(Debug, Clone)]
pub struct NewGroup<'a> {
    pub name: &'a str,
    pub topic: &'a str,
    pub category: &'a str,
    pub difficulty: &'a str,
    pub max_members: i32,
    pub created_by: &'a str,
}

/// Why an invitee was left out of a new room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteeSkip {
    NoProfile,
    InAnotherGroup,
    GroupFull,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateGroupResult {
    Created {
        group_id: Uuid,
        skipped: Vec<(String, InviteeSkip)>,
    },
    /// The creator already belongs to an open room. Nothing was written.
    CreatorInAnotherGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinResult {
    Joined,
    AlreadyMember,
    GroupFull,
    InAnotherGroup,
    Completed,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveResult {
    Left,
    NotMember,
}

/// Outcome of adding one user inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddMember {
    Added,
    AlreadyMember,
    InAnotherGroup,
    Full,
}

/// Repository for discussion group database operations.
#[derive(Clone)]
pub struct DiscussionGroupRepository {
    pool: PgPool,
}

impl DiscussionGroupRepository {
    /// Creates a new DiscussionGroupRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates a room with the creator as first member, then adds each
    /// invitee that has a profile and is free. All in one transaction.
    pub async fn create_group(
        &self,
        group: &NewGroup<'_>,
        invitees: &[String],
    ) -> Result<CreateGroupResult, sqlx::Error> {
        let timer = QueryTimer::new("create_discussion_group");
        let mut tx = self.pool.begin().await?;

        let group_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO discussion_groups (name, topic, category, difficulty, max_members, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(group.name)
        .bind(group.topic)
        .bind(group.category)
        .bind(group.difficulty)
        .bind(group.max_members)
        .bind(group.created_by)
        .fetch_one(&mut *tx)
        .await?;

        if Self::add_member_tx(&mut tx, group_id, group.created_by).await? != AddMember::Added {
            tx.rollback().await?;
            timer.record();
            return Ok(CreateGroupResult::CreatorInAnotherGroup);
        }

        let mut skipped = Vec::new();
        for uid in invitees {
            let has_profile: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE uid = $1)")
                    .bind(uid)
                    .fetch_one(&mut *tx)
                    .await?;
            if !has_profile {
                skipped.push((uid.clone(), InviteeSkip::NoProfile));
                continue;
            }

            match Self::add_member_tx(&mut tx, group_id, uid).await? {
                AddMember::Added | AddMember::AlreadyMember => {}
                AddMember::InAnotherGroup => {
                    skipped.push((uid.clone(), InviteeSkip::InAnotherGroup))
                }
                AddMember::Full => skipped.push((uid.clone(), InviteeSkip::GroupFull)),
            }
        }

        tx.commit().await?;
        timer.record();
        Ok(CreateGroupResult::Created { group_id, skipped })
    }

    /// Adds `uid` to an open room: claim the membership index, then bump the
    /// count if there is room, then append the member row.
    async fn add_member_tx(
        tx: &mut Transaction<'_, Postgres>,
        group_id: Uuid,
        uid: &str,
    ) -> Result<AddMember, sqlx::Error> {
        let claimed = sqlx::query(
            r#"
            INSERT INTO membership_index (user_id, group_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(uid)
        .bind(group_id)
        .execute(&mut **tx)
        .await?
        .rows_affected()
            > 0;

        if !claimed {
            let current: Option<Uuid> =
                sqlx::query_scalar("SELECT group_id FROM membership_index WHERE user_id = $1")
                    .bind(uid)
                    .fetch_optional(&mut **tx)
                    .await?;
            return Ok(if current == Some(group_id) {
                AddMember::AlreadyMember
            } else {
                AddMember::InAnotherGroup
            });
        }

        let new_count: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE discussion_groups
            SET member_count = member_count + 1,
                status = CASE WHEN member_count + 1 >= 2
                    THEN 'active'::group_status ELSE 'waiting'::group_status END,
                updated_at = NOW()
            WHERE id = $1 AND member_count < max_members AND status <> 'completed'
            RETURNING member_count
            "#,
        )
        .bind(group_id)
        .fetch_optional(&mut **tx)
        .await?;

        if new_count.is_none() {
            sqlx::query("DELETE FROM membership_index WHERE user_id = $1 AND group_id = $2")
                .bind(uid)
                .bind(group_id)
                .execute(&mut **tx)
                .await?;
            return Ok(AddMember::Full);
        }

        sqlx::query(
            r#"
            INSERT INTO group_members (group_id, user_id, position, joined_at)
            VALUES (
                $1, $2,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM group_members WHERE group_id = $1),
                clock_timestamp()
            )
            "#,
        )
        .bind(group_id)
        .bind(uid)
        .execute(&mut **tx)
        .await?;

        Ok(AddMember::Added)
    }

    /// Adds a user to a room.
    pub async fn join_group(&self, group_id: Uuid, uid: &str) -> Result<JoinResult, sqlx::Error> {
        let timer = QueryTimer::new("join_discussion_group");
        let mut tx = self.pool.begin().await?;

        let status: Option<GroupStatusDb> =
            sqlx::query_scalar("SELECT status FROM discussion_groups WHERE id = $1")
                .bind(group_id)
                .fetch_optional(&mut *tx)
                .await?;

        let result = match status {
            None => JoinResult::NotFound,
            Some(status) => {
                // Completed rooms release their index rows, so ask the roster.
                let already_member: bool = sqlx::query_scalar(
                    "SELECT EXISTS (SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2)",
                )
                .bind(group_id)
                .bind(uid)
                .fetch_one(&mut *tx)
                .await?;

                if already_member {
                    JoinResult::AlreadyMember
                } else if matches!(status, GroupStatusDb::Completed) {
                    JoinResult::Completed
                } else {
                    match Self::add_member_tx(&mut tx, group_id, uid).await? {
                        AddMember::Added => JoinResult::Joined,
                        AddMember::AlreadyMember => JoinResult::AlreadyMember,
                        AddMember::InAnotherGroup => JoinResult::InAnotherGroup,
                        AddMember::Full => JoinResult::GroupFull,
                    }
                }
            }
        };

        if result == JoinResult::Joined {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }
        timer.record();
        Ok(result)
    }

    /// Removes a user from a room. The room itself is kept even when empty.
    pub async fn leave_group(&self, group_id: Uuid, uid: &str) -> Result<LeaveResult, sqlx::Error> {
        let timer = QueryTimer::new("leave_discussion_group");
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(uid)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            tx.rollback().await?;
            timer.record();
            return Ok(LeaveResult::NotMember);
        }

        sqlx::query(
            r#"
            UPDATE discussion_groups
            SET member_count = member_count - 1,
                status = CASE
                    WHEN status = 'completed' THEN status
                    WHEN member_count - 1 >= 2 THEN 'active'::group_status
                    ELSE 'waiting'::group_status
                END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM membership_index WHERE user_id = $1 AND group_id = $2")
            .bind(uid)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        timer.record();
        Ok(LeaveResult::Left)
    }

    /// Deletes a room and its transcript. Members and index rows cascade.
    ///
    /// Returns false if the room no longer exists.
    pub async fn delete_group(&self, group_id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_discussion_group");
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM group_messages WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM discussion_groups WHERE id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        tx.commit().await?;
        timer.record();
        Ok(deleted)
    }

    /// Closes a room and releases its members' index rows.
    ///
    /// Returns false if the room was missing or already completed.
    pub async fn complete_group(&self, group_id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("complete_discussion_group");
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE discussion_groups
            SET status = 'completed', updated_at = NOW()
            WHERE id = $1 AND status <> 'completed'
            "#,
        )
        .bind(group_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if updated {
            sqlx::query("DELETE FROM membership_index WHERE group_id = $1")
                .bind(group_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        timer.record();
        Ok(updated)
    }

    /// Find a room by ID.
    pub async fn find_by_id(
        &self,
        group_id: Uuid,
    ) -> Result<Option<DiscussionGroupEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_discussion_group_by_id");
        let result = sqlx::query_as::<_, DiscussionGroupEntity>(&format!(
            "SELECT {GROUP_COLUMNS} FROM discussion_groups WHERE id = $1"
        ))
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Members of the given rooms in join order, joined with their profiles.
    pub async fn find_members(
        &self,
        group_ids: &[Uuid],
    ) -> Result<Vec<GroupMemberEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_discussion_group_members");
        let result = sqlx::query_as::<_, GroupMemberEntity>(
            r#"
            SELECT gm.group_id, u.uid, u.username, u.display_name, u.photo_url, gm.joined_at
            FROM group_members gm
            JOIN users u ON u.uid = gm.user_id
            WHERE gm.group_id = ANY($1)
            ORDER BY gm.group_id, gm.position
            "#,
        )
        .bind(group_ids)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a room and its ordered members.
    pub async fn find_with_members(
        &self,
        group_id: Uuid,
    ) -> Result<Option<(DiscussionGroupEntity, Vec<GroupMemberEntity>)>, sqlx::Error> {
        let Some(group) = self.find_by_id(group_id).await? else {
            return Ok(None);
        };
        let members = self.find_members(&[group_id]).await?;
        Ok(Some((group, members)))
    }

    /// List rooms, newest first, optionally filtered by status.
    pub async fn list(
        &self,
        status: Option<GroupStatusDb>,
    ) -> Result<Vec<DiscussionGroupEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_discussion_groups");
        let result = sqlx::query_as::<_, DiscussionGroupEntity>(&format!(
            r#"
            SELECT {GROUP_COLUMNS}
            FROM discussion_groups
            WHERE ($1::group_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// The open room a user belongs to, from the membership index.
    pub async fn current_group_id(&self, uid: &str) -> Result<Option<Uuid>, sqlx::Error> {
        let timer = QueryTimer::new("find_current_group_id");
        let result = sqlx::query_scalar("SELECT group_id FROM membership_index WHERE user_id = $1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Returns true if the user is currently a member of the room.
    pub async fn is_member(&self, group_id: Uuid, uid: &str) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("is_discussion_group_member");
        let result = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2)",
        )
        .bind(group_id)
        .bind(uid)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Moves the room into `submitted` unless an evaluation is already in
    /// flight. A `submitted` state older than `stale_after_secs` is treated
    /// as abandoned and may be taken over.
    ///
    /// Returns true if this caller now owns the evaluation.
    pub async fn begin_evaluation(
        &self,
        group_id: Uuid,
        stale_after_secs: i64,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("begin_group_evaluation");
        let result = sqlx::query(
            r#"
            UPDATE discussion_groups
            SET evaluation_state = 'submitted', evaluation_started_at = NOW(), updated_at = NOW()
            WHERE id = $1
              AND (evaluation_state <> 'submitted'
                   OR evaluation_started_at < NOW() - make_interval(secs => $2))
            "#,
        )
        .bind(group_id)
        .bind(stale_after_secs as f64)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    /// Leaves `submitted` for the given terminal state.
    pub async fn finish_evaluation(
        &self,
        group_id: Uuid,
        state: EvaluationStateDb,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("finish_group_evaluation");
        let result = sqlx::query(
            r#"
            UPDATE discussion_groups
            SET evaluation_state = $2, evaluation_started_at = NULL, updated_at = NOW()
            WHERE id = $1 AND evaluation_state = 'submitted'
            "#,
        )
        .bind(group_id)
        .bind(state)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }
}
