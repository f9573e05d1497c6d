//! Profile repository for database operations.

use domain::models::profile::{HistoryItem, HistoryKind, NewProfile, UserStats};
use domain::services::scoring;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::entities::{LeaderboardRowEntity, PlatformStatsEntity, UserEntity};
use crate::metrics::QueryTimer;

const USER_COLUMNS: &str = "uid, email, display_name, username, photo_url, has_set_username, \
    stats, history, completed_coding_challenges, completed_aptitude_tests, created_at, updated_at";

/// A history entry together with the completion it represents.
#[derive(Debug, Clone)]
pub struct HistoryAppend {
    pub item: HistoryItem,
    /// Coding problem to add to the completed list.
    pub coding_problem_id: Option<String>,
    /// Quiz to add to the completed list.
    pub aptitude_test_id: Option<String>,
}

impl HistoryAppend {
    pub fn new(item: HistoryItem) -> Self {
        Self {
            item,
            coding_problem_id: None,
            aptitude_test_id: None,
        }
    }
}

/// Repository for profile-related database operations.
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    /// Creates a new ProfileRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the profile on first access.
    ///
    /// Returns the stored profile and whether it was created by this call.
    pub async fn ensure_profile(
        &self,
        profile: &NewProfile,
    ) -> Result<(UserEntity, bool), sqlx::Error> {
        let timer = QueryTimer::new("ensure_profile");

        let inserted = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            INSERT INTO users (uid, email, display_name, photo_url, stats)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (uid) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&profile.uid)
        .bind(&profile.email)
        .bind(&profile.display_name)
        .bind(&profile.photo_url)
        .bind(Json(UserStats::default()))
        .fetch_optional(&self.pool)
        .await?;

        let result = match inserted {
            Some(entity) => {
                tracing::debug!(uid = %entity.uid, "Created profile on first access");
                Ok((entity, true))
            }
            None => sqlx::query_as::<_, UserEntity>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE uid = $1"
            ))
            .bind(&profile.uid)
            .fetch_one(&self.pool)
            .await
            .map(|entity| (entity, false)),
        };

        timer.record();
        result
    }

    /// Find a profile by user id.
    pub async fn find_by_uid(&self, uid: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_profile_by_uid");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE uid = $1"
        ))
        .bind(uid)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Sets the username. A clash with another user surfaces as a unique
    /// violation.
    pub async fn set_username(
        &self,
        uid: &str,
        username: &str,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_username");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            UPDATE users
            SET username = $2, has_set_username = true, updated_at = NOW()
            WHERE uid = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(uid)
        .bind(username)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Updates display name and photo. `None` leaves a field unchanged.
    pub async fn update_profile(
        &self,
        uid: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_profile");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                photo_url = COALESCE($3, photo_url),
                updated_at = NOW()
            WHERE uid = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(uid)
        .bind(display_name)
        .bind(photo_url)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Prepends a history entry and recomputes stats from the full history,
    /// in one transaction on this user's row only.
    ///
    /// Returns `None` if the profile does not exist.
    pub async fn append_history(
        &self,
        uid: &str,
        append: &HistoryAppend,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("append_history");
        let mut tx = self.pool.begin().await?;

        let result = Self::append_history_tx(&mut tx, uid, append).await?;

        tx.commit().await?;
        timer.record();
        Ok(result)
    }

    async fn append_history_tx(
        tx: &mut Transaction<'_, Postgres>,
        uid: &str,
        append: &HistoryAppend,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let current = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE uid = $1 FOR UPDATE"
        ))
        .bind(uid)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(current) = current else {
            return Ok(None);
        };

        let mut history = current.history.0;
        history.insert(0, append.item.clone());

        let mut completed_coding = current.completed_coding_challenges;
        let mut repeat_completion = false;
        if let Some(problem_id) = &append.coding_problem_id {
            if completed_coding.contains(problem_id) {
                repeat_completion = true;
            } else {
                completed_coding.push(problem_id.clone());
            }
        }

        let mut completed_aptitude = current.completed_aptitude_tests;
        if let Some(test_id) = &append.aptitude_test_id {
            if !completed_aptitude.contains(test_id) {
                completed_aptitude.push(test_id.clone());
            }
        }

        let stats = scoring::stats_after_append(
            &current.stats.0,
            &history,
            append.item.kind,
            repeat_completion && append.item.kind == HistoryKind::Coding,
        );

        sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            UPDATE users
            SET history = $2,
                stats = $3,
                total_score = $4,
                completed_coding_challenges = $5,
                completed_aptitude_tests = $6,
                updated_at = NOW()
            WHERE uid = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(uid)
        .bind(Json(&history))
        .bind(Json(&stats))
        .bind(stats.total_score)
        .bind(&completed_coding)
        .bind(&completed_aptitude)
        .fetch_one(&mut **tx)
        .await
        .map(Some)
    }

    /// Top users by total score. Ties keep the older account first.
    pub async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardRowEntity>, sqlx::Error> {
        let timer = QueryTimer::new("leaderboard");
        let result = sqlx::query_as::<_, LeaderboardRowEntity>(
            r#"
            SELECT uid, display_name, username, photo_url, total_score,
                   COALESCE((stats->>'gdCount')::bigint, 0) AS gd_count
            FROM users
            ORDER BY total_score DESC, created_at ASC, uid ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Platform-wide counters.
    pub async fn platform_stats(&self) -> Result<PlatformStatsEntity, sqlx::Error> {
        let timer = QueryTimer::new("platform_stats");
        let result = sqlx::query_as::<_, PlatformStatsEntity>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM group_submissions) AS total_submissions,
                (SELECT COALESCE(SUM(jsonb_array_length(history)), 0) FROM users)::bigint
                    AS total_history_entries
            "#,
        )
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }
}
