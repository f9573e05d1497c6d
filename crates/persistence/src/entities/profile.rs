//! User profile entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::leaderboard::{LeaderboardEntry, PlatformStats};
use domain::models::profile::{HistoryItem, UserProfile, UserStats};
use sqlx::types::Json;
use sqlx::FromRow;

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub username: Option<String>,
    pub photo_url: Option<String>,
    pub has_set_username: bool,
    pub stats: Json<UserStats>,
    pub history: Json<Vec<HistoryItem>>,
    pub completed_coding_challenges: Vec<String>,
    pub completed_aptitude_tests: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserEntity> for UserProfile {
    fn from(entity: UserEntity) -> Self {
        Self {
            uid: entity.uid,
            email: entity.email,
            display_name: entity.display_name,
            username: entity.username,
            photo_url: entity.photo_url,
            has_set_username: entity.has_set_username,
            stats: entity.stats.0,
            history: entity.history.0,
            completed_coding_challenges: entity.completed_coding_challenges,
            completed_aptitude_tests: entity.completed_aptitude_tests,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Leaderboard row.
#[derive(Debug, Clone, FromRow)]
pub struct LeaderboardRowEntity {
    pub uid: String,
    pub display_name: String,
    pub username: Option<String>,
    pub photo_url: Option<String>,
    pub total_score: f64,
    pub gd_count: i64,
}

impl LeaderboardRowEntity {
    /// Converts to a domain entry with a 1-based rank.
    pub fn into_entry(self, rank: usize) -> LeaderboardEntry {
        LeaderboardEntry {
            rank,
            uid: self.uid,
            display_name: self.display_name,
            username: self.username,
            photo_url: self.photo_url,
            total_score: self.total_score,
            gd_count: self.gd_count,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PlatformStatsEntity {
    pub total_users: i64,
    pub total_submissions: i64,
    pub total_history_entries: i64,
}

impl From<PlatformStatsEntity> for PlatformStats {
    fn from(entity: PlatformStatsEntity) -> Self {
        Self {
            total_users: entity.total_users,
            total_submissions: entity.total_submissions,
            total_history_entries: entity.total_history_entries,
        }
    }
}
