//! Leaderboard and platform statistics.

use serde::{Deserialize, Serialize};

/// Rows returned when no limit is given.
pub const DEFAULT_LEADERBOARD_LIMIT: i64 = 10;

/// Upper bound on requested rows.
pub const MAX_LEADERBOARD_LIMIT: i64 = 100;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

impl LeaderboardQuery {
    /// Requested limit clamped to 1..=100.
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
            .clamp(1, MAX_LEADERBOARD_LIMIT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub uid: String,
    pub display_name: String,
    pub username: Option<String>,
    pub photo_url: Option<String>,
    pub total_score: f64,
    pub gd_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardResponse {
    pub data: Vec<LeaderboardEntry>,
    pub count: usize,
}

/// Platform-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub total_users: i64,
    pub total_submissions: i64,
    pub total_history_entries: i64,
}
