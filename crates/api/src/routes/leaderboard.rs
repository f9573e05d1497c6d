//! Public leaderboard and platform counters.

use axum::{
    extract::{Query, State},
    Json,
};
use domain::models::leaderboard::{
    LeaderboardEntry, LeaderboardQuery, LeaderboardResponse, PlatformStats,
};
use persistence::repositories::ProfileRepository;

use crate::app::AppState;
use crate::error::ApiError;

/// Top users by total score.
///
/// GET /api/v1/leaderboard?limit=10
///
/// Public. Limit defaults to 10 and is capped at 100.
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let data: Vec<LeaderboardEntry> = ProfileRepository::new(state.pool.clone())
        .leaderboard(query.effective_limit())
        .await?
        .into_iter()
        .enumerate()
        .map(|(i, row)| row.into_entry(i + 1))
        .collect();

    Ok(Json(LeaderboardResponse {
        count: data.len(),
        data,
    }))
}

/// Platform-wide counters.
///
/// GET /api/v1/stats
///
/// Public.
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<PlatformStats>, ApiError> {
    let stats = ProfileRepository::new(state.pool.clone())
        .platform_stats()
        .await?;
    Ok(Json(stats.into()))
}
