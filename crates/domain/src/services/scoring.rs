//! Score aggregation over a user's history.
//!
//! Totals are always recomputed from the full history rather than adjusted
//! incrementally, so a missed or duplicated update can never drift.

use crate::models::profile::{HistoryItem, HistoryKind, UserStats};

/// Sum of every numeric score in the history. Non-numeric or missing scores
/// are ignored.
pub fn total_score(history: &[HistoryItem]) -> f64 {
    history.iter().filter_map(HistoryItem::numeric_score).sum()
}

/// Number of discussion entries (prepared topics and scored sessions).
pub fn discussion_count(history: &[HistoryItem]) -> i64 {
    history.iter().filter(|item| item.kind.is_discussion()).count() as i64
}

/// Stats with the history-derived fields refreshed.
pub fn recompute_stats(stats: &UserStats, history: &[HistoryItem]) -> UserStats {
    UserStats {
        total_score: total_score(history),
        gd_count: discussion_count(history),
        ..stats.clone()
    }
}

/// Stats after `item` has been prepended to `history`.
///
/// `repeat_completion` marks a coding entry for a problem that was already in
/// the completed list; it is recorded but not counted again.
pub fn stats_after_append(
    stats: &UserStats,
    history: &[HistoryItem],
    kind: HistoryKind,
    repeat_completion: bool,
) -> UserStats {
    let mut updated = recompute_stats(stats, history);
    match kind {
        HistoryKind::Aptitude => updated.aptitude_tests_completed += 1,
        HistoryKind::Gd => updated.gd_topics_prepared += 1,
        HistoryKind::Coding if !repeat_completion => updated.coding_challenges_completed += 1,
        HistoryKind::Coding | HistoryKind::GroupDiscussion => {}
    }
    updated
}

/// Percentage of correct answers, rounded to the nearest integer.
pub fn quiz_score(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((correct as f64 / total as f64) * 100.0).round() as u32
}

/// Most recent entries, optionally filtered by kind. History is stored
/// newest first.
pub fn recent_history(
    history: &[HistoryItem],
    kind: Option<HistoryKind>,
    limit: usize,
) -> Vec<HistoryItem> {
    history
        .iter()
        .filter(|item| kind.map_or(true, |k| item.kind == k))
        .take(limit)
        .cloned()
        .collect()
}
