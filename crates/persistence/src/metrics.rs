//! Query and pool metrics.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// Times one repository call. Names are static so the label set stays bounded.
///
/// ```ignore
/// let timer = QueryTimer::new("find_profile_by_uid");
/// let result = sqlx::query_as::<_, ProfileEntity>(...).fetch_optional(&pool).await;
/// timer.record();
/// result
/// ```
pub struct QueryTimer {
    query: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query: &'static str) -> Self {
        Self {
            query,
            start: Instant::now(),
        }
    }

    /// Records the elapsed time under `database_query_duration_seconds`.
    pub fn record(self) {
        histogram!("database_query_duration_seconds", "query" => self.query)
            .record(self.start.elapsed().as_secs_f64());
    }
}

/// Connection counts at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub total: u32,
    pub idle: usize,
}

impl PoolSnapshot {
    pub fn of(pool: &PgPool) -> Self {
        Self {
            total: pool.size(),
            idle: pool.num_idle(),
        }
    }

    /// Connections checked out. Idle can briefly exceed the total while the
    /// pool is resizing.
    pub fn active(&self) -> usize {
        (self.total as usize).saturating_sub(self.idle)
    }

    fn publish(&self) {
        gauge!("database_connections_active").set(self.active() as f64);
        gauge!("database_connections_idle").set(self.idle as f64);
        gauge!("database_connections_total").set(self.total as f64);
    }
}

/// Publishes pool gauges. Called on every scrape of the metrics endpoint.
pub fn record_pool_metrics(pool: &PgPool) {
    PoolSnapshot::of(pool).publish();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_connections() {
        let snapshot = PoolSnapshot { total: 8, idle: 3 };
        assert_eq!(snapshot.active(), 5);
    }

    #[test]
    fn test_active_never_negative() {
        let snapshot = PoolSnapshot { total: 2, idle: 4 };
        assert_eq!(snapshot.active(), 0);
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        QueryTimer::new("leaderboard").record();
    }
}
