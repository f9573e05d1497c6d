//! Rate limiting middleware.
//!
//! Per-user limits on the generative endpoints, which each cost an upstream
//! model call.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{clock::Clock, DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::app::AppState;
use crate::extractors::UserAuth;

/// Rate limiter state shared across all requests, keyed by user id.
pub struct RateLimiterState {
    limiter: DefaultKeyedRateLimiter<String>,
    rate_limit_per_minute: u32,
}

impl RateLimiterState {
    /// Create a limiter allowing `rate_limit_per_minute` requests per user.
    ///
    /// Returns `None` for a zero limit, which disables limiting.
    pub fn new(rate_limit_per_minute: u32) -> Option<Self> {
        let per_minute = NonZeroU32::new(rate_limit_per_minute)?;
        Some(Self {
            limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
            rate_limit_per_minute,
        })
    }

    /// Check if a request from the given user should be allowed.
    /// Returns Ok(()) if allowed, or Err with retry_after seconds if rate limited.
    pub fn check(&self, uid: &str) -> Result<(), u64> {
        match self.limiter.check_key(&uid.to_string()) {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let now = self.limiter.clock().now();
                Err(not_until.wait_time_from(now).as_secs().max(1))
            }
        }
    }

    /// Drops state for users whose quota has fully replenished.
    pub fn shrink(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn rate_limit_per_minute(&self) -> u32 {
        self.rate_limit_per_minute
    }

    /// Calls [`shrink`](Self::shrink) every `every` until the limiter is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_maintenance(limiter: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter = Arc::downgrade(limiter);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match limiter.upgrade() {
                    Some(limiter) => limiter.shrink(),
                    None => break,
                }
            }
        })
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("tracked_users", &self.limiter.len())
            .finish()
    }
}

/// Middleware that applies rate limiting per authenticated user.
///
/// Must run after authentication so that the caller is in request extensions.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(rate_limiter) = state.rate_limiter.as_ref() else {
        return next.run(req).await;
    };

    // No identity: the request fails auth anyway.
    let Some(auth) = req.extensions().get::<UserAuth>() else {
        return next.run(req).await;
    };

    if let Err(retry_after) = rate_limiter.check(&auth.uid) {
        tracing::info!(user_id = %auth.uid, retry_after, "Generation rate limit hit");
        return rate_limited_response(rate_limiter.rate_limit_per_minute(), retry_after);
    }

    next.run(req).await
}

/// Create a rate limited response with proper headers and body.
fn rate_limited_response(limit: u32, retry_after: u64) -> Response {
    let body = json!({
        "error": "rate_limited",
        "message": format!("Rate limit of {} requests/minute exceeded", limit),
        "retryAfter": retry_after
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}
