use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use shared::jwt::{JwtConfig, JwtError};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, require_user_auth,
    security_headers_middleware, trace_id, RateLimiterState,
};
use crate::routes::{aptitude, discussion, generation, groups, health, leaderboard, messages, profile};
use crate::services::{
    ChatHub, ContentGenerator, EvaluationService, GeminiClient, GenerationError, ProfileEvents,
    ProfileService, TextGenerator,
};

/// How often idle per-user rate limit state is dropped.
const RATE_LIMITER_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtConfig>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
    /// `None` when no API key is configured; generative endpoints then
    /// answer with a configuration error.
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub chat_hub: ChatHub,
    pub profile_events: ProfileEvents,
}

impl AppState {
    pub fn profile_service(&self) -> ProfileService {
        ProfileService::new(self.pool.clone(), self.profile_events.clone())
    }

    pub fn evaluation_service(&self) -> EvaluationService {
        EvaluationService::new(
            self.pool.clone(),
            self.generator.clone(),
            self.profile_service(),
            &self.config.evaluation,
        )
    }

    pub fn content_generator(&self) -> ContentGenerator {
        ContentGenerator::new(self.pool.clone(), self.generator.clone())
    }
}

/// Startup failures while assembling the application.
#[derive(Debug, Error)]
pub enum AppBuildError {
    #[error("Invalid JWT configuration: {0}")]
    Jwt(#[from] JwtError),

    #[error("Failed to create generative client: {0}")]
    Generator(#[from] GenerationError),
}

/// Builds the router with the production Gemini client, if configured.
///
/// `chat_hub` is shared with the notification listener started in `main`.
pub fn create_app(
    config: Config,
    pool: PgPool,
    chat_hub: ChatHub,
) -> Result<Router, AppBuildError> {
    let generator: Option<Arc<dyn TextGenerator>> = if config.gemini.is_configured() {
        Some(Arc::new(GeminiClient::new(config.gemini.clone())?))
    } else {
        tracing::warn!("Gemini API key not set, generative endpoints are disabled");
        None
    };

    create_app_with_generator(config, pool, chat_hub, generator)
}

/// Builds the router around the given generator.
///
/// Must be called from within a Tokio runtime.
pub fn create_app_with_generator(
    config: Config,
    pool: PgPool,
    chat_hub: ChatHub,
    generator: Option<Arc<dyn TextGenerator>>,
) -> Result<Router, AppBuildError> {
    let config = Arc::new(config);
    let jwt = JwtConfig::from_rsa_pem(
        &config.jwt.private_key,
        &config.jwt.public_key,
        config.jwt.token_expiry_secs,
        config.jwt.leeway_secs,
    )?
    .with_expectations(&config.jwt.issuer, &config.jwt.audience);

    // Zero disables per-user rate limiting
    let rate_limiter = RateLimiterState::new(config.security.rate_limit_per_minute).map(Arc::new);
    if let Some(limiter) = &rate_limiter {
        RateLimiterState::spawn_maintenance(limiter, RATE_LIMITER_MAINTENANCE_INTERVAL);
    }

    let state = AppState {
        pool,
        config: config.clone(),
        jwt: Arc::new(jwt),
        rate_limiter,
        generator,
        chat_hub,
        profile_events: ProfileEvents::new(),
    };

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let protected_routes = Router::new()
        // Profile
        .route("/api/v1/profile/me", get(profile::get_me).put(profile::update_me))
        .route("/api/v1/profile/me/username", put(profile::set_username))
        .route(
            "/api/v1/profile/me/history",
            get(profile::get_history).post(profile::add_history),
        )
        .route("/api/v1/profile/me/events", get(profile::profile_events))
        // Discussion rooms
        .route(
            "/api/v1/groups",
            post(groups::create_group).get(groups::list_groups),
        )
        .route("/api/v1/groups/current", get(groups::current_group))
        .route(
            "/api/v1/groups/:group_id",
            get(groups::get_group).delete(groups::delete_group),
        )
        .route("/api/v1/groups/:group_id/join", post(groups::join_group))
        .route("/api/v1/groups/:group_id/leave", post(groups::leave_group))
        .route(
            "/api/v1/groups/:group_id/complete",
            post(groups::complete_group),
        )
        // Chat
        .route(
            "/api/v1/groups/:group_id/messages",
            get(messages::list_messages).post(messages::post_message),
        )
        .route(
            "/api/v1/groups/:group_id/messages/stream",
            get(messages::stream_messages),
        )
        // Scoring
        .route(
            "/api/v1/groups/:group_id/submit",
            post(discussion::submit_discussion),
        )
        .route("/api/v1/submissions", get(discussion::list_submissions))
        // Aptitude
        .route("/api/v1/aptitude/questions", get(aptitude::list_questions))
        .route("/api/v1/aptitude/attempts", post(aptitude::submit_attempt))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    // Each call costs an upstream model request.
    // Auth runs first (outermost layer), then rate limiting keyed by the caller.
    let generative_routes = Router::new()
        .route(
            "/api/v1/evaluate-discussion",
            post(discussion::evaluate_discussion),
        )
        .route("/api/v1/generate-topic", post(generation::generate_topic))
        .route(
            "/api/v1/generate-quiz-items",
            post(generation::generate_quiz_items),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/live", get(health::live))
        .route("/api/health/ready", get(health::ready))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/leaderboard", get(leaderboard::get_leaderboard))
        .route("/api/v1/stats", get(leaderboard::get_stats));

    Ok(Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(generative_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state))
}
