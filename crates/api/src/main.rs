use anyhow::Result;
use placement_prep_api::{app, config, middleware, services::ChatHub};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = config::Config::load()?;

    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics()?;

    info!("Starting Placement Prep API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&(&config.database).into()).await?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    // Wakes local transcript subscribers when another instance posts.
    let chat_hub = ChatHub::new(pool.clone());
    chat_hub.spawn_listener();

    let addr = config.socket_addr()?;
    let app = app::create_app(config, pool, chat_hub)?;

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
