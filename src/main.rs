//! Paperdesk - PDF and image tools with a small CMS

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paperdesk::{api, config::Config, db, scheduler::Scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paperdesk=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Paperdesk {}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = std::env::var("PAPERDESK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yml"));
    let config = Config::load_with_env(&config_path)?;
    tracing::info!("Configuration loaded from {}", config_path.display());

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    if !config.ai.is_enabled() {
        tracing::info!("No AI API key configured, AI tools are disabled");
    }

    // Build application state (also bootstraps the superadmin)
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let interval = Duration::from_secs(config.scheduler.interval_secs);
    let state = api::AppState::new(config, pool).await?;

    // Background jobs: scheduled publishing, session and limiter cleanup
    Scheduler::new(
        state.blog_service.clone(),
        state.page_service.clone(),
        state.section_service.clone(),
        state.user_service.clone(),
        state.rate_limiter.clone(),
    )
    .spawn(interval);
    tracing::info!("Scheduler started, interval {}s", interval.as_secs());

    // Build router
    let app = api::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
