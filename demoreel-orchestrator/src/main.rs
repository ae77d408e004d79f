use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod queue;
pub mod repository;
pub mod service;
pub mod stages;
pub mod state;

use config::Config;
use service::events::EventBus;
use service::session::{SessionRegistry, spawn_idle_reaper};
use state::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "demoreel_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Demoreel Orchestrator...");

    let config = Arc::new(Config::from_env());

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // Media directories must exist before any stage or ServeDir touches them
    tokio::fs::create_dir_all(config.public_dir())
        .await
        .expect("Failed to create public media directory");
    tokio::fs::create_dir_all(config.media_root.join("work"))
        .await
        .expect("Failed to create work directory");

    let (queues, receivers) = queue::job_queues();
    let events = EventBus::new(256);
    let sessions = Arc::new(SessionRegistry::new(
        demoreel_browser::BrowserConfig {
            chrome_binary: config.chrome_binary.clone(),
            headless: config.headless,
            ..demoreel_browser::BrowserConfig::default()
        },
        config.session_idle_timeout,
        config.session_settle_delay,
    ));

    let app_state = AppState::new(
        pool,
        config.clone(),
        queues,
        events,
        sessions.clone(),
    );

    // Spawn stage workers and the session idle reaper
    queue::spawn_workers(app_state.clone(), receivers);
    spawn_idle_reaper(sessions);

    // Build router with all API endpoints
    let app = api::create_router(app_state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
