//! Troy Backend Service
//!
//! Main entry point for the Troy marketplace pricing core.
//! This service provides:
//! - Spot price polling and bucket price history recording
//! - Periodic maintenance (price lock expiry, history retention)
//!
//! The web layer links against the library and calls the pricing, matching,
//! lock, and history services directly.

use std::sync::Arc;
use tracing::{error, info};
use troy_backend::config::AppConfig;
use troy_backend::database::{create_pool, run_migrations};
use troy_backend::error::{AppError, AppResult};
use troy_backend::services::{MaintenanceTask, MarketPoller};
use troy_backend::AppState;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    // Initialize tracing/logging with config
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("troy_backend={},sqlx=warn", config.log_level).into()
            }),
        )
        .init();

    info!("Troy backend service starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("Spot feed: {}", config.spot.api_url);

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let pool = create_pool(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        AppError::Database(e)
    })?;

    info!("Database connection pool created successfully");
    info!("Max connections: {}", config.database.max_connections);

    // Run migrations
    info!("Running database migrations...");
    run_migrations(&pool, None).await.map_err(|e| {
        error!("Database migration failed: {}", e);
        AppError::Database(e)
    })?;

    info!("Database migrations completed successfully");

    // =========================================================================
    // CORE SERVICES INITIALIZATION
    // =========================================================================
    info!("Initializing core services...");

    let app_state = Arc::new(AppState::new(pool, &config));
    info!("✓ Application state initialized with repositories and services");

    // Warm the spot cache so the first pricing calls do not block on the feed
    if app_state.spot_cache.refresh().await {
        info!("✓ Spot price cache warmed");
    } else {
        info!("Spot price feed unavailable at startup, continuing with fallback pricing");
    }

    // =========================================================================
    // BACKGROUND TASKS
    // =========================================================================
    info!("Starting background tasks...");

    let poller = MarketPoller::new(
        app_state.spot_cache.clone(),
        app_state.history_service.clone(),
        app_state.bucket_repo.clone(),
    )
    .with_poll_interval(config.poll_interval());

    let poller_handle = tokio::spawn(async move {
        poller.start().await;
    });
    info!(
        "✓ Market poller started ({}s interval)",
        config.poll_interval_secs
    );

    let maintenance = MaintenanceTask::new(
        app_state.lock_service.clone(),
        app_state.history_service.clone(),
        config.sweep_interval(),
        config.history_retention_days,
    );

    let maintenance_handle = tokio::spawn(async move {
        maintenance.start().await;
    });
    info!(
        "✓ Maintenance task started ({}s interval, {} day retention)",
        config.sweep_interval_secs, config.history_retention_days
    );

    info!("Troy backend service ready");
    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = poller_handle => {
            error!("Market poller task exited unexpectedly");
        }
        _ = maintenance_handle => {
            error!("Maintenance task exited unexpectedly");
        }
    }

    info!("Troy backend service shutdown complete");
    Ok(())
}
