#![allow(dead_code)]

mod azure;
mod config;
mod crypto;
mod db;
mod errors;
mod handlers;
mod jobs;
mod mapper;
mod models;
mod orchestrator;
mod patch;
mod reconcile;
mod rules;
mod savings;
mod scm;
mod sync;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::handlers::AppState;
use crate::scm::GithubClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "costops=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = AppConfig::load()?;
    tracing::info!("Configuration loaded");

    // Connect to PostgreSQL
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url())
        .await?;
    tracing::info!("Connected to PostgreSQL");

    // Run migrations
    sqlx::raw_sql(include_str!("../migrations/001_initial_schema.sql"))
        .execute(&pool)
        .await?;
    tracing::info!("Database migrations applied");

    // Create shared state
    let state = AppState {
        pool: pool.clone(),
        github: Arc::new(GithubClient::new(&config.github)),
        encryption_key: config.encryption_key.clone(),
    };

    // Spawn background jobs
    jobs::spawn_background_jobs(pool.clone(), config.jobs.clone(), config.encryption_key.clone());

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        // Daily cycle
        .route("/api/v1/orgs/:org_id/cycles/run", post(handlers::cycles::run))
        // Recommendations
        .route("/api/v1/orgs/:org_id/recommendations", get(handlers::recommendations::list))
        .route("/api/v1/orgs/:org_id/recommendations/:id", get(handlers::recommendations::get_by_id))
        .route("/api/v1/orgs/:org_id/recommendations/:id/status", axum::routing::put(handlers::recommendations::update_status))
        .route("/api/v1/orgs/:org_id/recommendations/:id/open-pr", post(handlers::recommendations::open_pr))
        // Rule configuration
        .route("/api/v1/orgs/:org_id/rule-configs", get(handlers::rule_configs::get_overrides).put(handlers::rule_configs::put_overrides))
        .route("/api/v1/orgs/:org_id/rules", get(handlers::rule_configs::list_effective))
        // Pull request audit trail
        .route("/api/v1/orgs/:org_id/pull-requests", get(handlers::pull_requests::list))
        // Provider connections
        .route("/api/v1/orgs/:org_id/providers", get(handlers::providers::list).post(handlers::providers::create))
        .route("/api/v1/orgs/:org_id/providers/:id", axum::routing::delete(handlers::providers::delete))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Starting CostOps server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
