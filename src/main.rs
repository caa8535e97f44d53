//! Store Bulk API - Main Application Entry Point
//!
//! This is a REST API server for multi-tenant bulk data ingestion. Organizations register,
//! receive an API key, push batches of arbitrary JSON records which are deduplicated and
//! upserted, and later claim an "unexported" slice of their records exactly once through a
//! competing-consumer batch endpoint.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key (`X-API-Key`) for ingestion, bearer tokens for automation
//! - **Rate Limiting**: process-local fixed window per (identity, source address)
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod auth;
mod config;
mod db;
mod error;
mod fingerprint;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::middleware::rate_limit::RateLimiter;
use crate::services::{detection_service::FieldDetector, email_service::EmailService};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let server_port = config.server_port;
    let state = AppState {
        pool,
        rate_limiter: Arc::new(RateLimiter::new(
            config.rate_limit_requests,
            config.rate_limit_window_seconds,
        )),
        detector: Arc::new(FieldDetector::from_config(&config)),
        mailer: Arc::new(EmailService::from_config(&config)),
        config: Arc::new(config),
    };

    // Ingestion route: authenticated by long-lived API key
    let ingest_routes = Router::new()
        .route("/v1/bulk-ingest", post(handlers::ingest::bulk_ingest))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::api_key_auth,
        ));

    // Automation route: authenticated by short-lived bearer token
    let automation_routes = Router::new()
        .route(
            "/v1/automation/batch",
            get(handlers::automation::automation_batch),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::bearer_auth,
        ));

    // Everything under /v1 sits behind the rate limiter; /health does not.
    let api_routes = Router::new()
        .route(
            "/v1/clients/register",
            post(handlers::auth::register_client),
        )
        .route("/v1/auth/token", post(handlers::auth::issue_token))
        .route("/v1/auth/api-key/reset", post(handlers::auth::reset_api_key))
        .route(
            "/v1/auth/password-reset/request",
            post(handlers::auth::request_password_reset),
        )
        .route(
            "/v1/auth/password-reset/confirm",
            post(handlers::auth::confirm_password_reset),
        )
        .merge(ingest_routes)
        .merge(automation_routes)
        // Rate limiting runs before authentication, matching the gate order
        // of ingestion traffic: limiter -> auth -> handler
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit_middleware,
        ));

    let app = Router::new()
        // Public routes (no authentication, no rate limiting)
        .route("/health", get(handlers::health::health_check))
        .merge(api_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        // Share application state with all handlers via State extraction
        .with_state(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // ConnectInfo makes the peer address available to the rate limiter
    // when no X-Forwarded-For header is present.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
