//! Shared application state.
//!
//! Handlers and middleware receive this via Axum's `State` extractor. Everything
//! inside is cheap to clone: the pool is internally reference-counted and the
//! rest is behind `Arc`.

use std::sync::Arc;

use crate::config::Config;
use crate::db::DbPool;
use crate::middleware::rate_limit::RateLimiter;
use crate::services::detection_service::FieldDetector;
use crate::services::email_service::EmailService;

#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub pool: DbPool,

    /// Parsed environment configuration
    pub config: Arc<Config>,

    /// Process-local fixed-window rate limiter.
    ///
    /// State lives in memory and is lost on restart; horizontal scaling would
    /// require swapping this for a shared counting store behind the same
    /// `check(identity, address)` interface.
    pub rate_limiter: Arc<RateLimiter>,

    /// External field-detection collaborator (best-effort, never required for correctness)
    pub detector: Arc<FieldDetector>,

    /// Password-reset email delivery (best-effort)
    pub mailer: Arc<EmailService>,
}
