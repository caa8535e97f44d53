//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate requests
//! - Rate-limit callers
//! - Modify request/response
//! - Short-circuit requests (reject unauthorized or over-limit)

/// API key and bearer token authentication middleware
pub mod auth;
/// Identity-resolving fixed-window rate limiter
pub mod rate_limit;
