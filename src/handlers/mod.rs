//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Delegates to the business-logic services
//! 3. Returns HTTP response (JSON, status code)

/// Batch claim endpoint for automation clients
pub mod automation;
/// Registration, token exchange, and password reset endpoints
pub mod auth;
/// Service health endpoint
pub mod health;
/// Bulk ingestion endpoint
pub mod ingest;
