//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations (opaque 500)
/// - **Authentication Errors**: Invalid API keys, bearer tokens, credentials, reset tokens (401)
/// - **Conflicts**: Duplicate unique fields at registration (409)
/// - **Rate Limiting**: Window exceeded or key-reset cooldown active (429 + Retry-After)
/// - **Payload Errors**: Ingestion batch over the configured maximum (413)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// This wraps any sqlx::Error using the `#[from]` attribute, which
    /// automatically implements `From<sqlx::Error> for AppError`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// X-API-Key header is missing or does not match a registered client.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Bearer token is missing or does not belong to any client.
    #[error("Invalid token")]
    InvalidToken,

    /// Email/password pair does not match a registered client.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Password-reset token is unknown or already consumed.
    #[error("Invalid reset token")]
    InvalidResetToken,

    /// A unique field (email, distributor id) is already registered.
    ///
    /// Returns HTTP 409 Conflict. The String says which field collided.
    #[error("{0}")]
    Conflict(String),

    /// Rate-limit window exceeded, or API-key reset cooldown still active.
    ///
    /// Returns HTTP 429 with a `Retry-After` header stating remaining seconds.
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },

    /// Ingestion batch exceeds the configured maximum size.
    ///
    /// Returns HTTP 413 Payload Too Large.
    #[error("Batch size exceeds limit")]
    PayloadTooLarge,

    /// No client is registered under the supplied email.
    ///
    /// Returns HTTP 404 Not Found (password-reset request only).
    #[error("Email not found")]
    EmailNotFound,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// This implementation allows Axum handlers to return `Result<T, AppError>`
/// and have errors automatically converted to proper HTTP responses.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Map each error variant to (HTTP status, error code, message, Retry-After)
        let (status, code, message, retry_after) = match self {
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
                None,
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                self.to_string(),
                None,
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                self.to_string(),
                None,
            ),
            AppError::InvalidResetToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_reset_token",
                self.to_string(),
                None,
            ),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            AppError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Rate limit exceeded".to_string(),
                Some(retry_after),
            ),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                self.to_string(),
                None,
            ),
            AppError::EmailNotFound => (
                StatusCode::NOT_FOUND,
                "email_not_found",
                self.to_string(),
                None,
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone(), None)
            }
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        // Build JSON response body
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            // Digits are always a valid header value
            if let Ok(value) = header::HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
