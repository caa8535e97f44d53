//! Bearer token and password-reset token models, plus the reset wire types.
//!
//! Tokens are opaque secrets scoped to one tenant; only their SHA-256 digests
//! are stored. Reset tokens are single-use: `used_at` marks consumption.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bearer access token issued by `POST /v1/auth/token`.
///
/// Maps to the `access_tokens` table. Automation requests are authenticated by
/// joining this table on `token_sha`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessToken {
    pub id: Uuid,
    pub api_client_id: Uuid,
    /// SHA-256 digest of the raw token (64 hex characters, unique)
    pub token_sha: String,
    pub created_at: DateTime<Utc>,
}

/// Single-use password-reset token.
///
/// Maps to the `password_reset_tokens` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub api_client_id: Uuid,
    /// SHA-256 digest of the raw token (64 hex characters, unique)
    pub token_sha: String,
    pub created_at: DateTime<Utc>,
    /// Set when the token is consumed; consumed tokens are rejected
    pub used_at: Option<DateTime<Utc>>,
}

/// Request body for `POST /v1/auth/password-reset/request`.
#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Response body for `POST /v1/auth/password-reset/request`.
///
/// `reset_token` is only populated when `RESET_TOKEN_DEBUG` is enabled.
#[derive(Debug, Serialize)]
pub struct PasswordResetResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

/// Request body for `POST /v1/auth/password-reset/confirm`.
#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub reset_token: String,
    pub new_password: String,
}

/// Response body for `POST /v1/auth/password-reset/confirm`.
#[derive(Debug, Serialize)]
pub struct PasswordResetConfirmResponse {
    pub status: &'static str,
}
