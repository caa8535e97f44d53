//! Tenant (API client) data model and auth API request/response types.
//!
//! This module defines:
//! - `ApiClient`: Database entity representing one registered organization
//! - Request/response bodies for registration, token exchange, and API key reset

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a registered organization from the database.
///
/// # Database Table
///
/// Maps to the `api_clients` table. Each client:
/// - Is identified by a globally unique email and distributor id
/// - Holds an API-key verifier plus a unique fast-lookup digest (`api_key_sha`)
/// - Holds a salted password verifier for the token/reset flows
///
/// Raw API keys and passwords are never stored; see `crate::auth`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiClient {
    /// Unique identifier for this organization
    pub id: Uuid,

    /// Contact email, globally unique
    pub email: String,

    /// Human-readable organization name
    pub org_name: String,

    /// External distributor identifier, globally unique
    pub distributor_id: String,

    /// Verifier digest of the current API key
    pub api_key_hash: String,

    /// Fast-lookup digest of the current API key (64 hex characters, unique)
    ///
    /// When a request comes in with `X-API-Key: sk_abc`, we:
    /// 1. Hash "sk_abc" with SHA-256
    /// 2. Look up this digest in the database
    /// 3. Verify the key against `api_key_hash` in constant time
    pub api_key_sha: String,

    /// PBKDF2 password verifier
    pub password_hash: String,

    /// Per-client password salt
    pub password_salt: String,

    /// Timestamp when this organization registered
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last API-key rotation, if any.
    ///
    /// Token issuance and further rotations are blocked for a configurable
    /// cooldown after this time (429 + Retry-After).
    pub last_api_key_reset_at: Option<DateTime<Utc>>,
}

/// Request body for `POST /v1/clients/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub org_name: String,
    pub distributor_id: String,
    pub password: String,
}

/// Response body for `POST /v1/clients/register`.
///
/// The raw API key is shown exactly once, here.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub client_id: Uuid,
    pub api_key: String,
    pub distributor_id: String,
}

/// Request body for `POST /v1/auth/token` and `POST /v1/auth/api-key/reset`.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Response body for `POST /v1/auth/token`.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub distributor_id: String,
}

/// Response body for `POST /v1/auth/api-key/reset`.
#[derive(Debug, Serialize)]
pub struct ApiKeyResetResponse {
    pub api_key: String,
    pub distributor_id: String,
}
