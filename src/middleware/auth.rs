//! Authentication middleware for the two credential schemes.
//!
//! Ingestion traffic authenticates with a long-lived API key in `X-API-Key`;
//! automation traffic authenticates with a short-lived bearer token from
//! `POST /v1/auth/token`. Both middlewares:
//! 1. Extract the credential from its header
//! 2. Hash it and look up the owning client in the database
//! 3. Inject an `AuthContext` into the request
//! 4. Reject unauthorized requests with HTTP 401

use crate::{auth, error::AppError, models::client::ApiClient, state::AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Authentication context attached to authenticated requests.
///
/// Inserted into the request's extension map; route handlers extract it with
/// `Extension<AuthContext>` to know which tenant made the request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the authenticated tenant.
    ///
    /// Every query downstream filters by this id, keeping tenants isolated.
    pub client_id: Uuid,

    /// The tenant's external distributor identifier
    pub distributor_id: String,
}

/// API key authentication middleware for `/v1/bulk-ingest`.
///
/// # Flow
///
/// 1. Extract the `X-API-Key` header
/// 2. Hash it with SHA-256 and look up `api_clients.api_key_sha`
/// 3. Verify the key against the stored verifier in constant time
/// 4. If valid: inject `AuthContext`, call the next handler
/// 5. Otherwise: return 401 Unauthorized
pub async fn api_key_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = request
        .headers()
        .get("X-API-Key")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidApiKey)?;

    let key_sha = auth::sha256_hex(api_key);

    let client = sqlx::query_as::<_, ApiClient>(
        "SELECT id, email, org_name, distributor_id, api_key_hash, api_key_sha,
                password_hash, password_salt, created_at, last_api_key_reset_at
         FROM api_clients
         WHERE api_key_sha = $1",
    )
    .bind(&key_sha)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    if !auth::verify_api_key(api_key, &client.api_key_hash) {
        return Err(AppError::InvalidApiKey);
    }

    request.extensions_mut().insert(AuthContext {
        client_id: client.id,
        distributor_id: client.distributor_id,
    });

    Ok(next.run(request).await)
}

/// Bearer token authentication middleware for `/v1/automation/batch`.
///
/// Expected header format:
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// The token digest is joined through `access_tokens` to find the owning
/// tenant; unknown tokens return 401.
pub async fn bearer_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AppError::InvalidToken)?;

    let token_sha = auth::sha256_hex(token);

    let client = sqlx::query_as::<_, ApiClient>(
        "SELECT c.id, c.email, c.org_name, c.distributor_id, c.api_key_hash, c.api_key_sha,
                c.password_hash, c.password_salt, c.created_at, c.last_api_key_reset_at
         FROM api_clients c
         JOIN access_tokens t ON t.api_client_id = c.id
         WHERE t.token_sha = $1",
    )
    .bind(&token_sha)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::InvalidToken)?;

    request.extensions_mut().insert(AuthContext {
        client_id: client.id,
        distributor_id: client.distributor_id,
    });

    Ok(next.run(request).await)
}
