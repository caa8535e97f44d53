//! Registration and authentication HTTP handlers.
//!
//! This module implements:
//! - POST /v1/clients/register - Register an organization, issue its API key
//! - POST /v1/auth/token - Exchange email/password for a bearer token
//! - POST /v1/auth/api-key/reset - Rotate the API key
//! - POST /v1/auth/password-reset/request - Create and mail a reset token
//! - POST /v1/auth/password-reset/confirm - Consume a reset token

use axum::{Json, extract::State};

use crate::error::AppError;
use crate::models::client::{
    ApiKeyResetResponse, CredentialsRequest, RegisterRequest, RegisterResponse, TokenResponse,
};
use crate::models::token::{
    PasswordResetConfirmRequest, PasswordResetConfirmResponse, PasswordResetRequest,
    PasswordResetResponse,
};
use crate::services::auth_service;
use crate::state::AppState;

/// Register a new organization.
///
/// # Response
///
/// - **Success (200)**: client id, the raw API key (shown only once), distributor id
/// - **Error (409)**: email or distributor id already registered
pub async fn register_client(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    let registration = auth_service::register_client(&state.pool, &state.config, &request).await?;

    Ok(Json(RegisterResponse {
        client_id: registration.client_id,
        api_key: registration.api_key,
        distributor_id: registration.distributor_id,
    }))
}

/// Exchange email/password for a bearer token.
///
/// # Response
///
/// - **Success (200)**: access token for the automation endpoints
/// - **Error (401)**: bad credentials
/// - **Error (429)**: API-key reset cooldown still active (Retry-After set)
pub async fn issue_token(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let (access_token, client) =
        auth_service::issue_token(&state.pool, &state.config, &request.email, &request.password)
            .await?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        distributor_id: client.distributor_id,
    }))
}

/// Rotate the API key using email/password.
///
/// The previous key is invalidated immediately; further rotations and token
/// issuance are blocked for the configured cooldown.
pub async fn reset_api_key(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<ApiKeyResetResponse>, AppError> {
    let (api_key, client) =
        auth_service::reset_api_key(&state.pool, &state.config, &request.email, &request.password)
            .await?;

    Ok(Json(ApiKeyResetResponse {
        api_key,
        distributor_id: client.distributor_id,
    }))
}

/// Request a password reset token.
///
/// The token is delivered by email (best-effort). When `RESET_TOKEN_DEBUG` is
/// enabled the raw token is also returned in the response body.
///
/// # Response
///
/// - **Success (200)**: `{"status": "ok"}` (plus `reset_token` in debug mode)
/// - **Error (404)**: unknown email
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<Json<PasswordResetResponse>, AppError> {
    let (token, client) = auth_service::create_reset_token(&state.pool, &request.email).await?;

    state
        .mailer
        .send_reset_email(&client.email, &client.org_name, &token)
        .await;

    Ok(Json(PasswordResetResponse {
        status: "ok",
        reset_token: state.config.reset_token_debug.then_some(token),
    }))
}

/// Confirm a password reset with the emailed token.
///
/// # Response
///
/// - **Success (200)**: `{"status": "ok"}`
/// - **Error (401)**: token unknown or already used
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetConfirmRequest>,
) -> Result<Json<PasswordResetConfirmResponse>, AppError> {
    auth_service::confirm_password_reset(&state.pool, &request.reset_token, &request.new_password)
        .await?;

    Ok(Json(PasswordResetConfirmResponse { status: "ok" }))
}
