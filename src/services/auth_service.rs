//! Account flows: registration, token issuance, API key rotation, password reset.
//!
//! All functions operate over the pool through plain repository-style queries;
//! multi-row writes (reset confirmation) run in a single transaction.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth;
use crate::config::Config;
use crate::db::DbPool;
use crate::error::AppError;
use crate::models::client::{ApiClient, RegisterRequest};
use crate::models::token::PasswordResetToken;

/// Outcome of a successful registration. The raw API key appears only here.
pub struct Registration {
    pub client_id: Uuid,
    pub api_key: String,
    pub distributor_id: String,
}

/// Register a new organization and issue its first API key.
///
/// # Errors
///
/// `Conflict` when the email or distributor id is already registered. The
/// pre-checks give distinct messages; the UNIQUE constraints remain the real
/// guard, and a lost race surfaces as a database error.
pub async fn register_client(
    pool: &DbPool,
    config: &Config,
    request: &RegisterRequest,
) -> Result<Registration, AppError> {
    let email_taken: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM api_clients WHERE email = $1)")
            .bind(&request.email)
            .fetch_one(pool)
            .await?;
    if email_taken {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let distributor_taken: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM api_clients WHERE distributor_id = $1)")
            .bind(&request.distributor_id)
            .fetch_one(pool)
            .await?;
    if distributor_taken {
        return Err(AppError::Conflict(
            "Distributor ID already registered".to_string(),
        ));
    }

    let api_key = auth::generate_api_key(&config.api_key_prefix, config.api_key_length);
    let salt = auth::generate_salt();

    let client_id: Uuid = sqlx::query_scalar(
        "INSERT INTO api_clients \
         (id, email, org_name, distributor_id, api_key_hash, api_key_sha, \
          password_hash, password_salt, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(&request.email)
    .bind(&request.org_name)
    .bind(&request.distributor_id)
    .bind(auth::sha256_hex(&api_key))
    .bind(auth::sha256_hex(&api_key))
    .bind(auth::hash_password(&request.password, &salt))
    .bind(&salt)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(Registration {
        client_id,
        api_key,
        distributor_id: request.distributor_id.clone(),
    })
}

/// Verify email/password and return the client.
///
/// A missing client and a wrong password produce the same 401, so callers
/// cannot probe which emails exist through this endpoint.
pub async fn authenticate(
    pool: &DbPool,
    email: &str,
    password: &str,
) -> Result<ApiClient, AppError> {
    let client = find_by_email(pool, email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !auth::verify_password(password, &client.password_salt, &client.password_hash) {
        return Err(AppError::InvalidCredentials);
    }

    Ok(client)
}

/// Issue a bearer token for automation access.
///
/// Blocked during the API-key reset cooldown (429 + Retry-After), so a stolen
/// password cannot mint tokens immediately after a defensive key rotation.
pub async fn issue_token(
    pool: &DbPool,
    config: &Config,
    email: &str,
    password: &str,
) -> Result<(String, ApiClient), AppError> {
    let client = authenticate(pool, email, password).await?;
    check_reset_cooldown(&client, config)?;

    let token = auth::generate_access_token();
    sqlx::query(
        "INSERT INTO access_tokens (id, api_client_id, token_sha, created_at)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(client.id)
    .bind(auth::sha256_hex(&token))
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok((token, client))
}

/// Rotate the client's API key. The old key stops working immediately.
pub async fn reset_api_key(
    pool: &DbPool,
    config: &Config,
    email: &str,
    password: &str,
) -> Result<(String, ApiClient), AppError> {
    let client = authenticate(pool, email, password).await?;
    check_reset_cooldown(&client, config)?;

    let new_key = auth::generate_api_key(&config.api_key_prefix, config.api_key_length);
    sqlx::query(
        "UPDATE api_clients
         SET api_key_hash = $1, api_key_sha = $2, last_api_key_reset_at = $3
         WHERE id = $4",
    )
    .bind(auth::sha256_hex(&new_key))
    .bind(auth::sha256_hex(&new_key))
    .bind(Utc::now())
    .bind(client.id)
    .execute(pool)
    .await?;

    Ok((new_key, client))
}

/// Create a single-use password-reset token for the given email.
///
/// Returns the raw token so the handler can email it (and echo it back in
/// debug mode).
///
/// # Errors
///
/// `EmailNotFound` when no client is registered under the email.
pub async fn create_reset_token(pool: &DbPool, email: &str) -> Result<(String, ApiClient), AppError> {
    let client = find_by_email(pool, email)
        .await?
        .ok_or(AppError::EmailNotFound)?;

    let token = auth::generate_reset_token();
    sqlx::query(
        "INSERT INTO password_reset_tokens (id, api_client_id, token_sha, created_at)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(client.id)
    .bind(auth::sha256_hex(&token))
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok((token, client))
}

/// Consume a reset token and set the new password.
///
/// The password update and the `used_at` marker commit together; a token can
/// therefore never be spent without the password actually changing.
pub async fn confirm_password_reset(
    pool: &DbPool,
    reset_token: &str,
    new_password: &str,
) -> Result<(), AppError> {
    let token = sqlx::query_as::<_, PasswordResetToken>(
        "SELECT id, api_client_id, token_sha, created_at, used_at
         FROM password_reset_tokens
         WHERE token_sha = $1 AND used_at IS NULL",
    )
    .bind(auth::sha256_hex(reset_token))
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::InvalidResetToken)?;

    let salt = auth::generate_salt();
    let password_hash = auth::hash_password(new_password, &salt);

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE api_clients SET password_hash = $1, password_salt = $2 WHERE id = $3")
        .bind(&password_hash)
        .bind(&salt)
        .bind(token.api_client_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE password_reset_tokens SET used_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(token.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(())
}

async fn find_by_email(pool: &DbPool, email: &str) -> Result<Option<ApiClient>, AppError> {
    let client = sqlx::query_as::<_, ApiClient>(
        "SELECT id, email, org_name, distributor_id, api_key_hash, api_key_sha,
                password_hash, password_salt, created_at, last_api_key_reset_at
         FROM api_clients
         WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(client)
}

/// Reject while the API-key reset cooldown is still running.
fn check_reset_cooldown(client: &ApiClient, config: &Config) -> Result<(), AppError> {
    if let Some(remaining) = cooldown_remaining(
        client.last_api_key_reset_at,
        config.api_key_reset_cooldown_minutes,
        Utc::now(),
    ) {
        return Err(AppError::RateLimited {
            retry_after: remaining,
        });
    }
    Ok(())
}

/// Seconds left in the cooldown, or `None` once it has elapsed (or never started).
fn cooldown_remaining(
    last_reset: Option<DateTime<Utc>>,
    cooldown_minutes: i64,
    now: DateTime<Utc>,
) -> Option<u64> {
    let last_reset = last_reset?;
    let cooldown_seconds = cooldown_minutes.max(0) * 60;
    let elapsed = now.signed_duration_since(last_reset).num_seconds();
    if elapsed < cooldown_seconds {
        Some((cooldown_seconds - elapsed).max(1) as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).single().expect("valid timestamp")
    }

    #[test]
    fn no_reset_means_no_cooldown() {
        assert_eq!(cooldown_remaining(None, 30, at(0)), None);
    }

    #[test]
    fn cooldown_counts_down_remaining_seconds() {
        let last = at(0);
        assert_eq!(cooldown_remaining(Some(last), 30, at(0)), Some(1800));
        assert_eq!(cooldown_remaining(Some(last), 30, at(600)), Some(1200));
        assert_eq!(cooldown_remaining(Some(last), 30, at(1799)), Some(1));
    }

    #[test]
    fn cooldown_expires_at_boundary() {
        let last = at(0);
        assert_eq!(cooldown_remaining(Some(last), 30, at(1800)), None);
        assert_eq!(cooldown_remaining(Some(last), 30, at(86_400)), None);
    }

    #[test]
    fn zero_cooldown_never_blocks() {
        assert_eq!(cooldown_remaining(Some(at(0)), 0, at(0)), None);
    }
}
