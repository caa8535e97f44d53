//! Automation batch HTTP handler.
//!
//! `GET /v1/automation/batch`, authenticated by bearer token (see
//! `crate::middleware::auth::bearer_auth`).

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::item::AutomationBatchResponse;
use crate::services::ingest_service;
use crate::state::AppState;

/// Query parameters for the batch claim endpoint.
#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    /// Maximum records to claim, 1-1000
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// Claim a batch of unexported records for the authenticated tenant.
///
/// Each returned record is flagged exported in the same transaction that
/// selected it, so sequential calls never re-deliver a record and concurrent
/// calls never overlap. Re-ingesting a record clears the flag and makes it
/// claimable again.
///
/// # Response
///
/// - **Success (200)**: claimed records oldest-first; empty array when nothing
///   is unexported
/// - **Error (400)**: `limit` outside 1-1000
/// - **Error (401)**: bad token
pub async fn automation_batch(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<BatchQuery>,
) -> Result<Json<AutomationBatchResponse>, AppError> {
    if !(1..=1000).contains(&query.limit) {
        return Err(AppError::InvalidRequest(
            "limit must be between 1 and 1000".to_string(),
        ));
    }

    let items = ingest_service::claim_batch(&state.pool, auth.client_id, query.limit).await?;

    Ok(Json(AutomationBatchResponse {
        items: items.into_iter().map(Into::into).collect(),
    }))
}
