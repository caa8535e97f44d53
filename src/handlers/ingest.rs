//! Bulk ingestion HTTP handler.
//!
//! `POST /v1/bulk-ingest`, authenticated by `X-API-Key` (see
//! `crate::middleware::auth::api_key_auth`).

use axum::{Extension, Json, extract::State};
use serde_json::Value;

use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::item::BulkIngestResponse;
use crate::services::{ingest_service, mapping_service};
use crate::state::AppState;

/// Ingest a batch of arbitrary JSON records for the authenticated tenant.
///
/// # Flow
///
/// 1. Reject batches over `MAX_BATCH_SIZE` with 413
/// 2. Resolve the tenant's field mapping (first batch triggers one detection
///    attempt against the batch's first record; later batches reuse the stored
///    mapping, nulls included)
/// 3. Fingerprint, deduplicate, and upsert the batch atomically
///
/// # Response
///
/// - **Success (200)**: `{"processed": n}` - the count of valid records
///   submitted; in-batch duplicates collapse to one stored row but each counts
/// - **Error (401)**: bad API key
/// - **Error (413)**: batch exceeds the configured maximum
pub async fn bulk_ingest(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(items): Json<Vec<Value>>,
) -> Result<Json<BulkIngestResponse>, AppError> {
    if items.len() > state.config.max_batch_size {
        return Err(AppError::PayloadTooLarge);
    }

    let (quantity_field, price_field) = mapping_service::resolve_field_mapping(
        &state.pool,
        &state.detector,
        auth.client_id,
        items.first(),
    )
    .await?;

    let processed = ingest_service::bulk_upsert(
        &state.pool,
        auth.client_id,
        &items,
        quantity_field.as_deref(),
        price_field.as_deref(),
    )
    .await?;

    Ok(Json(BulkIngestResponse { processed }))
}
