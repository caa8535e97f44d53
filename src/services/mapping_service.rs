//! Field mapping resolution: detect once per tenant, reuse forever.
//!
//! The first ingestion batch for a tenant triggers at most one call to the
//! external field detector, using the batch's first record as the sample. The
//! outcome - detected names or a null fallback on any failure - is persisted
//! and reused verbatim for every later batch. A stored mapping with null
//! fields means "detection was attempted and settled on defaults"; it is never
//! re-attempted.

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::field_mapping::FieldMapping;
use crate::services::detection_service::{DetectedFields, FieldDetector};

/// Resolved field names for one tenant: `(quantity_field, price_field)`.
pub type ResolvedFields = (Option<String>, Option<String>);

/// Resolve the tenant's field mapping, detecting on first use.
///
/// Two simultaneous first-batches race benignly: the insert is
/// `ON CONFLICT DO NOTHING` followed by a re-read, so both callers converge on
/// whichever mapping landed. Both outcomes are equally valid fallbacks.
pub async fn resolve_field_mapping(
    pool: &DbPool,
    detector: &FieldDetector,
    client_id: Uuid,
    sample: Option<&Value>,
) -> Result<ResolvedFields, AppError> {
    if let Some(mapping) = get_field_mapping(pool, client_id).await? {
        return Ok((mapping.quantity_field, mapping.price_field));
    }

    let detected = match sample {
        Some(sample) => detector.detect(sample).await.unwrap_or_else(|e| {
            // Fail open: a detection problem must never fail the ingest
            tracing::warn!(%client_id, error = %e, "field detection failed, storing null mapping");
            DetectedFields::default()
        }),
        None => DetectedFields::default(),
    };

    sqlx::query(
        "INSERT INTO field_mappings (id, api_client_id, quantity_field, price_field, detected_at)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (api_client_id) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(client_id)
    .bind(&detected.quantity_field)
    .bind(&detected.price_field)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    // Re-read: if a concurrent first-batch won the insert race, its mapping
    // is the one every caller must use from now on.
    match get_field_mapping(pool, client_id).await? {
        Some(mapping) => Ok((mapping.quantity_field, mapping.price_field)),
        None => Ok((detected.quantity_field, detected.price_field)),
    }
}

async fn get_field_mapping(
    pool: &DbPool,
    client_id: Uuid,
) -> Result<Option<FieldMapping>, AppError> {
    let mapping = sqlx::query_as::<_, FieldMapping>(
        "SELECT id, api_client_id, quantity_field, price_field, detected_at
         FROM field_mappings
         WHERE api_client_id = $1",
    )
    .bind(client_id)
    .fetch_optional(pool)
    .await?;

    Ok(mapping)
}
