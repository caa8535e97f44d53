//! Ingested record data model and ingest/automation API types.
//!
//! This module defines:
//! - `StoreItem`: Database entity for one ingested JSON record
//! - `BulkIngestResponse`: Response body for the ingestion endpoint
//! - `AutomationItem` / `AutomationBatchResponse`: claimed-batch wire types

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Represents one ingested record from the database.
///
/// # Database Table
///
/// Maps to the `store_items` table. Each record:
/// - Belongs to exactly one tenant (via `api_client_id`)
/// - Is deduplicated by the UNIQUE `(api_client_id, fingerprint)` pair
/// - Carries the original payload verbatim plus extracted price/quantity
///
/// # Export Lifecycle
///
/// `is_exported`/`exported_at` are set by the batch claim protocol when an
/// automation client receives the record; re-upserting the same fingerprint
/// clears them, making the record claimable again.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct StoreItem {
    /// Unique identifier for this record
    pub id: Uuid,

    /// Foreign key to the owning tenant.
    ///
    /// Queries always filter by `api_client_id` so one tenant can never see
    /// another tenant's records.
    pub api_client_id: Uuid,

    /// SHA-256 content fingerprint (64 hex characters), the dedup key
    pub fingerprint: String,

    /// The original JSON payload, stored opaquely
    pub data: Value,

    /// Extracted numeric price, if the payload carried one
    pub price: Option<f64>,

    /// Extracted numeric quantity, if the payload carried one
    pub quantity: Option<f64>,

    /// Whether this record has been claimed by an automation batch
    pub is_exported: bool,

    /// When the record was claimed, if it has been
    pub exported_at: Option<DateTime<Utc>>,

    /// Timestamp of first insert; immutable across re-upserts
    pub created_at: DateTime<Utc>,

    /// Timestamp of the most recent upsert touching this fingerprint
    pub updated_at: DateTime<Utc>,
}

/// Response body for `POST /v1/bulk-ingest`.
///
/// `processed` counts the valid (non-empty object) records submitted, not the
/// number of stored rows: in-batch duplicates collapse to one row but each
/// still counts once here.
#[derive(Debug, Serialize)]
pub struct BulkIngestResponse {
    pub processed: u64,
}

/// One claimed record as returned by `GET /v1/automation/batch`.
///
/// Strips the internal `api_client_id`, `fingerprint`, and export-flag columns.
#[derive(Debug, Serialize)]
pub struct AutomationItem {
    pub id: Uuid,
    pub data: Value,
    pub price: Option<f64>,
    pub quantity: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoreItem> for AutomationItem {
    fn from(item: StoreItem) -> Self {
        Self {
            id: item.id,
            data: item.data,
            price: item.price,
            quantity: item.quantity,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

/// Response body for `GET /v1/automation/batch`.
#[derive(Debug, Serialize)]
pub struct AutomationBatchResponse {
    pub items: Vec<AutomationItem>,
}
