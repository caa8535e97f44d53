//! Per-tenant price/quantity field mapping model.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Cached decision of which payload keys hold quantity and price for a tenant.
///
/// Maps to the `field_mappings` table (at most one row per tenant, enforced by
/// a UNIQUE constraint on `api_client_id`). Created on a tenant's first
/// ingestion batch, via external detection or a null fallback, and read-only
/// afterwards: null fields mean "no mapping was ever detected, use the default
/// names". Re-detection is out of scope.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FieldMapping {
    pub id: Uuid,
    pub api_client_id: Uuid,
    pub quantity_field: Option<String>,
    pub price_field: Option<String>,
    pub detected_at: DateTime<Utc>,
}
