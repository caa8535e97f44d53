//! Ingestion service - the upsert engine and the batch claim protocol.
//!
//! # Upsert
//!
//! A batch of raw JSON records is fingerprinted, deduplicated in-batch
//! (last occurrence wins), and applied as one multi-row
//! `INSERT .. ON CONFLICT DO UPDATE` inside a single transaction. The dedup key
//! is the UNIQUE `(api_client_id, fingerprint)` pair.
//!
//! # Claim
//!
//! Automation clients claim the oldest unexported records with
//! `FOR UPDATE SKIP LOCKED`, so concurrent callers never receive overlapping
//! rows. Selection and the export-flag update commit in the same transaction:
//! once the response is observable the rows are flagged, and a crash before
//! commit leaves them unclaimed and visible again.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::fingerprint::{extract_number, fingerprint};
use crate::models::item::StoreItem;

/// One record ready for the upsert statement.
#[derive(Debug)]
struct PreparedItem {
    fingerprint: String,
    data: Value,
    price: Option<f64>,
    quantity: Option<f64>,
}

/// Fingerprint and deduplicate a raw batch.
///
/// Records that are not objects, or are empty objects, are skipped entirely.
/// Returns the deduplicated rows plus the count of valid records seen: within
/// one batch, a later record with the same fingerprint replaces the earlier
/// one's payload (last wins) but both count toward `processed`.
fn prepare_batch(
    items: &[Value],
    quantity_field: Option<&str>,
    price_field: Option<&str>,
) -> (Vec<PreparedItem>, u64) {
    // Exclusion set for fingerprinting; empty falls back to the default names
    let exclude: Vec<&str> = [price_field, quantity_field]
        .into_iter()
        .flatten()
        .collect();

    let mut rows: Vec<PreparedItem> = Vec::new();
    let mut by_fingerprint: HashMap<String, usize> = HashMap::new();
    let mut valid: u64 = 0;

    for item in items {
        let is_valid = item.as_object().is_some_and(|map| !map.is_empty());
        if !is_valid {
            continue;
        }
        valid += 1;

        let fp = fingerprint(item, &exclude);
        let prepared = PreparedItem {
            fingerprint: fp.clone(),
            data: item.clone(),
            price: extract_number(item, price_field.unwrap_or("price")),
            quantity: extract_number(item, quantity_field.unwrap_or("quantity")),
        };

        match by_fingerprint.get(&fp) {
            Some(&index) => rows[index] = prepared,
            None => {
                by_fingerprint.insert(fp, rows.len());
                rows.push(prepared);
            }
        }
    }

    (rows, valid)
}

/// Upsert a batch of records for one tenant.
///
/// Returns the number of valid records submitted, not the number of rows
/// touched. The whole batch commits atomically.
///
/// Re-upserting an existing fingerprint overwrites payload/price/quantity,
/// bumps `updated_at`, and clears the export flags - a previously claimed
/// record becomes claimable again. That un-claim behavior is intentional in the
/// current product: re-ingestion is treated as a refresh requiring re-export.
pub async fn bulk_upsert(
    pool: &DbPool,
    client_id: Uuid,
    items: &[Value],
    quantity_field: Option<&str>,
    price_field: Option<&str>,
) -> Result<u64, AppError> {
    let (rows, processed) = prepare_batch(items, quantity_field, price_field);
    if rows.is_empty() {
        return Ok(processed);
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    // One statement for the whole batch. In-batch duplicates were already
    // collapsed: Postgres rejects updating the same row twice within a single
    // INSERT .. ON CONFLICT.
    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO store_items \
         (id, api_client_id, fingerprint, data, price, quantity, is_exported, exported_at, created_at, updated_at) ",
    );
    builder.push_values(rows.iter(), |mut b, row| {
        b.push_bind(Uuid::new_v4())
            .push_bind(client_id)
            .push_bind(&row.fingerprint)
            .push_bind(&row.data)
            .push_bind(row.price)
            .push_bind(row.quantity)
            .push_bind(false)
            .push_bind(Option::<DateTime<Utc>>::None)
            .push_bind(now)
            .push_bind(now);
    });
    builder.push(
        " ON CONFLICT (api_client_id, fingerprint) DO UPDATE SET \
         data = EXCLUDED.data, \
         price = EXCLUDED.price, \
         quantity = EXCLUDED.quantity, \
         updated_at = EXCLUDED.updated_at, \
         is_exported = FALSE, \
         exported_at = NULL",
    );

    builder.build().execute(&mut *tx).await?;
    tx.commit().await?;

    Ok(processed)
}

/// Claim up to `limit` unexported records for one tenant, oldest first.
///
/// # Process
///
/// 1. Start database transaction
/// 2. `SELECT .. FOR UPDATE SKIP LOCKED`: rows locked by a concurrent claim
///    are skipped, so each record is delivered to at most one caller
/// 3. Flag every selected row exported with a single `UPDATE`
/// 4. Commit, then return the rows with their flags set
///
/// An empty result is a normal response, not an error.
pub async fn claim_batch(
    pool: &DbPool,
    client_id: Uuid,
    limit: i64,
) -> Result<Vec<StoreItem>, AppError> {
    let mut tx = pool.begin().await?;

    let mut items = sqlx::query_as::<_, StoreItem>(
        "SELECT id, api_client_id, fingerprint, data, price, quantity, \
                is_exported, exported_at, created_at, updated_at
         FROM store_items
         WHERE api_client_id = $1 AND is_exported = FALSE
         ORDER BY created_at
         LIMIT $2
         FOR UPDATE SKIP LOCKED",
    )
    .bind(client_id)
    .bind(limit)
    .fetch_all(&mut *tx)
    .await?;

    if items.is_empty() {
        tx.rollback().await?;
        return Ok(items);
    }

    let ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
    let exported_at = Utc::now();

    sqlx::query("UPDATE store_items SET is_exported = TRUE, exported_at = $1 WHERE id = ANY($2)")
        .bind(exported_at)
        .bind(&ids)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    // Reflect the committed flags in the returned rows
    for item in &mut items {
        item.is_exported = true;
        item.exported_at = Some(exported_at);
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn skips_invalid_records_without_counting_them() {
        let items = vec![
            json!({"sku": "S1", "price": 1.0}),
            json!({}),
            json!(null),
            json!("just a string"),
            json!([1, 2, 3]),
            json!({"sku": "S2", "price": 2.0}),
        ];
        let (rows, processed) = prepare_batch(&items, None, None);
        assert_eq!(processed, 2);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn in_batch_duplicates_collapse_but_still_count() {
        let items = vec![
            json!({"sku": "S1", "price": 10.0, "quantity": 5}),
            json!({"sku": "S1", "price": 12.0, "quantity": 3}),
        ];
        let (rows, processed) = prepare_batch(&items, None, None);
        // Same SKU, price/quantity excluded from the fingerprint: one row
        assert_eq!(processed, 2);
        assert_eq!(rows.len(), 1);
        // Last occurrence wins for the stored values
        assert_eq!(rows[0].price, Some(12.0));
        assert_eq!(rows[0].quantity, Some(3.0));
    }

    #[test]
    fn duplicate_replacement_keeps_original_position() {
        let items = vec![
            json!({"sku": "S1", "price": 1.0}),
            json!({"sku": "S2", "price": 2.0}),
            json!({"sku": "S1", "price": 9.0}),
        ];
        let (rows, processed) = prepare_batch(&items, None, None);
        assert_eq!(processed, 3);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].data["sku"], "S1");
        assert_eq!(rows[0].price, Some(9.0));
        assert_eq!(rows[1].data["sku"], "S2");
    }

    #[test]
    fn mapped_field_names_drive_extraction_and_fingerprint() {
        let items = vec![
            json!({"sku": "P1", "unit_price": 49.99, "qty_avail": 15}),
            json!({"sku": "P1", "unit_price": 39.99, "qty_avail": 8}),
        ];
        let (rows, processed) = prepare_batch(&items, Some("qty_avail"), Some("unit_price"));
        // Mapped fields are excluded from the fingerprint, so these collapse
        assert_eq!(processed, 2);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price, Some(39.99));
        assert_eq!(rows[0].quantity, Some(8.0));
    }

    #[test]
    fn unmapped_tenant_uses_default_field_names() {
        let items = vec![json!({"sku": "S1", "price": 5.5, "quantity": 2})];
        let (rows, _) = prepare_batch(&items, None, None);
        assert_eq!(rows[0].price, Some(5.5));
        assert_eq!(rows[0].quantity, Some(2.0));
    }

    #[test]
    fn missing_mapped_fields_store_null() {
        let items = vec![json!({"sku": "S1", "note": "no numbers here"})];
        let (rows, processed) = prepare_batch(&items, Some("qty_avail"), Some("unit_price"));
        assert_eq!(processed, 1);
        assert_eq!(rows[0].price, None);
        assert_eq!(rows[0].quantity, None);
    }
}
