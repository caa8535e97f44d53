//! Content fingerprinting for record deduplication.
//!
//! Two payloads are "the same record" iff their fingerprints match under the
//! tenant's current exclusion set. The fingerprint is a SHA-256 over a canonical
//! serialization: excluded top-level keys removed, remaining keys emitted in
//! byte-lexicographic order at every nesting level. Permuting input key order
//! never changes the digest.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Keys removed when no per-tenant field mapping supplies an exclusion set.
const DEFAULT_EXCLUDED: [&str; 2] = ["price", "quantity"];

/// Compute the content fingerprint of a payload.
///
/// `exclude` lists top-level keys to drop before hashing (the tenant's detected
/// price/quantity field names). An empty slice falls back to the literal keys
/// `"price"` and `"quantity"`. Non-object payloads pass through unmodified into
/// serialization; no exclusion applies to them.
pub fn fingerprint(payload: &Value, exclude: &[&str]) -> String {
    let exclude: &[&str] = if exclude.is_empty() {
        &DEFAULT_EXCLUDED
    } else {
        exclude
    };

    let mut canonical = Vec::new();
    match payload {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .keys()
                .filter(|k| !exclude.contains(&k.as_str()))
                .collect();
            keys.sort_unstable();
            write_object(&keys, |k| &map[k.as_str()], &mut canonical);
        }
        other => write_canonical(other, &mut canonical),
    }

    hex::encode(Sha256::digest(&canonical))
}

/// Serialize a value with object keys sorted byte-lexicographically.
///
/// Sorting is explicit rather than relying on serde_json's map ordering, so the
/// digest stays stable regardless of which map backend the crate is built with.
fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            write_object(&keys, |k| &map[k.as_str()], out);
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        // Scalars already have one fixed JSON encoding
        other => out.extend_from_slice(other.to_string().as_bytes()),
    }
}

fn write_object<'a>(
    keys: &[&'a String],
    value_of: impl Fn(&'a String) -> &'a Value,
    out: &mut Vec<u8>,
) {
    out.push(b'{');
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        // Value::String gives the escaped JSON form of the key
        out.extend_from_slice(Value::String((*key).clone()).to_string().as_bytes());
        out.push(b':');
        write_canonical(value_of(key), out);
    }
    out.push(b'}');
}

/// Read the named top-level field as a lossy f64.
///
/// Missing keys, non-numeric values, and non-finite results all yield `None`
/// rather than failing the record. Strings holding numbers are coerced, matching
/// how real feeds quote their prices.
pub fn extract_number(payload: &Value, key: &str) -> Option<f64> {
    let value = payload.as_object()?.get(key)?;
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_fingerprint() {
        let a: Value = serde_json::from_str(r#"{"sku":"S1","category":"vitamins","price":9.5}"#)
            .expect("valid json");
        let b: Value = serde_json::from_str(r#"{"price":9.5,"category":"vitamins","sku":"S1"}"#)
            .expect("valid json");
        assert_eq!(fingerprint(&a, &[]), fingerprint(&b, &[]));
    }

    #[test]
    fn nested_key_order_does_not_change_fingerprint() {
        let a: Value =
            serde_json::from_str(r#"{"sku":"S1","meta":{"x":1,"y":2}}"#).expect("valid json");
        let b: Value =
            serde_json::from_str(r#"{"meta":{"y":2,"x":1},"sku":"S1"}"#).expect("valid json");
        assert_eq!(fingerprint(&a, &[]), fingerprint(&b, &[]));
    }

    #[test]
    fn default_exclusion_ignores_price_and_quantity() {
        let a = json!({"sku": "S1", "price": 10.0, "quantity": 5});
        let b = json!({"sku": "S1", "price": 99.0, "quantity": 1});
        assert_eq!(fingerprint(&a, &[]), fingerprint(&b, &[]));
    }

    #[test]
    fn custom_exclusion_replaces_defaults() {
        let a = json!({"sku": "S1", "unit_price": 10.0, "qty_avail": 5});
        let b = json!({"sku": "S1", "unit_price": 99.0, "qty_avail": 1});
        assert_eq!(
            fingerprint(&a, &["unit_price", "qty_avail"]),
            fingerprint(&b, &["unit_price", "qty_avail"])
        );
        // Under the custom set, literal "price" is no longer excluded
        let c = json!({"sku": "S1", "price": 1.0});
        let d = json!({"sku": "S1", "price": 2.0});
        assert_ne!(
            fingerprint(&c, &["unit_price", "qty_avail"]),
            fingerprint(&d, &["unit_price", "qty_avail"])
        );
    }

    #[test]
    fn differing_content_differs() {
        let a = json!({"sku": "S1"});
        let b = json!({"sku": "S2"});
        assert_ne!(fingerprint(&a, &[]), fingerprint(&b, &[]));
    }

    #[test]
    fn non_object_payload_passes_through() {
        let a = json!(["a", "b"]);
        let b = json!(["a", "b"]);
        assert_eq!(fingerprint(&a, &[]), fingerprint(&b, &[]));
        assert_ne!(fingerprint(&a, &[]), fingerprint(&json!(["b", "a"]), &[]));
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = fingerprint(&json!({"sku": "S1"}), &[]);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn extract_number_handles_numbers_and_numeric_strings() {
        let payload = json!({"price": 19.99, "quantity": "42", "padded": " 7.5 "});
        assert_eq!(extract_number(&payload, "price"), Some(19.99));
        assert_eq!(extract_number(&payload, "quantity"), Some(42.0));
        assert_eq!(extract_number(&payload, "padded"), Some(7.5));
    }

    #[test]
    fn extract_number_tolerates_bad_values() {
        let payload = json!({
            "missing_type": null,
            "text": "out of stock",
            "list": [1, 2],
            "nan": "NaN",
            "inf": "inf"
        });
        assert_eq!(extract_number(&payload, "absent"), None);
        assert_eq!(extract_number(&payload, "missing_type"), None);
        assert_eq!(extract_number(&payload, "text"), None);
        assert_eq!(extract_number(&payload, "list"), None);
        // Non-finite parses are dropped rather than stored
        assert_eq!(extract_number(&payload, "nan"), None);
        assert_eq!(extract_number(&payload, "inf"), None);
        assert_eq!(extract_number(&json!("not an object"), "price"), None);
    }
}
