//! Idempotency keyer (C9): `key = H(scope || canonical_json(attributes))`.

use serde_json::Value;
use std::collections::BTreeMap;

/// Canonicalizes a JSON value: sorts object keys, drops nulls, and leaves number
/// formatting to `serde_json`'s own (stable) representation. `serde_json::Map` is
/// `BTreeMap`-backed by default, so plain `to_string` already yields sorted keys; this
/// function additionally strips nulls so two logically-equal attribute sets with
/// different optional fields hash identically.
pub fn canonical_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: BTreeMap<String, Value> = BTreeMap::new();
            for (k, v) in map {
                if v.is_null() {
                    continue;
                }
                sorted.insert(k.clone(), canonical_json(v));
            }
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_json).collect()),
        other => other.clone(),
    }
}

/// Deterministic, collision-resistant idempotency key for `scope` and `attributes`.
/// Callers must use the same attribute set on both the generate and
/// retrieve-if-exists paths (spec §4.9).
pub fn idempotency_key(scope: &str, attributes: &Value) -> String {
    let canonical = canonical_json(attributes);
    let payload = format!("{}||{}", scope, canonical);
    blake3::hash(payload.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_same_attributes_same_key() {
        let a = idempotency_key("credit_note", &json!({ "invoice_id": "inv_1", "reason": "x" }));
        let b = idempotency_key("credit_note", &json!({ "reason": "x", "invoice_id": "inv_1" }));
        assert_eq!(a, b);
    }

    #[test]
    fn test_null_fields_are_omitted() {
        let a = idempotency_key("credit_note", &json!({ "invoice_id": "inv_1", "reason": null }));
        let b = idempotency_key("credit_note", &json!({ "invoice_id": "inv_1" }));
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_scope_different_key() {
        let a = idempotency_key("credit_note", &json!({ "id": "x" }));
        let b = idempotency_key("coupon_application", &json!({ "id": "x" }));
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_is_128_bits_or_more() {
        let key = idempotency_key("scope", &json!({}));
        // blake3 hex output is 64 chars = 256 bits, well above the 128-bit floor.
        assert_eq!(key.len(), 64);
    }
}
