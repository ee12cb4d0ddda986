//! Hashing - canonical JSON and SHA-256 for snapshots and audit.
//!
//! Identical values always serialize to identical bytes, so hashes and
//! signatures over them can be recomputed later.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), sort_value(v))).collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Hash of any serializable value's canonical form.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(canonical_json(value)?.as_bytes()))
}

/// Audit hash of a layout submission:
/// `sha256(creative_id:catalog_version:canonical_layout:engine_version)`
pub fn compute_layout_hash(
    creative_id: &str,
    catalog_version: &str,
    layout: &impl Serialize,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let canonical_layout = canonical_json(layout)?;
    let combined = format!("{}:{}:{}:{}", creative_id, catalog_version, canonical_layout, engine_version);
    Ok(sha256_hex(combined.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": 2, "m": {"y": [{"b": 1, "a": 0}], "x": null}});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":2,"m":{"x":null,"y":[{"a":0,"b":1}]},"z":1}"#);
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_layout_hash_depends_on_every_part() {
        let layout = json!({"elements": [{"id": "a"}]});
        let base = compute_layout_hash("c1", "1.0.0", &layout, "1.0.0").unwrap();
        assert_eq!(base, compute_layout_hash("c1", "1.0.0", &layout, "1.0.0").unwrap());
        assert_ne!(base, compute_layout_hash("c2", "1.0.0", &layout, "1.0.0").unwrap());
        assert_ne!(base, compute_layout_hash("c1", "1.1.0", &layout, "1.0.0").unwrap());
        assert_ne!(base, compute_layout_hash("c1", "1.0.0", &json!({"elements": []}), "1.0.0").unwrap());
    }
}
