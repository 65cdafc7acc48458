//! Cache key derivation
//!
//! A key is the SHA-256 digest of the endpoint name and the canonical JSON
//! encoding of the request parameters. Object keys are sorted at every level,
//! so two parameter maps holding the same pairs always derive the same key.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Separator between the endpoint and the encoded parameters.
///
/// JSON escapes every control character, so a raw NUL never appears in the
/// parameter encoding.
const KEY_SEPARATOR: char = '\0';

/// Number of hex characters shown in logs
const SHORT_KEY_LEN: usize = 16;

/// Derived cache key (64 lowercase hex characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for an endpoint and its parameters
    pub fn derive(endpoint: &str, params: &Value) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(endpoint.as_bytes());
        hasher.update(KEY_SEPARATOR.to_string().as_bytes());
        hasher.update(canonical_json(params).as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wrap an already derived key read back from storage
    pub fn from_stored(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key prefix for log lines
    pub fn short(&self) -> &str {
        &self.0[..SHORT_KEY_LEN.min(self.0.len())]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Encode a JSON value with lexicographically sorted object keys and no
/// whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (index, (key, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map, json};
    use std::collections::HashSet;

    #[test]
    fn test_key_is_sha256_hex() {
        let key = CacheKey::derive("identities", &json!({"q": "a"}));
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key.short().len(), 16);
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"z": [3, {"y": true, "x": null}], "c": "s"}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":"s","z":[3,{"x":null,"y":true}]},"b":1}"#
        );
    }

    #[test]
    fn test_endpoint_and_params_do_not_bleed_together() {
        // "ab" + {} must differ from "a" + something that starts with "b"
        let first = CacheKey::derive("ab", &json!({}));
        let second = CacheKey::derive("a", &json!("b{}"));
        assert_ne!(first, second);

        let first = CacheKey::derive("roles", &json!({"top": 10}));
        let second = CacheKey::derive("roles:", &json!({"top": 10}));
        assert_ne!(first, second);
    }

    #[test]
    fn test_different_endpoints_same_params() {
        let params = json!({"filter": "EMAIL eq 'a@x.com'"});
        assert_ne!(
            CacheKey::derive("identities", &params),
            CacheKey::derive("resources", &params)
        );
    }

    #[test]
    fn test_control_characters_are_escaped() {
        let encoded = canonical_json(&json!({"k": "a\u{0}b"}));
        assert!(!encoded.contains('\0'));
    }

    proptest! {
        #[test]
        fn prop_key_ignores_insertion_order(
            pairs in proptest::collection::btree_map("[a-zA-Z_]{1,12}", any::<i64>(), 0..16),
            endpoint in "[a-z_]{1,24}",
        ) {
            let mut forward = Map::new();
            for (k, v) in pairs.iter() {
                forward.insert(k.clone(), json!(v));
            }
            let mut backward = Map::new();
            for (k, v) in pairs.iter().rev() {
                backward.insert(k.clone(), json!(v));
            }

            prop_assert_eq!(
                CacheKey::derive(&endpoint, &Value::Object(forward)),
                CacheKey::derive(&endpoint, &Value::Object(backward))
            );
        }

        #[test]
        fn prop_distinct_requests_distinct_keys(
            requests in proptest::collection::hash_set(("[a-z]{1,8}", "[a-z0-9]{0,8}"), 1..512),
        ) {
            let keys: HashSet<CacheKey> = requests
                .iter()
                .map(|(endpoint, q)| CacheKey::derive(endpoint, &json!({"q": q})))
                .collect();
            prop_assert_eq!(keys.len(), requests.len());
        }
    }
}
