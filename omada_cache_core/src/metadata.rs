//! Observability metadata attached to cache hits

use crate::database::models::time_utils;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field that carries [`CacheMetadata`] inside an object payload
pub const METADATA_FIELD: &str = "_cache_metadata";

/// Describes where a returned value came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub cached: bool,
    pub cache_hit: bool,
    /// Creation time of the stored row (RFC 3339)
    pub created_at: String,
    pub age_seconds: f64,
}

impl CacheMetadata {
    pub fn for_hit(created_at: i64, now: i64) -> Self {
        Self {
            cached: true,
            cache_hit: true,
            created_at: time_utils::to_rfc3339(created_at),
            age_seconds: time_utils::seconds_between(created_at, now),
        }
    }
}

/// A value served from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    /// The stored payload; object payloads carry `_cache_metadata`
    pub value: Value,
    pub metadata: CacheMetadata,
    /// Hit count after this read
    pub hit_count: i64,
}

impl CacheHit {
    pub fn new(payload: Value, metadata: CacheMetadata, hit_count: i64) -> Self {
        Self {
            value: annotate(payload, &metadata),
            metadata,
            hit_count,
        }
    }

    /// The payload as it was stored, without the metadata field
    pub fn payload(&self) -> Value {
        strip(&self.value)
    }
}

/// Merge metadata into an object payload; other payloads pass through
pub fn annotate(mut payload: Value, metadata: &CacheMetadata) -> Value {
    if let Value::Object(map) = &mut payload
        && let Ok(encoded) = serde_json::to_value(metadata)
    {
        map.insert(METADATA_FIELD.to_string(), encoded);
    }
    payload
}

/// Copy of `payload` without a metadata field left over from a previous hit
pub fn strip(payload: &Value) -> Value {
    match payload {
        Value::Object(map) if map.contains_key(METADATA_FIELD) => {
            let mut copy = map.clone();
            copy.remove(METADATA_FIELD);
            Value::Object(copy)
        }
        other => other.clone(),
    }
}
