//! Database model definitions
//!
//! This module contains all data structures that map to cache tables, plus
//! the typed views of the Omada records that feed the secondary indexes.

use crate::error::{Result, ValidationError};
use crate::key::CacheKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Row of the generic response cache (`api_cache`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub endpoint: String,
    pub params: String,
    pub payload: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub hit_count: i64,
    pub last_accessed: Option<i64>,
}

impl CacheEntry {
    /// Whether the entry is logically absent at `now` (milliseconds)
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Row of the identity index (`identity_cache`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityEntry {
    pub uid: String,
    pub email: Option<String>,
    pub identity_id: Option<String>,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_data: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub hit_count: i64,
    pub last_accessed: Option<i64>,
}

impl IdentityEntry {
    /// Whether the entry is logically absent at `now` (milliseconds)
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Row of the long-lived resource type table (`resource_type_cache`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTypeEntry {
    pub resource_type_id: i64,
    pub resource_type_name: Option<String>,
    pub system_id: Option<i64>,
    pub full_data: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub hit_count: i64,
    pub last_accessed: Option<i64>,
}

/// Lookup fields extracted from an Omada identity record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub uid: String,
    pub email: Option<String>,
    pub identity_id: Option<String>,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl IdentityRecord {
    pub const UID_FIELD: &'static str = "UId";
    pub const EMAIL_FIELD: &'static str = "EMAIL";

    /// Extract the index fields from a raw identity record
    ///
    /// `UId` is required. An empty `EMAIL` is stored as null so that it
    /// never collides on the unique email index.
    pub fn from_value(identity: &Value) -> Result<Self> {
        let uid = text_field(identity, Self::UID_FIELD)
            .ok_or_else(|| ValidationError::missing_field(Self::UID_FIELD))?;

        Ok(Self {
            uid,
            email: text_field(identity, Self::EMAIL_FIELD),
            identity_id: text_field(identity, "IDENTITYID"),
            display_name: text_field(identity, "DISPLAYNAME"),
            first_name: text_field(identity, "FIRSTNAME"),
            last_name: text_field(identity, "LASTNAME"),
        })
    }
}

/// Lookup fields of a resource type record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTypeRecord {
    pub id: i64,
    pub name: Option<String>,
    pub system_id: Option<i64>,
}

impl ResourceTypeRecord {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            name: None,
            system_id: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_system_id(mut self, system_id: i64) -> Self {
        self.system_id = Some(system_id);
        self
    }
}

/// Schema version record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub version: i32,
    pub applied_at: i64,
}

/// Read a field as text; Omada returns some identifiers as numbers.
fn text_field(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Helper functions for time conversion
pub mod time_utils {
    use chrono::{DateTime, SecondsFormat, Utc};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    /// Convert SystemTime to milliseconds since Unix epoch
    pub fn system_time_to_millis(time: SystemTime) -> i64 {
        time.duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }

    /// Get current time as milliseconds since Unix epoch
    pub fn now_millis() -> i64 {
        system_time_to_millis(SystemTime::now())
    }

    /// TTL in whole milliseconds, saturating at `i64::MAX`
    pub fn duration_to_millis(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }

    /// Seconds elapsed from `from` to `to` (negative when `to` is earlier)
    pub fn seconds_between(from: i64, to: i64) -> f64 {
        (to - from) as f64 / 1000.0
    }

    /// Render a millisecond timestamp as RFC 3339 (UTC)
    pub fn to_rfc3339(millis: i64) -> String {
        DateTime::<Utc>::from_timestamp_millis(millis)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| millis.to_string())
    }
}
