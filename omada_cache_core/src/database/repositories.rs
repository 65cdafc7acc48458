//! Repository implementations for each cache table
//!
//! Every read that counts as a hit is a single `UPDATE ... RETURNING`
//! statement, so the hit bump and the row read can never be torn apart by a
//! concurrent write or sweep. The statement runs in a transaction that only
//! commits once the payload decodes; an unreadable row keeps its statistics.

pub mod identity;
pub mod resource_type;
pub mod response;

// Re-export repository implementations
pub use identity::IdentityRepository;
pub use resource_type::ResourceTypeRepository;
pub use response::ResponseRepository;

use crate::error::{SerializationError, StorageError};
use crate::metadata::{self, CacheHit, CacheMetadata};
use serde_json::Value;
use sqlx::{Sqlite, Transaction};

/// Encode a payload for storage, dropping metadata from an earlier hit
pub(crate) fn encode_payload(store: &str, payload: &Value) -> crate::Result<String> {
    serde_json::to_string(&metadata::strip(payload))
        .map_err(|e| SerializationError::encode(store, &e.to_string()).into())
}

/// Decode a stored payload into a hit; a corrupt row is logged and read as a miss
pub(crate) fn decode_hit(
    store: &str,
    lookup: &str,
    stored: &str,
    created_at: i64,
    hit_count: i64,
    now: i64,
) -> Option<CacheHit> {
    match serde_json::from_str::<Value>(stored) {
        Ok(payload) => Some(CacheHit::new(
            payload,
            CacheMetadata::for_hit(created_at, now),
            hit_count,
        )),
        Err(e) => {
            log::warn!(
                "{} for {lookup}; treating as miss",
                SerializationError::decode(store, &e.to_string())
            );
            None
        }
    }
}

/// Commit the hit bump for a decoded row, or roll it back for a corrupt one
pub(crate) async fn finish_hit(
    tx: Transaction<'_, Sqlite>,
    operation: &str,
    decoded: bool,
) -> crate::Result<()> {
    let outcome = if decoded {
        tx.commit().await
    } else {
        tx.rollback().await
    };
    outcome.map_err(|e| StorageError::query(operation, e.to_string()).into())
}
