//! Generic API response repository (`api_cache`)

use crate::Result;
use crate::database::models::{CacheEntry, time_utils};
use crate::error::StorageError;
use crate::key::{CacheKey, canonical_json};
use crate::metadata::CacheHit;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use std::time::Duration;

use super::{decode_hit, encode_payload, finish_hit};

const STORE: &str = "api_cache";

/// Repository for cached endpoint responses
#[derive(Debug, Clone)]
pub struct ResponseRepository {
    pool: SqlitePool,
}

impl ResponseRepository {
    /// Create a new response repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up a live response, counting the read as a hit
    pub async fn get(&self, endpoint: &str, params: &Value) -> Result<Option<CacheHit>> {
        let key = CacheKey::derive(endpoint, params);
        let now = time_utils::now_millis();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::query("get", e.to_string()))?;

        let row = sqlx::query(
            r#"
            UPDATE api_cache
            SET hit_count = hit_count + 1, last_accessed = ?
            WHERE cache_key = ? AND expires_at > ?
            RETURNING response_data, created_at, hit_count
            "#,
        )
        .bind(now)
        .bind(key.as_str())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StorageError::query("get", e.to_string()))?;

        let Some(row) = row else {
            log::debug!("Cache MISS for {endpoint} (key {}...)", key.short());
            return Ok(None);
        };

        let stored: String = row.try_get("response_data")?;
        let created_at: i64 = row.try_get("created_at")?;
        let hit_count: i64 = row.try_get("hit_count")?;

        let hit = decode_hit(STORE, endpoint, &stored, created_at, hit_count, now);
        finish_hit(tx, "get", hit.is_some()).await?;
        if let Some(hit) = &hit {
            log::debug!(
                "Cache HIT for {endpoint} (key {}..., age {:.1}s)",
                key.short(),
                hit.metadata.age_seconds
            );
        }
        Ok(hit)
    }

    /// Store a response for `ttl`, replacing any row with the same key
    ///
    /// Returns the key written, or `None` when `ttl` rounds to zero
    /// milliseconds (such a row would already be expired).
    pub async fn set(
        &self,
        endpoint: &str,
        params: &Value,
        payload: &Value,
        ttl: Duration,
    ) -> Result<Option<CacheKey>> {
        let ttl_ms = time_utils::duration_to_millis(ttl);
        if ttl_ms <= 0 {
            log::debug!("Not caching {endpoint}: non-positive TTL");
            return Ok(None);
        }

        let encoded = encode_payload(STORE, payload)?;
        let key = CacheKey::derive(endpoint, params);
        let now = time_utils::now_millis();
        let expires_at = now.saturating_add(ttl_ms);

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO api_cache (
                cache_key, endpoint, query_params, response_data,
                created_at, expires_at, hit_count, last_accessed
            ) VALUES (?, ?, ?, ?, ?, ?, 0, NULL)
            "#,
        )
        .bind(key.as_str())
        .bind(endpoint)
        .bind(canonical_json(params))
        .bind(&encoded)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::query("set", e.to_string()))?;

        log::info!(
            "Cache STORED for {endpoint} (TTL {}s, expires {})",
            ttl.as_secs(),
            time_utils::to_rfc3339(expires_at)
        );
        Ok(Some(key))
    }

    /// Read a row without touching its hit statistics
    pub async fn find(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            r#"
            SELECT cache_key, endpoint, query_params, response_data,
                   created_at, expires_at, hit_count, last_accessed
            FROM api_cache
            WHERE cache_key = ?
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::query("find", e.to_string()))?;

        row.map(|row| -> Result<CacheEntry> {
            Ok(CacheEntry {
                key: CacheKey::from_stored(row.try_get("cache_key")?),
                endpoint: row.try_get("endpoint")?,
                params: row
                    .try_get::<Option<String>, _>("query_params")?
                    .unwrap_or_default(),
                payload: row.try_get("response_data")?,
                created_at: row.try_get("created_at")?,
                expires_at: row.try_get("expires_at")?,
                hit_count: row.try_get("hit_count")?,
                last_accessed: row.try_get("last_accessed")?,
            })
        })
        .transpose()
    }

    /// Delete the single row for an endpoint and parameter set
    pub async fn delete_entry(&self, endpoint: &str, params: &Value) -> Result<u64> {
        let key = CacheKey::derive(endpoint, params);
        let result = sqlx::query("DELETE FROM api_cache WHERE cache_key = ?")
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::query("invalidate", e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Delete every row stored under an endpoint
    pub async fn delete_endpoint(&self, endpoint: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM api_cache WHERE endpoint = ?")
            .bind(endpoint)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::query("invalidate", e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Count all rows, expired or not
    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM api_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::metadata::METADATA_FIELD;
    use serde_json::json;
    use tempfile::TempDir;

    async fn create_test_repo() -> (ResponseRepository, Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        (db.responses(), db, temp_dir)
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let (repo, _db, _temp_dir) = create_test_repo().await;
        let params = json!({"filter": "FIRSTNAME eq 'Ada'", "top": 5});
        let payload = json!({"value": [{"UId": "U1"}], "@odata.count": 1});

        let key = repo
            .set("identities", &params, &payload, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(key.is_some());

        let hit = repo.get("identities", &params).await.unwrap().unwrap();
        assert_eq!(hit.payload(), payload);
        assert_eq!(hit.value[METADATA_FIELD]["cache_hit"], true);
        assert_eq!(hit.hit_count, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_declined() {
        let (repo, _db, _temp_dir) = create_test_repo().await;

        let key = repo
            .set("tokens", &json!({}), &json!({"a": 1}), Duration::ZERO)
            .await
            .unwrap();
        assert!(key.is_none());

        let key = repo
            .set("tokens", &json!({}), &json!({"a": 1}), Duration::from_micros(900))
            .await
            .unwrap();
        assert!(key.is_none());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_strips_metadata_from_previous_hit() {
        let (repo, _db, _temp_dir) = create_test_repo().await;
        let params = json!({"q": "a"});
        repo.set("roles", &params, &json!({"n": 1}), Duration::from_secs(60))
            .await
            .unwrap();

        let hit = repo.get("roles", &params).await.unwrap().unwrap();
        let key = repo
            .set("roles", &params, &hit.value, Duration::from_secs(60))
            .await
            .unwrap()
            .unwrap();

        let entry = repo.find(&key).await.unwrap().unwrap();
        assert!(!entry.payload.contains(METADATA_FIELD));
        assert_eq!(entry.hit_count, 0);
        assert!(entry.last_accessed.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_payload_reads_as_miss() {
        let (repo, db, _temp_dir) = create_test_repo().await;
        let params = json!({"q": "broken"});
        let key = repo
            .set("roles", &params, &json!({}), Duration::from_secs(60))
            .await
            .unwrap()
            .unwrap();

        sqlx::query("UPDATE api_cache SET response_data = '{not json' WHERE cache_key = ?")
            .bind(key.as_str())
            .execute(db.pool())
            .await
            .unwrap();

        assert!(repo.get("roles", &params).await.unwrap().is_none());
        assert!(repo.get("roles", &params).await.unwrap().is_none());

        let entry = repo.find(&key).await.unwrap().unwrap();
        assert_eq!(entry.hit_count, 0);
        assert!(entry.last_accessed.is_none());
    }

    #[tokio::test]
    async fn test_find_does_not_count_hits() {
        let (repo, _db, _temp_dir) = create_test_repo().await;
        let key = repo
            .set("systems", &json!({}), &json!({"value": []}), Duration::from_secs(60))
            .await
            .unwrap()
            .unwrap();

        repo.find(&key).await.unwrap();
        repo.find(&key).await.unwrap();
        assert_eq!(repo.find(&key).await.unwrap().unwrap().hit_count, 0);
    }

    #[tokio::test]
    async fn test_stored_params_are_canonical() {
        let (repo, _db, _temp_dir) = create_test_repo().await;
        let key = repo
            .set("roles", &json!({"b": 2, "a": 1}), &json!({}), Duration::from_secs(60))
            .await
            .unwrap()
            .unwrap();

        let entry = repo.find(&key).await.unwrap().unwrap();
        assert_eq!(entry.params, r#"{"a":1,"b":2}"#);
        assert_eq!(entry.endpoint, "roles");
    }
}
