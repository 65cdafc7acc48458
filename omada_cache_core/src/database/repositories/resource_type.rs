//! Resource type repository (`resource_type_cache`)

use crate::Result;
use crate::database::models::{ResourceTypeEntry, ResourceTypeRecord, time_utils};
use crate::error::StorageError;
use crate::metadata::CacheHit;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use std::time::Duration;

use super::{decode_hit, encode_payload, finish_hit};

const STORE: &str = "resource_type_cache";

/// Repository for near-static resource type metadata
#[derive(Debug, Clone)]
pub struct ResourceTypeRepository {
    pool: SqlitePool,
}

impl ResourceTypeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a resource type for `ttl`; `None` when `ttl` rounds to zero
    pub async fn cache_resource_type(
        &self,
        record: &ResourceTypeRecord,
        data: &Value,
        ttl: Duration,
    ) -> Result<Option<i64>> {
        let ttl_ms = time_utils::duration_to_millis(ttl);
        if ttl_ms <= 0 {
            log::debug!("Not caching resource type {}: non-positive TTL", record.id);
            return Ok(None);
        }

        let encoded = encode_payload(STORE, data)?;
        let now = time_utils::now_millis();

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO resource_type_cache (
                resource_type_id, resource_type_name, system_id, full_data,
                created_at, expires_at, hit_count, last_accessed
            ) VALUES (?, ?, ?, ?, ?, ?, 0, NULL)
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(record.system_id)
        .bind(&encoded)
        .bind(now)
        .bind(now.saturating_add(ttl_ms))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::query("cache_resource_type", e.to_string()))?;

        log::info!(
            "Resource type CACHED: {} ({})",
            record.id,
            record.name.as_deref().unwrap_or("unnamed")
        );
        Ok(Some(record.id))
    }

    /// Look up a live resource type, counting the read as a hit
    pub async fn get(&self, id: i64) -> Result<Option<CacheHit>> {
        let now = time_utils::now_millis();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::query("get_resource_type", e.to_string()))?;

        let row = sqlx::query(
            r#"
            UPDATE resource_type_cache
            SET hit_count = hit_count + 1, last_accessed = ?
            WHERE resource_type_id = ? AND expires_at > ?
            RETURNING full_data, created_at, hit_count
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StorageError::query("get_resource_type", e.to_string()))?;

        let Some(row) = row else {
            log::debug!("Resource type cache MISS for {id}");
            return Ok(None);
        };

        let stored: String = row.try_get("full_data")?;
        let created_at: i64 = row.try_get("created_at")?;
        let hit_count: i64 = row.try_get("hit_count")?;

        let hit = decode_hit(
            STORE,
            &format!("resource type {id}"),
            &stored,
            created_at,
            hit_count,
            now,
        );
        finish_hit(tx, "get_resource_type", hit.is_some()).await?;
        Ok(hit)
    }

    /// Read a row without touching its hit statistics
    pub async fn find(&self, id: i64) -> Result<Option<ResourceTypeEntry>> {
        let row = sqlx::query(
            r#"
            SELECT resource_type_id, resource_type_name, system_id, full_data,
                   created_at, expires_at, hit_count, last_accessed
            FROM resource_type_cache
            WHERE resource_type_id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::query("find_resource_type", e.to_string()))?;

        row.map(|row| -> Result<ResourceTypeEntry> {
            Ok(ResourceTypeEntry {
                resource_type_id: row.try_get("resource_type_id")?,
                resource_type_name: row.try_get("resource_type_name")?,
                system_id: row.try_get("system_id")?,
                full_data: row.try_get("full_data")?,
                created_at: row.try_get("created_at")?,
                expires_at: row.try_get("expires_at")?,
                hit_count: row.try_get("hit_count")?,
                last_accessed: row.try_get("last_accessed")?,
            })
        })
        .transpose()
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM resource_type_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
