//! Database migration system
//!
//! This module handles schema migrations, ensuring the cache file is always
//! at the correct version. Running it against an up-to-date file is a no-op.

use crate::{Result, error::StorageError};
use sqlx::SqlitePool;

use super::models::time_utils;
use super::schema::{CURRENT_SCHEMA_VERSION, REQUIRED_TABLES, SCHEMA_V1};

/// Run all necessary migrations, then verify the required tables exist
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_current_version(pool).await?;

    if current_version < 1 {
        apply_migration(pool, 1, SCHEMA_V1).await?;
        log::debug!("Applied cache schema version 1");
    }

    verify_schema(pool).await
}

/// Get the current schema version from the database
async fn get_current_version(pool: &SqlitePool) -> Result<i32> {
    if !table_exists(pool, "schema_version").await? {
        return Ok(0);
    }

    let version = sqlx::query_scalar::<_, Option<i32>>("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await?;

    Ok(version.unwrap_or(0))
}

/// Apply a single migration
async fn apply_migration(pool: &SqlitePool, version: i32, sql: &str) -> Result<()> {
    let mut tx = pool.begin().await.map_err(|e| {
        StorageError::schema(version, format!("Failed to start migration transaction: {e}"))
    })?;

    sqlx::raw_sql(sql)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::schema(version, e.to_string()))?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, ?)")
        .bind(version)
        .bind(time_utils::now_millis())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::schema(version, format!("Failed to record migration: {e}")))?;

    tx.commit()
        .await
        .map_err(|e| StorageError::schema(version, format!("Failed to commit migration: {e}")))?;

    Ok(())
}

/// Fail if a required table is missing
async fn verify_schema(pool: &SqlitePool) -> Result<()> {
    for table in REQUIRED_TABLES {
        if !table_exists(pool, table).await? {
            return Err(StorageError::schema(
                CURRENT_SCHEMA_VERSION,
                format!("required table '{table}' is missing"),
            )
            .into());
        }
    }
    Ok(())
}

/// Check if a table exists
pub(crate) async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
    )
    .bind(table_name)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Check if an index exists
#[cfg(test)]
async fn index_exists(pool: &SqlitePool, index_name: &str) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name=?",
    )
    .bind(index_name)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}
