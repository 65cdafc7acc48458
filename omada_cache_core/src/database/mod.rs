//! Database module for the SQLite-backed cache file
//!
//! One file holds three caches: generic API responses, the identity index and
//! near-static resource type metadata. Connections come from a small pool so
//! request handlers and the sweeper never hold a lock longer than one
//! statement or transaction.

pub mod migrations;
pub mod models;
pub mod repositories;
pub mod schema;

use crate::{
    Result,
    error::{IoError, StorageError},
};
use serde::Serialize;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

// Re-export commonly used types
pub use models::{
    CacheEntry, IdentityEntry, IdentityRecord, ResourceTypeEntry, ResourceTypeRecord,
    SchemaVersion,
};
pub use repositories::{IdentityRepository, ResourceTypeRepository, ResponseRepository};

use models::time_utils;

/// Connection pool settings
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    /// How long a statement waits on a locked file before failing
    pub busy_timeout: Duration,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Rows removed from each store by one maintenance operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub responses: u64,
    pub identities: u64,
    pub resource_types: u64,
}

impl CleanupReport {
    pub fn total(&self) -> u64 {
        self.responses + self.identities + self.resource_types
    }
}

/// Database connection manager with connection pooling
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
}

impl Database {
    /// Open (or create) the cache file with default pool settings
    pub async fn new(db_path: &Path) -> Result<Self> {
        Self::with_options(db_path, &DatabaseOptions::default()).await
    }

    /// Open (or create) the cache file and bring its schema up to date
    ///
    /// Any failure here is fatal for the cache: the caller should abort startup.
    pub async fn with_options(db_path: &Path, options: &DatabaseOptions) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IoError::from_std(e).with_path(parent))?;
        }

        // WAL lets readers proceed while the sweeper deletes
        let connect_options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(options.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(options.max_connections)
            .connect_with(connect_options)
            .await
            .map_err(|e| StorageError::unavailable(db_path, e.to_string()))?;

        let db = Self {
            pool,
            path: db_path.to_path_buf(),
        };

        db.ensure_schema().await?;
        log::debug!("Cache database ready at {}", db.path.display());

        Ok(db)
    }

    /// Create missing tables and indexes; safe to call repeatedly
    pub async fn ensure_schema(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Path of the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn responses(&self) -> ResponseRepository {
        ResponseRepository::new(self.pool.clone())
    }

    pub fn identities(&self) -> IdentityRepository {
        IdentityRepository::new(self.pool.clone())
    }

    pub fn resource_types(&self) -> ResourceTypeRepository {
        ResourceTypeRepository::new(self.pool.clone())
    }

    /// Delete every row whose expiry has passed, across all stores
    pub async fn cleanup_expired(&self) -> Result<CleanupReport> {
        self.cleanup_expired_at(time_utils::now_millis()).await
    }

    /// Delete every row with `expires_at <= now`, in one transaction
    pub async fn cleanup_expired_at(&self, now: i64) -> Result<CleanupReport> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::query("cleanup_expired", e.to_string()))?;

        let mut report = CleanupReport::default();
        for (table, slot) in [
            ("api_cache", &mut report.responses),
            ("identity_cache", &mut report.identities),
            ("resource_type_cache", &mut report.resource_types),
        ] {
            *slot = sqlx::query(&format!("DELETE FROM {table} WHERE expires_at <= ?"))
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::query("cleanup_expired", e.to_string()))?
                .rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::query("cleanup_expired", e.to_string()))?;

        if report.total() > 0 {
            log::info!(
                "Cleanup removed {} expired cache entries ({} responses, {} identities, {} resource types)",
                report.total(),
                report.responses,
                report.identities,
                report.resource_types
            );
        }

        Ok(report)
    }

    /// Delete every row in every store, in one transaction
    pub async fn clear_all(&self) -> Result<CleanupReport> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::query("clear_all", e.to_string()))?;

        let mut report = CleanupReport::default();
        for (table, slot) in [
            ("api_cache", &mut report.responses),
            ("identity_cache", &mut report.identities),
            ("resource_type_cache", &mut report.resource_types),
        ] {
            *slot = sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::query("clear_all", e.to_string()))?
                .rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::query("clear_all", e.to_string()))?;

        log::info!("Entire cache cleared: {} entries deleted", report.total());
        Ok(report)
    }

    /// Size of the database file in bytes (`page_count * page_size`)
    pub async fn size_bytes(&self) -> Result<i64> {
        let size = sqlx::query_scalar::<_, i64>(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::query("size_bytes", e.to_string()))?;

        Ok(size)
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
