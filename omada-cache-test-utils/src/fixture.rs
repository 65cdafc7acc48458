//! Temp-dir backed cache fixture

use omada_cache_core::{CacheConfig, OmadaCache, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An [`OmadaCache`] backed by a database file in a temporary directory
///
/// The sweeper is not started, so expiry is only observed lazily unless a
/// test starts it. The directory is removed when the fixture is dropped.
pub struct TestCache {
    pub cache: OmadaCache,
    temp_dir: TempDir,
}

impl TestCache {
    pub async fn new() -> Result<Self> {
        Self::with_config(CacheConfig::default()).await
    }

    /// Open with `config`, overriding its database path and disabling the sweeper
    pub async fn with_config(config: CacheConfig) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let config = CacheConfig {
            database_path: Some(temp_dir.path().join("omada_cache.db")),
            auto_cleanup: false,
            ..config
        };

        Ok(Self {
            cache: OmadaCache::open(config).await?,
            temp_dir,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.temp_dir.path().join("omada_cache.db")
    }

    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Close the cache, keeping the directory alive for reopening
    pub async fn close(self) -> TempDir {
        self.cache.close().await;
        self.temp_dir
    }
}

impl std::ops::Deref for TestCache {
    type Target = OmadaCache;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}
