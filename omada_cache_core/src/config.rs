//! Cache configuration

use crate::database::DatabaseOptions;
use crate::error::{Result, ValidationError};
use crate::ttl_policy::TtlPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// File name used when no database path is configured
pub const DEFAULT_DB_FILE: &str = "omada_cache.db";

/// Settings for opening an [`OmadaCache`](crate::OmadaCache)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache file; defaults to `omada_cache.db` next to the executable
    pub database_path: Option<PathBuf>,
    pub default_ttl_seconds: u64,
    /// Run the expiry sweeper while the cache is open
    pub auto_cleanup: bool,
    /// Sweeper interval; the default TTL when unset
    pub cleanup_interval_seconds: Option<u64>,
    pub stop_grace_seconds: u64,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
    /// Per-operation TTLs layered over the built-in table (seconds)
    pub ttl_overrides: BTreeMap<String, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            default_ttl_seconds: 3600,
            auto_cleanup: true,
            cleanup_interval_seconds: None,
            stop_grace_seconds: 5,
            max_connections: 5,
            busy_timeout_ms: 5000,
            ttl_overrides: BTreeMap::new(),
        }
    }
}

impl CacheConfig {
    /// Configuration for a cache file at `path`, other settings default
    pub fn with_database_path(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_ttl_seconds == 0 {
            return Err(ValidationError::invalid_configuration(
                "default_ttl_seconds must be greater than zero",
            )
            .into());
        }
        if self.max_connections == 0 {
            return Err(ValidationError::invalid_configuration(
                "max_connections must be greater than zero",
            )
            .into());
        }
        if self.cleanup_interval_seconds == Some(0) {
            return Err(ValidationError::invalid_configuration(
                "cleanup_interval_seconds must be greater than zero",
            )
            .into());
        }
        Ok(())
    }

    /// Configured path, or `omada_cache.db` beside the running executable
    ///
    /// Falls back to the platform data directory when the executable
    /// location cannot be determined.
    pub fn resolved_database_path(&self) -> PathBuf {
        if let Some(path) = &self.database_path {
            return path.clone();
        }

        if let Ok(exe) = std::env::current_exe()
            && let Some(dir) = exe.parent()
        {
            return dir.join(DEFAULT_DB_FILE);
        }

        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("omada-cache")
            .join(DEFAULT_DB_FILE)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(
            self.cleanup_interval_seconds
                .unwrap_or(self.default_ttl_seconds),
        )
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_seconds)
    }

    pub fn database_options(&self) -> DatabaseOptions {
        DatabaseOptions {
            max_connections: self.max_connections,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy::with_default(self.default_ttl()).with_overrides(&self.ttl_overrides)
    }
}
