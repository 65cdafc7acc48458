//! The cache facade used by API handlers
//!
//! [`OmadaCache`] owns the database pool and the expiry sweeper. It is opened
//! once at startup and closed explicitly at shutdown.

use crate::config::CacheConfig;
use crate::database::{CleanupReport, Database, ResourceTypeRecord};
use crate::error::{Result, ValidationError};
use crate::key::CacheKey;
use crate::metadata::CacheHit;
use crate::stats::{CacheStats, ContentsReport, EfficiencyReport, StatsEngine};
use crate::sweeper::{ExpirySweeper, Sweepable};
use crate::ttl_policy::TtlPolicy;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// What an invalidation removes
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidationScope {
    /// The single row for one request
    Entry { endpoint: String, params: Value },
    /// Every row stored under an endpoint
    Endpoint(String),
    /// Every row in every store
    All,
}

impl InvalidationScope {
    /// Build a scope from optional caller arguments
    ///
    /// No endpoint and no params means a full flush. Params without an
    /// endpoint are rejected rather than read as a flush.
    pub fn from_parts(endpoint: Option<&str>, params: Option<&Value>) -> Result<Self> {
        match (endpoint, params) {
            (Some(endpoint), Some(params)) => Ok(Self::Entry {
                endpoint: endpoint.to_string(),
                params: params.clone(),
            }),
            (Some(endpoint), None) => Ok(Self::Endpoint(endpoint.to_string())),
            (None, None) => Ok(Self::All),
            (None, Some(_)) => Err(ValidationError::invalid_parameter(
                "params",
                "an endpoint is required when params are given",
            )
            .into()),
        }
    }
}

/// Persistent TTL cache for Omada API responses
pub struct OmadaCache {
    db: Database,
    config: CacheConfig,
    policy: TtlPolicy,
    stats: StatsEngine,
    sweeper: ExpirySweeper,
}

impl OmadaCache {
    /// Open the cache file, initialise the schema and start the sweeper
    /// when `auto_cleanup` is set
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let path = config.resolved_database_path();
        let db = Database::with_options(&path, &config.database_options()).await?;

        let target: Arc<dyn Sweepable> = Arc::new(db.clone());
        let sweeper = ExpirySweeper::new(target, config.cleanup_interval(), config.stop_grace());
        let stats = StatsEngine::new(db.clone(), config.default_ttl());
        let policy = config.ttl_policy();

        let cache = Self {
            db,
            config,
            policy,
            stats,
            sweeper,
        };

        log::info!(
            "Omada cache initialized at {} (default TTL {}s)",
            path.display(),
            cache.config.default_ttl_seconds
        );

        if cache.config.auto_cleanup {
            cache.sweeper.start().await;
        }

        Ok(cache)
    }

    /// Look up a cached response
    ///
    /// Storage failures are logged and reported as a miss so that callers
    /// fall through to the live API.
    pub async fn get(&self, endpoint: &str, params: &Value) -> Option<CacheHit> {
        match self.db.responses().get(endpoint, params).await {
            Ok(hit) => hit,
            Err(e) => {
                log::warn!("Cache read failed for {endpoint}: {e}");
                None
            }
        }
    }

    /// Store a response; `ttl` defaults to the configured default TTL
    pub async fn set(
        &self,
        endpoint: &str,
        params: &Value,
        payload: &Value,
        ttl: Option<Duration>,
    ) -> Result<Option<CacheKey>> {
        let ttl = ttl.unwrap_or_else(|| self.config.default_ttl());
        self.db.responses().set(endpoint, params, payload, ttl).await
    }

    /// Store an identity record in the identity index
    ///
    /// Returns the uid written, or `None` when the TTL was declined.
    pub async fn cache_identity(
        &self,
        identity: &Value,
        ttl: Option<Duration>,
    ) -> Result<Option<String>> {
        let ttl = ttl.unwrap_or_else(|| self.config.default_ttl());
        self.db.identities().cache_identity(identity, ttl).await
    }

    pub async fn get_identity_by_email(&self, email: &str) -> Option<CacheHit> {
        match self.db.identities().get_by_email(email).await {
            Ok(hit) => hit,
            Err(e) => {
                log::warn!("Identity cache read failed for email {email}: {e}");
                None
            }
        }
    }

    pub async fn get_identity_by_uid(&self, uid: &str) -> Option<CacheHit> {
        match self.db.identities().get_by_uid(uid).await {
            Ok(hit) => hit,
            Err(e) => {
                log::warn!("Identity cache read failed for uid {uid}: {e}");
                None
            }
        }
    }

    /// Store resource type metadata; `ttl` defaults to the policy TTL for
    /// `resource_types`
    pub async fn cache_resource_type(
        &self,
        record: &ResourceTypeRecord,
        data: &Value,
        ttl: Option<Duration>,
    ) -> Result<Option<i64>> {
        let ttl = ttl.unwrap_or_else(|| self.policy.ttl_for("resource_types", false));
        self.db
            .resource_types()
            .cache_resource_type(record, data, ttl)
            .await
    }

    pub async fn get_resource_type(&self, id: i64) -> Option<CacheHit> {
        match self.db.resource_types().get(id).await {
            Ok(hit) => hit,
            Err(e) => {
                log::warn!("Resource type cache read failed for {id}: {e}");
                None
            }
        }
    }

    /// Delete the rows in `scope`, returning how many were removed
    pub async fn invalidate(&self, scope: InvalidationScope) -> Result<u64> {
        let removed = match &scope {
            InvalidationScope::Entry { endpoint, params } => {
                self.db.responses().delete_entry(endpoint, params).await?
            }
            InvalidationScope::Endpoint(endpoint) => {
                self.db.responses().delete_endpoint(endpoint).await?
            }
            InvalidationScope::All => self.db.clear_all().await?.total(),
        };

        match scope {
            InvalidationScope::Entry { endpoint, .. } => {
                log::info!("Invalidated {removed} cache entry for {endpoint}")
            }
            InvalidationScope::Endpoint(endpoint) => {
                log::info!("Invalidated {removed} cache entries for endpoint {endpoint}")
            }
            InvalidationScope::All => {}
        }

        Ok(removed)
    }

    pub async fn cleanup_expired(&self) -> Result<CleanupReport> {
        self.db.cleanup_expired().await
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        self.stats.stats().await
    }

    pub async fn view_contents(&self, limit: u32, include_expired: bool) -> Result<ContentsReport> {
        self.stats.view_contents(limit, include_expired).await
    }

    pub async fn efficiency(&self) -> Result<EfficiencyReport> {
        self.stats.efficiency().await
    }

    /// Start the expiry sweeper; `false` if it was already running
    pub async fn start_sweeper(&self) -> bool {
        self.sweeper.start().await
    }

    /// Stop the expiry sweeper; `false` if it was not running
    pub async fn stop_sweeper(&self) -> bool {
        self.sweeper.stop().await
    }

    pub async fn sweeper_running(&self) -> bool {
        self.sweeper.is_running().await
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweeper.interval()
    }

    pub fn ttl_policy(&self) -> &TtlPolicy {
        &self.policy
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Stop the sweeper and close every pooled connection
    pub async fn close(self) {
        self.sweeper.stop().await;
        self.db.close().await;
        log::info!("Omada cache closed");
    }
}
