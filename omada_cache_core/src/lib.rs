//! Omada Cache Core Library
//!
//! Persistent TTL cache for Omada identity-governance API responses: a
//! generic response store keyed by a canonical request fingerprint, an
//! identity index keyed by uid and email, a resource type store, a
//! background expiry sweeper and read-only efficiency reports.

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod key;
pub mod metadata;
pub mod stats;
pub mod sweeper;
pub mod ttl_policy;

// Re-export main types
pub use cache::{InvalidationScope, OmadaCache};
pub use config::CacheConfig;
pub use database::{CleanupReport, Database, DatabaseOptions, ResourceTypeRecord};
pub use error::{Error, Result};
pub use key::CacheKey;
pub use metadata::{CacheHit, CacheMetadata, METADATA_FIELD};
pub use stats::{CacheStats, ContentsReport, EfficiencyReport, Recommendation, RecommendationLevel};
pub use sweeper::{ExpirySweeper, Sweepable};
pub use ttl_policy::TtlPolicy;
