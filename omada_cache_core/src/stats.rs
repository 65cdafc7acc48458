//! Read-only statistics, contents and efficiency reports
//!
//! Nothing here bumps a hit count. Misses are not recorded anywhere, so the
//! hit rate treats every never-hit entry as one miss:
//! `hits / (hits + never-hit entries)`. That is an approximation, and it is
//! reported as such.

use crate::Result;
use crate::database::Database;
use crate::database::models::time_utils;
use crate::error::StorageError;
use serde::Serialize;
use sqlx::Row;
use std::time::Duration;

/// Number of endpoints listed in top/least accessed tables
const ENDPOINT_LIMIT: i64 = 5;

/// Characters of the stored params kept in a contents row
const PARAMS_SUMMARY_LEN: usize = 100;

/// Row counts and hit totals of one store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreMetrics {
    pub total_entries: i64,
    pub valid_entries: i64,
    pub expired_entries: i64,
    pub total_hits: i64,
    /// Entries that were never read, expired or not
    pub unused_entries: i64,
    /// Live entries read at least once
    pub utilized_entries: i64,
    pub max_hits: i64,
    pub average_hits: f64,
}

impl StoreMetrics {
    /// Approximate hit rate in percent
    pub fn hit_rate(&self) -> f64 {
        percent(self.total_hits, self.total_hits + self.unused_entries)
    }

    /// Share of live entries read at least once, in percent
    pub fn utilization(&self) -> f64 {
        percent(self.utilized_entries, self.valid_entries)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointHits {
    pub endpoint: String,
    pub hits: i64,
}

/// Output of [`StatsEngine::stats`]
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub responses: StoreMetrics,
    pub identities: StoreMetrics,
    pub resource_types: StoreMetrics,
    /// Endpoints ranked by cumulative hits across all their rows
    pub top_endpoints: Vec<EndpointHits>,
    pub database_path: String,
    pub default_ttl_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Valid,
    Expired,
}

impl EntryStatus {
    fn at(expires_at: i64, now: i64) -> Self {
        if expires_at > now {
            Self::Valid
        } else {
            Self::Expired
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseRow {
    pub endpoint: String,
    pub params_summary: String,
    pub status: EntryStatus,
    pub created_at: String,
    pub expires_at: String,
    pub age_seconds: f64,
    /// Negative once the row has expired
    pub ttl_remaining_seconds: f64,
    pub hit_count: i64,
    pub last_accessed: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentityRow {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub identity_id: Option<String>,
    pub status: EntryStatus,
    pub created_at: String,
    pub expires_at: String,
    pub age_seconds: f64,
    pub ttl_remaining_seconds: f64,
    pub hit_count: i64,
    pub last_accessed: Option<String>,
}

/// Output of [`StatsEngine::view_contents`]
#[derive(Debug, Clone, Serialize)]
pub struct ContentsReport {
    pub responses: Vec<ResponseRow>,
    pub identities: Vec<IdentityRow>,
    pub limit: u32,
    pub include_expired: bool,
    pub generated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationLevel {
    Success,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub level: RecommendationLevel,
    pub message: String,
}

impl Recommendation {
    fn new(level: RecommendationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Output of [`StatsEngine::efficiency`]
#[derive(Debug, Clone, Serialize)]
pub struct EfficiencyReport {
    pub responses: StoreMetrics,
    pub identities: StoreMetrics,
    pub response_hit_rate_percent: f64,
    pub identity_hit_rate_percent: f64,
    pub combined_hit_rate_percent: f64,
    pub utilization_percent: f64,
    pub most_accessed: Vec<EndpointHits>,
    /// Live endpoints with at least one hit, fewest hits first
    pub least_accessed: Vec<EndpointHits>,
    pub database_size_bytes: i64,
    pub database_path: String,
    pub recommendations: Vec<Recommendation>,
    pub generated_at: String,
}

/// Builds reports from the cache tables
#[derive(Debug, Clone)]
pub struct StatsEngine {
    db: Database,
    default_ttl: Duration,
}

impl StatsEngine {
    pub fn new(db: Database, default_ttl: Duration) -> Self {
        Self { db, default_ttl }
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let now = time_utils::now_millis();

        let top_endpoints = sqlx::query(
            r#"
            SELECT endpoint, COALESCE(SUM(hit_count), 0) AS hits
            FROM api_cache
            GROUP BY endpoint
            ORDER BY hits DESC, endpoint ASC
            LIMIT ?
            "#,
        )
        .bind(ENDPOINT_LIMIT)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| StorageError::query("stats", e.to_string()))?
        .iter()
        .map(endpoint_hits)
        .collect::<Result<Vec<_>>>()?;

        Ok(CacheStats {
            responses: self.store_metrics("api_cache", now).await?,
            identities: self.store_metrics("identity_cache", now).await?,
            resource_types: self.store_metrics("resource_type_cache", now).await?,
            top_endpoints,
            database_path: self.db.path().display().to_string(),
            default_ttl_seconds: self.default_ttl.as_secs(),
        })
    }

    /// Newest rows first, at most `limit` from each store
    pub async fn view_contents(&self, limit: u32, include_expired: bool) -> Result<ContentsReport> {
        let now = time_utils::now_millis();

        let response_rows = sqlx::query(
            r#"
            SELECT endpoint, query_params, created_at, expires_at, hit_count, last_accessed
            FROM api_cache
            WHERE ? OR expires_at > ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(include_expired)
        .bind(now)
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| StorageError::query("view_contents", e.to_string()))?;

        let mut responses = Vec::with_capacity(response_rows.len());
        for row in &response_rows {
            let created_at: i64 = row.try_get("created_at")?;
            let expires_at: i64 = row.try_get("expires_at")?;
            let params: Option<String> = row.try_get("query_params")?;

            responses.push(ResponseRow {
                endpoint: row.try_get("endpoint")?,
                params_summary: summarize_params(params.as_deref().unwrap_or_default()),
                status: EntryStatus::at(expires_at, now),
                created_at: time_utils::to_rfc3339(created_at),
                expires_at: time_utils::to_rfc3339(expires_at),
                age_seconds: round_to(time_utils::seconds_between(created_at, now), 1),
                ttl_remaining_seconds: round_to(time_utils::seconds_between(now, expires_at), 1),
                hit_count: row.try_get("hit_count")?,
                last_accessed: row
                    .try_get::<Option<i64>, _>("last_accessed")?
                    .map(time_utils::to_rfc3339),
            });
        }

        let identity_rows = sqlx::query(
            r#"
            SELECT uid, email, display_name, identity_id,
                   created_at, expires_at, hit_count, last_accessed
            FROM identity_cache
            WHERE ? OR expires_at > ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(include_expired)
        .bind(now)
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| StorageError::query("view_contents", e.to_string()))?;

        let mut identities = Vec::with_capacity(identity_rows.len());
        for row in &identity_rows {
            let created_at: i64 = row.try_get("created_at")?;
            let expires_at: i64 = row.try_get("expires_at")?;

            identities.push(IdentityRow {
                uid: row.try_get("uid")?,
                email: row.try_get("email")?,
                display_name: row.try_get("display_name")?,
                identity_id: row.try_get("identity_id")?,
                status: EntryStatus::at(expires_at, now),
                created_at: time_utils::to_rfc3339(created_at),
                expires_at: time_utils::to_rfc3339(expires_at),
                age_seconds: round_to(time_utils::seconds_between(created_at, now), 1),
                ttl_remaining_seconds: round_to(time_utils::seconds_between(now, expires_at), 1),
                hit_count: row.try_get("hit_count")?,
                last_accessed: row
                    .try_get::<Option<i64>, _>("last_accessed")?
                    .map(time_utils::to_rfc3339),
            });
        }

        log::info!(
            "Cache contents viewed: {} responses, {} identities",
            responses.len(),
            identities.len()
        );

        Ok(ContentsReport {
            responses,
            identities,
            limit,
            include_expired,
            generated_at: time_utils::to_rfc3339(now),
        })
    }

    pub async fn efficiency(&self) -> Result<EfficiencyReport> {
        let now = time_utils::now_millis();
        let responses = self.store_metrics("api_cache", now).await?;
        let identities = self.store_metrics("identity_cache", now).await?;

        let most_accessed = self
            .live_endpoints(
                "SELECT endpoint, hit_count AS hits FROM api_cache \
                 WHERE expires_at > ? ORDER BY hit_count DESC, endpoint ASC LIMIT ?",
                now,
            )
            .await?;
        let least_accessed = self
            .live_endpoints(
                "SELECT endpoint, hit_count AS hits FROM api_cache \
                 WHERE expires_at > ? AND hit_count > 0 ORDER BY hit_count ASC, endpoint ASC LIMIT ?",
                now,
            )
            .await?;

        let response_hit_rate = responses.hit_rate();
        let identity_hit_rate = identities.hit_rate();
        let utilization = responses.utilization();
        let combined_requests = (responses.total_hits + responses.unused_entries)
            + (identities.total_hits + identities.unused_entries);
        let combined_hit_rate = percent(
            responses.total_hits + identities.total_hits,
            combined_requests.max(1),
        );

        let recommendations = recommend(
            response_hit_rate,
            utilization,
            responses.unused_entries,
            responses.total_entries,
        );

        log::info!(
            "Cache efficiency calculated: response hit rate {response_hit_rate:.1}%, identity hit rate {identity_hit_rate:.1}%"
        );

        Ok(EfficiencyReport {
            response_hit_rate_percent: round_to(response_hit_rate, 2),
            identity_hit_rate_percent: round_to(identity_hit_rate, 2),
            combined_hit_rate_percent: round_to(combined_hit_rate, 2),
            utilization_percent: round_to(utilization, 2),
            responses,
            identities,
            most_accessed,
            least_accessed,
            database_size_bytes: self.db.size_bytes().await?,
            database_path: self.db.path().display().to_string(),
            recommendations,
            generated_at: time_utils::to_rfc3339(now),
        })
    }

    async fn store_metrics(&self, table: &'static str, now: i64) -> Result<StoreMetrics> {
        let sql = format!(
            "SELECT COUNT(*) AS total_entries, \
                    COALESCE(SUM(CASE WHEN expires_at > ? THEN 1 ELSE 0 END), 0) AS valid_entries, \
                    COALESCE(SUM(hit_count), 0) AS total_hits, \
                    COALESCE(SUM(CASE WHEN hit_count = 0 THEN 1 ELSE 0 END), 0) AS unused_entries, \
                    COALESCE(SUM(CASE WHEN hit_count > 0 AND expires_at > ? THEN 1 ELSE 0 END), 0) AS utilized_entries, \
                    COALESCE(MAX(hit_count), 0) AS max_hits, \
                    COALESCE(AVG(hit_count), 0.0) AS average_hits \
             FROM {table}"
        );

        let row = sqlx::query(&sql)
            .bind(now)
            .bind(now)
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| StorageError::query("stats", e.to_string()))?;

        let total_entries: i64 = row.try_get("total_entries")?;
        let valid_entries: i64 = row.try_get("valid_entries")?;
        let average_hits: f64 = row.try_get("average_hits")?;

        Ok(StoreMetrics {
            total_entries,
            valid_entries,
            expired_entries: total_entries - valid_entries,
            total_hits: row.try_get("total_hits")?,
            unused_entries: row.try_get("unused_entries")?,
            utilized_entries: row.try_get("utilized_entries")?,
            max_hits: row.try_get("max_hits")?,
            average_hits: round_to(average_hits, 2),
        })
    }

    async fn live_endpoints(&self, sql: &str, now: i64) -> Result<Vec<EndpointHits>> {
        sqlx::query(sql)
            .bind(now)
            .bind(ENDPOINT_LIMIT)
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| StorageError::query("efficiency", e.to_string()))?
            .iter()
            .map(endpoint_hits)
            .collect()
    }
}

fn endpoint_hits(row: &sqlx::sqlite::SqliteRow) -> Result<EndpointHits> {
    Ok(EndpointHits {
        endpoint: row.try_get("endpoint")?,
        hits: row.try_get("hits")?,
    })
}

/// Advisory notes over the response store metrics
pub fn recommend(hit_rate: f64, utilization: f64, unused: i64, total: i64) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if hit_rate < 30.0 {
        recommendations.push(Recommendation::new(
            RecommendationLevel::Warning,
            format!(
                "Low cache hit rate ({hit_rate:.1}%). Consider increasing TTL or reviewing cache strategy."
            ),
        ));
    } else if hit_rate > 80.0 {
        recommendations.push(Recommendation::new(
            RecommendationLevel::Success,
            format!("Excellent cache hit rate ({hit_rate:.1}%). Cache is performing well."),
        ));
    }

    if utilization < 50.0 {
        recommendations.push(Recommendation::new(
            RecommendationLevel::Info,
            format!(
                "Low cache utilization ({utilization:.1}%). Many cached items are not being reused."
            ),
        ));
    }

    if unused > 0 && (unused as f64) > (total as f64) * 0.3 {
        recommendations.push(Recommendation::new(
            RecommendationLevel::Warning,
            format!("{unused} entries have never been accessed. Consider reducing TTL or cache scope."),
        ));
    }

    if recommendations.is_empty() {
        recommendations.push(Recommendation::new(
            RecommendationLevel::Success,
            "Cache efficiency is good. No immediate optimizations needed.",
        ));
    }

    recommendations
}

fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

/// First 100 characters of the stored params, with `...` when cut
fn summarize_params(params: &str) -> String {
    if params.chars().count() > PARAMS_SUMMARY_LEN {
        let head: String = params.chars().take(PARAMS_SUMMARY_LEN).collect();
        format!("{head}...")
    } else {
        params.to_string()
    }
}
