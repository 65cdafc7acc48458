//! Identity index repository (`identity_cache`)

use crate::Result;
use crate::database::models::{IdentityEntry, IdentityRecord, time_utils};
use crate::error::StorageError;
use crate::metadata::CacheHit;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::time::Duration;

use super::{decode_hit, encode_payload, finish_hit};

const STORE: &str = "identity_cache";

/// Repository for identity records keyed by uid and email
#[derive(Debug, Clone)]
pub struct IdentityRepository {
    pool: SqlitePool,
}

impl IdentityRepository {
    /// Create a new identity repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store an identity record for `ttl`
    ///
    /// The row is replaced on a uid match. A row owned by another uid that
    /// holds the same email is removed, so the newest writer owns the email.
    /// Returns the uid written, or `None` when `ttl` rounds to zero.
    pub async fn cache_identity(&self, identity: &Value, ttl: Duration) -> Result<Option<String>> {
        let record = IdentityRecord::from_value(identity)?;

        let ttl_ms = time_utils::duration_to_millis(ttl);
        if ttl_ms <= 0 {
            log::debug!("Not caching identity {}: non-positive TTL", record.uid);
            return Ok(None);
        }

        let encoded = encode_payload(STORE, identity)?;
        let now = time_utils::now_millis();

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO identity_cache (
                uid, email, identity_id, display_name, first_name, last_name,
                full_data, created_at, expires_at, hit_count, last_accessed
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL)
            "#,
        )
        .bind(&record.uid)
        .bind(&record.email)
        .bind(&record.identity_id)
        .bind(&record.display_name)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&encoded)
        .bind(now)
        .bind(now.saturating_add(ttl_ms))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::query("cache_identity", e.to_string()))?;

        log::info!(
            "Identity CACHED: {} (uid {})",
            record.email.as_deref().unwrap_or("<no email>"),
            record.uid
        );
        Ok(Some(record.uid))
    }

    /// Look up a live identity by email, counting the read as a hit
    pub async fn get_by_email(&self, email: &str) -> Result<Option<CacheHit>> {
        self.hit("email", email).await
    }

    /// Look up a live identity by uid, counting the read as a hit
    pub async fn get_by_uid(&self, uid: &str) -> Result<Option<CacheHit>> {
        self.hit("uid", uid).await
    }

    async fn hit(&self, column: &'static str, value: &str) -> Result<Option<CacheHit>> {
        let now = time_utils::now_millis();
        let sql = format!(
            "UPDATE identity_cache \
             SET hit_count = hit_count + 1, last_accessed = ? \
             WHERE {column} = ? AND expires_at > ? \
             RETURNING full_data, created_at, hit_count"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::query("get_identity", e.to_string()))?;

        let row = sqlx::query(&sql)
            .bind(now)
            .bind(value)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::query("get_identity", e.to_string()))?;

        let Some(row) = row else {
            log::debug!("Identity cache MISS for {column} {value}");
            return Ok(None);
        };

        let stored: String = row.try_get("full_data")?;
        let created_at: i64 = row.try_get("created_at")?;
        let hit_count: i64 = row.try_get("hit_count")?;

        let lookup = format!("identity {column} {value}");
        let hit = decode_hit(STORE, &lookup, &stored, created_at, hit_count, now);
        finish_hit(tx, "get_identity", hit.is_some()).await?;
        if hit.is_some() {
            log::debug!("Identity cache HIT for {column} {value}");
        }
        Ok(hit)
    }

    /// Read a row by uid without touching its hit statistics
    pub async fn find_by_uid(&self, uid: &str) -> Result<Option<IdentityEntry>> {
        let row = sqlx::query(
            r#"
            SELECT uid, email, identity_id, display_name, first_name, last_name,
                   full_data, created_at, expires_at, hit_count, last_accessed
            FROM identity_cache
            WHERE uid = ?
            "#,
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::query("find_identity", e.to_string()))?;

        row.as_ref().map(entry_from_row).transpose()
    }

    /// Count all rows, expired or not
    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM identity_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

pub(crate) fn entry_from_row(row: &SqliteRow) -> Result<IdentityEntry> {
    Ok(IdentityEntry {
        uid: row.try_get("uid")?,
        email: row.try_get("email")?,
        identity_id: row.try_get("identity_id")?,
        display_name: row.try_get("display_name")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        full_data: row.try_get("full_data")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        hit_count: row.try_get("hit_count")?,
        last_accessed: row.try_get("last_accessed")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::error::{Error, ValidationError};
    use serde_json::json;
    use tempfile::TempDir;

    async fn create_test_repo() -> (IdentityRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        (db.identities(), temp_dir)
    }

    fn identity(uid: &str, email: &str) -> Value {
        json!({
            "UId": uid,
            "EMAIL": email,
            "IDENTITYID": format!("ID-{uid}"),
            "DISPLAYNAME": "Test User",
            "FIRSTNAME": "Test",
            "LASTNAME": "User"
        })
    }

    #[tokio::test]
    async fn test_lookup_by_email_and_uid() {
        let (repo, _temp_dir) = create_test_repo().await;
        repo.cache_identity(&identity("U1", "u1@example.com"), Duration::from_secs(60))
            .await
            .unwrap();

        let by_email = repo.get_by_email("u1@example.com").await.unwrap().unwrap();
        let by_uid = repo.get_by_uid("U1").await.unwrap().unwrap();
        assert_eq!(by_email.payload(), by_uid.payload());
        assert_eq!(by_uid.hit_count, 2);
    }

    #[tokio::test]
    async fn test_missing_uid_is_rejected() {
        let (repo, _temp_dir) = create_test_repo().await;
        let err = repo
            .cache_identity(&json!({"EMAIL": "x@example.com"}), Duration::from_secs(60))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Validation(ValidationError::MissingField { .. })
        ));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_email_takeover_replaces_older_row() {
        let (repo, _temp_dir) = create_test_repo().await;
        repo.cache_identity(&identity("U1", "shared@example.com"), Duration::from_secs(60))
            .await
            .unwrap();
        repo.cache_identity(&identity("U2", "shared@example.com"), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(repo.find_by_uid("U1").await.unwrap().is_none());
        let hit = repo.get_by_email("shared@example.com").await.unwrap().unwrap();
        assert_eq!(hit.value["UId"], "U2");
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_identities_without_email_coexist() {
        let (repo, _temp_dir) = create_test_repo().await;
        repo.cache_identity(&json!({"UId": "U1"}), Duration::from_secs(60))
            .await
            .unwrap();
        repo.cache_identity(&json!({"UId": "U2", "EMAIL": ""}), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
        assert!(repo.find_by_uid("U2").await.unwrap().unwrap().email.is_none());
    }

    #[tokio::test]
    async fn test_rewrite_resets_hits() {
        let (repo, _temp_dir) = create_test_repo().await;
        let record = identity("U1", "u1@example.com");
        repo.cache_identity(&record, Duration::from_secs(60)).await.unwrap();
        repo.get_by_uid("U1").await.unwrap();
        repo.cache_identity(&record, Duration::from_secs(60)).await.unwrap();

        let entry = repo.find_by_uid("U1").await.unwrap().unwrap();
        assert_eq!(entry.hit_count, 0);
        assert!(entry.last_accessed.is_none());
    }

    #[tokio::test]
    async fn test_expired_identity_misses() {
        let (repo, _temp_dir) = create_test_repo().await;
        repo.cache_identity(&identity("U1", "u1@example.com"), Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(repo.get_by_uid("U1").await.unwrap().is_none());
        assert!(repo.get_by_email("u1@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_identity_keeps_hit_count() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        let repo = db.identities();
        repo.cache_identity(&identity("U1", "a@example.com"), Duration::from_secs(60))
            .await
            .unwrap();

        sqlx::query("UPDATE identity_cache SET full_data = '[broken' WHERE uid = 'U1'")
            .execute(db.pool())
            .await
            .unwrap();

        assert!(repo.get_by_email("a@example.com").await.unwrap().is_none());
        assert!(repo.get_by_uid("U1").await.unwrap().is_none());

        let entry = repo.find_by_uid("U1").await.unwrap().unwrap();
        assert_eq!(entry.hit_count, 0);
        assert!(entry.last_accessed.is_none());
    }
}
