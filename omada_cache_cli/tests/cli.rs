use assert_cmd::Command;
use omada_cache_core::{CacheConfig, OmadaCache};
use omada_cache_test_utils::IdentityBuilder;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Command with an isolated config file and database
fn cli(temp_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("omada-cache").unwrap();
    cmd.arg("--config")
        .arg(temp_dir.join("config.toml"))
        .arg("--db")
        .arg(temp_dir.join("omada_cache.db"))
        .env_remove("RUST_LOG");
    cmd
}

async fn seed(temp_dir: &Path) -> PathBuf {
    let db_path = temp_dir.join("omada_cache.db");
    let cache = OmadaCache::open(CacheConfig {
        auto_cleanup: false,
        ..CacheConfig::with_database_path(&db_path)
    })
    .await
    .unwrap();

    let minute = Some(Duration::from_secs(60));
    cache
        .set("roles", &json!({"top": 5}), &json!({"value": ["r1"]}), minute)
        .await
        .unwrap();
    cache
        .set("roles", &json!({"top": 10}), &json!({"value": ["r2"]}), minute)
        .await
        .unwrap();
    cache
        .set("systems", &json!({}), &json!({"value": []}), minute)
        .await
        .unwrap();
    cache
        .cache_identity(
            &IdentityBuilder::new("U1").with_email("ada@example.com").build(),
            minute,
        )
        .await
        .unwrap();
    cache.close().await;
    db_path
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "{output:?}");
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_version() {
    let mut cmd = Command::cargo_bin("omada-cache").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_stats_on_new_database() {
    let temp_dir = TempDir::new().unwrap();
    let stats = json_stdout(cli(temp_dir.path()).args(["--format", "json", "stats"]));

    assert_eq!(stats["responses"]["total_entries"], 0);
    assert_eq!(stats["default_ttl_seconds"], 3600);
    assert!(temp_dir.path().join("omada_cache.db").exists());
}

#[tokio::test]
async fn test_get_reports_hit_and_miss() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path()).await;

    let hit = json_stdout(cli(temp_dir.path()).args([
        "--format", "json", "get", "--endpoint", "roles", "--params", r#"{"top": 5}"#,
    ]));
    assert_eq!(hit["hit"], true);
    assert_eq!(hit["value"], json!({"value": ["r1"]}));
    assert_eq!(hit["hit_count"], 1);

    let miss = json_stdout(cli(temp_dir.path()).args([
        "--format", "json", "get", "--endpoint", "roles", "--params", r#"{"top": 99}"#,
    ]));
    assert_eq!(miss["hit"], false);
}

#[tokio::test]
async fn test_identity_lookup_by_email() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path()).await;

    cli(temp_dir.path())
        .args(["--format", "text", "identity", "--email", "ada@example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("email ada@example.com: hit"))
        .stdout(predicate::str::contains("\"UId\": \"U1\""));
}

#[tokio::test]
async fn test_invalidate_endpoint() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path()).await;

    let summary = json_stdout(cli(temp_dir.path()).args([
        "--format", "json", "invalidate", "--endpoint", "roles",
    ]));
    assert_eq!(summary["removed"], 2);

    let stats = json_stdout(cli(temp_dir.path()).args(["--format", "json", "stats"]));
    assert_eq!(stats["responses"]["total_entries"], 1);
}

#[tokio::test]
async fn test_invalidate_all_clears_identities() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path()).await;

    let summary = json_stdout(cli(temp_dir.path()).args(["--format", "json", "invalidate", "--all"]));
    assert_eq!(summary["removed"], 4);
}

#[test]
fn test_invalidate_requires_target() {
    let temp_dir = TempDir::new().unwrap();
    cli(temp_dir.path()).arg("invalidate").assert().failure();
    cli(temp_dir.path())
        .args(["invalidate", "--params", "{}"])
        .assert()
        .failure();
}

#[test]
fn test_invalid_params_json_fails() {
    let temp_dir = TempDir::new().unwrap();
    cli(temp_dir.path())
        .args(["get", "--endpoint", "roles", "--params", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --params JSON"));
}

#[tokio::test]
async fn test_view_and_efficiency() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path()).await;

    let contents = json_stdout(cli(temp_dir.path()).args(["--format", "json", "view", "--limit", "2"]));
    assert_eq!(contents["responses"].as_array().unwrap().len(), 2);
    assert_eq!(contents["identities"].as_array().unwrap().len(), 1);

    let efficiency = json_stdout(cli(temp_dir.path()).args(["--format", "json", "efficiency"]));
    assert!(!efficiency["recommendations"].as_array().unwrap().is_empty());
    assert!(efficiency["database_size_bytes"].as_i64().unwrap() > 0);
}

#[test]
fn test_cleanup_on_empty_database() {
    let temp_dir = TempDir::new().unwrap();
    let report = json_stdout(cli(temp_dir.path()).args(["--format", "json", "cleanup"]));
    assert_eq!(report["total"], 0);
}

#[test]
fn test_ttl_lookup() {
    let temp_dir = TempDir::new().unwrap();
    cli(temp_dir.path())
        .args(["--format", "text", "ttl", "get_pending_approvals"])
        .assert()
        .success()
        .stdout(predicate::str::contains("get_pending_approvals: 300s"));

    cli(temp_dir.path())
        .args(["--format", "text", "ttl", "roles", "--mutation"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not cached"));

    // The policy needs no database
    assert!(!temp_dir.path().join("omada_cache.db").exists());
}

#[test]
fn test_config_file_is_used() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[cache]\ndefault_ttl_seconds = 600\n\n[cache.ttl_overrides]\nroles = 5\n",
    )
    .unwrap();

    cli(temp_dir.path())
        .args(["config", "get", "cache.default_ttl_seconds"])
        .assert()
        .success()
        .stdout("600\n");

    cli(temp_dir.path())
        .args(["--format", "text", "ttl", "roles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("roles: 5s"));

    cli(temp_dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_completions() {
    Command::cargo_bin("omada-cache")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("omada-cache"));
}
