//! Database schema definitions
//!
//! All timestamps are milliseconds since the Unix epoch.

/// Current schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Tables that must exist once migrations have run
pub const REQUIRED_TABLES: [&str; 4] = [
    "schema_version",
    "api_cache",
    "identity_cache",
    "resource_type_cache",
];

/// Initial schema creation SQL
pub const SCHEMA_V1: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- Generic API response cache
CREATE TABLE IF NOT EXISTS api_cache (
    cache_key TEXT PRIMARY KEY,
    endpoint TEXT NOT NULL,
    query_params TEXT,
    response_data TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    hit_count INTEGER NOT NULL DEFAULT 0,
    last_accessed INTEGER,
    CHECK (expires_at > created_at)
);

-- Identity lookups by UId or email
CREATE TABLE IF NOT EXISTS identity_cache (
    uid TEXT PRIMARY KEY,
    email TEXT UNIQUE,
    identity_id TEXT,
    display_name TEXT,
    first_name TEXT,
    last_name TEXT,
    full_data TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    hit_count INTEGER NOT NULL DEFAULT 0,
    last_accessed INTEGER,
    CHECK (expires_at > created_at)
);

-- Near-static resource type metadata
CREATE TABLE IF NOT EXISTS resource_type_cache (
    resource_type_id INTEGER PRIMARY KEY,
    resource_type_name TEXT,
    system_id INTEGER,
    full_data TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    hit_count INTEGER NOT NULL DEFAULT 0,
    last_accessed INTEGER,
    CHECK (expires_at > created_at)
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_api_cache_endpoint ON api_cache(endpoint);
CREATE INDEX IF NOT EXISTS idx_api_cache_expires_at ON api_cache(expires_at);

CREATE INDEX IF NOT EXISTS idx_identity_cache_email ON identity_cache(email);
CREATE INDEX IF NOT EXISTS idx_identity_cache_expires_at ON identity_cache(expires_at);

CREATE INDEX IF NOT EXISTS idx_resource_type_cache_expires_at ON resource_type_cache(expires_at);
"#;
