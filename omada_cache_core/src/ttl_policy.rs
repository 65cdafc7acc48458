//! Operation name to TTL lookup used by the API callers
//!
//! The stores never consult this table; callers ask it for a TTL before
//! calling `set` and skip caching when the answer is zero.

use std::collections::BTreeMap;
use std::time::Duration;

/// TTL applied to operations that match no table entry
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

const DAY: u64 = 86_400;
const HOUR: u64 = 3_600;
const QUARTER_HOUR: u64 = 900;
const FIVE_MINUTES: u64 = 300;

/// Built-in table, checked in order; the first matching name wins
const BUILTIN: &[(&str, u64)] = &[
    // Static data
    ("resource_types", DAY),
    ("systems", DAY),
    ("compliance_config", DAY),
    // Slow-changing data
    ("identities", HOUR),
    ("identity_by_email", HOUR),
    ("identity_by_uid", HOUR),
    ("resources", HOUR),
    ("roles", HOUR),
    ("contexts", HOUR),
    // Dynamic data
    ("calculated_assignments", QUARTER_HOUR),
    ("access_requests", QUARTER_HOUR),
    // Real-time data
    ("pending_approvals", FIVE_MINUTES),
    ("approval_details", FIVE_MINUTES),
    // Never cached
    ("create_access_request", 0),
    ("make_approval_decision", 0),
    ("tokens", 0),
    ("oauth", 0),
];

/// TTL lookup table keyed by operation name
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    entries: Vec<(String, Duration)>,
    default_ttl: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            entries: BUILTIN
                .iter()
                .map(|(name, secs)| (name.to_string(), Duration::from_secs(*secs)))
                .collect(),
            default_ttl: DEFAULT_TTL,
        }
    }
}

impl TtlPolicy {
    /// Built-in table with a different fallback TTL
    pub fn with_default(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            ..Self::default()
        }
    }

    /// Replace or add entries; overrides take precedence over built-ins
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, u64>) -> Self {
        let mut merged: Vec<(String, Duration)> = overrides
            .iter()
            .map(|(name, secs)| (name.to_lowercase(), Duration::from_secs(*secs)))
            .collect();
        merged.extend(
            self.entries
                .into_iter()
                .filter(|(name, _)| !overrides.keys().any(|o| o.eq_ignore_ascii_case(name))),
        );
        self.entries = merged;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// TTL for an operation; mutations are never cached
    pub fn ttl_for(&self, operation: &str, is_mutation: bool) -> Duration {
        if is_mutation {
            return Duration::ZERO;
        }

        let operation = operation.to_lowercase();
        self.entries
            .iter()
            .find(|(name, _)| operation.contains(name.as_str()))
            .map(|(_, ttl)| *ttl)
            .unwrap_or(self.default_ttl)
    }

    pub fn should_cache(&self, operation: &str, is_mutation: bool) -> bool {
        !self.ttl_for(operation, is_mutation).is_zero()
    }

    /// Table entries in lookup order
    pub fn entries(&self) -> impl Iterator<Item = (&str, Duration)> {
        self.entries.iter().map(|(name, ttl)| (name.as_str(), *ttl))
    }
}
