mod formatters;

pub use formatters::{JsonFormatter, TextFormatter};

use anyhow::Result;
use omada_cache_core::{CacheHit, CacheStats, CleanupReport, ContentsReport, EfficiencyReport};
use serde::Serialize;
use std::time::Duration;

/// Output format enumeration
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// Parse output format from string
    pub fn from_string(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => anyhow::bail!("Unknown output format: {}", s),
        }
    }

    /// Pick the format: explicit flag, then configured default, then text on a
    /// terminal and JSON everywhere else
    pub fn resolve(flag: Option<Self>, configured: Option<&str>, interactive: bool) -> Result<Self> {
        if let Some(format) = flag {
            return Ok(format);
        }
        if let Some(configured) = configured {
            return Self::from_string(configured);
        }
        Ok(if interactive { Self::Text } else { Self::Json })
    }

    pub fn formatter(self, use_color: bool) -> Box<dyn ReportFormatter> {
        match self {
            Self::Text => Box::new(TextFormatter::new(use_color)),
            Self::Json => Box::new(JsonFormatter),
        }
    }
}

/// Result of an `invalidate` command
#[derive(Debug, Clone, Serialize)]
pub struct InvalidationSummary {
    pub scope: String,
    pub removed: u64,
}

/// Result of a `ttl` command
#[derive(Debug, Clone, Serialize)]
pub struct TtlAnswer {
    pub operation: String,
    pub is_mutation: bool,
    pub ttl_seconds: u64,
    pub should_cache: bool,
}

impl TtlAnswer {
    pub fn new(operation: &str, is_mutation: bool, ttl: Duration) -> Self {
        Self {
            operation: operation.to_string(),
            is_mutation,
            ttl_seconds: ttl.as_secs(),
            should_cache: !ttl.is_zero(),
        }
    }
}

/// Renders each kind of cache report
pub trait ReportFormatter: Send + Sync {
    fn format_stats(&self, stats: &CacheStats) -> Result<String>;

    fn format_contents(&self, contents: &ContentsReport) -> Result<String>;

    fn format_efficiency(&self, report: &EfficiencyReport) -> Result<String>;

    fn format_cleanup(&self, report: &CleanupReport) -> Result<String>;

    fn format_invalidation(&self, summary: &InvalidationSummary) -> Result<String>;

    fn format_ttl(&self, answer: &TtlAnswer) -> Result<String>;

    /// Format a lookup; `None` is a miss
    fn format_lookup(&self, what: &str, hit: Option<&CacheHit>) -> Result<String>;
}
