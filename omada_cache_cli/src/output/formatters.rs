use super::{InvalidationSummary, ReportFormatter, TtlAnswer};
use anyhow::Result;
use colored::*;
use omada_cache_core::stats::{EntryStatus, StoreMetrics};
use omada_cache_core::{
    CacheHit, CacheStats, CleanupReport, ContentsReport, EfficiencyReport, RecommendationLevel,
};
use serde_json::{Value, json};
use std::fmt::Write;

/// Text formatter for human-readable output
pub struct TextFormatter {
    use_color: bool,
}

impl TextFormatter {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn colorize(&self, text: &str, color: fn(&str) -> ColoredString) -> String {
        if self.use_color {
            color(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.colorize(text, |s| s.bold().blue())
    }

    fn status(&self, status: EntryStatus) -> String {
        match status {
            EntryStatus::Valid => self.colorize("valid", |s| s.green()),
            EntryStatus::Expired => self.colorize("expired", |s| s.red()),
        }
    }

    fn store_metrics(&self, out: &mut String, name: &str, metrics: &StoreMetrics) {
        let _ = writeln!(out, "{}", self.heading(name));
        let _ = writeln!(
            out,
            "  Entries: {} ({} valid, {} expired)",
            metrics.total_entries, metrics.valid_entries, metrics.expired_entries
        );
        let _ = writeln!(
            out,
            "  Hits:    {} total, {:.2} average",
            metrics.total_hits, metrics.average_hits
        );
    }
}

impl ReportFormatter for TextFormatter {
    fn format_stats(&self, stats: &CacheStats) -> Result<String> {
        let mut out = String::new();
        self.store_metrics(&mut out, "Response cache", &stats.responses);
        self.store_metrics(&mut out, "Identity cache", &stats.identities);
        self.store_metrics(&mut out, "Resource type cache", &stats.resource_types);

        if !stats.top_endpoints.is_empty() {
            let _ = writeln!(out, "{}", self.heading("Top endpoints"));
            for entry in &stats.top_endpoints {
                let _ = writeln!(out, "  {:<40} {:>6} hits", entry.endpoint, entry.hits);
            }
        }

        let _ = writeln!(out, "Database:    {}", stats.database_path);
        let _ = write!(out, "Default TTL: {}s", stats.default_ttl_seconds);
        Ok(out)
    }

    fn format_contents(&self, contents: &ContentsReport) -> Result<String> {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} ({} shown)",
            self.heading("Response cache"),
            contents.responses.len()
        );
        for row in &contents.responses {
            let _ = writeln!(
                out,
                "  [{}] {} {}",
                self.status(row.status),
                self.colorize(&row.endpoint, |s| s.cyan()),
                row.params_summary
            );
            let _ = writeln!(
                out,
                "      hits {}, age {:.1}s, ttl {:.1}s, created {}",
                row.hit_count, row.age_seconds, row.ttl_remaining_seconds, row.created_at
            );
        }

        let _ = writeln!(
            out,
            "{} ({} shown)",
            self.heading("Identity cache"),
            contents.identities.len()
        );
        for row in &contents.identities {
            let _ = writeln!(
                out,
                "  [{}] {} {} ({})",
                self.status(row.status),
                self.colorize(row.email.as_deref().unwrap_or("<no email>"), |s| s.cyan()),
                row.display_name.as_deref().unwrap_or_default(),
                row.uid
            );
            let _ = writeln!(
                out,
                "      hits {}, age {:.1}s, ttl {:.1}s",
                row.hit_count, row.age_seconds, row.ttl_remaining_seconds
            );
        }
        Ok(out.trim_end().to_string())
    }

    fn format_efficiency(&self, report: &EfficiencyReport) -> Result<String> {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.heading("Efficiency"));
        let _ = writeln!(
            out,
            "  Response hit rate: {:.2}%",
            report.response_hit_rate_percent
        );
        let _ = writeln!(
            out,
            "  Identity hit rate: {:.2}%",
            report.identity_hit_rate_percent
        );
        let _ = writeln!(
            out,
            "  Combined hit rate: {:.2}%",
            report.combined_hit_rate_percent
        );
        let _ = writeln!(out, "  Utilization:       {:.2}%", report.utilization_percent);
        let _ = writeln!(
            out,
            "  Unused entries:    {} of {}",
            report.responses.unused_entries, report.responses.total_entries
        );

        if !report.most_accessed.is_empty() {
            let _ = writeln!(out, "{}", self.heading("Most accessed"));
            for entry in &report.most_accessed {
                let _ = writeln!(out, "  {:<40} {:>6}", entry.endpoint, entry.hits);
            }
        }
        if !report.least_accessed.is_empty() {
            let _ = writeln!(out, "{}", self.heading("Least accessed"));
            for entry in &report.least_accessed {
                let _ = writeln!(out, "  {:<40} {:>6}", entry.endpoint, entry.hits);
            }
        }

        let _ = writeln!(
            out,
            "Database: {} ({:.2} MB)",
            report.database_path,
            report.database_size_bytes as f64 / (1024.0 * 1024.0)
        );

        let _ = writeln!(out, "{}", self.heading("Recommendations"));
        for recommendation in &report.recommendations {
            let level = match recommendation.level {
                RecommendationLevel::Success => self.colorize("success", |s| s.green()),
                RecommendationLevel::Info => self.colorize("info", |s| s.cyan()),
                RecommendationLevel::Warning => self.colorize("warning", |s| s.yellow()),
            };
            let _ = writeln!(out, "  [{level}] {}", recommendation.message);
        }
        Ok(out.trim_end().to_string())
    }

    fn format_cleanup(&self, report: &CleanupReport) -> Result<String> {
        Ok(format!(
            "Removed {} expired entries ({} responses, {} identities, {} resource types)",
            report.total(),
            report.responses,
            report.identities,
            report.resource_types
        ))
    }

    fn format_invalidation(&self, summary: &InvalidationSummary) -> Result<String> {
        Ok(format!(
            "Invalidated {} entries ({})",
            summary.removed, summary.scope
        ))
    }

    fn format_ttl(&self, answer: &TtlAnswer) -> Result<String> {
        if answer.should_cache {
            Ok(format!("{}: {}s", answer.operation, answer.ttl_seconds))
        } else {
            Ok(format!(
                "{}: {}",
                answer.operation,
                self.colorize("not cached", |s| s.yellow())
            ))
        }
    }

    fn format_lookup(&self, what: &str, hit: Option<&CacheHit>) -> Result<String> {
        let Some(hit) = hit else {
            return Ok(format!("{what}: {}", self.colorize("miss", |s| s.yellow())));
        };

        Ok(format!(
            "{what}: {} (hits {}, age {:.1}s, created {})\n{}",
            self.colorize("hit", |s| s.green()),
            hit.hit_count,
            hit.metadata.age_seconds,
            hit.metadata.created_at,
            serde_json::to_string_pretty(&hit.payload())?
        ))
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl ReportFormatter for JsonFormatter {
    fn format_stats(&self, stats: &CacheStats) -> Result<String> {
        Ok(serde_json::to_string_pretty(stats)?)
    }

    fn format_contents(&self, contents: &ContentsReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(contents)?)
    }

    fn format_efficiency(&self, report: &EfficiencyReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    fn format_cleanup(&self, report: &CleanupReport) -> Result<String> {
        let mut value = serde_json::to_value(report)?;
        value["total"] = json!(report.total());
        Ok(serde_json::to_string_pretty(&value)?)
    }

    fn format_invalidation(&self, summary: &InvalidationSummary) -> Result<String> {
        Ok(serde_json::to_string_pretty(summary)?)
    }

    fn format_ttl(&self, answer: &TtlAnswer) -> Result<String> {
        Ok(serde_json::to_string_pretty(answer)?)
    }

    fn format_lookup(&self, what: &str, hit: Option<&CacheHit>) -> Result<String> {
        let value = match hit {
            Some(hit) => json!({
                "lookup": what,
                "hit": true,
                "hit_count": hit.hit_count,
                "metadata": hit.metadata,
                "value": hit.payload(),
            }),
            None => json!({"lookup": what, "hit": false, "value": Value::Null}),
        };
        Ok(serde_json::to_string_pretty(&value)?)
    }
}
