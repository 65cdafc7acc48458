use crate::paths;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use omada_cache_core::CacheConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prefix of environment variables read into the configuration
pub const ENV_PREFIX: &str = "OMADA_CACHE_";

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// `text` or `json`; unset picks by terminal detection
    pub default_format: Option<String>,
    pub color_enabled: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: None,
            color_enabled: true,
        }
    }
}

impl AppConfig {
    /// Apply CLI argument overrides to the configuration
    pub fn apply_cli_overrides(&mut self, database: Option<PathBuf>) {
        if let Some(path) = database {
            self.cache.database_path = Some(path);
        }
    }
}

/// Configuration manager that handles platform paths and layered configuration
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Create a new ConfigManager with the default platform path
    pub fn new() -> Self {
        Self {
            config_path: paths::get_config_path(),
        }
    }

    /// Create a ConfigManager with a specific path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn get_config_path(&self) -> PathBuf {
        self.config_path.clone()
    }

    /// Load configuration with layered priority: ENV > File > Defaults
    ///
    /// CLI flags are applied afterwards with [`AppConfig::apply_cli_overrides`].
    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::new();

        // Layer 1: Defaults
        figment = figment.merge(Serialized::defaults(AppConfig::default()));

        // Layer 2: Config file (if exists)
        if self.config_path.exists() {
            figment = figment.merge(Toml::file(&self.config_path));
        }

        // Layer 3: Environment variables
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract().context("Failed to load configuration")
    }

    /// Get a configuration value by key (dot notation)
    pub fn get(&self, key: &str) -> Result<String> {
        let value = Self::as_toml(&self.load()?)?;

        let mut current = &value;
        for part in key.split('.') {
            match current {
                toml::Value::Table(table) => {
                    current = table
                        .get(part)
                        .ok_or_else(|| anyhow::anyhow!("Key '{}' not found", key))?;
                }
                _ => anyhow::bail!("Invalid key path: {}", key),
            }
        }

        match current {
            toml::Value::String(s) => Ok(s.clone()),
            toml::Value::Integer(i) => Ok(i.to_string()),
            toml::Value::Float(f) => Ok(f.to_string()),
            toml::Value::Boolean(b) => Ok(b.to_string()),
            toml::Value::Table(table) if !table.is_empty() => Ok(toml::to_string(table)?),
            _ => anyhow::bail!("Value at '{}' is not a simple type", key),
        }
    }

    /// List all configuration values, sorted by key
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let value = Self::as_toml(&self.load()?)?;

        let mut items = Vec::new();
        Self::collect_values(&value, String::new(), &mut items);
        items.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(items)
    }

    fn as_toml(config: &AppConfig) -> Result<toml::Value> {
        let toml_string = toml::to_string(config).context("Failed to render configuration")?;
        Ok(toml::from_str(&toml_string)?)
    }

    /// Recursively collect all key-value pairs from TOML
    fn collect_values(value: &toml::Value, prefix: String, items: &mut Vec<(String, String)>) {
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    let new_prefix = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    Self::collect_values(val, new_prefix, items);
                }
            }
            toml::Value::String(s) => items.push((prefix, s.clone())),
            toml::Value::Integer(i) => items.push((prefix, i.to_string())),
            toml::Value::Float(f) => items.push((prefix, f.to_string())),
            toml::Value::Boolean(b) => items.push((prefix, b.to_string())),
            _ => {} // Skip arrays and other complex types
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_defaults_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("missing.toml"));

        let config = manager.load().unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(manager.get("cache.default_ttl_seconds").unwrap(), "3600");
    }

    #[test]
    #[serial]
    fn test_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[cache]
default_ttl_seconds = 900
auto_cleanup = false

[cache.ttl_overrides]
roles = 60

[output]
default_format = "json"
"#,
        )
        .unwrap();

        let manager = ConfigManager::with_path(path);
        let config = manager.load().unwrap();
        assert_eq!(config.cache.default_ttl_seconds, 900);
        assert!(!config.cache.auto_cleanup);
        assert_eq!(config.cache.ttl_overrides.get("roles"), Some(&60));
        assert_eq!(config.cache.max_connections, 5);
        assert_eq!(config.output.default_format.as_deref(), Some("json"));

        let items = manager.list().unwrap();
        assert!(items.contains(&("cache.ttl_overrides.roles".to_string(), "60".to_string())));
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[cache]\ndefault_ttl_seconds = 900\n").unwrap();

        // SAFETY: serialized with the other tests that touch the environment
        unsafe { std::env::set_var("OMADA_CACHE_CACHE__DEFAULT_TTL_SECONDS", "120") };
        let loaded = ConfigManager::with_path(path).load();
        unsafe { std::env::remove_var("OMADA_CACHE_CACHE__DEFAULT_TTL_SECONDS") };

        assert_eq!(loaded.unwrap().cache.default_ttl_seconds, 120);
    }

    #[test]
    #[serial]
    fn test_unknown_key_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("missing.toml"));
        assert!(manager.get("cache.nope").is_err());
    }

    #[test]
    fn test_cli_database_override() {
        let mut config = AppConfig::default();
        config.apply_cli_overrides(Some(PathBuf::from("/tmp/override.db")));
        assert_eq!(
            config.cache.database_path,
            Some(PathBuf::from("/tmp/override.db"))
        );
    }
}
