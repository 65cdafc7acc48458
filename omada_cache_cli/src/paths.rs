//! Centralized path management for the omada-cache CLI

use std::path::PathBuf;

/// The name of the application directory used across all platforms
const APP_DIR: &str = "omada-cache";

/// The name of the configuration file
const CONFIG_FILE: &str = "config.toml";

/// Returns the path to the configuration directory
///
/// On Unix-like systems this is `~/.config/omada-cache`, and on Windows
/// `%APPDATA%/omada-cache`. `XDG_CONFIG_HOME` takes precedence when set.
pub fn get_config_dir() -> PathBuf {
    #[cfg(not(target_os = "windows"))]
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        return PathBuf::from(xdg_config).join(APP_DIR);
    }

    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".omada-cache"))
}

/// Returns the path to the configuration file
pub fn get_config_path() -> PathBuf {
    get_config_dir().join(CONFIG_FILE)
}
