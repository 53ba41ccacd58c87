//! Configuration directory helpers for the mail cache tools
//!
//! Resolves the shared config directory (~/.config/mailcache/) and loads
//! JSON files from it. Call [`init`] at startup to create the directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Name of the directory under the platform config dir
const APP_DIR: &str = "mailcache";

/// Initialize the config directory.
///
/// Creates ~/.config/mailcache/ if it doesn't exist and returns its path.
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

/// Get the config directory (~/.config/mailcache/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a file within the config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Load and parse a JSON file from the config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Check if a file exists in the config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Ensure the config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}
