//! Configuration stored in `~/.leadflow/config.json`.
//!
//! Every field has a serde default, so a missing file means "local dev
//! against localhost" rather than an error. `LEADFLOW_API_URL` overrides
//! the configured backend URL, matching how deployments point the
//! dashboard at a different server.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the dashboard backend, including the `/api` prefix.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token for the agent session. The engine never obtains one
    /// itself; login is the embedder's business.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Undo window in seconds.
    #[serde(default = "default_undo_window_secs")]
    pub undo_window_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            auth_token: None,
            undo_window_secs: default_undo_window_secs(),
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_undo_window_secs() -> u64 {
    60
}

/// Canonical config file path (`~/.leadflow/config.json`).
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
    Ok(home.join(".leadflow").join("config.json"))
}

impl Config {
    /// Load from the canonical path, then apply the `LEADFLOW_API_URL`
    /// environment override if set.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&config_path()?)?;
        if let Ok(url) = std::env::var("LEADFLOW_API_URL") {
            if !url.is_empty() {
                config.api_url = url;
            }
        }
        Ok(config)
    }

    /// Load from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Write to an explicit path, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn undo_window(&self) -> Duration {
        Duration::from_secs(self.undo_window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();

        assert_eq!(config.api_url, "http://localhost:5000/api");
        assert_eq!(config.auth_token, None);
        assert_eq!(config.undo_window(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "apiUrl": "https://leads.example.com/api" }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_url, "https://leads.example.com/api");
        assert_eq!(config.undo_window_secs, 60);
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            api_url: "https://leads.example.com/api".to_string(),
            auth_token: Some("jwt-token".to_string()),
            undo_window_secs: 30,
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_url, config.api_url);
        assert_eq!(loaded.auth_token.as_deref(), Some("jwt-token"));
        assert_eq!(loaded.undo_window_secs, 30);
    }

    #[test]
    fn test_corrupt_config_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json at all").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Json(_))
        ));
    }
}
