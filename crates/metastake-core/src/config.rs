//! Application configuration and persistence utilities.
//!
//! The configuration types are always available. Loading and saving the
//! JSON file under the platform config directory needs the `persistence`
//! feature.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::Address;

#[cfg(feature = "persistence")]
use directories::ProjectDirs;
#[cfg(feature = "persistence")]
use std::fs;
#[cfg(feature = "persistence")]
use std::path::{Path, PathBuf};

/// Configuration error type.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization/deserialization error.
    #[cfg(feature = "persistence")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Other configuration error.
    #[error("{0}")]
    Other(String),
}

/// Tunables of the transaction-lifecycle controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// How long an attempt may wait for inclusion before it fails with a timeout.
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    /// Cached reads older than this are reported as stale.
    #[serde(default = "default_cache_max_age_secs")]
    pub cache_max_age_secs: u64,
    /// Buffered attempt events per subscriber.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_confirmation_timeout_secs() -> u64 {
    120
}

fn default_cache_max_age_secs() -> u64 {
    30
}

fn default_event_capacity() -> usize {
    64
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            cache_max_age_secs: default_cache_max_age_secs(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl ControllerConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_secs)
    }

    /// Reject values the controller cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.confirmation_timeout_secs == 0 {
            return Err(ConfigError::Other(
                "confirmation_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Other(
                "event_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Last connected account.
    #[serde(default)]
    pub last_account: Option<Address>,
    /// Controller tunables.
    #[serde(default)]
    pub controller: ControllerConfig,
}

// ==================== Path Utilities ====================

/// Get the config directory.
#[cfg(feature = "persistence")]
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from("xyz", "metanode", "metastake")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| ConfigError::Other("Could not determine config directory".to_string()))
}

/// Get the config file path.
#[cfg(feature = "persistence")]
pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    get_config_dir().map(|dir| dir.join("config.json"))
}

// ==================== Config I/O ====================

/// Load configuration from disk, falling back to defaults when missing.
#[cfg(feature = "persistence")]
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path()?)
}

/// Load configuration from a specific file.
#[cfg(feature = "persistence")]
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    config.controller.validate()?;
    Ok(config)
}

/// Save configuration to disk.
#[cfg(feature = "persistence")]
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &get_config_path()?)
}

/// Save configuration to a specific file.
#[cfg(feature = "persistence")]
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

/// Backup a corrupted config file for debugging.
#[cfg(feature = "persistence")]
pub fn backup_corrupted_config(path: &Path) -> Result<PathBuf, ConfigError> {
    let parent = path
        .parent()
        .ok_or_else(|| ConfigError::Other("Config path has no parent".to_string()))?;
    let backup_path = parent.join(format!(
        "config.backup.{}",
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    ));
    fs::copy(path, &backup_path)?;
    Ok(backup_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_config_default() {
        let config = ControllerConfig::default();
        assert_eq!(config.confirmation_timeout(), Duration::from_secs(120));
        assert_eq!(config.cache_max_age(), Duration::from_secs(30));
        assert_eq!(config.event_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_controller_config_rejects_zero_timeout() {
        let config = ControllerConfig {
            confirmation_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_controller_config_rejects_zero_capacity() {
        let config = ControllerConfig {
            event_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert!(config.last_account.is_none());
        assert_eq!(config.controller, ControllerConfig::default());
    }

    #[test]
    #[cfg(feature = "persistence")]
    fn test_app_config_deserialize_missing_fields() {
        let json = r#"{"controller":{"confirmation_timeout_secs":5}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.controller.confirmation_timeout_secs, 5);
        assert_eq!(config.controller.cache_max_age_secs, 30);
        assert!(config.last_account.is_none());
    }

    #[test]
    #[cfg(feature = "persistence")]
    fn test_app_config_roundtrip_through_file() {
        let dir = std::env::temp_dir().join(format!("metastake-config-{}", std::process::id()));
        let path = dir.join("config.json");
        let config = AppConfig {
            last_account: Some("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap()),
            controller: ControllerConfig {
                confirmation_timeout_secs: 15,
                ..Default::default()
            },
        };
        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    #[cfg(feature = "persistence")]
    fn test_load_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("metastake-does-not-exist/config.json");
        assert_eq!(load_config_from(&path).unwrap(), AppConfig::default());
    }

    #[test]
    #[cfg(feature = "persistence")]
    fn test_get_config_path() {
        let result = get_config_path();
        assert!(result.is_ok());
        assert!(result.unwrap().to_string_lossy().contains("config.json"));
    }
}
