use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SatchelError};

/// Top-level configuration for the Satchel client.
///
/// Loaded from `~/.satchel/config.toml` by default. Each section covers one
/// cross-cutting concern; the user-facing runtime settings (streaming,
/// retries, bookmarks) live in the persistent store instead, since they are
/// mutated at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatchelConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for SatchelConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl SatchelConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SatchelConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SatchelError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the persisted JSON stores.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.satchel/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Remote answering-service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the answering service.
    pub base_url: String,
    /// Number of chunks requested per query.
    pub top_k: u32,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// How long a notification stays visible, in seconds.
    pub notification_ttl_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            top_k: 5,
            request_timeout_secs: 60,
            notification_ttl_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SatchelConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.api.top_k, 5);
        assert_eq!(config.api.request_timeout_secs, 60);
        assert_eq!(config.api.notification_ttl_secs, 5);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = SatchelConfig::default();
        config.api.base_url = "https://qa.example.com".to_string();
        config.api.top_k = 8;
        config.save(&path).unwrap();

        let loaded = SatchelConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(SatchelConfig::load(&path).is_err());
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let config = SatchelConfig::load_or_default(&path);
        assert_eq!(config, SatchelConfig::default());
    }

    #[test]
    fn test_load_or_default_on_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid [ toml").unwrap();
        let config = SatchelConfig::load_or_default(&path);
        assert_eq!(config, SatchelConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\nbase_url = \"https://qa.internal\"\n").unwrap();

        let config = SatchelConfig::load(&path).unwrap();
        assert_eq!(config.api.base_url, "https://qa.internal");
        assert_eq!(config.api.top_k, 5);
        assert_eq!(config.general.log_level, "info");
    }
}
