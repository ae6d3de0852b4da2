//! Configuration settings for BlueChip.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// File name of the persisted bearer token inside the data directory.
pub const TOKEN_FILE_NAME: &str = "token";

/// Main configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API configuration.
    pub api: ApiConfig,
    /// Polling configuration.
    pub polling: PollingConfig,
    /// Session configuration.
    pub session: SessionConfig,
}

impl Config {
    /// Load configuration from the default location, falling back to defaults.
    pub fn load_or_default() -> crate::Result<Self> {
        Self::load(None)
    }

    /// Load configuration from file, then apply `BLUECHIP__*` environment overrides.
    pub fn load(path: Option<PathBuf>) -> crate::Result<Self> {
        let config_path = path.unwrap_or_else(Self::default_path);

        config::Config::builder()
            .add_source(config::File::from(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(super::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| crate::Error::config(e.to_string()))
    }

    /// Save configuration to file.
    pub fn save(&self, path: Option<PathBuf>) -> crate::Result<()> {
        let config_path = path.unwrap_or_else(Self::default_path);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::config(e.to_string()))?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    fn default_path() -> PathBuf {
        super::config_dir()
            .map(|p| p.join("config.toml"))
            .unwrap_or_else(|_| PathBuf::from("config.toml"))
    }
}

/// API configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Market API base URL.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Polling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between listing refreshes while a session is active.
    pub interval_secs: u64,
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        // tokio intervals panic on a zero period
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

/// Session configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Where the bearer token is persisted. Defaults to `<data_dir>/token`.
    pub token_path: Option<PathBuf>,
}

impl SessionConfig {
    /// Resolve the token file location.
    pub fn resolved_token_path(&self) -> crate::Result<PathBuf> {
        match &self.token_path {
            Some(path) => Ok(path.clone()),
            None => super::data_dir().map(|dir| dir.join(TOKEN_FILE_NAME)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("bluechip-config-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_defaults_match_observed_client() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.polling.interval(), Duration::from_secs(5));
        assert_eq!(config.session.token_path, None);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let polling = PollingConfig { interval_secs: 0 };
        assert_eq!(polling.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load(Some(temp_path("absent.toml"))).unwrap();
        assert_eq!(config.api, ApiConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("config.toml");
        let mut config = Config::default();
        config.api.base_url = "http://market.local:9000".to_string();
        config.polling.interval_secs = 12;
        config.save(Some(path.clone())).unwrap();

        let loaded = Config::load(Some(path)).unwrap();
        assert_eq!(loaded.api.base_url, "http://market.local:9000");
        assert_eq!(loaded.polling.interval_secs, 12);
    }

    #[test]
    fn test_explicit_token_path_wins() {
        let session = SessionConfig {
            token_path: Some(PathBuf::from("/tmp/bluechip-token")),
        };
        assert_eq!(
            session.resolved_token_path().unwrap(),
            PathBuf::from("/tmp/bluechip-token")
        );
    }
}
