//! Gateway configuration.
//!
//! Configuration precedence (later wins):
//! 1. Defaults
//! 2. Global config file (`~/.shearline/config.toml`)
//! 3. Local config file (`./.shearlinerc`)
//! 4. Environment variables (`SHEARLINE_API_URL`, `SHEARLINE_TIMEOUT_SECS`,
//!    `SHEARLINE_CREDENTIALS`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::refresh::DEFAULT_REFRESH_PATH;

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Gateway configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL every request path is joined onto.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request timeout in seconds, refresh calls included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Path of the token refresh endpoint.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Credentials file (defaults to `~/.shearline/credentials.json`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            refresh_path: default_refresh_path(),
            credentials_path: None,
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Partial configuration as found in one file; unset fields leave the base alone.
#[derive(Debug, Default, Deserialize)]
struct ConfigLayer {
    api_url: Option<String>,
    timeout_secs: Option<u64>,
    refresh_path: Option<String>,
    credentials_path: Option<PathBuf>,
}

impl GatewayConfig {
    /// Load configuration from a TOML file. Missing fields take defaults.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let mut config = Self::default();
        config.merge(Self::read_layer(path)?);
        Ok(config)
    }

    fn read_layer(path: &Path) -> ConfigResult<ConfigLayer> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".shearline")
            .join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".shearlinerc")
    }

    /// Discover and load configuration from files and the environment.
    ///
    /// Unreadable or missing files are skipped; the result is validated.
    pub fn discover_and_load() -> ConfigResult<Self> {
        let mut config = Self::default();

        for path in [Self::default_global_path(), Self::default_local_path()] {
            match Self::read_layer(&path) {
                Ok(layer) => config.merge(layer),
                Err(ConfigError::NotFound(_)) => {}
                Err(e) => warn!(error = %e, "Skipping configuration file"),
            }
        }

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides exactly the fields `layer` sets, even when a value equals
    /// the default.
    fn merge(&mut self, layer: ConfigLayer) {
        if let Some(api_url) = layer.api_url {
            self.api_url = api_url;
        }
        if let Some(timeout_secs) = layer.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
        if let Some(refresh_path) = layer.refresh_path {
            self.refresh_path = refresh_path;
        }
        if let Some(credentials_path) = layer.credentials_path {
            self.credentials_path = Some(credentials_path);
        }
    }

    /// Override fields from `SHEARLINE_*` environment variables.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(api_url) = var("SHEARLINE_API_URL") {
            self.api_url = api_url;
        }
        if let Some(timeout) = var("SHEARLINE_TIMEOUT_SECS") {
            self.timeout_secs = timeout.trim().parse().map_err(|_| {
                ConfigError::InvalidValue(format!("SHEARLINE_TIMEOUT_SECS={}", timeout))
            })?;
        }
        if let Some(path) = var("SHEARLINE_CREDENTIALS") {
            self.credentials_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> ConfigResult<()> {
        let url = self.api_url.trim();
        if url.is_empty() {
            return Err(ConfigError::InvalidValue("api_url is empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(format!(
                "api_url must start with http:// or https://: {}",
                url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("timeout_secs must be positive".to_string()));
        }
        if !self.refresh_path.starts_with('/') {
            return Err(ConfigError::InvalidValue(format!(
                "refresh_path must start with '/': {}",
                self.refresh_path
            )));
        }
        Ok(())
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = GatewayConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.refresh_path, "/auth/refresh");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config_content = r#"
api_url = "https://api.shearline.app"
timeout_secs = 10
credentials_path = "/tmp/shearline/credentials.json"
"#;

        std::fs::write(&config_path, config_content).unwrap();

        let config = GatewayConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.api_url, "https://api.shearline.app");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.refresh_path, DEFAULT_REFRESH_PATH);
        assert_eq!(
            config.credentials_path,
            Some(PathBuf::from("/tmp/shearline/credentials.json"))
        );
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = GatewayConfig::load_from_file(&temp_dir.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "api_url = [").unwrap();

        let result = GatewayConfig::load_from_file(&config_path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_merge_overrides_only_set_fields() {
        let temp_dir = TempDir::new().unwrap();
        let global_path = temp_dir.path().join("config.toml");
        let local_path = temp_dir.path().join(".shearlinerc");
        std::fs::write(
            &global_path,
            "api_url = \"https://staging.shearline.app/api\"\ntimeout_secs = 60\n",
        )
        .unwrap();
        std::fs::write(&local_path, "timeout_secs = 30\n").unwrap();

        let mut config = GatewayConfig::load_from_file(&global_path).unwrap();
        config.merge(GatewayConfig::read_layer(&local_path).unwrap());

        assert_eq!(config.api_url, "https://staging.shearline.app/api");
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.refresh_path, DEFAULT_REFRESH_PATH);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SHEARLINE_API_URL", "https://env.shearline.app"),
            ("SHEARLINE_TIMEOUT_SECS", "7"),
            ("SHEARLINE_CREDENTIALS", "/var/lib/shear/creds.json"),
        ]);
        let mut config = GatewayConfig::default();

        config.apply_vars(|name| vars.get(name).map(|v| (*v).to_string())).unwrap();

        assert_eq!(config.api_url, "https://env.shearline.app");
        assert_eq!(config.timeout_secs, 7);
        assert_eq!(config.credentials_path, Some(PathBuf::from("/var/lib/shear/creds.json")));
    }

    #[test]
    fn test_env_rejects_bad_timeout() {
        let mut config = GatewayConfig::default();
        let result = config.apply_vars(|name| {
            (name == "SHEARLINE_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_url = GatewayConfig { api_url: "ftp://example.com".to_string(), ..Default::default() };
        assert!(bad_url.validate().is_err());

        let zero_timeout = GatewayConfig { timeout_secs: 0, ..Default::default() };
        assert!(zero_timeout.validate().is_err());

        let bad_path = GatewayConfig { refresh_path: "auth/refresh".to_string(), ..Default::default() };
        assert!(bad_path.validate().is_err());
    }
}
