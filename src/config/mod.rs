//! Configuration management for adminop

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::confirm::FailurePolicy;
use crate::error::{ConfigError, Result};

/// Environment variable overriding `api_url`
pub const API_URL_ENV: &str = "ADMINOP_API_URL";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the console backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Bearer token sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Directory holding the persistent cache (defaults to ~/.cache/adminop)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// User preferences
    #[serde(default)]
    pub preferences: Preferences,
}

/// User preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    /// Default page size for list screens
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Pause before typed search text is committed
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Staleness window for resources without their own
    #[serde(default = "default_stale_secs")]
    pub stale_secs: u64,

    /// Leave the delete confirmation open after a failed delete
    #[serde(default)]
    pub keep_dialog_open_on_failure: bool,
}

fn default_page_size() -> usize {
    10
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_stale_secs() -> u64 {
    60
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            debounce_ms: default_debounce_ms(),
            stale_secs: default_stale_secs(),
            keep_dialog_open_on_failure: false,
        }
    }
}

impl Preferences {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_secs)
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.keep_dialog_open_on_failure {
            FailurePolicy::KeepOpenOnFailure
        } else {
            FailurePolicy::CloseOnFailure
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".adminop").join("config.yaml"))
    }

    /// Config path to use: the override if given, else the default
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Self::default_path(),
        }
    }

    /// Load configuration from `path` or the default location, then apply
    /// environment overrides
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        let mut config = Self::load_from(&Self::resolve_path(path)?)?;
        config.apply_env();
        Ok(config)
    }

    /// Like [`Config::load_at`], but a missing file yields defaults
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        let resolved = Self::resolve_path(path)?;
        let mut config = if resolved.exists() {
            Self::load_from(&resolved)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;

        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_url = Some(url);
            }
        }
    }

    /// Save configuration to `path` or the default location
    pub fn save_at(&self, path: Option<&str>) -> Result<()> {
        self.save_to(&Self::resolve_path(path)?)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(path, contents)?;

        // Set file permissions to 600 on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.preferences.page_size == 0 {
            return Err(ConfigError::Invalid("preferences.page_size must be at least 1".to_string()).into());
        }
        Ok(())
    }

    /// Backend URL, required by every command that talks to the backend
    pub fn require_api_url(&self) -> Result<&str> {
        self.api_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiUrl.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.api_url.is_none());
        assert!(config.api_token.is_none());
        assert_eq!(config.preferences.page_size, 10);
        assert_eq!(config.preferences.debounce(), Duration::from_millis(500));
        assert_eq!(config.preferences.stale_time(), Duration::from_secs(60));
        assert_eq!(config.preferences.failure_policy(), FailurePolicy::CloseOnFailure);
    }

    #[test]
    fn test_partial_preferences_use_defaults() {
        let config: Config = serde_yaml::from_str(
            "api_url: http://localhost:8080/api\npreferences:\n  page_size: 25\n  keep_dialog_open_on_failure: true\n",
        )
        .unwrap();

        assert_eq!(config.preferences.page_size, 25);
        assert_eq!(config.preferences.debounce_ms, 500);
        assert_eq!(config.preferences.failure_policy(), FailurePolicy::KeepOpenOnFailure);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = Config {
            api_url: Some("http://localhost:8080/api".to_string()),
            api_token: Some("secret".to_string()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_url, config.api_url);
        assert_eq!(loaded.api_token, config.api_token);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = Config::load_from(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::NotFound)));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "preferences:\n  page_size: 0\n").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(Error::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_require_api_url() {
        let mut config = Config::default();
        assert!(matches!(
            config.require_api_url(),
            Err(Error::Config(ConfigError::MissingApiUrl))
        ));

        config.api_url = Some("http://x".to_string());
        assert_eq!(config.require_api_url().unwrap(), "http://x");
    }
}
