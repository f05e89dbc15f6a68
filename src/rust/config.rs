use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::DashboardError;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const API_URL_ENV: &str = "MLPIPE_API_URL";
pub const TIMEOUT_ENV: &str = "MLPIPE_TIMEOUT_SECS";
pub const CONFIG_PATH_ENV: &str = "MLPIPE_CONFIG";

/// Settings needed to reach the inference service.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Base URL without a trailing slash
    pub api_url: String,
    /// Client-side request timeout. `None` leaves failure detection to the transport.
    pub timeout: Option<Duration>,
}

/// Shape of the optional TOML config file.
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: None,
        }
    }
}

impl DashboardConfig {
    /// Creates a config for the given base URL with no timeout
    pub fn new(api_url: &str) -> Result<Self, DashboardError> {
        Ok(Self {
            api_url: normalize_base_url(api_url)?,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the config file location
    pub fn default_config_path() -> Option<PathBuf> {
        // 1. Check environment variable
        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }

        // 2. Use platform-specific config directory
        if let Some(config_dir) = dirs::config_dir() {
            return Some(config_dir.join("mlpipe").join("config.toml"));
        }

        // 3. Fallback to user's home directory
        dirs::home_dir().map(|home| home.join(".config").join("mlpipe").join("config.toml"))
    }

    /// Resolves the config from the CLI flag, the environment, the config
    /// file and the built-in default, first hit wins.
    pub fn load(cli_api_url: Option<String>) -> Result<Self, DashboardError> {
        let file = match Self::default_config_path() {
            Some(path) => read_file_config(&path)?,
            None => None,
        };
        Self::from_sources(
            cli_api_url,
            env::var(API_URL_ENV).ok(),
            env::var(TIMEOUT_ENV).ok(),
            file,
        )
    }

    pub fn from_sources(
        cli_api_url: Option<String>,
        env_api_url: Option<String>,
        env_timeout: Option<String>,
        file: Option<FileConfig>,
    ) -> Result<Self, DashboardError> {
        let file = file.unwrap_or_default();

        let api_url = cli_api_url
            .or(env_api_url)
            .or(file.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout_secs = match env_timeout {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                DashboardError::Config(format!("{} must be a whole number of seconds, got {:?}", TIMEOUT_ENV, raw))
            })?),
            None => file.timeout_secs,
        };

        let mut config = Self::new(&api_url)?;
        config.timeout = timeout_secs.filter(|s| *s > 0).map(Duration::from_secs);
        log::info!("Using inference service at {}", config.api_url);
        Ok(config)
    }
}

/// Reads the TOML config file. A missing file is not an error.
pub fn read_file_config(path: &Path) -> Result<Option<FileConfig>, DashboardError> {
    if !path.exists() {
        log::debug!("No config file at {:?}", path);
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    let parsed = toml::from_str::<FileConfig>(&raw)
        .map_err(|e| DashboardError::Config(format!("invalid config file {:?}: {}", path, e)))?;
    log::info!("Loaded config file {:?}", path);
    Ok(Some(parsed))
}

/// Trims whitespace and trailing slashes and checks the scheme.
pub fn normalize_base_url(url: &str) -> Result<String, DashboardError> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(DashboardError::Config("API base URL is empty".to_string()));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(DashboardError::Config(format!(
            "API base URL must start with http:// or https://, got {:?}",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_when_nothing_set() {
        let config = DashboardConfig::from_sources(None, None, None, None).unwrap();
        assert_eq!(config, DashboardConfig::default());
    }

    #[test]
    fn test_precedence() {
        let file = FileConfig {
            api_url: Some("http://file:1".to_string()),
            timeout_secs: Some(7),
        };
        let config = DashboardConfig::from_sources(
            Some("http://cli:3/".to_string()),
            Some("http://env:2".to_string()),
            None,
            Some(file.clone()),
        )
        .unwrap();
        assert_eq!(config.api_url, "http://cli:3");
        assert_eq!(config.timeout, Some(Duration::from_secs(7)));

        let config = DashboardConfig::from_sources(None, Some("http://env:2".to_string()), Some("3".to_string()), Some(file.clone())).unwrap();
        assert_eq!(config.api_url, "http://env:2");
        assert_eq!(config.timeout, Some(Duration::from_secs(3)));

        let config = DashboardConfig::from_sources(None, None, None, Some(file)).unwrap();
        assert_eq!(config.api_url, "http://file:1");
    }

    #[test]
    fn test_bad_timeout() {
        let result = DashboardConfig::from_sources(None, None, Some("soon".to_string()), None);
        assert!(matches!(result, Err(DashboardError::Config(_))));
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url(" http://localhost:5000// ").unwrap(), "http://localhost:5000");
        assert!(normalize_base_url("").is_err());
        assert!(normalize_base_url("localhost:5000").is_err());
    }

    #[test]
    fn test_read_file_config() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        assert!(read_file_config(&path)?.is_none());

        fs::write(&path, "api_url = \"https://ml.internal:8443\"\ntimeout_secs = 30\n")?;
        let parsed = read_file_config(&path)?.unwrap();
        assert_eq!(parsed.api_url.as_deref(), Some("https://ml.internal:8443"));
        assert_eq!(parsed.timeout_secs, Some(30));

        fs::write(&path, "api_url = [")?;
        assert!(matches!(read_file_config(&path), Err(DashboardError::Config(_))));
        Ok(())
    }
}
