use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::status::{DEFAULT_INTERVAL_MS, DEFAULT_PHRASES};

/// Environment variable that overrides the configured service URL
pub const BASE_URL_ENV: &str = "SUPPORTLINE_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root URL of the chat service, without the `/api/...` path
    pub base_url: String,

    /// Give up on a request after this many seconds; unset means wait forever
    pub request_timeout_secs: Option<u64>,

    /// UI preferences
    pub ui: UiConfig,

    /// Supportline home directory
    #[serde(skip)]
    pub home: PathBuf,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub status_interval_ms: u64,
    pub status_phrases: Vec<String>,
    pub show_agent_labels: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: DEFAULT_INTERVAL_MS,
            status_phrases: DEFAULT_PHRASES.iter().map(|p| p.to_string()).collect(),
            show_agent_labels: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: None,
            ui: UiConfig::default(),
            home: home.join(".supportline"),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `~/.supportline/config.toml`
    /// when no path is given, then apply the environment override.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let defaults = Config::default();
                let default_path = defaults.home.join("config.toml");
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    defaults
                }
            }
        };

        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a config file; missing keys fall back to defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.home = Config::default().home;
        Ok(config)
    }

    /// Override the service URL (the `--base-url` flag)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self> {
        self.base_url = base_url.into();
        self.validate()?;
        Ok(self)
    }

    /// Reject values the client cannot work with
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("Invalid base_url '{}'", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("base_url must be http or https, got '{}'", url.scheme());
        }
        if self.request_timeout_secs == Some(0) {
            bail!("request_timeout_secs must be greater than zero, or left unset for no timeout");
        }
        if self.ui.status_interval_ms == 0 {
            bail!("ui.status_interval_ms must be greater than zero");
        }
        if self.ui.status_phrases.is_empty() {
            bail!("ui.status_phrases must contain at least one phrase");
        }
        Ok(())
    }

    /// Full URL of an API path on the configured service
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Where the tracing output goes while the TUI owns the terminal
    pub fn log_path(&self) -> PathBuf {
        self.home.join("supportline.log")
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout_secs, None);
        assert_eq!(config.ui.status_interval_ms, 1200);
        assert_eq!(config.ui.status_phrases.len(), 4);
        config.validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url = \"https://support.example.com\"").unwrap();
        writeln!(file, "[ui]").unwrap();
        writeln!(file, "show_agent_labels = false").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.base_url, "https://support.example.com");
        assert!(!config.ui.show_agent_labels);
        assert_eq!(config.ui.status_interval_ms, 1200);
        assert_eq!(config.ui.status_phrases[0], "Analyzing query");
    }

    #[test]
    fn garbage_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url = [").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::default().with_base_url("not a url").is_err());
        assert!(Config::default().with_base_url("ftp://example.com").is_err());

        let mut config = Config::default();
        config.ui.status_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ui.status_phrases.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = Config::default();
        config.request_timeout_secs = Some(0);
        assert!(config.validate().is_err());

        config.request_timeout_secs = Some(30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = Config::default().with_base_url("http://localhost:9000/").unwrap();
        assert_eq!(
            config.endpoint("/api/chat/messages"),
            "http://localhost:9000/api/chat/messages"
        );
        assert_eq!(config.endpoint("api/health"), "http://localhost:9000/api/health");
    }

    #[test]
    fn toml_round_trip_keeps_timeout() {
        let mut config = Config::default();
        config.request_timeout_secs = Some(30);
        let text = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.request_timeout_secs, Some(30));
    }
}
