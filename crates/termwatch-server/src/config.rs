//! Configuration file parsing for the Termwatch service.
//!
//! Loads settings from TOML files (bind address, feed endpoints, default
//! matching options, stop grace period and results path) and applies the
//! environment overrides the service has always honoured.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use termwatch_domain::{language, MatchOptions};
use termwatch_feeds::http::{DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT_SECS};
use termwatch_worker::DEFAULT_STOP_GRACE_PERIOD;
use thiserror::Error;

/// Service configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// A value could not be used
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// Setting or environment variable name
        key: String,
        /// What is wrong with it
        message: String,
    },
}

/// Service configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Bind address (e.g., "0.0.0.0")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Bind port (default: 8000)
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// Default log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Upstream feeds
    #[serde(default)]
    pub feeds: FeedsConfig,

    /// Matching defaults for runs that do not set them
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Worker lifecycle settings
    #[serde(default)]
    pub worker: WorkerSettings,

    /// Where extraction records go
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where alerts and terms come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// Upstream HTTP feeds
    #[default]
    Http,
    /// Fixed pages loaded once from JSON files
    Static,
}

/// Upstream feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedsConfig {
    /// Feed mode
    #[serde(default)]
    pub mode: FeedMode,

    /// API key sent as the `key` query parameter
    #[serde(default)]
    pub api_key: String,

    /// Alert text endpoint
    #[serde(default = "default_alerts_url")]
    pub alerts_url: String,

    /// Query term endpoint
    #[serde(default = "default_terms_url")]
    pub terms_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per fetch (1 = no retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// JSON file with the alert page (static mode)
    #[serde(default)]
    pub alerts_file: Option<PathBuf>,

    /// JSON file with the term page (static mode)
    #[serde(default)]
    pub terms_file: Option<PathBuf>,
}

/// Matching defaults
#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Match terms in supplied order
    #[serde(default)]
    pub keep_order: bool,

    /// Only match content in this language
    #[serde(default)]
    pub language: Option<String>,

    /// Match each term only against content in its own language (default: true)
    #[serde(default = "default_by_term_language")]
    pub by_term_language: bool,
}

/// Worker lifecycle settings
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    /// How long a stop request waits for the run to exit
    #[serde(default = "default_stop_grace_period_ms")]
    pub stop_grace_period_ms: u64,
}

/// Output settings
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Line-delimited JSON file that receives one record per iteration
    #[serde(default = "default_results_path")]
    pub results_path: PathBuf,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_bind_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_alerts_url() -> String {
    "https://services.prewave.ai/adminInterface/api/testAlerts".to_string()
}

fn default_terms_url() -> String {
    "https://services.prewave.ai/adminInterface/api/testQueryTerm".to_string()
}

fn default_by_term_language() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_stop_grace_period_ms() -> u64 {
    DEFAULT_STOP_GRACE_PERIOD.as_millis() as u64
}

fn default_results_path() -> PathBuf {
    PathBuf::from(".logs/extracted_alerts.jsonl")
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            log_level: default_log_level(),
            feeds: FeedsConfig::default(),
            matching: MatchingConfig::default(),
            worker: WorkerSettings::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            mode: FeedMode::default(),
            api_key: String::new(),
            alerts_url: default_alerts_url(),
            terms_url: default_terms_url(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            alerts_file: None,
            terms_file: None,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            keep_order: false,
            language: None,
            by_term_language: default_by_term_language(),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            stop_grace_period_ms: default_stop_grace_period_ms(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_path: default_results_path(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`
    ///
    /// Recognised variables: `ALERT_API_KEY`, `ALERT_TEXT_API_URL`,
    /// `ALERT_TERMS_API_URL`, `HOST_PORT`, `MATCH_LANGUAGE` and
    /// `FILTER_BY_LANGUAGE`. `FILTER_BY_LANGUAGE=true` matches every term
    /// against content in its own language; `false` switches all language
    /// filtering off.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("ALERT_API_KEY") {
            self.feeds.api_key = key;
        }
        if let Some(url) = lookup("ALERT_TEXT_API_URL") {
            self.feeds.alerts_url = url;
        }
        if let Some(url) = lookup("ALERT_TERMS_API_URL") {
            self.feeds.terms_url = url;
        }
        if let Some(port) = lookup("HOST_PORT") {
            self.bind_port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "HOST_PORT".to_string(),
                message: format!("'{}' is not a port number", port),
            })?;
        }
        if let Some(code) = lookup("MATCH_LANGUAGE") {
            self.matching.language = Some(code);
        }
        if let Some(flag) = lookup("FILTER_BY_LANGUAGE") {
            let enabled = parse_flag("FILTER_BY_LANGUAGE", &flag)?;
            self.matching.by_term_language = enabled;
            if !enabled {
                self.matching.language = None;
            }
        }
        Ok(())
    }

    /// Check settings that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(code) = &self.matching.language {
            if !language::is_valid(code) {
                return Err(ConfigError::InvalidValue {
                    key: "matching.language".to_string(),
                    message: format!("'{}' is not a 2-3 letter language code", code),
                });
            }
        }

        match self.feeds.mode {
            FeedMode::Http => {
                if self.feeds.api_key.is_empty() {
                    return Err(ConfigError::MissingField("feeds.api_key".to_string()));
                }
                if self.feeds.max_attempts == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "feeds.max_attempts".to_string(),
                        message: "must be at least 1".to_string(),
                    });
                }
            }
            FeedMode::Static => {}
        }

        Ok(())
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }

    /// Matching options applied when a start request leaves them out
    pub fn default_match_options(&self) -> MatchOptions {
        MatchOptions {
            keep_order: self.matching.keep_order,
            language: self.matching.language.clone(),
            by_term_language: self.matching.by_term_language,
        }
    }

    /// Stop grace period as a Duration
    pub fn stop_grace_period(&self) -> Duration {
        Duration::from_millis(self.worker.stop_grace_period_ms)
    }

    /// Configuration for local runs and tests: static feeds, no credentials
    pub fn default_test_config() -> Self {
        let mut config = Self::default();
        config.bind_address = "127.0.0.1".to_string();
        config.feeds.mode = FeedMode::Static;
        config
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{}' is not a boolean", value),
        }),
    }
}
