//! Client configuration and SDK identity.
//!
//! [`AdstractConfig`] holds every tunable of the client. It can be built in
//! code, or loaded from YAML:
//!
//! ```yaml
//! version: "1.0"
//! api_key: "sk-live-0123456789"    # optional, falls back to ADSTRACT_API_KEY
//! base_url: "https://api.adstract.ai"
//! timeout_secs: 100
//! retries: 1                       # capped at 1; larger values fall back to 0
//! backoff_factor_secs: 0.5
//! max_backoff_secs: 8
//! wrapping_type: "xml"             # or "plain"
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use analytics::WrappingType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AdSdkError;
use crate::retry::RetryConfig;

pub const SDK_NAME: &str = "adstractai-rust";
/// Baked in from the crate version at build time.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SDK_TYPE: &str = "web";

pub const DEFAULT_BASE_URL: &str = "https://api.adstract.ai";
pub const AD_INJECTION_ENDPOINT: &str = "/api/ad-injection/start/";
pub const AD_ACK_ENDPOINT: &str = "/api/ad-ack/ad-ack/create/";

pub const API_KEY_ENV: &str = "ADSTRACT_API_KEY";
pub const BASE_URL_ENV: &str = "ADSTRACT_DEBUG_URL";

pub const SDK_HEADER_NAME: &str = "X-Adstract-SDK";
pub const SDK_VERSION_HEADER_NAME: &str = "X-Adstract-SDK-Version";
pub const API_KEY_HEADER_NAME: &str = "X-Adstract-API-Key";

pub const MIN_API_KEY_LEN: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: f64 = 100.0;
pub const DEFAULT_RETRIES: u32 = 0;
pub const MAX_RETRIES: u32 = 1;
pub const DEFAULT_BACKOFF_FACTOR_SECS: f64 = 0.5;
pub const DEFAULT_MAX_BACKOFF_SECS: f64 = 8.0;

/// Most ads a response may contain and still satisfy policy.
pub const DEFAULT_MAX_ADS: usize = 1;
/// Slowest service execution time, in milliseconds, that satisfies policy.
pub const DEFAULT_MAX_LATENCY_MS: f64 = 1000.0;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Settings for an [`Adstract`](crate::Adstract) client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AdstractConfig {
    /// Configuration format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Falls back to `ADSTRACT_API_KEY` when absent.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Falls back to `ADSTRACT_DEBUG_URL`, then the production endpoint.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Extra attempts after the first. Values above [`MAX_RETRIES`] fall back
    /// to [`DEFAULT_RETRIES`].
    #[serde(default)]
    pub retries: u32,

    #[serde(default = "default_backoff_factor_secs")]
    pub backoff_factor_secs: f64,

    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: f64,

    #[serde(default)]
    pub wrapping_type: WrappingType,
}

impl Default for AdstractConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            api_key: None,
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
            backoff_factor_secs: DEFAULT_BACKOFF_FACTOR_SECS,
            max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
            wrapping_type: WrappingType::default(),
        }
    }
}

impl AdstractConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: AdstractConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_backoff(mut self, backoff_factor_secs: f64, max_backoff_secs: f64) -> Self {
        self.backoff_factor_secs = backoff_factor_secs;
        self.max_backoff_secs = max_backoff_secs;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: f64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_wrapping_type(mut self, wrapping_type: WrappingType) -> Self {
        self.wrapping_type = wrapping_type;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => {}
            v => return Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }
        match Duration::try_from_secs_f64(self.timeout_secs) {
            Ok(timeout) if !timeout.is_zero() => {}
            _ => {
                return Err(ConfigLoadError::Validation(
                    "timeout_secs must be a positive number of seconds".into(),
                ));
            }
        }
        for (name, value) in [
            ("backoff_factor_secs", self.backoff_factor_secs),
            ("max_backoff_secs", self.max_backoff_secs),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigLoadError::Validation(format!(
                    "{name} must be a non-negative number of seconds"
                )));
            }
        }
        Ok(())
    }

    /// API key from the config, else from the environment.
    pub fn resolve_api_key(&self) -> Result<String, AdSdkError> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Same as [`AdstractConfig::resolve_api_key`] with a custom variable lookup.
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Result<String, AdSdkError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = match &self.api_key {
            Some(key) => Some(key.clone()),
            None => lookup(API_KEY_ENV),
        };
        match key {
            Some(key) if key.trim().chars().count() >= MIN_API_KEY_LEN => Ok(key),
            _ => Err(AdSdkError::Validation(format!(
                "api_key must be at least {MIN_API_KEY_LEN} characters"
            ))),
        }
    }

    /// Base URL from the config, else from the environment, else production.
    pub fn resolve_base_url(&self) -> String {
        self.resolve_base_url_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_base_url_with<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        self.base_url
            .clone()
            .filter(|url| !url.is_empty())
            .or_else(|| lookup(BASE_URL_ENV).filter(|url| !url.is_empty()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn effective_retries(&self) -> u32 {
        if self.retries <= MAX_RETRIES {
            self.retries
        } else {
            DEFAULT_RETRIES
        }
    }

    /// Falls back to the default for values [`validate`](Self::validate) rejects.
    pub fn timeout(&self) -> Duration {
        secs_or(self.timeout_secs, DEFAULT_TIMEOUT_SECS)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.effective_retries(),
            backoff_factor: secs_or(self.backoff_factor_secs, DEFAULT_BACKOFF_FACTOR_SECS),
            max_backoff: secs_or(self.max_backoff_secs, DEFAULT_MAX_BACKOFF_SECS),
        }
    }
}

fn secs_or(secs: f64, default_secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::from_secs_f64(default_secs))
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_timeout_secs() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_backoff_factor_secs() -> f64 {
    DEFAULT_BACKOFF_FACTOR_SECS
}

fn default_max_backoff_secs() -> f64 {
    DEFAULT_MAX_BACKOFF_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults() {
        let cfg = AdstractConfig::default();
        assert_eq!(cfg.timeout(), Duration::from_secs(100));
        assert_eq!(cfg.effective_retries(), 0);
        assert_eq!(cfg.wrapping_type, WrappingType::Xml);
        assert_eq!(cfg.resolve_base_url_with(no_env), DEFAULT_BASE_URL);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn retries_above_cap_fall_back_to_default() {
        assert_eq!(AdstractConfig::default().with_retries(1).effective_retries(), 1);
        assert_eq!(AdstractConfig::default().with_retries(5).effective_retries(), 0);
    }

    #[test]
    fn retry_config_uses_effective_retries() {
        let rc = AdstractConfig::default()
            .with_retries(1)
            .with_backoff(0.25, 2.0)
            .retry_config();
        assert_eq!(rc.max_retries, 1);
        assert_eq!(rc.backoff_factor, Duration::from_millis(250));
        assert_eq!(rc.max_backoff, Duration::from_secs(2));
    }

    #[test]
    fn api_key_from_config_wins_over_env() {
        let cfg = AdstractConfig::default().with_api_key("config-key-123");
        let key = cfg
            .resolve_api_key_with(|_| Some("env-key-4567890".into()))
            .unwrap();
        assert_eq!(key, "config-key-123");
    }

    #[test]
    fn api_key_falls_back_to_env() {
        let cfg = AdstractConfig::default();
        let key = cfg
            .resolve_api_key_with(|name| (name == API_KEY_ENV).then(|| "env-key-4567890".into()))
            .unwrap();
        assert_eq!(key, "env-key-4567890");
        assert!(cfg.resolve_api_key_with(no_env).is_err());
    }

    #[test]
    fn short_or_blank_api_key_is_rejected() {
        let cfg = AdstractConfig::default().with_api_key("   short   ");
        let err = cfg.resolve_api_key_with(no_env).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn base_url_resolution_order() {
        let env = |name: &str| (name == BASE_URL_ENV).then(|| "http://debug.local".to_string());
        assert_eq!(AdstractConfig::default().resolve_base_url_with(env), "http://debug.local");
        let cfg = AdstractConfig::default().with_base_url("http://explicit.local");
        assert_eq!(cfg.resolve_base_url_with(env), "http://explicit.local");
    }

    #[test]
    fn yaml_roundtrip() {
        let yaml = r#"
version: "1.0"
api_key: "yaml-key-0123456"
timeout_secs: 5
retries: 1
wrapping_type: plain
"#;
        let cfg = AdstractConfig::from_yaml(yaml).unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("yaml-key-0123456"));
        assert_eq!(cfg.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.wrapping_type, WrappingType::Plain);
        assert_eq!(cfg.backoff_factor_secs, DEFAULT_BACKOFF_FACTOR_SECS);
    }

    #[test]
    fn yaml_rejects_unknown_wrapping_type() {
        let err = AdstractConfig::from_yaml("wrapping_type: html\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::YamlParse(_)));
    }

    #[test]
    fn yaml_rejects_bad_values() {
        assert!(matches!(
            AdstractConfig::from_yaml("version: \"2.0\"\n").unwrap_err(),
            ConfigLoadError::UnsupportedVersion(_)
        ));
        assert!(matches!(
            AdstractConfig::from_yaml("timeout_secs: 0\n").unwrap_err(),
            ConfigLoadError::Validation(_)
        ));
    }

    #[test]
    fn unrepresentable_durations_are_rejected() {
        for yaml in [
            "timeout_secs: 1.0e300\n",
            "backoff_factor_secs: 1.0e300\n",
            "max_backoff_secs: -1\n",
        ] {
            assert!(matches!(
                AdstractConfig::from_yaml(yaml).unwrap_err(),
                ConfigLoadError::Validation(_)
            ));
        }

        let cfg = AdstractConfig::default().with_timeout_secs(1e300);
        assert!(cfg.validate().is_err());
        assert_eq!(cfg.timeout(), Duration::from_secs(100));
    }

    #[test]
    fn from_file_reads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adstract.yaml");
        std::fs::write(&path, "retries: 1\n").unwrap();
        let cfg = AdstractConfig::from_file(&path).unwrap();
        assert_eq!(cfg.retries, 1);
        assert!(AdstractConfig::from_file(dir.path().join("missing.yaml")).is_err());
    }
}
