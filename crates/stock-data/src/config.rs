//! Configuration for the stock data provider

use crate::error::{Result, StockError};
use std::path::PathBuf;
use std::time::Duration;

/// Default Alpha Vantage query endpoint
pub const ALPHA_VANTAGE_BASE_URL: &str = "https://www.alphavantage.co/query";

/// Configuration for the stock data provider.
///
/// Built once by the caller and handed to the provider; nothing below the
/// provider reads the environment.
#[derive(Debug, Clone)]
pub struct StockConfig {
    /// Alpha Vantage API key. Without one the primary source is skipped.
    pub alpha_vantage_api_key: Option<String>,

    /// How long a cache entry stays fresh after it was written
    pub cache_duration: Duration,

    /// Directory holding one JSON file per ticker
    pub cache_dir: PathBuf,

    /// Upper bound for each remote call
    pub request_timeout: Duration,

    /// Alpha Vantage requests allowed per minute
    pub alpha_vantage_rate_limit: u32,

    /// Lookback window for the secondary source, in days
    pub history_lookback_days: u32,

    /// Alpha Vantage query endpoint
    pub alpha_vantage_base_url: String,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            alpha_vantage_api_key: None,
            cache_duration: Duration::from_secs(3600),   // 1 hour
            cache_dir: PathBuf::from("./data/cache"),
            request_timeout: Duration::from_secs(30),
            alpha_vantage_rate_limit: 5,                 // free tier
            history_lookback_days: 730,                  // 2 years
            alpha_vantage_base_url: ALPHA_VANTAGE_BASE_URL.to_string(),
        }
    }
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Defaults overlaid with `ALPHA_VANTAGE_API_KEY`, `CACHE_DURATION`
    /// (seconds) and `CACHE_DIRECTORY`.
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env()?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.alpha_vantage_rate_limit == 0 {
            return Err(StockError::ConfigError(
                "alpha_vantage_rate_limit must be greater than 0".to_string(),
            ));
        }

        if self.history_lookback_days == 0 {
            return Err(StockError::ConfigError(
                "history_lookback_days must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(StockError::ConfigError(
                "request_timeout must be non-zero".to_string(),
            ));
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(StockError::ConfigError(
                "cache_dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// The API key, if one is set and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.alpha_vantage_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    alpha_vantage_api_key: Option<String>,
    cache_duration: Option<Duration>,
    cache_dir: Option<PathBuf>,
    request_timeout: Option<Duration>,
    alpha_vantage_rate_limit: Option<u32>,
    history_lookback_days: Option<u32>,
    alpha_vantage_base_url: Option<String>,
}

impl StockConfigBuilder {
    /// Set Alpha Vantage API key
    pub fn alpha_vantage_api_key(mut self, key: impl Into<String>) -> Self {
        self.alpha_vantage_api_key = Some(key.into());
        self
    }

    /// Set cache freshness window
    pub fn cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = Some(duration);
        self
    }

    /// Set cache directory
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set Alpha Vantage requests per minute
    pub fn alpha_vantage_rate_limit(mut self, per_minute: u32) -> Self {
        self.alpha_vantage_rate_limit = Some(per_minute);
        self
    }

    /// Set secondary source lookback in days
    pub fn history_lookback_days(mut self, days: u32) -> Self {
        self.history_lookback_days = Some(days);
        self
    }

    /// Point the primary source at a different endpoint
    pub fn alpha_vantage_base_url(mut self, url: impl Into<String>) -> Self {
        self.alpha_vantage_base_url = Some(url.into());
        self
    }

    /// Fill unset fields from the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|name| std::env::var(name).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if self.alpha_vantage_api_key.is_none() {
            self.alpha_vantage_api_key = var("ALPHA_VANTAGE_API_KEY");
        }

        if self.cache_duration.is_none() {
            if let Some(raw) = var("CACHE_DURATION") {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    StockError::ConfigError(format!(
                        "CACHE_DURATION must be a whole number of seconds, got {raw:?}"
                    ))
                })?;
                self.cache_duration = Some(Duration::from_secs(secs));
            }
        }

        if self.cache_dir.is_none() {
            self.cache_dir = var("CACHE_DIRECTORY")
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from);
        }

        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let defaults = StockConfig::default();

        let config = StockConfig {
            alpha_vantage_api_key: self.alpha_vantage_api_key,
            cache_duration: self.cache_duration.unwrap_or(defaults.cache_duration),
            cache_dir: self.cache_dir.unwrap_or(defaults.cache_dir),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            alpha_vantage_rate_limit: self
                .alpha_vantage_rate_limit
                .unwrap_or(defaults.alpha_vantage_rate_limit),
            history_lookback_days: self
                .history_lookback_days
                .unwrap_or(defaults.history_lookback_days),
            alpha_vantage_base_url: self
                .alpha_vantage_base_url
                .unwrap_or(defaults.alpha_vantage_base_url),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = StockConfig::default();
        assert_eq!(config.cache_duration, Duration::from_secs(3600));
        assert_eq!(config.cache_dir, PathBuf::from("./data/cache"));
        assert_eq!(config.history_lookback_days, 730);
        assert!(config.api_key().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = StockConfig::builder()
            .alpha_vantage_api_key("demo")
            .cache_duration(Duration::from_secs(60))
            .request_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(config.api_key(), Some("demo"));
        assert_eq!(config.cache_duration, Duration::from_secs(60));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let config = StockConfig::builder()
            .alpha_vantage_api_key("   ")
            .build()
            .unwrap();
        assert!(config.api_key().is_none());
    }

    #[test]
    fn test_validation_rejects_zero_rate_limit() {
        let config = StockConfig {
            alpha_vantage_rate_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overlay() {
        let config = StockConfig::builder()
            .with_vars(vars(&[
                ("ALPHA_VANTAGE_API_KEY", "abc"),
                ("CACHE_DURATION", "120"),
                ("CACHE_DIRECTORY", "/tmp/stock-cache"),
            ]))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.api_key(), Some("abc"));
        assert_eq!(config.cache_duration, Duration::from_secs(120));
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/stock-cache"));
    }

    #[test]
    fn test_explicit_values_beat_env() {
        let config = StockConfig::builder()
            .cache_duration(Duration::from_secs(10))
            .with_vars(vars(&[("CACHE_DURATION", "120")]))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.cache_duration, Duration::from_secs(10));
    }

    #[test]
    fn test_env_rejects_bad_duration() {
        let result = StockConfig::builder().with_vars(vars(&[("CACHE_DURATION", "1h")]));
        assert!(matches!(result, Err(StockError::ConfigError(_))));
    }
}
