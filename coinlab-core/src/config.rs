//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so a config file only needs to name what it
//! overrides:
//!
//! ```toml
//! data_dir = "/var/lib/coinlab"
//! max_entities = 50
//! rate_limit_delay_ms = 2000
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for the ingestion pipeline and its fetch strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the persisted datasets.
    pub data_dir: PathBuf,
    /// Target number of tracked entities.
    pub max_entities: usize,
    /// Entities below this market cap are dropped by the validity filter.
    pub min_market_cap: f64,
    /// Entities below this 24h volume are dropped by the validity filter.
    pub min_volume: f64,
    /// Symbol substrings (case-insensitive) excluded from tracking.
    pub stable_denylist: Vec<String>,
    /// Catalog page size.
    pub page_size: u32,
    /// Pause between catalog pages.
    pub page_delay_ms: u64,
    /// Pause after each historical request and between fill-stage entities.
    pub rate_limit_delay_ms: u64,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    /// Retries after a transient HTTP failure (0 = single attempt).
    pub max_retries: u32,
    /// First retry backoff; doubles on each further attempt.
    pub retry_base_delay_ms: u64,
    /// How long the market-data circuit breaker stays open once tripped.
    pub breaker_cooldown_secs: u64,
    /// Provider-side daily history window.
    pub history_limit: u32,
    /// Quote currency for bars and snapshots.
    pub quote_currency: String,
    /// Base URL of the ranked symbol catalog.
    pub catalog_url: String,
    /// Base URL of the OHLCV / quote provider.
    pub market_data_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            max_entities: 100,
            min_market_cap: 500_000.0,
            min_volume: 10_000.0,
            stable_denylist: ["usdt", "usdc", "busd", "dai"]
                .into_iter()
                .map(String::from)
                .collect(),
            page_size: 250,
            page_delay_ms: 1000,
            rate_limit_delay_ms: 1000,
            request_timeout_secs: 30,
            max_retries: 1,
            retry_base_delay_ms: 500,
            breaker_cooldown_secs: 30 * 60,
            history_limit: 2000,
            quote_currency: "USD".into(),
            catalog_url: "https://api.coingecko.com/api/v3".into(),
            market_data_url: "https://min-api.cryptocompare.com/data".into(),
        }
    }
}

impl PipelineConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the config to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entities == 0 {
            return Err(ConfigError::Invalid("max_entities must be >= 1".into()));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be >= 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be >= 1".into(),
            ));
        }
        Ok(())
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }
}
