//! Collector configuration: parsing, normalization, and validation.
//!
//! The TOML file describes the tracked assets, the collector cadence and key
//! layout, the rate-limit retry, the CoinGecko plan, and the storage backend.
//! Every section is optional; omitted values fall back to [`Config::default`],
//! which tracks `bitcoin` and `ethereum` into a local `data/` directory.
//!
//! Normalization trims and lowercases asset ids and rejects duplicates after
//! normalization. Validation failures are fatal: the process must not start
//! collecting with a half-valid configuration.
//!
//! Two environment variables override the file: [`INTERVAL_ENV`] replaces
//! `collector.interval_secs` and [`DATA_ROOT_ENV`] replaces the local storage
//! root.
//!
//! Entrypoints:
//! - Parse + validate from a TOML string: [`load_config_str`]
//! - Parse + validate from a file path: [`load_config_path`]

use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::{NaiveDate, Utc};
use indexmap::IndexMap;
use quote_ingestor::{
    models::asset::Asset,
    providers::{
        ProviderInitError,
        coingecko::{ApiTier, CoinGeckoConfig, CoinGeckoProvider, provider::API_KEY_VAR},
        retry::RateLimitRetry,
        yahoo_chart::YahooChartProvider,
    },
};
use serde::{Deserialize, Serialize};
use shared_utils::env::{get_env_var_opt, parse_env_var};

use crate::store::{
    BlobStore, KeyLayout, LocalStore, ObjectStoreBlob, RealtimeLayout, StoreError,
};

/// Overrides `collector.interval_secs`.
pub const INTERVAL_ENV: &str = "PRICE_SYNC_INTERVAL_SECS";

/// Overrides `storage.root` of the local backend.
pub const DATA_ROOT_ENV: &str = "PRICE_SYNC_DATA_ROOT";

/// Fatal startup errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing credential: environment variable {name} is not set")]
    MissingCredential { name: &'static str },

    #[error("failed to initialise provider: {0}")]
    Provider(#[source] ProviderInitError),

    #[error("failed to open storage: {0}")]
    Store(#[from] StoreError),
}

impl From<ProviderInitError> for ConfigError {
    fn from(err: ProviderInitError) -> Self {
        match err {
            ProviderInitError::MissingEnvVar { .. } => {
                ConfigError::MissingCredential { name: API_KEY_VAR }
            }
            other => ConfigError::Provider(other),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub collector: CollectorCfg,
    pub rate_limit: RateLimitCfg,
    pub coingecko: CoinGeckoCfg,
    pub storage: StorageCfg,
    /// Asset id -> settings. The id doubles as the CoinGecko coin id.
    pub assets: IndexMap<String, AssetCfg>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct CollectorCfg {
    pub interval_secs: u64,
    pub layout: RealtimeLayout,
    pub vs_currency: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct RateLimitCfg {
    pub cooldown_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct CoinGeckoCfg {
    pub tier: ApiTier,
    pub requests_per_minute: u32,
}

/// Where documents land.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "snake_case", deny_unknown_fields)]
pub enum StorageCfg {
    Local {
        #[serde(default = "default_root")]
        root: PathBuf,
    },
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        region: Option<String>,
    },
}

/// Static settings of one tracked asset.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AssetCfg {
    /// Ticker on the historical provider (e.g. `BTC-USD`).
    pub symbol: String,
    /// First day of the historical backfill.
    pub start_date: NaiveDate,
}

fn default_root() -> PathBuf {
    PathBuf::from("data")
}

impl Default for CollectorCfg {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            layout: RealtimeLayout::default(),
            vs_currency: "usd".to_string(),
        }
    }
}

impl Default for RateLimitCfg {
    fn default() -> Self {
        let retry = RateLimitRetry::default();
        Self {
            cooldown_secs: retry.cooldown.as_secs(),
            max_retries: retry.max_retries,
        }
    }
}

impl Default for CoinGeckoCfg {
    fn default() -> Self {
        Self {
            tier: ApiTier::Demo,
            requests_per_minute: 30,
        }
    }
}

impl Default for StorageCfg {
    fn default() -> Self {
        StorageCfg::Local {
            root: default_root(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut assets = IndexMap::new();
        assets.insert(
            "bitcoin".to_string(),
            AssetCfg {
                symbol: "BTC-USD".to_string(),
                start_date: NaiveDate::from_ymd_opt(2014, 1, 1).unwrap_or_default(),
            },
        );
        assets.insert(
            "ethereum".to_string(),
            AssetCfg {
                symbol: "ETH-USD".to_string(),
                start_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default(),
            },
        );
        Self {
            collector: CollectorCfg::default(),
            rate_limit: RateLimitCfg::default(),
            coingecko: CoinGeckoCfg::default(),
            storage: StorageCfg::default(),
            assets,
        }
    }
}

impl Config {
    /// Applies [`INTERVAL_ENV`] and [`DATA_ROOT_ENV`] when set.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(secs) =
            parse_env_var::<u64>(INTERVAL_ENV).map_err(|e| ConfigError::Invalid(e.to_string()))?
        {
            self.collector.interval_secs = secs;
        }
        if let (Some(dir), StorageCfg::Local { root }) =
            (get_env_var_opt(DATA_ROOT_ENV), &mut self.storage)
        {
            *root = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Normalizes asset ids and checks every constraint, using `today` (UTC)
    /// as the latest acceptable backfill start.
    pub fn normalize_and_validate(&mut self, today: NaiveDate) -> Result<(), ConfigError> {
        if self.assets.is_empty() {
            return Err(invalid("at least one asset must be configured"));
        }

        let mut rebuilt: IndexMap<String, AssetCfg> = IndexMap::with_capacity(self.assets.len());
        for (raw_id, mut cfg) in std::mem::take(&mut self.assets) {
            let id = raw_id.trim().to_lowercase();
            if id.is_empty() {
                return Err(invalid("asset id cannot be empty after trimming"));
            }
            if !id.chars().all(is_asset_id_char) {
                return Err(invalid(format!(
                    "asset id '{id}' may only contain a-z, 0-9, '-', '_' and '.'"
                )));
            }
            if rebuilt.contains_key(&id) {
                return Err(invalid(format!("duplicate asset id after normalization: {id}")));
            }
            cfg.symbol = cfg.symbol.trim().to_string();
            if cfg.symbol.is_empty() {
                return Err(invalid(format!("asset '{id}' has an empty symbol")));
            }
            if cfg.start_date > today {
                return Err(invalid(format!(
                    "asset '{id}' start_date {} is in the future",
                    cfg.start_date
                )));
            }
            rebuilt.insert(id, cfg);
        }
        self.assets = rebuilt;

        if self.collector.interval_secs == 0 {
            return Err(invalid("collector.interval_secs must be greater than 0"));
        }
        self.collector.vs_currency = self.collector.vs_currency.trim().to_lowercase();
        if self.collector.vs_currency.is_empty() {
            return Err(invalid("collector.vs_currency cannot be empty"));
        }
        if self.coingecko.requests_per_minute == 0 {
            return Err(invalid("coingecko.requests_per_minute must be greater than 0"));
        }
        match &self.storage {
            StorageCfg::S3 { bucket, .. } if bucket.trim().is_empty() => {
                return Err(invalid("storage.bucket cannot be empty"));
            }
            _ => {}
        }
        Ok(())
    }

    /// Tracked assets, in configuration order.
    pub fn assets(&self) -> Vec<Asset> {
        self.assets
            .iter()
            .map(|(id, cfg)| Asset::new(id.as_str(), cfg.symbol.as_str(), cfg.start_date))
            .collect()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.collector.interval_secs)
    }

    pub fn retry(&self) -> RateLimitRetry {
        RateLimitRetry::new(
            Duration::from_secs(self.rate_limit.cooldown_secs),
            self.rate_limit.max_retries,
        )
    }

    pub fn key_layout(&self) -> KeyLayout {
        KeyLayout::new(self.collector.layout)
    }

    pub fn coingecko_config(&self) -> CoinGeckoConfig {
        CoinGeckoConfig {
            tier: self.coingecko.tier,
            vs_currency: self.collector.vs_currency.clone(),
            requests_per_minute: NonZeroU32::new(self.coingecko.requests_per_minute)
                .unwrap_or(NonZeroU32::MIN),
        }
    }

    /// Opens the configured storage backend.
    pub fn build_store(&self) -> Result<Arc<dyn BlobStore>, ConfigError> {
        Ok(match &self.storage {
            StorageCfg::Local { root } => Arc::new(LocalStore::new(root.clone())),
            StorageCfg::S3 {
                bucket,
                prefix,
                region,
            } => {
                let mut store = ObjectStoreBlob::s3(bucket.trim(), region.as_deref())?;
                if let Some(prefix) = prefix {
                    store = store.with_prefix(prefix);
                }
                Arc::new(store)
            }
        })
    }

    /// Creates the historical provider. Needs no credentials.
    pub fn build_historical_provider(&self) -> Result<YahooChartProvider, ConfigError> {
        YahooChartProvider::new().map_err(ConfigError::Provider)
    }

    /// Creates the real-time provider; fails when `COINGECKO_API_KEY` is unset.
    pub fn build_realtime_provider(&self) -> Result<CoinGeckoProvider, ConfigError> {
        Ok(CoinGeckoProvider::new(self.coingecko_config())?)
    }
}

// Object store paths percent-encode anything else, which breaks prefix listing.
fn is_asset_id_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.')
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

/// Parse, normalize and validate a configuration from a TOML string.
///
/// An empty string yields the defaults. Environment overrides are applied
/// before validation.
pub fn load_config_str(toml_str: &str) -> Result<Config, ConfigError> {
    let mut config: Config = toml::from_str(toml_str)?;
    config.apply_env_overrides()?;
    config.normalize_and_validate(Utc::now().date_naive())?;
    Ok(config)
}

/// Read a configuration file from disk; see [`load_config_str`].
pub fn load_config_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_str(&text)
}
