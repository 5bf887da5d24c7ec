//! Application config: `config/truetale.toml` plus environment overrides.
//!
//! Resolution order for the file: `$TRUETALE_CONFIG_PATH`, then
//! `config/truetale.toml`. A missing default file means built-in defaults;
//! a missing explicit path is an error.

pub mod classifier;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ratelimit::MAX_CLIENT_WINDOW;
use crate::review::ReviewerHistory;
use crate::signals::DetectorConfig;
use crate::sweeper::MAX_SWEEP_PERIOD;
use classifier::ClassifierConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/truetale.toml";
pub const ENV_CONFIG_PATH: &str = "TRUETALE_CONFIG_PATH";

pub const ENV_SWEEP_INTERVAL_SECS: &str = "TRUETALE_SWEEP_INTERVAL_SECS";
pub const ENV_CLIENT_LIMIT_PER_MIN: &str = "TRUETALE_CLIENT_LIMIT_PER_MIN";
pub const ENV_FETCH_PER_MIN: &str = "TRUETALE_FETCH_PER_MIN";
pub const ENV_CLASSIFIER_ENDPOINT: &str = "TRUETALE_CLASSIFIER_ENDPOINT";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detectors: DetectorConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub classifier: ClassifierConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 3600,
        }
    }
}

impl CacheConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1)).min(MAX_SWEEP_PERIOD)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// PerClientWindow limit for inbound endpoints.
    pub client_limit: usize,
    pub client_window_secs: u64,
    /// GlobalPacing for the third-party review fetch.
    pub fetch_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            client_limit: 60,
            client_window_secs: 60,
            fetch_per_minute: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Places API key; "ENV" reads GOOGLE_PLACES_API_KEY.
    pub places_api_key: Option<String>,
    /// History applied to fetched batches (one history per batch).
    pub default_history: ReviewerHistory,
}

impl RateLimitConfig {
    pub fn client_window(&self) -> Duration {
        Duration::from_secs(self.client_window_secs.max(1)).min(MAX_CLIENT_WINDOW)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            places_api_key: Some("ENV".into()),
            default_history: ReviewerHistory::new(6, ["product1", "product2"]),
        }
    }
}

impl AppConfig {
    /// Load from `$TRUETALE_CONFIG_PATH` or the default path, then apply env overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => Self::from_path(Path::new(&p))?,
            Err(_) => {
                let p = PathBuf::from(DEFAULT_CONFIG_PATH);
                if p.exists() {
                    Self::from_path(&p)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env_overrides();
        cfg.classifier = cfg.classifier.normalize()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing config at {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = parse_env::<u64>(ENV_SWEEP_INTERVAL_SECS) {
            self.cache.sweep_interval_secs = v.max(1);
        }
        if let Some(v) = parse_env::<usize>(ENV_CLIENT_LIMIT_PER_MIN) {
            self.rate_limit.client_limit = v.max(1);
        }
        if let Some(v) = parse_env::<u32>(ENV_FETCH_PER_MIN) {
            self.rate_limit.fetch_per_minute = v.max(1);
        }
        if let Ok(v) = std::env::var(ENV_CLASSIFIER_ENDPOINT) {
            if !v.trim().is_empty() {
                self.classifier.endpoint = Some(v);
                self.classifier.enabled = true;
            }
        }
    }

    /// Places API key with "ENV" resolved; `None` when unset.
    pub fn places_api_key(&self) -> Option<String> {
        match self.fetch.places_api_key.as_deref().map(str::trim) {
            Some(k) if k.eq_ignore_ascii_case("env") => std::env::var("GOOGLE_PLACES_API_KEY").ok(),
            Some("") | None => None,
            Some(k) => Some(k.to_string()),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}
