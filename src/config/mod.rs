// src/config/mod.rs
//! Service configuration: TOML file + env overrides.

pub mod law;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// --- env defaults & names ---
pub const DEFAULT_MONITOR_CONFIG_PATH: &str = "config/monitor.toml";

pub const ENV_MONITOR_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";
pub const ENV_DATA_ROOT: &str = "MONITOR_DATA_ROOT";
pub const ENV_REPORT_ROOT: &str = "MONITOR_REPORT_ROOT";
pub const ENV_CACHE_TTL_SECS: &str = "MONITOR_CACHE_TTL_SECS";
pub const ENV_MARKET_FEED: &str = "MONITOR_MARKET_FEED";

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}
fn default_report_root() -> PathBuf {
    PathBuf::from("report")
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_primary_ticker() -> String {
    "KT".to_string()
}
fn default_tickers() -> Vec<String> {
    vec!["KT".into(), "SKT".into(), "LG".into()]
}

/// Where quotes and daily history come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketFeedKind {
    #[default]
    Naver,
    Off,
}

impl MarketFeedKind {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "naver" => Some(Self::Naver),
            "off" | "none" | "disabled" => Some(Self::Off),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    #[serde(default = "default_report_root")]
    pub report_root: PathBuf,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_primary_ticker")]
    pub primary_ticker: String,
    #[serde(default = "default_tickers")]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub market_feed: MarketFeedKind,
    /// Seed today's directory with sample drops when it is missing.
    #[serde(default)]
    pub bootstrap_sample_data: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            report_root: default_report_root(),
            cache_ttl_secs: default_cache_ttl_secs(),
            primary_ticker: default_primary_ticker(),
            tickers: default_tickers(),
            market_feed: MarketFeedKind::default(),
            bootstrap_sample_data: false,
        }
    }
}

impl MonitorConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: MonitorConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading monitor config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    /// Resolve config:
    /// 1) $MONITOR_CONFIG_PATH (must exist)
    /// 2) config/monitor.toml if present
    /// 3) built-in defaults
    ///
    /// then apply env overrides.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(ENV_MONITOR_CONFIG_PATH) {
            Ok(p) => Self::load_from_file(PathBuf::from(p))?,
            Err(_) => {
                let p = PathBuf::from(DEFAULT_MONITOR_CONFIG_PATH);
                if p.exists() {
                    Self::load_from_file(&p)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var(ENV_DATA_ROOT) {
            if !v.trim().is_empty() {
                self.data_root = PathBuf::from(v);
            }
        }
        if let Ok(v) = std::env::var(ENV_REPORT_ROOT) {
            if !v.trim().is_empty() {
                self.report_root = PathBuf::from(v);
            }
        }
        if let Some(ttl) = std::env::var(ENV_CACHE_TTL_SECS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.cache_ttl_secs = ttl;
        }
        if let Some(kind) = std::env::var(ENV_MARKET_FEED)
            .ok()
            .and_then(|v| MarketFeedKind::parse(&v))
        {
            self.market_feed = kind;
        }
        self.primary_ticker = self.primary_ticker.trim().to_ascii_uppercase();
        if self.primary_ticker.is_empty() {
            self.primary_ticker = default_primary_ticker();
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// `<data_root>/law`
    pub fn law_dir(&self) -> PathBuf {
        self.data_root.join("law")
    }

    /// `<data_root>/my`
    pub fn my_dir(&self) -> PathBuf {
        self.data_root.join("my")
    }
}
