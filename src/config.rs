// src/config.rs
// All runtime knobs in one immutable value, loaded once at process start and
// passed into components. Nothing reads configuration from ambient globals
// after boot.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const ENV_CONFIG_PATH: &str = "WATCHER_CONFIG_PATH";
const ENV_TOKEN: &str = "WATCHER_TOKEN";
const ENV_CHAT_ID: &str = "WATCHER_CHAT_ID";
const DEFAULT_CONFIG_PATH: &str = "config/watcher.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct WatcherConfig {
    /// Bot token for the real notification transport. Usually supplied via
    /// the WATCHER_TOKEN env var so it stays out of the config file.
    #[serde(default)]
    pub token: String,
    /// Delivery target (chat/channel id) handed to the notifier.
    #[serde(default)]
    pub chat_id: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_retention_horizon_days")]
    pub retention_horizon_days: i64,
    #[serde(default = "default_prune_every_cycles")]
    pub prune_every_cycles: u64,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Pause between consecutive sends within one cycle, to stay polite with
    /// the downstream messaging API. Zero disables pacing.
    #[serde(default = "default_notify_pacing_ms")]
    pub notify_pacing_ms: u64,

    #[serde(default = "default_keywords_path")]
    pub keywords_path: PathBuf,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    /// Listings file the external scraper keeps rewriting.
    #[serde(default = "default_source_path")]
    pub source_path: PathBuf,
    /// Append-only trail of notified listings; disabled when unset.
    #[serde(default)]
    pub audit_path: Option<PathBuf>,
}

fn default_poll_interval_secs() -> u64 {
    120
}
fn default_retention_horizon_days() -> i64 {
    30
}
fn default_prune_every_cycles() -> u64 {
    10
}
fn default_max_concurrent_fetches() -> usize {
    4
}
fn default_notify_pacing_ms() -> u64 {
    1_000
}
fn default_keywords_path() -> PathBuf {
    PathBuf::from("state/keywords.txt")
}
fn default_state_path() -> PathBuf {
    PathBuf::from("state/state.json")
}
fn default_source_path() -> PathBuf {
    PathBuf::from("state/listings.json")
}

impl Default for WatcherConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty config must deserialize via defaults")
    }
}

impl WatcherConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parse watcher config")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks:
    /// 1) $WATCHER_CONFIG_PATH (must exist when set)
    /// 2) config/watcher.toml
    /// 3) built-in defaults
    /// then apply WATCHER_TOKEN / WATCHER_CHAT_ID overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                anyhow::bail!("{ENV_CONFIG_PATH} points to non-existent path");
            }
            Self::from_path(&pb)?
        } else {
            let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
            if fallback.exists() {
                Self::from_path(&fallback)?
            } else {
                Self::default()
            }
        };

        if let Ok(token) = std::env::var(ENV_TOKEN) {
            cfg.token = token;
        }
        if let Ok(chat_id) = std::env::var(ENV_CHAT_ID) {
            cfg.chat_id = chat_id;
        }
        Ok(cfg)
    }

    pub fn retention_horizon(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_horizon_days.max(0))
    }
}
