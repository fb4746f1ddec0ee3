//! Application configuration.

use crate::error::{AppError, AppResult};
use oddscast_alert::SwingConfig;
use oddscast_chart::ChartConfig;
use oddscast_engine::FusionConfig;
use oddscast_feed::NormalizerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Append-only snapshot log (JSON Lines).
    #[serde(default = "default_snapshot_log")]
    pub snapshot_log: String,
    /// Subscriber file (JSON Lines).
    #[serde(default = "default_subscriber_file")]
    pub subscriber_file: String,
    /// Leader-election lock file for the trigger loop.
    #[serde(default = "default_leader_lock")]
    pub leader_lock: String,
}

fn default_snapshot_log() -> String {
    "data/snapshots.jsonl".to_string()
}

fn default_subscriber_file() -> String {
    "data/subscribers.jsonl".to_string()
}

fn default_leader_lock() -> String {
    "data/trigger.lock".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            snapshot_log: default_snapshot_log(),
            subscriber_file: default_subscriber_file(),
            leader_lock: default_leader_lock(),
        }
    }
}

/// Quote feed endpoints and label filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// Full market endpoint of the primary forecast API.
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
    /// Markets listing endpoint of the secondary exchange API.
    #[serde(default = "default_exchange_url")]
    pub exchange_url: String,
    /// Exchange series ticker grouping the per-entity yes/no markets.
    #[serde(default)]
    pub series_ticker: String,
    /// Labels containing any of these terms (case-insensitive) never reach
    /// the engine.
    #[serde(default)]
    pub excluded_terms: Vec<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Label normalization rules shared by both feeds.
    #[serde(default)]
    pub normalizer: NormalizerConfig,
}

fn default_forecast_url() -> String {
    "https://api.manifold.markets/v0/slug/example-market".to_string()
}

fn default_exchange_url() -> String {
    "https://api.elections.kalshi.com/trade-api/v2/markets".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            forecast_url: default_forecast_url(),
            exchange_url: default_exchange_url(),
            series_ticker: String::new(),
            excluded_terms: Vec::new(),
            timeout_secs: default_timeout_secs(),
            normalizer: NormalizerConfig::default(),
        }
    }
}

/// Alerting parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Swing floor and debounce window.
    #[serde(default)]
    pub swing: SwingConfig,
    /// Threshold used when a subscriber does not pick one.
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
    /// UTC hour at which the daily summary becomes due.
    #[serde(default = "default_summary_hour_utc")]
    pub summary_hour_utc: u32,
    /// Secret keying unsubscribe tokens. The `ODDSCAST_UNSUB_SECRET`
    /// environment variable overrides this value when set.
    #[serde(default)]
    pub unsubscribe_secret: String,
}

fn default_threshold() -> f64 {
    5.0
}

fn default_summary_hour_utc() -> u32 {
    13
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            swing: SwingConfig::default(),
            default_threshold: default_threshold(),
            summary_hour_utc: default_summary_hour_utc(),
            unsubscribe_secret: String::new(),
        }
    }
}

/// Trigger loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between aggregation ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Seconds between daily-summary due checks.
    #[serde(default = "default_summary_check_secs")]
    pub summary_check_secs: u64,
}

fn default_tick_interval_secs() -> u64 {
    180
}

fn default_summary_check_secs() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            summary_check_secs: default_summary_check_secs(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Load configuration from the given path. A missing file falls back to
    /// defaults with a warning; an unreadable or malformed file is an error.
    pub fn load(path: &str) -> AppResult<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Self::default()
        };

        if let Ok(secret) = std::env::var("ODDSCAST_UNSUB_SECRET") {
            config.alerts.unsubscribe_secret = secret;
        }
        Ok(config)
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }
}
