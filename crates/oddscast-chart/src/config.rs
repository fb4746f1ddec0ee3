//! Downsampling parameters.

use serde::{Deserialize, Serialize};

/// Tunables for the downsampling pipeline and its cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Spacing above this, on the raw filtered series, is a reported gap.
    #[serde(default = "default_gap_threshold_secs")]
    pub gap_threshold_secs: i64,
    /// EMA responsiveness. Lower is smoother.
    #[serde(default = "default_ema_alpha")]
    pub ema_alpha: f64,
    /// No two kept points may be further apart than this when an original
    /// sample exists between them.
    #[serde(default = "default_density_interval_secs")]
    pub density_interval_secs: i64,
    /// How long a computed payload stays served from cache.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_gap_threshold_secs() -> i64 {
    7200
}

fn default_ema_alpha() -> f64 {
    0.15
}

fn default_density_interval_secs() -> i64 {
    900
}

fn default_cache_ttl_secs() -> u64 {
    60
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            gap_threshold_secs: default_gap_threshold_secs(),
            ema_alpha: default_ema_alpha(),
            density_interval_secs: default_density_interval_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}
