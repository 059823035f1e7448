//! Service configuration
//!
//! Loaded from an optional JSON file; every field has a default so an empty
//! object is a valid configuration. CLI flags override individual fields.

use crate::analysis::{CentralityOptions, InfluenceWeights, PathCost, PipelineOptions};
use crate::cache::{DEFAULT_CAPACITY, DEFAULT_TTL_SECS};
use crate::live::{self, LiveSettings};
use crate::market_data::yahoo::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the config file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for this schema
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Interface to bind the HTTP server to
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Result cache time-to-live in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum cached results before LRU eviction
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Default seconds between live refreshes
    #[serde(default = "default_live_refresh_secs")]
    pub live_refresh_secs: u64,

    /// Seconds between live heartbeat pings
    #[serde(default = "default_live_heartbeat_secs")]
    pub live_heartbeat_secs: u64,

    /// Smallest client refresh interval accepted
    #[serde(default = "default_live_min_refresh_secs")]
    pub live_min_refresh_secs: u64,

    /// Largest client refresh interval accepted
    #[serde(default = "default_live_max_refresh_secs")]
    pub live_max_refresh_secs: u64,

    /// Concurrent CPU-bound pipeline runs
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Maximum fraction of missing returns before a ticker is dropped
    #[serde(default = "default_max_nan_ratio")]
    pub max_nan_ratio: f64,

    /// Distance used by closeness centrality
    #[serde(default)]
    pub closeness_cost: PathCost,

    #[serde(default)]
    pub influence_weights: InfluenceWeights,

    /// Attach the sector heatmap to analysis results
    #[serde(default = "default_sector_heatmap")]
    pub sector_heatmap: bool,

    /// Root URL of the upstream chart API
    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,

    #[serde(default = "default_upstream_requests_per_second")]
    pub upstream_requests_per_second: u32,

    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
}

// Default value functions for serde
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_cache_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}
fn default_cache_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_live_refresh_secs() -> u64 {
    live::DEFAULT_REFRESH_SECS
}
fn default_live_heartbeat_secs() -> u64 {
    live::DEFAULT_HEARTBEAT_SECS
}
fn default_live_min_refresh_secs() -> u64 {
    live::MIN_REFRESH_SECS
}
fn default_live_max_refresh_secs() -> u64 {
    live::MAX_REFRESH_SECS
}
fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}
fn default_max_nan_ratio() -> f64 {
    crate::analysis::DEFAULT_MAX_NAN_RATIO
}
fn default_sector_heatmap() -> bool {
    true
}
fn default_upstream_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_upstream_requests_per_second() -> u32 {
    5
}
fn default_upstream_timeout_secs() -> u64 {
    15
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
            live_refresh_secs: default_live_refresh_secs(),
            live_heartbeat_secs: default_live_heartbeat_secs(),
            live_min_refresh_secs: default_live_min_refresh_secs(),
            live_max_refresh_secs: default_live_max_refresh_secs(),
            worker_threads: default_worker_threads(),
            max_nan_ratio: default_max_nan_ratio(),
            closeness_cost: PathCost::default(),
            influence_weights: InfluenceWeights::default(),
            sector_heatmap: default_sector_heatmap(),
            upstream_base_url: default_upstream_base_url(),
            upstream_requests_per_second: default_upstream_requests_per_second(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    /// Read a JSON config file and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: ServiceConfig = serde_json::from_str(&raw)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_ttl_secs == 0 {
            return Err("cache_ttl_secs must be at least 1".to_string());
        }
        if self.cache_capacity == 0 {
            return Err("cache_capacity must be at least 1".to_string());
        }
        if self.live_heartbeat_secs == 0 {
            return Err("live_heartbeat_secs must be at least 1".to_string());
        }
        if self.live_min_refresh_secs > self.live_max_refresh_secs {
            return Err(format!(
                "live_min_refresh_secs ({}) exceeds live_max_refresh_secs ({})",
                self.live_min_refresh_secs, self.live_max_refresh_secs
            ));
        }
        if self.live_refresh_secs == 0 {
            return Err("live_refresh_secs must be at least 1".to_string());
        }
        if self.worker_threads == 0 {
            return Err("worker_threads must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.max_nan_ratio) {
            return Err(format!(
                "max_nan_ratio must be between 0.0 and 1.0, got {}",
                self.max_nan_ratio
            ));
        }
        if self.upstream_requests_per_second == 0 {
            return Err("upstream_requests_per_second must be at least 1".to_string());
        }
        self.influence_weights.validate()?;
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn live_settings(&self) -> LiveSettings {
        LiveSettings {
            refresh: Duration::from_secs(self.live_refresh_secs),
            heartbeat: Duration::from_secs(self.live_heartbeat_secs),
            min_refresh: Duration::from_secs(self.live_min_refresh_secs),
            max_refresh: Duration::from_secs(self.live_max_refresh_secs),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            max_nan_ratio: self.max_nan_ratio,
            centrality: CentralityOptions {
                closeness_cost: self.closeness_cost,
                ..CentralityOptions::default()
            },
            influence: self.influence_weights,
            sector_heatmap: self.sector_heatmap,
        }
    }
}
