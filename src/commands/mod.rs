//! CLI command handlers.
//!
//! Each subcommand loads configuration, wires the price source and the
//! analyzer, then hands off to the service or the pipeline.

mod analyze;
mod indices;
mod serve;

pub use analyze::run_analyze;
pub use indices::run_indices;
pub use serve::run_serve;

use crate::analysis::Analyzer;
use crate::clock::SystemClock;
use crate::config::{ConfigError, ServiceConfig};
use crate::market_data::{IndexRegistry, PriceSource, SyntheticPriceSource, YahooPriceSource};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Config file if given, defaults otherwise
pub(crate) fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            ServiceConfig::load(path)
        }
        None => {
            let config = ServiceConfig::default();
            config.validate().map_err(ConfigError::Invalid)?;
            Ok(config)
        }
    }
}

/// Build the analyzer over the upstream provider or the synthetic generator.
pub(crate) fn build_analyzer(
    config: &ServiceConfig,
    synthetic: bool,
    seed: u64,
) -> Result<Arc<Analyzer>, Box<dyn std::error::Error>> {
    let source: Arc<dyn PriceSource> = if synthetic {
        info!(seed, "Using synthetic price source");
        Arc::new(SyntheticPriceSource::new(seed))
    } else {
        Arc::new(YahooPriceSource::new(
            config.upstream_base_url.clone(),
            config.upstream_requests_per_second,
            config.upstream_timeout(),
        )?)
    };

    Ok(Arc::new(Analyzer::new(
        source,
        Arc::new(SystemClock),
        Arc::new(IndexRegistry::builtin()),
        config.worker_threads,
        config.pipeline_options(),
    )))
}
