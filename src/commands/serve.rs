//! `serve` command handler.

use super::{build_analyzer, load_config};
use crate::analysis::AnalysisService;
use crate::server::{self, AppState};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Start the HTTP service.
///
/// # Errors
/// Returns error if the configuration is invalid or the address cannot be bound.
pub async fn run_serve(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    synthetic: bool,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path.as_deref())?;
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let ip: IpAddr = config
        .host
        .parse()
        .map_err(|e| format!("Invalid host '{}': {}", config.host, e))?;
    let addr = SocketAddr::new(ip, config.port);

    let analyzer = build_analyzer(&config, synthetic, seed)?;
    let service = Arc::new(AnalysisService::new(
        analyzer,
        config.cache_ttl(),
        config.cache_capacity,
    ));

    info!(
        cache_ttl_secs = config.cache_ttl_secs,
        cache_capacity = config.cache_capacity,
        workers = config.worker_threads,
        live_refresh_secs = config.live_refresh_secs,
        "--- corrnet: starting service ---"
    );

    let state = AppState::new(service, config.live_settings());
    server::run_server(addr, state).await?;
    Ok(())
}
