//! Health check and Prometheus endpoints for monitoring

use crate::metrics;
use crate::server::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: String, // "healthy"
    pub version: String,
    pub uptime_seconds: u64,
    pub cache_entries: usize,
    pub active_streams: i64,
    pub timestamp: i64,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: 0,
            cache_entries: 0,
            active_streams: 0,
            timestamp: Utc::now().timestamp(),
        }
    }
}

impl HealthResponse {
    /// Snapshot of the running service
    pub fn from_state(state: &AppState) -> Self {
        Self {
            uptime_seconds: state.started.elapsed().as_secs(),
            cache_entries: state.service.cache().len(),
            active_streams: metrics::active_streams(),
            ..Self::default()
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::from_state(&state))
}

/// Prometheus text exposition
pub async fn metrics_endpoint() -> String {
    metrics::gather_metrics()
}
