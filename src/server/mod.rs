//! HTTP surface
//!
//! Routes:
//! - `GET /` service banner
//! - `GET /health`, `GET /metrics`
//! - `GET /api/indices`
//! - `POST /api/analyze`
//! - `GET /api/live/stream` (server-sent events)
//! - `POST /api/portfolio/check`

pub mod error;
pub mod routes;
pub mod state;

pub use error::{AppError, AppResult};
pub use state::AppState;

use crate::health;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics_endpoint))
        .route("/api/indices", get(routes::list_indices))
        .route("/api/analyze", post(routes::analyze))
        .route("/api/live/stream", get(routes::live_stream))
        .route("/api/portfolio/check", post(routes::check_portfolio))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn run_server(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!("Server failed to bind to {}: {}", addr, e);
        e
    })?;

    tracing::info!("corrnet listening on {}", addr);
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisService, Analyzer, PipelineOptions};
    use crate::clock::SystemClock;
    use crate::live::LiveSettings;
    use crate::market_data::{IndexRegistry, SyntheticPriceSource};
    use std::sync::Arc;
    use std::time::Duration;

    fn state() -> AppState {
        let analyzer = Arc::new(Analyzer::new(
            Arc::new(SyntheticPriceSource::new(7)),
            Arc::new(SystemClock),
            Arc::new(IndexRegistry::builtin()),
            2,
            PipelineOptions::default(),
        ));
        let service = Arc::new(AnalysisService::new(analyzer, Duration::from_secs(600), 50));
        AppState::new(service, LiveSettings::default())
    }

    #[test]
    fn test_create_app() {
        let _app = create_app(state());
    }

    #[tokio::test]
    async fn test_health_reports_cache_size() {
        let state = state();
        let axum::Json(health) = health::health_check(axum::extract::State(state)).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.cache_entries, 0);
    }

    #[tokio::test]
    async fn test_indices_lists_builtin() {
        let axum::Json(resp) = routes::list_indices(axum::extract::State(state())).await;
        assert_eq!(resp.indices.len(), 5);
    }
}
