//! Request handlers

use super::error::AppResult;
use super::state::AppState;
use crate::analysis::{AnalysisRequest, AnalysisResult, PortfolioReport, PortfolioRequest};
use crate::live::{LiveStreamController, StreamEvent};
use crate::market_data::IndexInfo;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Buffered events per live subscriber
const STREAM_BUFFER: usize = 16;

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "corrnet",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "operational"
    }))
}

#[derive(Debug, Serialize, PartialEq)]
pub struct IndicesResponse {
    pub indices: Vec<IndexInfo>,
}

/// GET /api/indices
pub async fn list_indices(State(state): State<AppState>) -> Json<IndicesResponse> {
    Json(IndicesResponse {
        indices: state.service.analyzer().registry().list(),
    })
}

/// POST /api/analyze
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> AppResult<Json<Arc<AnalysisResult>>> {
    let result = state.service.analyze(&request).await?;
    Ok(Json(result))
}

/// POST /api/portfolio/check
pub async fn check_portfolio(
    State(state): State<AppState>,
    Json(request): Json<PortfolioRequest>,
) -> AppResult<Json<PortfolioReport>> {
    let report = state.service.analyzer().check_portfolio(&request).await?;
    Ok(Json(report))
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveQuery {
    pub index: String,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    /// Requested refresh interval in seconds
    #[serde(default)]
    pub interval: Option<u64>,
}

impl LiveQuery {
    pub fn to_request(&self) -> AnalysisRequest {
        let mut request = AnalysisRequest::new(self.index.clone());
        request.period = self.period.clone();
        request.start_date = self.start_date.clone();
        request.end_date = self.end_date.clone();
        if let Some(threshold) = self.threshold {
            request.threshold = threshold;
        }
        request
    }
}

fn to_sse(event: StreamEvent) -> Event {
    match event.data_json() {
        Ok(data) => Event::default().event(event.name()).data(data),
        Err(e) => {
            warn!(event = event.name(), error = %e, "Failed to encode stream event");
            Event::default()
                .event("error")
                .data(json!({ "message": "failed to encode event" }).to_string())
        }
    }
}

/// GET /api/live/stream
///
/// The request is validated before the stream opens so a bad index or
/// threshold comes back as a plain 400.
pub async fn live_stream(
    State(state): State<AppState>,
    Query(query): Query<LiveQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let request = query.to_request();
    let analyzer = state.service.analyzer().clone();
    analyzer.validate(&request)?;

    let controller = LiveStreamController::new(analyzer, request, query.interval, &state.live);
    info!(
        index = %query.index,
        refresh_secs = controller.refresh_interval().as_secs(),
        "Live subscriber connected"
    );

    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    tokio::spawn(controller.run(tx));

    let events = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (Ok(to_sse(event)), rx))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::IndexRegistry;

    #[test]
    fn test_live_query_to_request() {
        let query: LiveQuery =
            serde_json::from_str(r#"{"index":"NIFTY 50","threshold":0.7,"interval":60}"#).unwrap();
        let request = query.to_request();
        assert_eq!(request.index, "NIFTY 50");
        assert!(request.validate(&IndexRegistry::builtin()).is_ok());
        assert_eq!(request.threshold, 0.7);
        assert_eq!(query.interval, Some(60));
    }

    #[test]
    fn test_live_query_default_threshold() {
        let query: LiveQuery = serde_json::from_str(r#"{"index":"S&P 500 (Top 50)"}"#).unwrap();
        assert_eq!(query.to_request().threshold, crate::analysis::pipeline::DEFAULT_THRESHOLD);
    }
}
