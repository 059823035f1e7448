//! Live refresh stream
//!
//! Each subscription runs its own state machine:
//!
//! ```text
//! Connected -> Emitting -> Waiting -> (Emitting | Closed)
//! ```
//!
//! Events go out through an `mpsc` channel. The subscriber disconnects by
//! dropping the receiver; the controller notices at the top of each cycle
//! and while waiting between heartbeats. A pipeline run that has already
//! started always completes.

use crate::analysis::{AnalysisRequest, AnalysisResult, Analyzer};
use crate::metrics::{self, ActiveStreamGuard};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const DEFAULT_REFRESH_SECS: u64 = 120;
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;
pub const MIN_REFRESH_SECS: u64 = 30;
pub const MAX_REFRESH_SECS: u64 = 600;

/// Timer configuration shared by all streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveSettings {
    pub refresh: Duration,
    pub heartbeat: Duration,
    pub min_refresh: Duration,
    pub max_refresh: Duration,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            refresh: Duration::from_secs(DEFAULT_REFRESH_SECS),
            heartbeat: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            min_refresh: Duration::from_secs(MIN_REFRESH_SECS),
            max_refresh: Duration::from_secs(MAX_REFRESH_SECS),
        }
    }
}

impl LiveSettings {
    /// Client interval if inside the accepted bounds, the default otherwise
    pub fn effective_refresh(&self, requested_secs: Option<u64>) -> Duration {
        match requested_secs.map(Duration::from_secs) {
            Some(d) if d >= self.min_refresh && d <= self.max_refresh => d,
            _ => self.refresh,
        }
    }
}

/// Event pushed to a live subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Update(Arc<AnalysisResult>),
    Ping {
        timestamp: String,
        seconds_until_next: u64,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Update(_) => "update",
            StreamEvent::Ping { .. } => "ping",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// SSE data payload
    pub fn data_json(&self) -> Result<String, serde_json::Error> {
        match self {
            StreamEvent::Update(result) => serde_json::to_string(result.as_ref()),
            StreamEvent::Ping {
                timestamp,
                seconds_until_next,
            } => serde_json::to_string(&json!({
                "timestamp": timestamp,
                "seconds_until_next": seconds_until_next,
            })),
            StreamEvent::Error { message } => serde_json::to_string(&json!({ "message": message })),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connected,
    Emitting,
    /// Time already spent waiting in the current refresh interval
    Waiting {
        elapsed: Duration,
    },
    Closed,
}

/// Drives one live subscription
#[derive(Debug)]
pub struct LiveStreamController {
    analyzer: Arc<Analyzer>,
    request: AnalysisRequest,
    refresh: Duration,
    heartbeat: Duration,
}

impl LiveStreamController {
    pub fn new(
        analyzer: Arc<Analyzer>,
        request: AnalysisRequest,
        requested_interval_secs: Option<u64>,
        settings: &LiveSettings,
    ) -> Self {
        Self {
            analyzer,
            request,
            refresh: settings.effective_refresh(requested_interval_secs),
            heartbeat: settings.heartbeat.max(Duration::from_millis(1)),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh
    }

    async fn send(&self, tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
        let name = event.name();
        match tx.send(event).await {
            Ok(()) => {
                metrics::record_stream_event(name);
                true
            }
            Err(_) => false,
        }
    }

    /// Run until the subscriber disconnects or the request is rejected.
    ///
    /// Always returns [`StreamState::Closed`].
    pub async fn run(self, tx: mpsc::Sender<StreamEvent>) -> StreamState {
        let _active = ActiveStreamGuard::new();
        let index = self.request.index.clone();
        let mut state = StreamState::Connected;

        let validated = match self.analyzer.validate(&self.request) {
            Ok(v) => v,
            Err(e) => {
                warn!(index = %index, error = %e, "Live stream rejected");
                self.send(&tx, StreamEvent::Error { message: e.to_string() }).await;
                return StreamState::Closed;
            }
        };

        info!(
            index = %index,
            refresh_secs = self.refresh.as_secs(),
            heartbeat_secs = self.heartbeat.as_secs(),
            "Live stream opened"
        );

        loop {
            let next = match state {
                StreamState::Connected => StreamState::Emitting,

                StreamState::Emitting => {
                    if tx.is_closed() {
                        StreamState::Closed
                    } else {
                        let event = match self.analyzer.run(&validated, "live").await {
                            Ok(result) => {
                                debug!(
                                    index = %index,
                                    nodes = result.stats.total_nodes,
                                    edges = result.stats.total_edges,
                                    "Live update"
                                );
                                StreamEvent::Update(Arc::new(result))
                            }
                            Err(e) => StreamEvent::Error { message: e.to_string() },
                        };
                        if self.send(&tx, event).await {
                            StreamState::Waiting {
                                elapsed: Duration::ZERO,
                            }
                        } else {
                            StreamState::Closed
                        }
                    }
                }

                StreamState::Waiting { elapsed } if elapsed >= self.refresh => StreamState::Emitting,

                StreamState::Waiting { elapsed } => {
                    let step = self.heartbeat.min(self.refresh - elapsed);
                    tokio::select! {
                        _ = tx.closed() => StreamState::Closed,
                        _ = tokio::time::sleep(step) => {
                            let elapsed = elapsed + self.heartbeat;
                            let ping = StreamEvent::Ping {
                                timestamp: self.analyzer.clock().now_iso(),
                                seconds_until_next: self.refresh.saturating_sub(elapsed).as_secs(),
                            };
                            if self.send(&tx, ping).await {
                                StreamState::Waiting { elapsed }
                            } else {
                                StreamState::Closed
                            }
                        }
                    }
                }

                StreamState::Closed => break,
            };

            if next != state && !matches!(next, StreamState::Waiting { .. }) {
                debug!(index = %index, from = ?state, to = ?next, "Live stream transition");
            }
            state = next;
        }

        info!(index = %index, "Live stream closed");
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_refresh_bounds() {
        let settings = LiveSettings::default();
        assert_eq!(settings.effective_refresh(None), Duration::from_secs(120));
        assert_eq!(settings.effective_refresh(Some(30)), Duration::from_secs(30));
        assert_eq!(settings.effective_refresh(Some(600)), Duration::from_secs(600));
        assert_eq!(settings.effective_refresh(Some(29)), Duration::from_secs(120));
        assert_eq!(settings.effective_refresh(Some(601)), Duration::from_secs(120));
    }

    #[test]
    fn test_event_payloads() {
        let ping = StreamEvent::Ping {
            timestamp: "2024-01-01T00:00:00.000Z".into(),
            seconds_until_next: 90,
        };
        assert_eq!(ping.name(), "ping");
        let data: serde_json::Value = serde_json::from_str(&ping.data_json().unwrap()).unwrap();
        assert_eq!(data["seconds_until_next"], 90);

        let err = StreamEvent::Error {
            message: "boom".into(),
        };
        assert_eq!(err.data_json().unwrap(), r#"{"message":"boom"}"#);
    }
}
