//! Yahoo Finance chart API client
//!
//! Fetches daily adjusted closes per ticker, concurrently, behind a shared
//! rate limiter. Tickers that fail individually are skipped.

use super::{FetchError, PriceSource};
use crate::types::{PricePoint, PriceTable, RangeSpec};
use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use futures::future::join_all;
use governor::{clock::DefaultClock, state::InMemoryState, Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// HTTP price provider backed by the Yahoo Finance chart endpoint
pub struct YahooPriceSource {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<RateLimiter<governor::state::direct::NotKeyed, InMemoryState, DefaultClock>>,
}

impl YahooPriceSource {
    /// # Arguments
    /// * `base_url` - API root, e.g. [`DEFAULT_BASE_URL`]
    /// * `requests_per_second` - Upper bound on outgoing requests
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: impl Into<String>, requests_per_second: u32, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("corrnet/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(rate)));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter,
        })
    }

    fn window_epochs(range: &RangeSpec) -> (i64, i64) {
        let (start, end) = range.window(Utc::now().date_naive());
        (
            start.and_time(NaiveTime::MIN).and_utc().timestamp(),
            end.and_time(NaiveTime::MIN).and_utc().timestamp(),
        )
    }

    async fn fetch_one(&self, ticker: &str, period1: i64, period2: i64) -> Result<Vec<PricePoint>, FetchError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "div,splits".to_string()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport(format!("{} returned HTTP {}", ticker, status)));
        }

        let body: ChartResponse = response.json().await.map_err(|e| FetchError::Malformed {
            ticker: ticker.to_string(),
            reason: e.to_string(),
        })?;

        parse_chart(ticker, body)
    }
}

fn parse_chart(ticker: &str, body: ChartResponse) -> Result<Vec<PricePoint>, FetchError> {
    if let Some(err) = body.chart.error {
        return Err(FetchError::Malformed {
            ticker: ticker.to_string(),
            reason: err.description.unwrap_or_else(|| "upstream error".to_string()),
        });
    }

    let Some(result) = body.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let timestamps = result.timestamp.unwrap_or_default();

    // Prefer adjusted closes, fall back to raw closes
    let closes = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .filter(|c| !c.is_empty())
        .or_else(|| result.indicators.quote.into_iter().next().map(|q| q.close))
        .unwrap_or_default();

    Ok(timestamps
        .iter()
        .zip(closes.iter())
        .filter_map(|(ts, close)| {
            let price = (*close)?;
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            price.is_finite().then_some(PricePoint { date, price })
        })
        .collect())
}

#[async_trait]
impl PriceSource for YahooPriceSource {
    async fn fetch(&self, tickers: &[String], range: &RangeSpec) -> Result<PriceTable, FetchError> {
        let (period1, period2) = Self::window_epochs(range);
        info!(tickers = tickers.len(), ?range, "Fetching prices");

        let results = join_all(tickers.iter().map(|t| self.fetch_one(t, period1, period2))).await;

        let mut table = PriceTable::new();
        let mut last_error = None;
        let mut failed = 0usize;

        for (ticker, result) in tickers.iter().zip(results) {
            match result {
                Ok(points) if !points.is_empty() => table.insert(ticker.clone(), points),
                Ok(_) => {
                    debug!(ticker = %ticker, "No prices returned");
                    failed += 1;
                }
                Err(e) => {
                    debug!(ticker = %ticker, error = %e, "Ticker fetch failed");
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        if table.is_empty() {
            return Err(match last_error {
                Some(e @ FetchError::Transport(_)) => e,
                _ => FetchError::NoData,
            });
        }

        if failed > 0 {
            warn!(failed, requested = tickers.len(), "Some tickers returned no data");
        }
        info!(tickers = table.len(), "Fetched prices");
        Ok(table)
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}
