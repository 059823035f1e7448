//! End-to-end pipeline scenarios over seeded synthetic prices

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use corrnet::analysis::{AnalysisError, AnalysisRequest, AnalysisService, Analyzer, PipelineOptions, PortfolioRequest};
use corrnet::clock::Clock;
use corrnet::market_data::{FactorGroup, FetchError, IndexRegistry, PriceSource, SyntheticPriceSource};
use corrnet::types::{PriceTable, RangeSpec};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct TestClock {
    millis: Arc<Mutex<i64>>,
}

impl TestClock {
    fn at(date: NaiveDate) -> Self {
        let millis = date.and_hms_opt(16, 0, 0).unwrap().and_utc().timestamp_millis();
        Self {
            millis: Arc::new(Mutex::new(millis)),
        }
    }

    fn advance(&self, secs: i64) {
        *self.millis.lock().unwrap() += secs * 1000;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(*self.millis.lock().unwrap()).unwrap()
    }
}

/// Counts upstream calls
#[derive(Debug)]
struct CountingSource {
    inner: SyntheticPriceSource,
    calls: AtomicUsize,
}

#[async_trait]
impl PriceSource for CountingSource {
    async fn fetch(&self, tickers: &[String], range: &RangeSpec) -> Result<PriceTable, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(tickers, range).await
    }
}

fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
}

fn tickers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn registry() -> IndexRegistry {
    IndexRegistry::empty().with_index("TEST", tickers(&["A", "B", "C", "D", "E"]))
}

/// A/B move together at ~0.95, C/D at ~0.9, E on its own
fn clustered_source() -> SyntheticPriceSource {
    SyntheticPriceSource::new(11)
        .with_anchor(anchor())
        .with_group(FactorGroup::with_correlation(tickers(&["A", "B"]), 0.95))
        .with_group(FactorGroup::with_correlation(tickers(&["C", "D"]), 0.9))
}

fn service(source: Arc<dyn PriceSource>, clock: TestClock) -> AnalysisService {
    let analyzer = Arc::new(Analyzer::new(
        source,
        Arc::new(clock),
        Arc::new(registry()),
        2,
        PipelineOptions::default(),
    ));
    AnalysisService::new(analyzer, Duration::from_secs(600), 50)
}

fn one_year(threshold: f64) -> AnalysisRequest {
    AnalysisRequest {
        period: Some("1y".into()),
        threshold,
        ..AnalysisRequest::new("TEST")
    }
}

fn node<'a>(result: &'a corrnet::analysis::AnalysisResult, id: &str) -> &'a corrnet::analysis::pipeline::NodeData {
    result.nodes.iter().find(|n| n.id == id).unwrap()
}

#[tokio::test]
async fn test_two_pairs_and_an_isolated_ticker() {
    let svc = service(Arc::new(clustered_source()), TestClock::at(anchor()));
    let result = svc.analyze(&one_year(0.6)).await.unwrap();

    assert_eq!(result.stats.total_nodes, 5);
    assert_eq!(result.stats.total_edges, 2);

    let pairs: Vec<(String, String)> = result
        .edges
        .iter()
        .map(|e| {
            let mut p = [e.source.clone(), e.target.clone()];
            p.sort();
            (p[0].clone(), p[1].clone())
        })
        .collect();
    assert!(pairs.contains(&("A".into(), "B".into())));
    assert!(pairs.contains(&("C".into(), "D".into())));

    let e = node(&result, "E");
    assert_eq!(e.connection_count, 0);
    assert_eq!(e.centrality.degree, 0.0);
    assert_eq!(e.centrality.betweenness, 0.0);

    assert!(result.stats.num_clusters >= 3);
    assert_eq!(node(&result, "A").cluster_id, node(&result, "B").cluster_id);
    assert_eq!(node(&result, "C").cluster_id, node(&result, "D").cluster_id);
    assert_ne!(node(&result, "A").cluster_id, node(&result, "C").cluster_id);
    assert_ne!(node(&result, "E").cluster_id, node(&result, "A").cluster_id);
    assert!(result.stats.modularity > 0.0);

    let total: usize = result.clusters.iter().map(|c| c.size).sum();
    assert_eq!(total, 5);
}

#[tokio::test]
async fn test_repeat_request_served_from_cache_until_ttl() {
    let source = Arc::new(CountingSource {
        inner: clustered_source(),
        calls: AtomicUsize::new(0),
    });
    let clock = TestClock::at(anchor());
    let svc = service(source.clone(), clock.clone());

    let first = svc.analyze(&one_year(0.6)).await.unwrap();
    clock.advance(30);
    let second = svc.analyze(&one_year(0.6)).await.unwrap();

    assert_eq!(first.timestamp, second.timestamp);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(svc.cache().len(), 1);

    clock.advance(600);
    let third = svc.analyze(&one_year(0.6)).await.unwrap();
    assert_ne!(first.timestamp, third.timestamp);
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_different_threshold_is_a_different_entry() {
    let source = Arc::new(CountingSource {
        inner: clustered_source(),
        calls: AtomicUsize::new(0),
    });
    let svc = service(source.clone(), TestClock::at(anchor()));

    svc.analyze(&one_year(0.6)).await.unwrap();
    svc.analyze(&one_year(0.7)).await.unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    assert_eq!(svc.cache().len(), 2);
}

#[tokio::test]
async fn test_high_threshold_on_weak_correlations_gives_singletons() {
    let source = SyntheticPriceSource::new(5).with_anchor(anchor());
    let svc = service(Arc::new(source), TestClock::at(anchor()));
    let result = svc.analyze(&one_year(0.95)).await.unwrap();

    assert_eq!(result.stats.total_edges, 0);
    assert_eq!(result.stats.num_clusters, 5);
    assert_eq!(result.stats.modularity, 0.0);
    assert!(result.clusters.iter().all(|c| c.size == 1));
    assert!(result.nodes.iter().all(|n| n.connection_count == 0));
}

#[tokio::test]
async fn test_too_few_tickers_after_fetch() {
    let source = clustered_source().with_missing(&["C", "D", "E"]);
    let svc = service(Arc::new(source), TestClock::at(anchor()));
    let err = svc.analyze(&one_year(0.6)).await.unwrap_err();

    assert!(matches!(err, AnalysisError::InsufficientData { expected: 3, .. }));
    assert!(svc.cache().is_empty());
}

#[tokio::test]
async fn test_total_upstream_failure() {
    let source = clustered_source().with_missing(&["A", "B", "C", "D", "E"]);
    let svc = service(Arc::new(source), TestClock::at(anchor()));
    let err = svc.analyze(&one_year(0.6)).await.unwrap_err();
    assert_eq!(err.kind(), "upstream_fetch");
}

#[tokio::test]
async fn test_invalid_requests_rejected_before_fetch() {
    let source = Arc::new(CountingSource {
        inner: clustered_source(),
        calls: AtomicUsize::new(0),
    });
    let svc = service(source.clone(), TestClock::at(anchor()));

    let unknown = svc.analyze(&AnalysisRequest::new("NOPE")).await.unwrap_err();
    assert_eq!(unknown.kind(), "invalid_request");

    let low = svc.analyze(&one_year(0.05)).await.unwrap_err();
    assert_eq!(low.kind(), "invalid_request");

    let bad_period = AnalysisRequest {
        period: Some("2w".into()),
        ..AnalysisRequest::new("TEST")
    };
    assert_eq!(svc.analyze(&bad_period).await.unwrap_err().kind(), "invalid_request");

    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_custom_dates_override_period() {
    let svc = service(Arc::new(clustered_source()), TestClock::at(anchor()));
    let request = AnalysisRequest {
        period: Some("1mo".into()),
        start_date: Some("2023-06-01".into()),
        end_date: Some("2024-06-01".into()),
        ..AnalysisRequest::new("TEST")
    };
    let result = svc.analyze(&request).await.unwrap();
    assert_eq!(result.start_date.as_deref(), Some("2023-06-01"));
    assert_eq!(result.stats.total_edges, 2);
}

#[tokio::test]
async fn test_portfolio_check_flags_concentration() {
    let svc = service(Arc::new(clustered_source()), TestClock::at(anchor()));
    let request = PortfolioRequest {
        tickers: tickers(&["a", "b", "ZZZ"]),
        period: Some("1y".into()),
        start_date: None,
        end_date: None,
    };

    // ZZZ is not in any group but the synthetic source still knows it
    let report = svc.analyzer().check_portfolio(&request).await.unwrap();
    assert_eq!(report.tickers_found.len(), 3);
    assert_eq!(report.correlations.len(), 3);
    assert_eq!(
        (report.correlations[0].ticker1.as_str(), report.correlations[0].ticker2.as_str()),
        ("A", "B")
    );
    assert!(report.correlations[0].correlation > 0.8);
}

#[tokio::test]
async fn test_portfolio_check_bounds() {
    let svc = service(Arc::new(clustered_source()), TestClock::at(anchor()));
    let single = PortfolioRequest {
        tickers: tickers(&["A"]),
        period: None,
        start_date: None,
        end_date: None,
    };
    let err = svc.analyzer().check_portfolio(&single).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_request");
}
