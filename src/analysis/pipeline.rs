//! Analysis pipeline orchestration
//!
//! `compute` is the pure, CPU-bound chain from prices to an assembled
//! result. `Analyzer` adds the upstream fetch and runs the chain on the
//! blocking pool behind a semaphore. `AnalysisService` puts the result cache
//! in front of the analyzer.

use super::community::detect;
use super::correlation::{correlate, threshold};
use super::error::AnalysisError;
use super::graph::{build, centrality_with, influence_weighted, CentralityOptions, CentralityRecord, InfluenceWeights};
use super::preprocess::{clean, log_returns, DEFAULT_MAX_NAN_RATIO};
use super::round_to;
use super::sector::{sector_heatmap, SectorHeatmap};
use crate::cache::{fingerprint, ResultCache};
use crate::clock::Clock;
use crate::market_data::indices::display_symbol;
use crate::market_data::{IndexRegistry, PriceSource};
use crate::metrics;
use crate::types::{Period, PriceTable, RangeSpec};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

pub const DEFAULT_THRESHOLD: f64 = 0.6;
pub const MIN_THRESHOLD: f64 = 0.1;
pub const MAX_THRESHOLD: f64 = 0.95;
/// Fewest cleaned tickers a graph is built from
pub const MIN_TICKERS: usize = 3;

const DATE_FORMAT: &str = "%Y-%m-%d";

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

/// Analysis request as received from a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub index: String,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl AnalysisRequest {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            period: None,
            start_date: None,
            end_date: None,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Check the request against the registry and resolve its date range.
    pub fn validate(&self, registry: &IndexRegistry) -> Result<ValidatedRequest, AnalysisError> {
        let tickers = registry.tickers(&self.index).ok_or_else(|| {
            AnalysisError::InvalidRequest(format!(
                "Unknown index '{}'. Available: {:?}",
                self.index,
                registry.names()
            ))
        })?;

        if !self.threshold.is_finite() || !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&self.threshold) {
            return Err(AnalysisError::InvalidRequest(format!(
                "threshold must be in [{}, {}], got {}",
                MIN_THRESHOLD, MAX_THRESHOLD, self.threshold
            )));
        }

        let range = resolve_range(
            self.period.as_deref(),
            self.start_date.as_deref(),
            self.end_date.as_deref(),
        )?;

        Ok(ValidatedRequest {
            index: self.index.clone(),
            tickers: tickers.to_vec(),
            range,
            threshold: self.threshold,
        })
    }
}

/// Custom dates win when both are present; otherwise the period (default
/// `3mo`) is used.
pub(crate) fn resolve_range(
    period: Option<&str>,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<RangeSpec, AnalysisError> {
    match (start_date, end_date) {
        (Some(start), Some(end)) if !start.trim().is_empty() && !end.trim().is_empty() => {
            let parse = |s: &str| {
                NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|e| {
                    AnalysisError::InvalidRequest(format!("Invalid date '{}': {}", s, e))
                })
            };
            let (start, end) = (parse(start)?, parse(end)?);
            if start >= end {
                return Err(AnalysisError::InvalidRequest(format!(
                    "start_date {} must be before end_date {}",
                    start, end
                )));
            }
            Ok(RangeSpec::Dates { start, end })
        }
        _ => {
            let period = match period {
                Some(p) => p.parse::<Period>().map_err(AnalysisError::InvalidRequest)?,
                None => Period::default(),
            };
            Ok(RangeSpec::Period { period })
        }
    }
}

/// Request that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub index: String,
    pub tickers: Vec<String>,
    pub range: RangeSpec,
    pub threshold: f64,
}

#[derive(Serialize)]
struct CacheParams<'a> {
    index: &'a str,
    range: &'a RangeSpec,
    threshold: String,
}

impl ValidatedRequest {
    /// Fingerprint of the effective request; a missing period and an
    /// explicit `3mo` map to the same key.
    pub fn cache_key(&self) -> Result<String, AnalysisError> {
        fingerprint(&CacheParams {
            index: &self.index,
            range: &self.range,
            threshold: format!("{:.4}", self.threshold),
        })
        .map_err(|e| AnalysisError::Internal(format!("cache key: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeData {
    pub id: String,
    pub symbol: String,
    pub influence_score: f64,
    pub cluster_id: usize,
    pub centrality: CentralityRecord,
    pub connection_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeData {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterInfo {
    pub cluster_id: usize,
    pub size: usize,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub density: f64,
    pub avg_degree: f64,
    pub modularity: f64,
    pub num_clusters: usize,
}

/// Complete output of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub nodes: Vec<NodeData>,
    pub edges: Vec<EdgeData>,
    pub clusters: Vec<ClusterInfo>,
    pub stats: NetworkStats,
    pub index: String,
    pub period: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub threshold: f64,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector_heatmap: Option<SectorHeatmap>,
}

/// Tunables of the compute stage
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub max_nan_ratio: f64,
    pub centrality: CentralityOptions,
    pub influence: InfluenceWeights,
    pub sector_heatmap: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_nan_ratio: DEFAULT_MAX_NAN_RATIO,
            centrality: CentralityOptions::default(),
            influence: InfluenceWeights::default(),
            sector_heatmap: true,
        }
    }
}

/// Run every stage from prices to the assembled result.
pub fn compute(
    prices: &PriceTable,
    request: &ValidatedRequest,
    options: &PipelineOptions,
    timestamp: String,
) -> Result<AnalysisResult, AnalysisError> {
    let raw = log_returns(prices)?;
    let returns = clean(&raw, options.max_nan_ratio);

    if returns.n_cols() < MIN_TICKERS {
        return Err(AnalysisError::InsufficientData {
            expected: MIN_TICKERS,
            actual: returns.n_cols(),
        });
    }
    if returns.n_rows() < 2 {
        return Err(AnalysisError::InsufficientData {
            expected: 2,
            actual: returns.n_rows(),
        });
    }

    let corr = correlate(&returns);
    let adjacency = threshold(&corr, request.threshold)?;
    let graph = build(&adjacency);
    let records = centrality_with(&graph, &options.centrality);
    let scores = influence_weighted(&records, &options.influence);
    let (partition, modularity) = detect(&graph);

    let n = graph.node_count();
    if partition.len() != n || records.len() != n {
        return Err(AnalysisError::Internal(format!(
            "stage outputs disagree on node count ({} nodes, {} partition, {} centrality)",
            n,
            partition.len(),
            records.len()
        )));
    }

    let mut nodes: Vec<NodeData> = (0..n)
        .map(|i| {
            let ticker = graph.label(i);
            NodeData {
                id: ticker.to_string(),
                symbol: display_symbol(ticker).to_string(),
                influence_score: scores[i],
                cluster_id: partition[i],
                centrality: records[i],
                connection_count: graph.degree(i),
            }
        })
        .collect();
    // Stable: equal scores keep node order
    nodes.sort_by(|a, b| b.influence_score.total_cmp(&a.influence_score));

    let edges: Vec<EdgeData> = graph
        .edges()
        .iter()
        .map(|e| EdgeData {
            source: graph.label(e.source).to_string(),
            target: graph.label(e.target).to_string(),
            weight: round_to(e.weight, 4),
        })
        .collect();

    let mut members: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (node, &cluster) in partition.iter().enumerate() {
        members.entry(cluster).or_default().push(graph.label(node).to_string());
    }
    let clusters: Vec<ClusterInfo> = members
        .into_iter()
        .map(|(cluster_id, mut members)| {
            members.sort();
            ClusterInfo {
                cluster_id,
                size: members.len(),
                members,
            }
        })
        .collect();

    let total_edges = graph.edge_count();
    let density = if n > 1 {
        round_to(total_edges as f64 / (n * (n - 1) / 2) as f64, 4)
    } else {
        0.0
    };
    let degree_sum: usize = (0..n).map(|i| graph.degree(i)).sum();
    let stats = NetworkStats {
        total_nodes: n,
        total_edges,
        density,
        avg_degree: round_to(degree_sum as f64 / n.max(1) as f64, 2),
        modularity: round_to(modularity, 4),
        num_clusters: clusters.len(),
    };

    let heatmap = if options.sector_heatmap {
        match sector_heatmap(&corr) {
            Ok(h) => Some(h),
            Err(e) => {
                warn!(error = %e, "Sector heatmap generation failed");
                None
            }
        }
    } else {
        None
    };

    let (period, start_date, end_date) = match request.range {
        RangeSpec::Period { period } => (Some(period.as_str().to_string()), None, None),
        RangeSpec::Dates { start, end } => (
            None,
            Some(start.format(DATE_FORMAT).to_string()),
            Some(end.format(DATE_FORMAT).to_string()),
        ),
    };

    Ok(AnalysisResult {
        nodes,
        edges,
        clusters,
        stats,
        index: request.index.clone(),
        period,
        start_date,
        end_date,
        threshold: request.threshold,
        timestamp,
        sector_heatmap: heatmap,
    })
}

/// Fetches prices and runs the compute stage on the blocking pool.
#[derive(Debug)]
pub struct Analyzer {
    source: Arc<dyn PriceSource>,
    clock: Arc<dyn Clock>,
    registry: Arc<IndexRegistry>,
    permits: Arc<Semaphore>,
    options: PipelineOptions,
}

impl Analyzer {
    /// # Arguments
    /// * `workers` - Maximum concurrent compute stages (at least 1)
    pub fn new(
        source: Arc<dyn PriceSource>,
        clock: Arc<dyn Clock>,
        registry: Arc<IndexRegistry>,
        workers: usize,
        options: PipelineOptions,
    ) -> Self {
        Self {
            source,
            clock,
            registry,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            options,
        }
    }

    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn source(&self) -> &Arc<dyn PriceSource> {
        &self.source
    }

    pub fn validate(&self, request: &AnalysisRequest) -> Result<ValidatedRequest, AnalysisError> {
        request.validate(&self.registry)
    }

    /// Run `job` on the blocking pool once a worker permit is free.
    pub(crate) async fn run_blocking<T, F>(&self, job: F) -> Result<T, AnalysisError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, AnalysisError> + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AnalysisError::Internal(format!("worker pool closed: {}", e)))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| AnalysisError::Internal(format!("compute task failed: {}", e)))?
    }

    /// Fetch prices and run the full pipeline, bypassing any cache.
    ///
    /// `trigger` labels the run in metrics and logs (e.g. `analyze`, `live`).
    pub async fn run(&self, request: &ValidatedRequest, trigger: &str) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();
        let outcome = self.run_inner(request).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &outcome {
            Ok(result) => {
                metrics::record_pipeline_run(trigger, "success", elapsed);
                info!(
                    trigger,
                    index = %request.index,
                    nodes = result.stats.total_nodes,
                    edges = result.stats.total_edges,
                    clusters = result.stats.num_clusters,
                    elapsed_ms = (elapsed * 1000.0) as u64,
                    "Analysis complete"
                );
            }
            Err(e) => {
                metrics::record_pipeline_run(trigger, e.kind(), elapsed);
                match e {
                    AnalysisError::Internal(_) => error!(trigger, index = %request.index, error = %e, "Analysis pipeline error"),
                    _ => warn!(trigger, index = %request.index, error = %e, "Analysis failed"),
                }
            }
        }
        outcome
    }

    async fn run_inner(&self, request: &ValidatedRequest) -> Result<AnalysisResult, AnalysisError> {
        let prices = self.source.fetch(&request.tickers, &request.range).await?;
        if prices.len() < request.tickers.len() {
            warn!(
                requested = request.tickers.len(),
                received = prices.len(),
                "Partial price coverage"
            );
        }

        let request = request.clone();
        let options = self.options.clone();
        let timestamp = self.clock.now_iso();
        self.run_blocking(move || compute(&prices, &request, &options, timestamp))
            .await
    }
}

/// Cached front of the analyzer
#[derive(Debug)]
pub struct AnalysisService {
    analyzer: Arc<Analyzer>,
    cache: ResultCache<Arc<AnalysisResult>>,
}

impl AnalysisService {
    pub fn new(analyzer: Arc<Analyzer>, ttl: Duration, capacity: usize) -> Self {
        let cache = ResultCache::new(ttl, capacity, analyzer.clock().clone());
        Self { analyzer, cache }
    }

    pub fn analyzer(&self) -> &Arc<Analyzer> {
        &self.analyzer
    }

    pub fn cache(&self) -> &ResultCache<Arc<AnalysisResult>> {
        &self.cache
    }

    /// Validate, serve from cache when fresh, otherwise run and cache.
    ///
    /// Failed runs are not cached.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<Arc<AnalysisResult>, AnalysisError> {
        let validated = self.analyzer.validate(request)?;
        let key = validated.cache_key()?;

        if let Some(hit) = self.cache.get(&key) {
            info!(index = %validated.index, "Serving cached analysis");
            return Ok(hit);
        }

        let result = Arc::new(self.analyzer.run(&validated, "analyze").await?);
        self.cache.put(key, result.clone());
        Ok(result)
    }
}
