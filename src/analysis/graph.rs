//! Relationship graph, centrality and influence scoring
//!
//! The graph uses integer node indices with adjacency lists so the shortest
//! path and community algorithms stay independent of ticker strings.

use super::correlation::AdjacencyMatrix;
use super::error::AnalysisError;
use super::round_to;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Decimal places kept on centrality metrics
const CENTRALITY_DECIMALS: i32 = 6;
/// Decimal places kept on influence scores
const INFLUENCE_DECIMALS: i32 = 4;

/// Undirected weighted edge between two node indices (`source < target`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
}

/// Weighted undirected graph without self-loops.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    labels: Vec<String>,
    adjacency: Vec<Vec<(usize, f64)>>,
    edges: Vec<Edge>,
}

impl Graph {
    /// Build a graph from explicit edges.
    ///
    /// Rejects self-loops, non-positive weights, out-of-range indices and
    /// duplicated pairs.
    pub fn from_edges(labels: Vec<String>, edges: &[(usize, usize, f64)]) -> Result<Self, AnalysisError> {
        let n = labels.len();
        let mut graph = Graph {
            labels,
            adjacency: vec![Vec::new(); n],
            edges: Vec::with_capacity(edges.len()),
        };

        for &(a, b, weight) in edges {
            if a >= n || b >= n {
                return Err(AnalysisError::Internal(format!(
                    "edge ({}, {}) out of range for {} nodes",
                    a, b, n
                )));
            }
            if a == b {
                return Err(AnalysisError::Internal(format!("self-loop on node {}", a)));
            }
            if !(weight > 0.0) || !weight.is_finite() {
                return Err(AnalysisError::Internal(format!(
                    "edge ({}, {}) has invalid weight {}",
                    a, b, weight
                )));
            }
            if graph.adjacency[a].iter().any(|&(v, _)| v == b) {
                return Err(AnalysisError::Internal(format!("duplicate edge ({}, {})", a, b)));
            }
            graph.push_edge(a.min(b), a.max(b), weight);
        }

        Ok(graph)
    }

    fn push_edge(&mut self, source: usize, target: usize, weight: f64) {
        self.adjacency[source].push((target, weight));
        self.adjacency[target].push((source, weight));
        self.edges.push(Edge {
            source,
            target,
            weight,
        });
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, node: usize) -> &str {
        &self.labels[node]
    }

    pub fn node_count(&self) -> usize {
        self.labels.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn neighbors(&self, node: usize) -> &[(usize, f64)] {
        &self.adjacency[node]
    }

    /// Number of incident edges
    pub fn degree(&self, node: usize) -> usize {
        self.adjacency[node].len()
    }

    /// Sum of incident edge weights
    pub fn weighted_degree(&self, node: usize) -> f64 {
        self.adjacency[node].iter().map(|&(_, w)| w).sum()
    }

    /// Sum of all edge weights (m)
    pub fn total_weight(&self) -> f64 {
        self.edges.iter().map(|e| e.weight).sum()
    }
}

/// One node per column; an edge wherever the adjacency cell is non-zero.
pub fn build(adjacency: &AdjacencyMatrix) -> Graph {
    let n = adjacency.size();
    let mut graph = Graph {
        labels: adjacency.labels().to_vec(),
        adjacency: vec![Vec::new(); n],
        edges: Vec::new(),
    };

    for i in 0..n {
        for j in (i + 1)..n {
            let value = adjacency.get(i, j);
            if value != 0.0 {
                graph.push_edge(i, j, value.abs());
            }
        }
    }

    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Built graph"
    );
    graph
}

/// How an edge contributes to a shortest-path length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PathCost {
    /// Every edge costs 1
    #[default]
    Hops,
    /// Edge weight (absolute correlation) used directly as the cost
    Weight,
}

impl PathCost {
    #[inline]
    fn cost(self, weight: f64) -> f64 {
        match self {
            PathCost::Hops => 1.0,
            PathCost::Weight => weight,
        }
    }
}

/// Distance semantics used by the path-based metrics.
///
/// Betweenness defaults to weight-as-cost, so strongly correlated pairs look
/// *farther* apart. This mirrors the behaviour the service has always had;
/// see DESIGN.md before changing it. Closeness defaults to hop count so it
/// stays in [0, 1]; the service config overrides it with `closeness_cost`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CentralityOptions {
    pub betweenness_cost: PathCost,
    pub closeness_cost: PathCost,
}

impl Default for CentralityOptions {
    fn default() -> Self {
        Self {
            betweenness_cost: PathCost::Weight,
            closeness_cost: PathCost::Hops,
        }
    }
}

/// Per-node centrality metrics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CentralityRecord {
    pub degree: f64,
    pub betweenness: f64,
    pub closeness: f64,
}

/// Weights of the composite influence score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InfluenceWeights {
    pub degree: f64,
    pub betweenness: f64,
    pub closeness: f64,
}

impl Default for InfluenceWeights {
    fn default() -> Self {
        Self {
            degree: 0.4,
            betweenness: 0.3,
            closeness: 0.3,
        }
    }
}

impl InfluenceWeights {
    pub fn validate(&self) -> Result<(), String> {
        let parts = [self.degree, self.betweenness, self.closeness];
        if parts.iter().any(|w| !(0.0..=1.0).contains(w)) {
            return Err("influence weights must each be in [0, 1]".to_string());
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(format!("influence weights must sum to 1.0, got {}", sum));
        }
        Ok(())
    }
}

/// Single-source shortest paths with path counts (Brandes' first phase).
struct ShortestPaths {
    dist: Vec<f64>,
    sigma: Vec<f64>,
    preds: Vec<Vec<usize>>,
    /// Nodes in non-decreasing distance order
    order: Vec<usize>,
}

#[inline]
fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
}

/// Array-based Dijkstra; lowest index wins among equally distant candidates.
fn shortest_paths(graph: &Graph, source: usize, cost: PathCost) -> ShortestPaths {
    let n = graph.node_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut sigma = vec![0.0; n];
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut settled = vec![false; n];
    let mut order = Vec::with_capacity(n);

    dist[source] = 0.0;
    sigma[source] = 1.0;

    loop {
        let next = (0..n)
            .filter(|&v| !settled[v] && dist[v].is_finite())
            .min_by(|&a, &b| dist[a].total_cmp(&dist[b]).then(a.cmp(&b)));
        let Some(u) = next else { break };

        settled[u] = true;
        order.push(u);

        for &(v, w) in graph.neighbors(u) {
            if settled[v] {
                continue;
            }
            let alt = dist[u] + cost.cost(w);
            if dist[v].is_finite() && approx_eq(alt, dist[v]) {
                sigma[v] += sigma[u];
                preds[v].push(u);
            } else if alt < dist[v] {
                dist[v] = alt;
                sigma[v] = sigma[u];
                preds[v] = vec![u];
            }
        }
    }

    ShortestPaths {
        dist,
        sigma,
        preds,
        order,
    }
}

/// Normalized betweenness (Brandes), indexed by node.
fn betweenness(graph: &Graph, cost: PathCost) -> Vec<f64> {
    let n = graph.node_count();
    let mut scores = vec![0.0; n];
    if n <= 2 {
        return scores;
    }

    for source in 0..n {
        let sp = shortest_paths(graph, source, cost);
        let mut delta = vec![0.0; n];
        for &w in sp.order.iter().rev() {
            for &v in &sp.preds[w] {
                delta[v] += sp.sigma[v] / sp.sigma[w] * (1.0 + delta[w]);
            }
            if w != source {
                scores[w] += delta[w];
            }
        }
    }

    // Each unordered pair was visited from both ends
    let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
    scores.iter_mut().for_each(|s| *s *= scale);
    scores
}

/// `(reachable - 1) / Σ distance` over the node's component; 0 when isolated.
fn closeness(graph: &Graph, node: usize, cost: PathCost) -> f64 {
    let sp = shortest_paths(graph, node, cost);
    let reachable = sp.dist.iter().filter(|d| d.is_finite()).count();
    let total: f64 = sp.dist.iter().filter(|d| d.is_finite()).sum();
    if reachable > 1 && total > 0.0 {
        (reachable - 1) as f64 / total
    } else {
        0.0
    }
}

/// Degree, betweenness and closeness for every node, in node order.
pub fn centrality(graph: &Graph) -> Vec<CentralityRecord> {
    centrality_with(graph, &CentralityOptions::default())
}

pub fn centrality_with(graph: &Graph, options: &CentralityOptions) -> Vec<CentralityRecord> {
    let n = graph.node_count();
    if n == 0 {
        return Vec::new();
    }

    let between = betweenness(graph, options.betweenness_cost);

    (0..n)
        .map(|node| {
            let degree = if n > 1 {
                graph.degree(node) as f64 / (n - 1) as f64
            } else {
                0.0
            };
            CentralityRecord {
                degree: round_to(degree, CENTRALITY_DECIMALS),
                betweenness: round_to(between[node], CENTRALITY_DECIMALS),
                closeness: round_to(closeness(graph, node, options.closeness_cost), CENTRALITY_DECIMALS),
            }
        })
        .collect()
}

/// Min-max scaled values; all zero when every value is equal.
fn min_max(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max > min {
        values.iter().map(|v| (v - min) / (max - min)).collect()
    } else {
        vec![0.0; values.len()]
    }
}

/// Composite influence score with the default 0.4/0.3/0.3 weights.
pub fn influence(records: &[CentralityRecord]) -> Vec<f64> {
    influence_weighted(records, &InfluenceWeights::default())
}

pub fn influence_weighted(records: &[CentralityRecord], weights: &InfluenceWeights) -> Vec<f64> {
    if records.is_empty() {
        return Vec::new();
    }

    let degree = min_max(&records.iter().map(|r| r.degree).collect::<Vec<_>>());
    let between = min_max(&records.iter().map(|r| r.betweenness).collect::<Vec<_>>());
    let close = min_max(&records.iter().map(|r| r.closeness).collect::<Vec<_>>());

    (0..records.len())
        .map(|i| {
            let score = weights.degree * degree[i]
                + weights.betweenness * between[i]
                + weights.closeness * close[i];
            round_to(score, INFLUENCE_DECIMALS)
        })
        .collect()
}
