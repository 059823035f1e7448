//! Louvain community detection
//!
//! Deterministic variant: nodes are visited in ascending order, candidate
//! communities are scanned in ascending id, and a node only moves on a
//! strictly positive gain over staying where it is.

use super::graph::Graph;
use super::round_to;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Node index -> cluster id
pub type Partition = Vec<usize>;

/// Smallest per-move gain treated as an improvement
const GAIN_EPSILON: f64 = 1e-12;
/// A level improving modularity by less than this ends the search
const MIN_LEVEL_IMPROVEMENT: f64 = 1e-7;
const MODULARITY_DECIMALS: i32 = 4;

/// Weighted graph of one Louvain level; self-loops hold collapsed weight.
#[derive(Debug, Clone)]
struct Level {
    neighbors: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    /// k_i, a self-loop counted twice
    degrees: Vec<f64>,
    /// 2m
    total_degree: f64,
}

impl Level {
    fn from_graph(graph: &Graph) -> Self {
        let n = graph.node_count();
        let neighbors: Vec<Vec<(usize, f64)>> = (0..n).map(|i| graph.neighbors(i).to_vec()).collect();
        Self::new(neighbors, vec![0.0; n])
    }

    fn new(neighbors: Vec<Vec<(usize, f64)>>, self_loops: Vec<f64>) -> Self {
        let degrees: Vec<f64> = neighbors
            .iter()
            .zip(self_loops.iter())
            .map(|(adj, &own)| adj.iter().map(|&(_, w)| w).sum::<f64>() + 2.0 * own)
            .collect();
        let total_degree = degrees.iter().sum();
        Self {
            neighbors,
            self_loops,
            degrees,
            total_degree,
        }
    }

    fn len(&self) -> usize {
        self.degrees.len()
    }

    /// Repeated passes of greedy node moves. Returns the community of each
    /// node and whether anything moved.
    fn local_moving(&self) -> (Vec<usize>, bool) {
        let n = self.len();
        let mut community: Vec<usize> = (0..n).collect();
        let mut totals = self.degrees.clone();
        let mut moved_any = false;

        loop {
            let mut moved = false;

            for node in 0..n {
                let current = community[node];
                let k = self.degrees[node];

                // Weight from `node` into each neighbouring community
                let mut links: BTreeMap<usize, f64> = BTreeMap::new();
                for &(other, w) in &self.neighbors[node] {
                    *links.entry(community[other]).or_insert(0.0) += w;
                }

                totals[current] -= k;

                let gain = |c: usize, totals: &[f64]| {
                    links.get(&c).copied().unwrap_or(0.0) - totals[c] * k / self.total_degree
                };

                let mut best = current;
                let mut best_gain = gain(current, &totals);
                for &candidate in links.keys() {
                    if candidate == current {
                        continue;
                    }
                    let g = gain(candidate, &totals);
                    if g > best_gain + GAIN_EPSILON {
                        best = candidate;
                        best_gain = g;
                    }
                }

                totals[best] += k;
                if best != current {
                    community[node] = best;
                    moved = true;
                }
            }

            if !moved {
                break;
            }
            moved_any = true;
        }

        (community, moved_any)
    }

    /// Collapse each community into one node.
    fn aggregate(&self, community: &[usize], count: usize) -> Level {
        let mut self_loops = vec![0.0; count];
        let mut links: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); count];

        for node in 0..self.len() {
            let c = community[node];
            self_loops[c] += self.self_loops[node];
            for &(other, w) in &self.neighbors[node] {
                let d = community[other];
                if c == d {
                    // Each internal edge is seen from both ends
                    self_loops[c] += w / 2.0;
                } else {
                    *links[c].entry(d).or_insert(0.0) += w;
                }
            }
        }

        let neighbors = links.into_iter().map(|m| m.into_iter().collect()).collect();
        Level::new(neighbors, self_loops)
    }

    fn modularity(&self, community: &[usize]) -> f64 {
        if self.total_degree == 0.0 {
            return 0.0;
        }
        let m = self.total_degree / 2.0;
        let mut internal: HashMap<usize, f64> = HashMap::new();
        let mut degree: HashMap<usize, f64> = HashMap::new();

        for node in 0..self.len() {
            let c = community[node];
            *degree.entry(c).or_insert(0.0) += self.degrees[node];
            *internal.entry(c).or_insert(0.0) += self.self_loops[node];
            for &(other, w) in &self.neighbors[node] {
                if other > node && community[other] == c {
                    *internal.entry(c).or_insert(0.0) += w;
                }
            }
        }

        degree
            .iter()
            .map(|(c, &d)| {
                let inside = internal.get(c).copied().unwrap_or(0.0);
                inside / m - (d / self.total_degree).powi(2)
            })
            .sum()
    }
}

/// Relabel ids by first appearance; returns the relabelled ids and their count.
fn renumber(ids: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    let relabelled = ids
        .iter()
        .map(|id| {
            let next = mapping.len();
            *mapping.entry(*id).or_insert(next)
        })
        .collect();
    (relabelled, mapping.len())
}

/// Modularity of `partition` on `graph`:
/// Q = (1/2m) Σ_ij [A_ij − k_i k_j / 2m] δ(c_i, c_j).
///
/// Zero for a graph without edges. `partition` must have one entry per node.
pub fn modularity(graph: &Graph, partition: &[usize]) -> f64 {
    debug_assert_eq!(partition.len(), graph.node_count());
    if graph.edge_count() == 0 || partition.len() != graph.node_count() {
        return 0.0;
    }
    Level::from_graph(graph).modularity(partition)
}

/// Partition `graph` into communities and report the modularity of the
/// result (rounded to 4 decimals).
///
/// - no nodes: empty partition, 0.0
/// - no edges: every node in its own cluster, 0.0
pub fn detect(graph: &Graph) -> (Partition, f64) {
    let n = graph.node_count();
    if n == 0 {
        return (Vec::new(), 0.0);
    }
    if graph.edge_count() == 0 {
        return ((0..n).collect(), 0.0);
    }

    let mut level = Level::from_graph(graph);
    let mut membership: Vec<usize> = (0..n).collect();
    let mut current_q = level.modularity(&membership);
    let mut depth = 0usize;

    loop {
        let (community, moved) = level.local_moving();
        if !moved {
            break;
        }

        let (community, count) = renumber(&community);
        let new_q = level.modularity(&community);
        for id in membership.iter_mut() {
            *id = community[*id];
        }
        depth += 1;
        debug!(level = depth, communities = count, modularity = new_q, "Louvain level");

        if new_q - current_q < MIN_LEVEL_IMPROVEMENT || count == level.len() {
            break;
        }
        current_q = new_q;
        level = level.aggregate(&community, count);
    }

    let (partition, clusters) = renumber(&membership);
    let q = round_to(modularity(graph, &partition), MODULARITY_DECIMALS);

    info!(communities = clusters, modularity = q, levels = depth, "Louvain detected communities");
    (partition, q)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("N{}", i)).collect()
    }

    fn two_triangles() -> Graph {
        Graph::from_edges(
            labels(6),
            &[
                (0, 1, 0.9),
                (1, 2, 0.9),
                (0, 2, 0.9),
                (3, 4, 0.9),
                (4, 5, 0.9),
                (3, 5, 0.9),
                (2, 3, 0.61),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_graph() {
        let g = Graph::from_edges(Vec::new(), &[]).unwrap();
        assert_eq!(detect(&g), (Vec::new(), 0.0));
    }

    #[test]
    fn test_no_edges_gives_singletons() {
        let g = Graph::from_edges(labels(4), &[]).unwrap();
        let (partition, q) = detect(&g);
        assert_eq!(partition, vec![0, 1, 2, 3]);
        assert_eq!(q, 0.0);
        assert_eq!(modularity(&g, &partition), 0.0);
    }

    #[test]
    fn test_two_triangles_split() {
        let g = two_triangles();
        let (partition, q) = detect(&g);
        assert_eq!(partition, vec![0, 0, 0, 1, 1, 1]);
        assert!(q > 0.3, "modularity {}", q);
    }

    #[test]
    fn test_detected_beats_singletons() {
        let g = two_triangles();
        let (partition, q) = detect(&g);
        let singletons: Vec<usize> = (0..g.node_count()).collect();
        assert!(modularity(&g, &singletons) <= q);
        assert!((modularity(&g, &partition) - q).abs() < 1e-4);
    }

    #[test]
    fn test_single_cluster_modularity_is_zero() {
        let g = two_triangles();
        assert!(modularity(&g, &[0; 6]).abs() < 1e-12);
    }

    #[test]
    fn test_disjoint_pairs_and_isolated() {
        let g = Graph::from_edges(labels(5), &[(0, 1, 0.95), (2, 3, 0.9)]).unwrap();
        let (partition, _) = detect(&g);
        assert_eq!(partition, vec![0, 0, 1, 1, 2]);
    }

    #[test]
    fn test_deterministic() {
        let g = two_triangles();
        assert_eq!(detect(&g), detect(&g));
    }

    #[test]
    fn test_renumber_first_appearance() {
        assert_eq!(renumber(&[4, 4, 1, 7, 1]), (vec![0, 0, 1, 2, 1], 3));
    }
}
