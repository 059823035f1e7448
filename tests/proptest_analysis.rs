//! Property-based tests for the correlation and graph stages
//!
//! These tests use proptest to verify invariants across many random inputs,
//! catching edge cases that unit tests might miss.

use corrnet::analysis::{
    build, centrality, correlate, detect, influence, modularity, threshold, LabeledMatrix,
    ReturnMatrix,
};
use proptest::prelude::*;

fn labels(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("T{}", i)).collect()
}

/// 2..7 return columns of equal length
fn return_matrix() -> impl Strategy<Value = ReturnMatrix> {
    (2usize..7, 3usize..40).prop_flat_map(|(cols, rows)| {
        prop::collection::vec(prop::collection::vec(-0.1f64..0.1f64, rows), cols)
            .prop_map(move |columns| ReturnMatrix::from_columns(labels(cols), columns).unwrap())
    })
}

/// Symmetric matrix with unit diagonal and entries in [-1, 1]
fn similarity_matrix() -> impl Strategy<Value = LabeledMatrix> {
    (1usize..12).prop_flat_map(|n| {
        prop::collection::vec(-1.0f64..=1.0f64, n * n).prop_map(move |raw| {
            let mut data = vec![vec![0.0; n]; n];
            for i in 0..n {
                data[i][i] = 1.0;
                for j in (i + 1)..n {
                    data[i][j] = raw[i * n + j];
                    data[j][i] = raw[i * n + j];
                }
            }
            LabeledMatrix::from_rows(labels(n), data).unwrap()
        })
    })
}

proptest! {
    /// Correlation matrices are symmetric, bounded, with a unit diagonal
    #[test]
    fn correlation_is_symmetric_with_unit_diagonal(returns in return_matrix()) {
        let corr = correlate(&returns);
        let n = corr.size();
        prop_assert_eq!(n, returns.n_cols());
        for i in 0..n {
            prop_assert_eq!(corr.get(i, i), 1.0);
            for j in 0..n {
                prop_assert_eq!(corr.get(i, j), corr.get(j, i));
                prop_assert!(corr.get(i, j).abs() <= 1.0);
            }
        }
    }

    /// Thresholding twice changes nothing and clears the diagonal
    #[test]
    fn threshold_is_idempotent(matrix in similarity_matrix(), t in 0.05f64..0.95f64) {
        let once = threshold(&matrix, t).unwrap();
        let twice = threshold(&once, t).unwrap();
        prop_assert_eq!(&once, &twice);
        for i in 0..once.size() {
            prop_assert_eq!(once.get(i, i), 0.0);
            for j in 0..once.size() {
                let v = once.get(i, j);
                prop_assert!(v == 0.0 || v.abs() >= t);
            }
        }
    }

    /// Graph has no self-loops, positive weights and one edge per retained pair
    #[test]
    fn graph_edges_are_well_formed(matrix in similarity_matrix(), t in 0.05f64..0.95f64) {
        let adjacency = threshold(&matrix, t).unwrap();
        let graph = build(&adjacency);

        prop_assert_eq!(graph.node_count(), matrix.size());
        let mut expected = 0;
        for i in 0..adjacency.size() {
            for j in (i + 1)..adjacency.size() {
                if adjacency.get(i, j) != 0.0 {
                    expected += 1;
                }
            }
        }
        prop_assert_eq!(graph.edge_count(), expected);
        for edge in graph.edges() {
            prop_assert!(edge.source != edge.target);
            prop_assert!(edge.weight > 0.0);
        }
    }

    /// Every node gets exactly one cluster and ids are contiguous from 0
    #[test]
    fn partition_covers_every_node(matrix in similarity_matrix(), t in 0.05f64..0.95f64) {
        let graph = build(&threshold(&matrix, t).unwrap());
        let (partition, _) = detect(&graph);

        prop_assert_eq!(partition.len(), graph.node_count());
        let clusters = partition.iter().copied().max().map_or(0, |m| m + 1);
        for id in 0..clusters {
            prop_assert!(partition.contains(&id));
        }
    }

    /// Louvain never does worse than leaving every node on its own
    #[test]
    fn detected_modularity_beats_singletons(matrix in similarity_matrix(), t in 0.05f64..0.95f64) {
        let graph = build(&threshold(&matrix, t).unwrap());
        let (partition, q) = detect(&graph);
        let singletons: Vec<usize> = (0..graph.node_count()).collect();

        let baseline = modularity(&graph, &singletons);
        prop_assert!(q >= baseline - 1e-4, "q = {}, singletons = {}", q, baseline);
        prop_assert!((q - modularity(&graph, &partition)).abs() <= 5e-5 + 1e-12);
        prop_assert!((-0.5..=1.0).contains(&q));
    }

    /// Influence scores stay within [0, 1]
    #[test]
    fn influence_is_bounded(matrix in similarity_matrix(), t in 0.05f64..0.95f64) {
        let graph = build(&threshold(&matrix, t).unwrap());
        let records = centrality(&graph);
        for score in influence(&records) {
            prop_assert!((0.0..=1.0 + 1e-9).contains(&score));
        }
        for record in &records {
            prop_assert!((0.0..=1.0 + 1e-9).contains(&record.degree));
            prop_assert!((0.0..=1.0 + 1e-9).contains(&record.betweenness));
        }
    }
}
