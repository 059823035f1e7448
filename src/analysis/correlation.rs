//! Correlation matrix and threshold filtering
//!
//! Builds the Pearson correlation matrix over cleaned log returns and turns it
//! into the adjacency matrix the graph is built from.

use super::error::AnalysisError;
use super::preprocess::ReturnMatrix;
use serde::Serialize;
use tracing::info;

/// Square matrix with one label per row/column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledMatrix {
    labels: Vec<String>,
    data: Vec<Vec<f64>>,
}

/// Pearson correlations; symmetric with a unit diagonal.
pub type CorrelationMatrix = LabeledMatrix;

/// Thresholded correlations; symmetric with a zero diagonal.
pub type AdjacencyMatrix = LabeledMatrix;

impl LabeledMatrix {
    pub fn from_rows(labels: Vec<String>, data: Vec<Vec<f64>>) -> Result<Self, AnalysisError> {
        let n = labels.len();
        if data.len() != n || data.iter().any(|row| row.len() != n) {
            return Err(AnalysisError::Internal(format!(
                "matrix is not {}x{}",
                n, n
            )));
        }
        Ok(Self { labels, data })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i][j]
    }

    /// Mean of the strictly upper triangle, 0.0 for matrices smaller than 2x2
    pub fn mean_off_diagonal(&self) -> f64 {
        let n = self.size();
        if n < 2 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                sum += self.data[i][j];
            }
        }
        sum / (n * (n - 1) / 2) as f64
    }
}

/// Calculate Pearson correlation coefficient between two return series
///
/// Returns a value in [-1.0, 1.0]. A constant series has no defined
/// correlation and yields 0.0.
///
/// # Mathematical Definition
/// r = Σ[(xi - x̄)(yi - ȳ)] / √[Σ(xi - x̄)² × Σ(yi - ȳ)²]
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.len() < 2 {
        return 0.0;
    }

    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;

    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        covariance += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }

    let correlation = covariance / (var_a.sqrt() * var_b.sqrt());
    if correlation.is_finite() {
        correlation.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Pairwise Pearson correlation over all return columns, O(n²·T).
pub fn correlate(returns: &ReturnMatrix) -> CorrelationMatrix {
    let n = returns.n_cols();
    let columns = returns.columns();
    let mut data = vec![vec![0.0; n]; n];

    for i in 0..n {
        data[i][i] = 1.0;
        for j in (i + 1)..n {
            let r = pearson(&columns[i], &columns[j]);
            data[i][j] = r;
            data[j][i] = r;
        }
    }

    info!(size = n, observations = returns.n_rows(), "Computed correlation matrix");

    LabeledMatrix {
        labels: returns.tickers().to_vec(),
        data,
    }
}

/// Zero every off-diagonal cell with `|value| < t` and the whole diagonal.
///
/// `t` must lie strictly inside (0, 1). Applying the same threshold twice
/// gives the same matrix.
pub fn threshold(matrix: &LabeledMatrix, t: f64) -> Result<AdjacencyMatrix, AnalysisError> {
    if !(t > 0.0 && t < 1.0) {
        return Err(AnalysisError::InvalidRequest(format!(
            "threshold must be in (0, 1), got {}",
            t
        )));
    }

    let n = matrix.size();
    let mut data = matrix.data.clone();
    let mut retained = 0usize;

    for (i, row) in data.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            if i == j || value.abs() < t {
                *value = 0.0;
            } else if j > i {
                retained += 1;
            }
        }
    }

    info!(threshold = t, edges = retained, size = n, "Threshold applied");

    Ok(LabeledMatrix {
        labels: matrix.labels.clone(),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn returns(cols: Vec<Vec<f64>>) -> ReturnMatrix {
        let tickers = (0..cols.len()).map(|i| format!("T{}", i)).collect();
        ReturnMatrix::from_columns(tickers, cols).unwrap()
    }

    #[test]
    fn test_perfect_correlation() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let b = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_negative_correlation() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let b = vec![5.0, 4.0, 3.0, 2.0, 1.0];
        assert!((pearson(&a, &b) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_series_is_uncorrelated() {
        let a = vec![1.0, 1.0, 1.0, 1.0];
        let b = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(pearson(&a, &b), 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert_eq!(pearson(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_correlate_unit_diagonal_and_symmetry() {
        let m = correlate(&returns(vec![
            vec![0.01, -0.02, 0.03, 0.0],
            vec![0.02, -0.01, 0.01, 0.01],
            vec![-0.01, 0.02, 0.0, 0.03],
        ]));
        for i in 0..3 {
            assert_eq!(m.get(i, i), 1.0);
            for j in 0..3 {
                assert_eq!(m.get(i, j), m.get(j, i));
            }
        }
    }

    #[test]
    fn test_threshold_zeroes_weak_and_diagonal() {
        let m = LabeledMatrix::from_rows(
            vec!["A".into(), "B".into(), "C".into()],
            vec![
                vec![1.0, 0.8, -0.7],
                vec![0.8, 1.0, 0.3],
                vec![-0.7, 0.3, 1.0],
            ],
        )
        .unwrap();
        let adj = threshold(&m, 0.6).unwrap();
        assert_eq!(
            adj.rows(),
            &[
                vec![0.0, 0.8, -0.7],
                vec![0.8, 0.0, 0.0],
                vec![-0.7, 0.0, 0.0]
            ]
        );
        assert_eq!(threshold(&adj, 0.6).unwrap(), adj);
    }

    #[test]
    fn test_threshold_bounds() {
        let m = LabeledMatrix::from_rows(vec!["A".into()], vec![vec![1.0]]).unwrap();
        assert!(threshold(&m, 0.0).is_err());
        assert!(threshold(&m, 1.0).is_err());
        assert!(threshold(&m, f64::NAN).is_err());
    }

    #[test]
    fn test_mean_off_diagonal() {
        let m = LabeledMatrix::from_rows(
            vec!["A".into(), "B".into(), "C".into()],
            vec![
                vec![1.0, 0.5, 0.1],
                vec![0.5, 1.0, 0.3],
                vec![0.1, 0.3, 1.0],
            ],
        )
        .unwrap();
        assert!((m.mean_off_diagonal() - 0.3).abs() < 1e-12);
    }
}
