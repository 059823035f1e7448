//! Log-return computation and gap cleaning
//!
//! Prices from the upstream provider are aligned on the union of their dates,
//! converted to daily log returns and then cleaned so every surviving column
//! has a value on every surviving row.

use super::error::AnalysisError;
use crate::types::PriceTable;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

/// Default maximum fraction of missing returns tolerated per ticker
pub const DEFAULT_MAX_NAN_RATIO: f64 = 0.3;

/// Log returns before cleaning; `None` marks a missing observation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReturns {
    pub tickers: Vec<String>,
    /// Date of each return row (the later of the two prices)
    pub dates: Vec<NaiveDate>,
    /// Column-major: `columns[ticker][row]`
    pub columns: Vec<Vec<Option<f64>>>,
}

impl RawReturns {
    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }
}

/// Cleaned, gap-free log returns (column-major).
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnMatrix {
    tickers: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl ReturnMatrix {
    /// Build a matrix from equally long columns.
    pub fn from_columns(tickers: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self, AnalysisError> {
        if tickers.len() != columns.len() {
            return Err(AnalysisError::Internal(format!(
                "{} tickers but {} return columns",
                tickers.len(),
                columns.len()
            )));
        }
        if let Some(first) = columns.first() {
            let rows = first.len();
            if columns.iter().any(|c| c.len() != rows) {
                return Err(AnalysisError::Internal(
                    "return columns have different lengths".to_string(),
                ));
            }
        }
        Ok(Self { tickers, columns })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn column(&self, ticker: &str) -> Option<&[f64]> {
        self.tickers
            .iter()
            .position(|t| t == ticker)
            .map(|i| self.columns[i].as_slice())
    }

    pub fn n_cols(&self) -> usize {
        self.tickers.len()
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.len())
    }
}

/// Compute daily log returns: `ln(p[t] / p[t-1])`, first row dropped.
///
/// Series are aligned on the union of all dates, so a ticker that did not
/// trade on a date gets a missing price there; any return touching a missing
/// or non-positive price is missing.
pub fn log_returns(prices: &PriceTable) -> Result<RawReturns, AnalysisError> {
    let all_dates: BTreeSet<NaiveDate> = prices
        .tickers()
        .filter_map(|t| prices.get(t))
        .flat_map(|series| series.iter().map(|p| p.date))
        .collect();
    let dates: Vec<NaiveDate> = all_dates.into_iter().collect();

    if dates.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            expected: 2,
            actual: dates.len(),
        });
    }

    let row_of: HashMap<NaiveDate, usize> = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

    let mut tickers = Vec::with_capacity(prices.len());
    let mut columns = Vec::with_capacity(prices.len());

    for ticker in prices.tickers() {
        let mut aligned: Vec<Option<f64>> = vec![None; dates.len()];
        for point in prices.get(ticker).unwrap_or_default() {
            if let Some(&row) = row_of.get(&point.date) {
                aligned[row] = Some(point.price);
            }
        }

        let column: Vec<Option<f64>> = aligned
            .windows(2)
            .map(|w| match (w[0], w[1]) {
                (Some(prev), Some(cur)) if prev > 0.0 && cur > 0.0 => {
                    let r = (cur / prev).ln();
                    r.is_finite().then_some(r)
                }
                _ => None,
            })
            .collect();

        tickers.push(ticker.to_string());
        columns.push(column);
    }

    let raw = RawReturns {
        tickers,
        dates: dates[1..].to_vec(),
        columns,
    };
    info!(
        tickers = raw.tickers.len(),
        rows = raw.n_rows(),
        "Computed log returns"
    );
    Ok(raw)
}

/// Drop sparse tickers, fill gaps, and drop rows that are still incomplete.
///
/// 1. Columns whose missing ratio exceeds `max_nan_ratio` are removed.
/// 2. Remaining gaps are forward-filled, then back-filled.
/// 3. Rows still holding a missing value are removed.
pub fn clean(returns: &RawReturns, max_nan_ratio: f64) -> ReturnMatrix {
    let total_rows = returns.n_rows();

    let mut kept_tickers = Vec::new();
    let mut kept_columns: Vec<Vec<Option<f64>>> = Vec::new();
    let mut dropped = Vec::new();

    for (ticker, column) in returns.tickers.iter().zip(returns.columns.iter()) {
        let missing = column.iter().filter(|v| v.is_none()).count();
        let ratio = if total_rows == 0 {
            0.0
        } else {
            missing as f64 / total_rows as f64
        };
        if ratio > max_nan_ratio {
            dropped.push(ticker.clone());
            continue;
        }
        kept_tickers.push(ticker.clone());
        kept_columns.push(fill_gaps(column));
    }

    if !dropped.is_empty() {
        warn!(
            count = dropped.len(),
            max_nan_ratio,
            tickers = ?dropped,
            "Dropping tickers with too many missing returns"
        );
    }

    let complete_rows: Vec<usize> = (0..total_rows)
        .filter(|&row| kept_columns.iter().all(|c| c[row].is_some()))
        .collect();

    let columns: Vec<Vec<f64>> = kept_columns
        .iter()
        .map(|c| complete_rows.iter().filter_map(|&row| c[row]).collect())
        .collect();

    info!(
        tickers = kept_tickers.len(),
        observations = complete_rows.len(),
        "Cleaned return data"
    );

    ReturnMatrix {
        tickers: kept_tickers,
        columns,
    }
}

/// Forward-fill then back-fill a single column.
fn fill_gaps(column: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut filled = column.to_vec();

    let mut last = None;
    for value in filled.iter_mut() {
        match value {
            Some(v) => last = Some(*v),
            None => *value = last,
        }
    }

    let mut next = None;
    for value in filled.iter_mut().rev() {
        match value {
            Some(v) => next = Some(*v),
            None => *value = next,
        }
    }

    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PricePoint;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series(prices: &[(u32, f64)]) -> Vec<PricePoint> {
        prices
            .iter()
            .map(|&(day, price)| PricePoint { date: d(day), price })
            .collect()
    }

    #[test]
    fn test_log_returns_basic() {
        let mut table = PriceTable::new();
        table.insert("AAA", series(&[(1, 100.0), (2, 110.0), (3, 99.0)]));
        let raw = log_returns(&table).unwrap();

        assert_eq!(raw.n_rows(), 2);
        assert_eq!(raw.dates, vec![d(2), d(3)]);
        let r = &raw.columns[0];
        assert!((r[0].unwrap() - (110.0f64 / 100.0).ln()).abs() < 1e-12);
        assert!((r[1].unwrap() - (99.0f64 / 110.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_log_returns_requires_two_rows() {
        let mut table = PriceTable::new();
        table.insert("AAA", series(&[(1, 100.0)]));
        assert_eq!(
            log_returns(&table),
            Err(AnalysisError::InsufficientData {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_gap_produces_missing_returns() {
        let mut table = PriceTable::new();
        table.insert("AAA", series(&[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)]));
        table.insert("BBB", series(&[(1, 1.0), (3, 3.0), (4, 4.0)]));
        let raw = log_returns(&table).unwrap();

        let bbb = &raw.columns[1];
        assert_eq!(bbb[0], None); // day 1 -> day 2 (missing)
        assert_eq!(bbb[1], None); // day 2 (missing) -> day 3
        assert!(bbb[2].is_some());
    }

    #[test]
    fn test_clean_drops_sparse_columns_and_fills() {
        let raw = RawReturns {
            tickers: vec!["A".into(), "B".into(), "C".into()],
            dates: (1..=5).map(d).collect(),
            columns: vec![
                vec![Some(0.1), Some(0.2), Some(0.3), Some(0.4), Some(0.5)],
                vec![None, Some(0.2), None, Some(0.4), Some(0.5)], // 40% missing
                vec![None, Some(0.2), Some(0.3), Some(0.4), None], // 40% missing
            ],
        };
        let cleaned = clean(&raw, 0.3);
        assert_eq!(cleaned.tickers(), &["A".to_string()]);
        assert_eq!(cleaned.n_rows(), 5);

        let cleaned = clean(&raw, 0.5);
        assert_eq!(cleaned.n_cols(), 3);
        // B: forward fill of row 2, back fill of row 0
        assert_eq!(cleaned.column("B").unwrap(), &[0.2, 0.2, 0.2, 0.4, 0.5]);
        // C: back fill row 0, forward fill row 4
        assert_eq!(cleaned.column("C").unwrap(), &[0.2, 0.2, 0.3, 0.4, 0.4]);
    }

    #[test]
    fn test_clean_drops_rows_of_empty_column() {
        let raw = RawReturns {
            tickers: vec!["A".into(), "B".into()],
            dates: (1..=3).map(d).collect(),
            columns: vec![vec![Some(0.1), Some(0.2), Some(0.3)], vec![None, None, None]],
        };
        let cleaned = clean(&raw, 1.0);
        assert_eq!(cleaned.n_cols(), 2);
        assert_eq!(cleaned.n_rows(), 0);
    }

    #[test]
    fn test_from_columns_rejects_ragged() {
        let result = ReturnMatrix::from_columns(
            vec!["A".into(), "B".into()],
            vec![vec![0.1, 0.2], vec![0.1]],
        );
        assert!(result.is_err());
    }
}
