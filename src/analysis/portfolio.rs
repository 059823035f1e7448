//! Portfolio diversification check
//!
//! Scores a user-chosen basket by its average pairwise return correlation.

use super::correlation::correlate;
use super::error::AnalysisError;
use super::pipeline::{resolve_range, Analyzer};
use super::preprocess::{clean, log_returns};
use super::round_to;
use crate::market_data::indices::display_symbol;
use crate::types::PriceTable;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const MIN_PORTFOLIO_TICKERS: usize = 2;
pub const MAX_PORTFOLIO_TICKERS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRequest {
    pub tickers: Vec<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl PortfolioRequest {
    /// Trimmed, upper-cased, non-empty tickers in request order
    pub fn normalized_tickers(&self) -> Vec<String> {
        self.tickers
            .iter()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Moderate Risk")]
    Moderate,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskLevel {
    /// Low at 70 and above, Moderate from 40, High below
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            RiskLevel::Low
        } else if score >= 40.0 {
            RiskLevel::Moderate
        } else {
            RiskLevel::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairCorrelation {
    pub ticker1: String,
    pub ticker2: String,
    pub correlation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioReport {
    pub tickers_found: Vec<String>,
    pub tickers_missing: Vec<String>,
    /// 0-100, higher = more diversified
    pub diversification_score: f64,
    pub risk_level: RiskLevel,
    pub avg_correlation: f64,
    /// Strongest (by absolute value) first
    pub correlations: Vec<PairCorrelation>,
    pub correlation_matrix: Vec<Vec<f64>>,
    pub matrix_labels: Vec<String>,
    pub timestamp: String,
}

/// Diversification score from the mean pairwise correlation
pub fn diversification_score(avg_correlation: f64) -> f64 {
    ((1.0 - avg_correlation) * 100.0).clamp(0.0, 100.0)
}

/// Score the basket `requested` given the fetched `prices`.
pub fn assess(prices: &PriceTable, requested: &[String], timestamp: String) -> Result<PortfolioReport, AnalysisError> {
    let (found, missing): (Vec<String>, Vec<String>) =
        requested.iter().cloned().partition(|t| prices.contains(t));

    if found.len() < MIN_PORTFOLIO_TICKERS {
        return Err(AnalysisError::InsufficientData {
            expected: MIN_PORTFOLIO_TICKERS,
            actual: found.len(),
        });
    }

    let returns = clean(&log_returns(prices)?, super::preprocess::DEFAULT_MAX_NAN_RATIO);
    if returns.n_cols() < MIN_PORTFOLIO_TICKERS || returns.n_rows() < 2 {
        return Err(AnalysisError::InsufficientData {
            expected: MIN_PORTFOLIO_TICKERS,
            actual: returns.n_cols(),
        });
    }

    let corr = correlate(&returns);
    let labels: Vec<String> = corr
        .labels()
        .iter()
        .map(|t| display_symbol(t).to_string())
        .collect();

    let n = corr.size();
    let mut correlations = Vec::with_capacity(n * (n - 1) / 2);
    let mut values = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            let value = corr.get(i, j);
            values.push(value);
            correlations.push(PairCorrelation {
                ticker1: labels[i].clone(),
                ticker2: labels[j].clone(),
                correlation: round_to(value, 3),
            });
        }
    }
    correlations.sort_by(|a, b| b.correlation.abs().total_cmp(&a.correlation.abs()));

    let avg = values.iter().sum::<f64>() / values.len() as f64;
    let score = diversification_score(avg);

    info!(
        tickers = n,
        avg_correlation = avg,
        score,
        "Portfolio assessed"
    );

    Ok(PortfolioReport {
        tickers_found: found.iter().map(|t| display_symbol(t).to_string()).collect(),
        tickers_missing: missing,
        diversification_score: round_to(score, 1),
        risk_level: RiskLevel::from_score(score),
        avg_correlation: round_to(avg, 3),
        correlations,
        correlation_matrix: corr
            .rows()
            .iter()
            .map(|row| row.iter().map(|v| round_to(*v, 3)).collect())
            .collect(),
        matrix_labels: labels,
        timestamp,
    })
}

impl Analyzer {
    /// Fetch the basket and score its diversification.
    pub async fn check_portfolio(&self, request: &PortfolioRequest) -> Result<PortfolioReport, AnalysisError> {
        let tickers = request.normalized_tickers();
        if !(MIN_PORTFOLIO_TICKERS..=MAX_PORTFOLIO_TICKERS).contains(&tickers.len()) {
            return Err(AnalysisError::InvalidRequest(format!(
                "Between {} and {} tickers required, got {}",
                MIN_PORTFOLIO_TICKERS,
                MAX_PORTFOLIO_TICKERS,
                tickers.len()
            )));
        }
        let range = resolve_range(
            request.period.as_deref(),
            request.start_date.as_deref(),
            request.end_date.as_deref(),
        )?;

        let prices = self.source().fetch(&tickers, &range).await?;
        let timestamp = self.clock().now_iso();
        self.run_blocking(move || assess(&prices, &tickers, timestamp))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PricePoint;
    use chrono::NaiveDate;

    fn table(series: &[(&str, &[f64])]) -> PriceTable {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut t = PriceTable::new();
        for (ticker, prices) in series {
            let points = prices
                .iter()
                .enumerate()
                .map(|(i, &price)| PricePoint {
                    date: base + chrono::Duration::days(i as i64),
                    price,
                })
                .collect();
            t.insert(*ticker, points);
        }
        t
    }

    #[test]
    fn test_risk_levels() {
        assert_eq!(RiskLevel::from_score(70.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(69.9), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(40.0), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(10.0), RiskLevel::High);
    }

    #[test]
    fn test_score_clamped() {
        assert_eq!(diversification_score(-0.5), 100.0);
        assert_eq!(diversification_score(1.0), 0.0);
        assert!((diversification_score(0.25) - 75.0).abs() < 1e-12);
    }

    #[test]
    fn test_assess_identical_moves_is_high_risk() {
        let prices = table(&[
            ("AAA.NS", &[10.0, 11.0, 10.5, 12.0, 11.0]),
            ("BBB.NS", &[20.0, 22.0, 21.0, 24.0, 22.0]),
        ]);
        let requested = vec!["AAA.NS".to_string(), "BBB.NS".to_string(), "ZZZ".to_string()];
        let report = assess(&prices, &requested, "ts".into()).unwrap();

        assert_eq!(report.tickers_found, vec!["AAA", "BBB"]);
        assert_eq!(report.tickers_missing, vec!["ZZZ"]);
        assert_eq!(report.avg_correlation, 1.0);
        assert_eq!(report.diversification_score, 0.0);
        assert_eq!(report.risk_level, RiskLevel::High);
        assert_eq!(report.matrix_labels, vec!["AAA", "BBB"]);
    }

    #[test]
    fn test_assess_sorts_by_strength() {
        let prices = table(&[
            ("A", &[10.0, 11.0, 10.0, 11.0, 10.0, 11.0]),
            ("B", &[10.0, 11.0, 10.0, 11.0, 10.0, 11.5]),
            ("C", &[10.0, 10.2, 10.1, 10.4, 10.0, 10.3]),
        ]);
        let requested: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        let report = assess(&prices, &requested, "ts".into()).unwrap();
        assert_eq!(report.correlations.len(), 3);
        assert!(report
            .correlations
            .windows(2)
            .all(|w| w[0].correlation.abs() >= w[1].correlation.abs()));
    }

    #[test]
    fn test_assess_needs_two_found() {
        let prices = table(&[("A", &[1.0, 2.0, 3.0])]);
        let err = assess(&prices, &["A".to_string(), "B".to_string()], "ts".into()).unwrap_err();
        assert_eq!(err.kind(), "insufficient_data");
    }

    #[test]
    fn test_normalized_tickers() {
        let req = PortfolioRequest {
            tickers: vec![" aapl ".into(), "".into(), "msft".into()],
            period: None,
            start_date: None,
            end_date: None,
        };
        assert_eq!(req.normalized_tickers(), vec!["AAPL", "MSFT"]);
    }
}
