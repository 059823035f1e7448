//! Error types for the analysis pipeline

use crate::market_data::FetchError;
use thiserror::Error;

/// Errors that can occur while turning prices into a relationship graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Unknown index, bad period, malformed threshold or dates
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Too few tickers or observations survived cleaning
    #[error("Insufficient data: expected at least {expected}, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    /// Upstream provider returned nothing usable
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(String),

    /// Unexpected failure inside a pipeline stage
    #[error("Analysis failed: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Short machine-readable label, used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::InvalidRequest(_) => "invalid_request",
            AnalysisError::InsufficientData { .. } => "insufficient_data",
            AnalysisError::UpstreamFetch(_) => "upstream_fetch",
            AnalysisError::Internal(_) => "internal",
        }
    }
}

impl From<FetchError> for AnalysisError {
    fn from(err: FetchError) -> Self {
        AnalysisError::UpstreamFetch(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalysisError::InsufficientData {
            expected: 3,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient data: expected at least 3, got 1"
        );
    }

    #[test]
    fn test_fetch_error_maps_to_upstream() {
        let err: AnalysisError = FetchError::NoData.into();
        assert_eq!(err.kind(), "upstream_fetch");
    }
}
