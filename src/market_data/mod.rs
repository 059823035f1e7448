//! Upstream price providers and the index registry
//!
//! `PriceSource` lets the pipeline swap between the HTTP provider, the
//! synthetic generator and test doubles without touching analysis code.

pub mod indices;
pub mod synthetic;
pub mod yahoo;

use crate::types::{PriceTable, RangeSpec};
use async_trait::async_trait;
use thiserror::Error;

pub use indices::{IndexInfo, IndexRegistry};
pub use synthetic::{FactorGroup, SyntheticPriceSource};
pub use yahoo::YahooPriceSource;

/// Errors returned by an upstream price provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// None of the requested tickers returned any prices
    #[error("No price data returned for the given tickers and range")]
    NoData,

    /// Network or HTTP-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body could not be interpreted
    #[error("Malformed response for {ticker}: {reason}")]
    Malformed { ticker: String, reason: String },
}

/// Source of daily closing prices.
///
/// Partial coverage is a success: tickers without data are simply absent
/// from the returned table. Only a total absence of data or a transport
/// failure is an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self, tickers: &[String], range: &RangeSpec) -> Result<PriceTable, FetchError>;

    /// Short provider name for logs
    fn name(&self) -> &'static str {
        "unknown"
    }
}

impl std::fmt::Debug for dyn PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PriceSource({})", self.name())
    }
}
