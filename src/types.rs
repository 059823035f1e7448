//! Common Types Module
//!
//! Shared types used across the codebase to avoid circular dependencies.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Preset lookback window accepted by the analysis endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
}

impl Period {
    pub const VALID: &'static [&'static str] = &["1mo", "3mo", "6mo", "1y"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::OneYear => "1y",
        }
    }

    /// Calendar days covered by the period.
    pub fn days(&self) -> i64 {
        match self {
            Period::OneMonth => 30,
            Period::ThreeMonths => 91,
            Period::SixMonths => 182,
            Period::OneYear => 365,
        }
    }
}

impl Default for Period {
    fn default() -> Self {
        Period::ThreeMonths
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1mo" => Ok(Period::OneMonth),
            "3mo" => Ok(Period::ThreeMonths),
            "6mo" => Ok(Period::SixMonths),
            "1y" => Ok(Period::OneYear),
            other => Err(format!(
                "Invalid period '{}'. Valid: {:?}",
                other,
                Period::VALID
            )),
        }
    }
}

/// Which slice of history to fetch from the upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RangeSpec {
    Period { period: Period },
    Dates { start: NaiveDate, end: NaiveDate },
}

impl RangeSpec {
    /// Resolve to an inclusive-exclusive date window ending at `today`.
    pub fn window(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match *self {
            RangeSpec::Period { period } => (today - chrono::Duration::days(period.days()), today),
            RangeSpec::Dates { start, end } => (start, end),
        }
    }
}

/// A single daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Closing price histories keyed by ticker.
///
/// Each series is kept sorted by date; tickers the provider could not serve
/// are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    series: BTreeMap<String, Vec<PricePoint>>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a series, sorting it by date and keeping the last price for
    /// duplicated dates.
    pub fn insert(&mut self, ticker: impl Into<String>, mut points: Vec<PricePoint>) {
        points.sort_by_key(|p| p.date);
        points.dedup_by(|later, earlier| {
            if later.date == earlier.date {
                earlier.price = later.price;
                true
            } else {
                false
            }
        });
        self.series.insert(ticker.into(), points);
    }

    pub fn get(&self, ticker: &str) -> Option<&[PricePoint]> {
        self.series.get(ticker).map(|v| v.as_slice())
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.series.contains_key(ticker)
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
