//! Deterministic synthetic prices for offline runs and tests

use super::{FetchError, PriceSource};
use crate::types::{PricePoint, PriceTable, RangeSpec};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::collections::HashSet;
use tracing::debug;

/// Tickers driven by a shared factor.
///
/// Two members of the same group have an expected return correlation of
/// `loading²`.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorGroup {
    pub tickers: Vec<String>,
    pub loading: f64,
}

impl FactorGroup {
    /// Group whose members correlate at roughly `correlation`
    pub fn with_correlation(tickers: Vec<String>, correlation: f64) -> Self {
        Self {
            tickers,
            loading: correlation.clamp(0.0, 1.0).sqrt(),
        }
    }
}

/// Synthetic market data provider for testing without a live upstream
///
/// Produces weekday closes as seeded geometric random walks. Output only
/// depends on the seed, the ticker, the factor groups and the date window.
#[derive(Debug, Clone)]
pub struct SyntheticPriceSource {
    seed: u64,
    base_price: f64,
    volatility: f64,
    groups: Vec<FactorGroup>,
    missing: HashSet<String>,
    anchor: Option<NaiveDate>,
}

impl Default for SyntheticPriceSource {
    fn default() -> Self {
        Self::new(42)
    }
}

impl SyntheticPriceSource {
    /// # Arguments
    /// * `seed` - Base seed; per-ticker streams are derived from it
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            base_price: 100.0,
            volatility: 0.015,
            groups: Vec::new(),
            missing: HashSet::new(),
            anchor: None,
        }
    }

    /// Daily return standard deviation (e.g. 0.015 = 1.5%)
    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn with_group(mut self, group: FactorGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Tickers the source pretends not to know
    pub fn with_missing(mut self, tickers: &[&str]) -> Self {
        self.missing.extend(tickers.iter().map(|t| t.to_string()));
        self
    }

    /// Fix "today" for period ranges instead of the wall clock
    pub fn with_anchor(mut self, today: NaiveDate) -> Self {
        self.anchor = Some(today);
        self
    }

    fn derive_seed(&self, label: &str) -> u64 {
        // FNV-1a over the label, mixed with the base seed
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in label.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        hash ^ self.seed.rotate_left(17)
    }

    fn draws(&self, label: &str, count: usize) -> Result<Vec<f64>, FetchError> {
        let normal = Normal::new(0.0, 1.0).map_err(|e| FetchError::Transport(e.to_string()))?;
        let mut rng = StdRng::seed_from_u64(self.derive_seed(label));
        Ok((0..count).map(|_| normal.sample(&mut rng)).collect())
    }

    fn trading_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|d| *d < end)
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .collect()
    }
}

#[async_trait]
impl PriceSource for SyntheticPriceSource {
    async fn fetch(&self, tickers: &[String], range: &RangeSpec) -> Result<PriceTable, FetchError> {
        let today = self.anchor.unwrap_or_else(|| Utc::now().date_naive());
        let (start, end) = range.window(today);
        let days = Self::trading_days(start, end);

        let mut table = PriceTable::new();
        for ticker in tickers {
            if self.missing.contains(ticker) {
                continue;
            }

            let own = self.draws(ticker, days.len())?;
            let group = self
                .groups
                .iter()
                .enumerate()
                .find(|(_, g)| g.tickers.iter().any(|t| t == ticker));

            let shocks: Vec<f64> = match group {
                Some((idx, g)) => {
                    let factor = self.draws(&format!("factor-{}", idx), days.len())?;
                    let idio = (1.0 - g.loading * g.loading).max(0.0).sqrt();
                    factor
                        .iter()
                        .zip(own.iter())
                        .map(|(f, e)| g.loading * f + idio * e)
                        .collect()
                }
                None => own,
            };

            let mut log_price = self.base_price.ln();
            let points = days
                .iter()
                .zip(shocks.iter())
                .map(|(date, shock)| {
                    log_price += self.volatility * shock;
                    PricePoint {
                        date: *date,
                        price: log_price.exp(),
                    }
                })
                .collect();
            table.insert(ticker.clone(), points);
        }

        if table.is_empty() || days.is_empty() {
            return Err(FetchError::NoData);
        }

        debug!(
            tickers = table.len(),
            days = days.len(),
            "Generated synthetic prices"
        );
        Ok(table)
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}
