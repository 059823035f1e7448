//! Index registry: index name -> constituent tickers

use lazy_static::lazy_static;
use serde::Serialize;

/// Static index definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    pub name: &'static str,
    pub tickers: &'static [&'static str],
}

lazy_static! {
    static ref INDICES: Vec<IndexDefinition> = vec![
        IndexDefinition {
            name: "NIFTY 50",
            tickers: &[
                "RELIANCE.NS", "TCS.NS", "HDFCBANK.NS", "INFY.NS", "ICICIBANK.NS",
                "HINDUNILVR.NS", "ITC.NS", "SBIN.NS", "BHARTIARTL.NS", "KOTAKBANK.NS",
                "LT.NS", "AXISBANK.NS", "ASIANPAINT.NS", "MARUTI.NS", "HCLTECH.NS",
                "SUNPHARMA.NS", "TITAN.NS", "BAJFINANCE.NS", "WIPRO.NS", "ULTRACEMCO.NS",
                "NESTLEIND.NS", "NTPC.NS", "POWERGRID.NS", "M&M.NS", "TATAMOTORS.NS",
                "ADANIENT.NS", "ADANIPORTS.NS", "ONGC.NS", "JSWSTEEL.NS", "TATASTEEL.NS",
                "TECHM.NS", "INDUSINDBK.NS", "HINDALCO.NS", "DRREDDY.NS", "DIVISLAB.NS",
                "CIPLA.NS", "BAJAJFINSV.NS", "BRITANNIA.NS", "EICHERMOT.NS", "APOLLOHOSP.NS",
                "COALINDIA.NS", "BPCL.NS", "GRASIM.NS", "TATACONSUM.NS", "HEROMOTOCO.NS",
                "SBILIFE.NS", "HDFCLIFE.NS", "UPL.NS", "BAJAJ-AUTO.NS", "LTIM.NS",
            ],
        },
        IndexDefinition {
            name: "S&P 500 (Top 50)",
            tickers: &[
                "AAPL", "MSFT", "AMZN", "NVDA", "GOOGL", "META", "TSLA", "BRK-B",
                "UNH", "JNJ", "XOM", "JPM", "V", "PG", "MA", "HD", "CVX", "MRK",
                "ABBV", "LLY", "PEP", "KO", "AVGO", "COST", "WMT", "TMO", "MCD",
                "CSCO", "ACN", "ABT", "CRM", "DHR", "LIN", "NEE", "TXN", "AMD",
                "PM", "UPS", "MS", "ORCL", "LOW", "INTC", "HON", "UNP", "QCOM",
                "BA", "AMGN", "SBUX", "IBM", "GE",
            ],
        },
        IndexDefinition {
            name: "FTSE 100 (Top 30)",
            tickers: &[
                "SHEL.L", "AZN.L", "HSBA.L", "ULVR.L", "BP.L", "GSK.L", "RIO.L",
                "BATS.L", "DGE.L", "REL.L", "LSEG.L", "AAL.L", "NG.L", "VOD.L",
                "GLEN.L", "CPG.L", "PRU.L", "ABF.L", "RKT.L", "CRH.L",
                "EXPN.L", "SSE.L", "AHT.L", "SGE.L", "BKG.L", "MNDI.L",
                "BNZL.L", "SVT.L", "HLMA.L", "INF.L",
            ],
        },
        IndexDefinition {
            name: "DAX 40 (Top 30)",
            tickers: &[
                "SAP.DE", "SIE.DE", "ALV.DE", "DTE.DE", "AIR.DE", "BAS.DE",
                "MBG.DE", "BMW.DE", "MUV2.DE", "IFX.DE", "ADS.DE", "DHL.DE",
                "BAYN.DE", "VOW3.DE", "HEN3.DE", "DB1.DE", "RWE.DE", "FRE.DE",
                "BEI.DE", "HEI.DE", "MTX.DE", "MRK.DE", "SHL.DE", "PAH3.DE",
                "ENR.DE", "CON.DE", "SRT3.DE", "QIA.DE", "ZAL.DE", "PUM.DE",
            ],
        },
        IndexDefinition {
            name: "Hang Seng (Top 30)",
            tickers: &[
                "0005.HK", "0700.HK", "9988.HK", "0941.HK", "1299.HK",
                "0388.HK", "0002.HK", "0003.HK", "0011.HK", "0016.HK",
                "0001.HK", "0066.HK", "0006.HK", "0012.HK", "0017.HK",
                "0027.HK", "0883.HK", "1038.HK", "1044.HK", "1093.HK",
                "1109.HK", "1177.HK", "1398.HK", "1928.HK", "2007.HK",
                "2018.HK", "2269.HK", "2313.HK", "2318.HK", "2388.HK",
            ],
        },
    ];
}

/// Exchange suffixes stripped from display symbols
const EXCHANGE_SUFFIXES: &[&str] = &[".NS", ".L", ".DE", ".HK", ".BO"];

/// Display symbol for a ticker: `RELIANCE.NS` -> `RELIANCE`
pub fn display_symbol(ticker: &str) -> &str {
    EXCHANGE_SUFFIXES
        .iter()
        .find_map(|suffix| ticker.strip_suffix(suffix))
        .unwrap_or(ticker)
}

/// Summary row for `/api/indices`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    pub name: String,
    pub stock_count: usize,
}

/// Lookup table of known indices.
///
/// The built-in registry covers the five supported markets; tests and the
/// synthetic CLI mode can register extra baskets with [`IndexRegistry::with_index`].
#[derive(Debug, Clone)]
pub struct IndexRegistry {
    entries: Vec<(String, Vec<String>)>,
}

impl Default for IndexRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl IndexRegistry {
    pub fn builtin() -> Self {
        let entries = INDICES
            .iter()
            .map(|def| {
                (
                    def.name.to_string(),
                    def.tickers.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect();
        Self { entries }
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add (or replace) an index
    pub fn with_index(mut self, name: impl Into<String>, tickers: Vec<String>) -> Self {
        let name = name.into();
        self.entries.retain(|(existing, _)| *existing != name);
        self.entries.push((name, tickers));
        self
    }

    pub fn tickers(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tickers(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn list(&self) -> Vec<IndexInfo> {
        self.entries
            .iter()
            .map(|(name, tickers)| IndexInfo {
                name: name.clone(),
                stock_count: tickers.len(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_indices() {
        let registry = IndexRegistry::builtin();
        assert_eq!(registry.names().len(), 5);
        assert_eq!(registry.tickers("NIFTY 50").map(|t| t.len()), Some(50));
        assert_eq!(registry.tickers("DAX 40 (Top 30)").map(|t| t.len()), Some(30));
        assert!(!registry.contains("NASDAQ"));
    }

    #[test]
    fn test_with_index_replaces() {
        let registry = IndexRegistry::empty()
            .with_index("TEST", vec!["A".into()])
            .with_index("TEST", vec!["A".into(), "B".into()]);
        assert_eq!(
            registry.list(),
            vec![IndexInfo {
                name: "TEST".into(),
                stock_count: 2
            }]
        );
    }

    #[test]
    fn test_display_symbol() {
        assert_eq!(display_symbol("RELIANCE.NS"), "RELIANCE");
        assert_eq!(display_symbol("0700.HK"), "0700");
        assert_eq!(display_symbol("BRK-B"), "BRK-B");
    }
}
