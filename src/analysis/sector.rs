//! Sector taxonomy and sector-level correlation heatmap

use super::correlation::CorrelationMatrix;
use super::error::AnalysisError;
use super::round_to;
use crate::market_data::indices::display_symbol;
use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

const HEATMAP_DECIMALS: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sector {
    Financials,      // Banks, insurers, exchanges, payment networks
    Technology,      // Software, semis, IT services
    Energy,          // Oil & gas, coal
    Healthcare,      // Pharma, hospitals, med-tech
    ConsumerStaples, // Food, beverages, household, tobacco
    ConsumerDiscretionary,
    Industrials,
    Materials, // Metals, chemicals, cement, paints
    Utilities,
    Telecom,
    Automotive,
    RealEstate,

    Other,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Financials => "Financials",
            Sector::Technology => "Technology",
            Sector::Energy => "Energy",
            Sector::Healthcare => "Healthcare",
            Sector::ConsumerStaples => "Consumer Staples",
            Sector::ConsumerDiscretionary => "Consumer Discretionary",
            Sector::Industrials => "Industrials",
            Sector::Materials => "Materials",
            Sector::Utilities => "Utilities",
            Sector::Telecom => "Telecom",
            Sector::Automotive => "Automotive",
            Sector::RealEstate => "Real Estate",
            Sector::Other => "Other",
        }
    }
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

lazy_static! {
    static ref TICKER_SECTORS: HashMap<&'static str, Sector> = {
        use Sector::*;
        let table: &[(&[&str], Sector)] = &[
            // === NIFTY 50 ===
            (&["HDFCBANK.NS", "ICICIBANK.NS", "SBIN.NS", "KOTAKBANK.NS", "AXISBANK.NS",
               "INDUSINDBK.NS", "BAJFINANCE.NS", "BAJAJFINSV.NS", "SBILIFE.NS", "HDFCLIFE.NS"], Financials),
            (&["TCS.NS", "INFY.NS", "HCLTECH.NS", "WIPRO.NS", "TECHM.NS", "LTIM.NS"], Technology),
            (&["RELIANCE.NS", "ONGC.NS", "BPCL.NS", "COALINDIA.NS"], Energy),
            (&["SUNPHARMA.NS", "DRREDDY.NS", "DIVISLAB.NS", "CIPLA.NS", "APOLLOHOSP.NS"], Healthcare),
            (&["HINDUNILVR.NS", "ITC.NS", "NESTLEIND.NS", "BRITANNIA.NS", "TATACONSUM.NS"], ConsumerStaples),
            (&["TITAN.NS", "ASIANPAINT.NS"], ConsumerDiscretionary),
            (&["LT.NS", "ADANIENT.NS", "ADANIPORTS.NS"], Industrials),
            (&["ULTRACEMCO.NS", "JSWSTEEL.NS", "TATASTEEL.NS", "HINDALCO.NS", "GRASIM.NS", "UPL.NS"], Materials),
            (&["NTPC.NS", "POWERGRID.NS"], Utilities),
            (&["BHARTIARTL.NS"], Telecom),
            (&["MARUTI.NS", "M&M.NS", "TATAMOTORS.NS", "EICHERMOT.NS", "HEROMOTOCO.NS", "BAJAJ-AUTO.NS"], Automotive),

            // === S&P 500 ===
            (&["BRK-B", "JPM", "V", "MA", "MS"], Financials),
            (&["AAPL", "MSFT", "NVDA", "GOOGL", "META", "AVGO", "CSCO", "ACN", "CRM",
               "TXN", "AMD", "ORCL", "INTC", "QCOM", "IBM"], Technology),
            (&["XOM", "CVX"], Energy),
            (&["UNH", "JNJ", "MRK", "ABBV", "LLY", "TMO", "ABT", "DHR", "AMGN"], Healthcare),
            (&["PG", "PEP", "KO", "COST", "WMT", "PM"], ConsumerStaples),
            (&["AMZN", "HD", "MCD", "LOW", "SBUX"], ConsumerDiscretionary),
            (&["UPS", "HON", "UNP", "BA", "GE"], Industrials),
            (&["LIN"], Materials),
            (&["NEE"], Utilities),
            (&["TSLA"], Automotive),

            // === FTSE 100 ===
            (&["HSBA.L", "LSEG.L", "PRU.L"], Financials),
            (&["SGE.L", "REL.L", "EXPN.L", "INF.L"], Technology),
            (&["SHEL.L", "BP.L"], Energy),
            (&["AZN.L", "GSK.L"], Healthcare),
            (&["ULVR.L", "BATS.L", "DGE.L", "ABF.L", "RKT.L", "CPG.L"], ConsumerStaples),
            (&["AHT.L", "BNZL.L", "HLMA.L"], Industrials),
            (&["RIO.L", "AAL.L", "GLEN.L", "CRH.L", "MNDI.L"], Materials),
            (&["NG.L", "SSE.L", "SVT.L"], Utilities),
            (&["VOD.L"], Telecom),
            (&["BKG.L"], RealEstate),

            // === DAX 40 ===
            (&["ALV.DE", "MUV2.DE", "DB1.DE"], Financials),
            (&["SAP.DE", "IFX.DE"], Technology),
            (&["BAYN.DE", "FRE.DE", "MRK.DE", "SHL.DE", "SRT3.DE", "QIA.DE"], Healthcare),
            (&["HEN3.DE", "BEI.DE"], ConsumerStaples),
            (&["ADS.DE", "ZAL.DE", "PUM.DE"], ConsumerDiscretionary),
            (&["SIE.DE", "AIR.DE", "DHL.DE", "MTX.DE", "ENR.DE"], Industrials),
            (&["BAS.DE", "HEI.DE"], Materials),
            (&["RWE.DE"], Utilities),
            (&["DTE.DE"], Telecom),
            (&["MBG.DE", "BMW.DE", "VOW3.DE", "PAH3.DE", "CON.DE"], Automotive),

            // === Hang Seng ===
            (&["0005.HK", "1299.HK", "0388.HK", "0011.HK", "1398.HK", "2318.HK", "2388.HK"], Financials),
            (&["0700.HK", "9988.HK", "2018.HK"], Technology),
            (&["0883.HK"], Energy),
            (&["1093.HK", "1177.HK", "2269.HK"], Healthcare),
            (&["1044.HK"], ConsumerStaples),
            (&["2313.HK", "1928.HK", "0027.HK"], ConsumerDiscretionary),
            (&["0001.HK", "0066.HK"], Industrials),
            (&["0002.HK", "0003.HK", "0006.HK", "1038.HK"], Utilities),
            (&["0941.HK"], Telecom),
            (&["0016.HK", "0012.HK", "0017.HK", "1109.HK", "2007.HK"], RealEstate),
        ];

        let mut m = HashMap::new();
        for (tickers, sector) in table {
            for ticker in *tickers {
                m.insert(*ticker, *sector);
            }
        }
        m
    };
}

pub fn get_sector(ticker: &str) -> Sector {
    match TICKER_SECTORS.get(ticker) {
        Some(sector) => *sector,
        None => {
            debug!(ticker = %ticker, "Unknown sector mapping - ticker not in classification table");
            Sector::Other
        }
    }
}

/// Average pairwise correlation within and between sectors
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorHeatmap {
    /// Sector names, sorted
    pub sectors: Vec<String>,
    /// `matrix[i][j]`: mean correlation between members of sectors i and j
    pub matrix: Vec<Vec<f64>>,
    /// Display symbols of the members of each sector
    pub sector_stocks: BTreeMap<String, Vec<String>>,
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Group the matrix columns by sector and average the correlations.
///
/// The diagonal holds the mean intra-sector correlation (1.0 for a
/// single-member sector); off-diagonal cells the mean over all cross pairs.
pub fn sector_heatmap(corr: &CorrelationMatrix) -> Result<SectorHeatmap, AnalysisError> {
    sector_heatmap_with(corr, get_sector)
}

pub fn sector_heatmap_with<F>(corr: &CorrelationMatrix, sector_of: F) -> Result<SectorHeatmap, AnalysisError>
where
    F: Fn(&str) -> Sector,
{
    if corr.size() == 0 {
        return Err(AnalysisError::InsufficientData {
            expected: 1,
            actual: 0,
        });
    }

    // Column indices per sector, sectors in display-name order
    let mut groups: BTreeMap<&'static str, Vec<usize>> = BTreeMap::new();
    for (idx, ticker) in corr.labels().iter().enumerate() {
        groups.entry(sector_of(ticker).as_str()).or_default().push(idx);
    }

    let sectors: Vec<&str> = groups.keys().copied().collect();
    let n = sectors.len();
    let mut matrix = vec![vec![0.0; n]; n];

    for (i, s1) in sectors.iter().enumerate() {
        for (j, s2) in sectors.iter().enumerate() {
            let a = &groups[s1];
            let b = &groups[s2];
            let value = if i == j {
                let pairs: Vec<f64> = a
                    .iter()
                    .enumerate()
                    .flat_map(|(k, &x)| a[k + 1..].iter().map(move |&y| (x, y)))
                    .map(|(x, y)| corr.get(x, y))
                    .collect();
                mean(&pairs).unwrap_or(1.0)
            } else {
                let pairs: Vec<f64> = a
                    .iter()
                    .flat_map(|&x| b.iter().map(move |&y| corr.get(x, y)))
                    .collect();
                mean(&pairs).unwrap_or(0.0)
            };
            matrix[i][j] = round_to(value, HEATMAP_DECIMALS);
        }
    }

    let sector_stocks = groups
        .iter()
        .map(|(sector, members)| {
            (
                sector.to_string(),
                members
                    .iter()
                    .map(|&idx| display_symbol(&corr.labels()[idx]).to_string())
                    .collect(),
            )
        })
        .collect();

    info!(sectors = n, "Computed sector heatmap");

    Ok(SectorHeatmap {
        sectors: sectors.iter().map(|s| s.to_string()).collect(),
        matrix,
        sector_stocks,
    })
}
