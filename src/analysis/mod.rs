//! Correlation network analysis
//!
//! Turns a basket of price histories into a weighted relationship graph:
//! 1. Log returns and gap cleaning (`preprocess`)
//! 2. Pearson correlation and threshold filtering (`correlation`)
//! 3. Graph construction, centrality and influence (`graph`)
//! 4. Louvain community detection (`community`)
//! 5. Result assembly, caching and worker dispatch (`pipeline`)

pub mod community;
pub mod correlation;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod portfolio;
pub mod preprocess;
pub mod sector;

pub use community::{detect, modularity, Partition};
pub use correlation::{correlate, pearson, threshold, AdjacencyMatrix, CorrelationMatrix, LabeledMatrix};
pub use error::AnalysisError;
pub use graph::{
    build, centrality, centrality_with, influence, influence_weighted, CentralityOptions,
    CentralityRecord, Graph, InfluenceWeights, PathCost,
};
pub use pipeline::{
    AnalysisRequest, AnalysisResult, AnalysisService, Analyzer, PipelineOptions, ValidatedRequest,
};
pub use portfolio::{PortfolioReport, PortfolioRequest, RiskLevel};
pub use preprocess::{clean, log_returns, ReturnMatrix, DEFAULT_MAX_NAN_RATIO};
pub use sector::{sector_heatmap, Sector, SectorHeatmap};

/// Round half away from zero to `decimals` places.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
