//! `analyze` command handler.
//!
//! Runs the pipeline once, bypassing the cache, and writes the result to
//! stdout as JSON.

use super::{build_analyzer, load_config};
use crate::analysis::AnalysisRequest;
use std::path::PathBuf;
use tracing::info;

/// # Errors
/// Returns error on an invalid request, a failed fetch, or a pipeline failure.
#[allow(clippy::too_many_arguments)]
pub async fn run_analyze(
    index: String,
    period: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    threshold: f64,
    config_path: Option<PathBuf>,
    synthetic: bool,
    seed: u64,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path.as_deref())?;
    let analyzer = build_analyzer(&config, synthetic, seed)?;

    let request = AnalysisRequest {
        index,
        period,
        start_date,
        end_date,
        threshold,
    };
    let validated = analyzer.validate(&request)?;
    info!(
        index = %validated.index,
        tickers = validated.tickers.len(),
        threshold = validated.threshold,
        "Running one-shot analysis"
    );

    let result = analyzer.run(&validated, "cli").await?;
    let json = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", json);
    Ok(())
}
