//! CLI argument parsing using clap.
//!
//! Defines the command-line interface for corrnet: the HTTP service, a
//! one-shot analysis that prints JSON, and the index listing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// corrnet - Correlation network analysis service
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Set the verbosity level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub verbose: String,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// JSON configuration file (all fields optional)
        #[arg(long, env = "CORRNET_CONFIG")]
        config: Option<PathBuf>,
        /// Bind address, overrides the config file
        #[arg(long, env = "CORRNET_HOST")]
        host: Option<String>,
        /// Listen port, overrides the config file
        #[arg(long, env = "CORRNET_PORT")]
        port: Option<u16>,
        /// Serve seeded synthetic prices instead of the upstream provider
        #[arg(long, default_value_t = false)]
        synthetic: bool,
        /// Seed for synthetic prices
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Run the pipeline once and print the result as JSON
    Analyze {
        /// Index name as listed by `indices` (e.g., "NIFTY 50", "S&P 500 (Top 50)")
        #[arg(short, long)]
        index: String,
        /// Preset lookback: 1mo, 3mo, 6mo or 1y
        #[arg(long)]
        period: Option<String>,
        /// Custom range start (YYYY-MM-DD), used with --end-date
        #[arg(long)]
        start_date: Option<String>,
        /// Custom range end (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<String>,
        /// Minimum |correlation| for an edge
        #[arg(short, long, default_value_t = 0.6)]
        threshold: f64,
        /// JSON configuration file
        #[arg(long, env = "CORRNET_CONFIG")]
        config: Option<PathBuf>,
        /// Use seeded synthetic prices (no network)
        #[arg(long, default_value_t = false)]
        synthetic: bool,
        /// Seed for synthetic prices
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Pretty-print the JSON output
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },

    /// List the supported indices
    Indices,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from([
            "corrnet", "analyze", "--index", "NIFTY 50", "--period", "1y", "--synthetic",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze {
                index,
                period,
                threshold,
                synthetic,
                ..
            } => {
                assert_eq!(index, "NIFTY 50");
                assert!(crate::market_data::IndexRegistry::builtin().contains(&index));
                assert_eq!(period.as_deref(), Some("1y"));
                assert_eq!(threshold, 0.6);
                assert!(synthetic);
            }
            _ => panic!("expected analyze"),
        }
        assert_eq!(cli.verbose, "info");
    }

    #[test]
    fn test_parse_serve_with_port() {
        let cli = Cli::try_parse_from(["corrnet", "serve", "--port", "9001", "--verbose", "debug"]).unwrap();
        match cli.command {
            Commands::Serve { port, .. } => assert_eq!(port, Some(9001)),
            _ => panic!("expected serve"),
        }
        assert_eq!(cli.verbose, "debug");
    }
}
