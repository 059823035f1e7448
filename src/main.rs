use clap::Parser;
use corrnet::cli::{Cli, Commands};
use corrnet::commands::{run_analyze, run_indices, run_serve};
use corrnet::observability::init_logging;
use dotenv::dotenv;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from the .env file
    dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli.verbose)?;

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            synthetic,
            seed,
        } => {
            run_serve(config, host, port, synthetic, seed).await?;
        }
        Commands::Analyze {
            index,
            period,
            start_date,
            end_date,
            threshold,
            config,
            synthetic,
            seed,
            pretty,
        } => {
            run_analyze(
                index, period, start_date, end_date, threshold, config, synthetic, seed, pretty,
            )
            .await?;
        }
        Commands::Indices => run_indices(),
    }

    Ok(())
}
