//! `ingest`: fetch today's threat-intelligence feeds into JSONL files

use clap::Parser;
use intel_ingest::{Config, Pipeline};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Daily threat-intelligence ingestion
#[derive(Debug, Parser)]
#[command(name = "ingest", version, about = "Normalize public threat-intel feeds into JSONL")]
struct Cli {
    /// Directory receiving the day's JSONL files (created if absent)
    #[arg(long = "output_dir")]
    output_dir: PathBuf,

    /// Days to look back for date-filterable APIs [default: 1]
    #[arg(long = "lookback_days")]
    lookback_days: Option<u32>,

    /// TOML file supplying the base configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fetch all sources concurrently
    #[arg(long)]
    parallel: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "INTEL_INGEST_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "INTEL_INGEST_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli)?;

    let mut config = match &cli.config {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::default(),
    };
    config.output_dir = cli.output_dir;
    if let Some(days) = cli.lookback_days {
        config.lookback_days = days;
    }
    config.parallel |= cli.parallel;
    let config = config.with_env_overrides();

    let pipeline = Pipeline::new(config)?;
    let summary = pipeline.run().await?;
    info!(
        date = %summary.date,
        written = summary.written(),
        skipped = summary.skipped(),
        "Run finished"
    );

    Ok(())
}

fn init_logging(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = cli.log_level.parse::<tracing::Level>()?;
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into());

    if cli.log_json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            )
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .with(filter)
            .init();
    }

    Ok(())
}
