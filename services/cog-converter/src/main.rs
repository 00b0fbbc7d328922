//! Greenhouse-gas dataset converter.
//!
//! Runs transformation plugins over netCDF and GeoTIFF sources, writes
//! Cloud-Optimized GeoTIFFs to S3 or a local directory, validates COGs and
//! builds STAC items for the results.

mod cli;
mod commands;
mod config;
mod config_loader;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, LogFormat};

fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let loaded_env = dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_format)?;
    if let Some(path) = loaded_env {
        debug!(path = %path.display(), "Loaded environment file");
    }

    match &cli.command {
        Command::Convert(args) => commands::convert(args).await,
        Command::Plugins => {
            commands::plugins();
            Ok(())
        }
        Command::Catalog(args) => commands::catalog(args).await,
        Command::Validate(args) => commands::validate(args).await,
    }
}
