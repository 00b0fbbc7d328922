//! Fidelity statistics CLI for converted datasets.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fidelity_stats::{
    aggregate::{load_records_from_dir, load_records_from_storage},
    compare, legacy, report, summarize_cog_dir, summarize_cog_prefix, summarize_sources,
    MatchStatus, Summary,
};
use storage::{ObjectStorage, ObjectStorageConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;
use transform::{plugin_by_name, DirectorySource, SourceFetcher, SourceFilter, StorageSource};

#[derive(Parser)]
#[command(name = "fidelity-stats")]
#[command(about = "Check converted COGs against their source data", long_about = None)]
struct Cli {
    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log format: pretty (default), json
    #[arg(long, global = true, default_value = "pretty")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize sources and COGs, write the stats files and compare
    Compare {
        /// Plugin that produced the COGs
        #[arg(short, long)]
        plugin: String,

        /// Local directory of source files
        #[arg(short, long, conflicts_with = "source_prefix")]
        source: Option<PathBuf>,

        /// S3 key prefix of source files
        #[arg(long)]
        source_prefix: Option<String>,

        #[arg(long)]
        recursive: bool,

        /// Local directory of COGs
        #[arg(short, long, conflicts_with = "cogs_prefix")]
        cogs: Option<PathBuf>,

        /// S3 key prefix of COGs
        #[arg(long)]
        cogs_prefix: Option<String>,

        /// Bucket for the S3 prefixes (defaults to S3_BUCKET)
        #[arg(long)]
        bucket: Option<String>,

        /// Provider nodata sentinel
        #[arg(long, default_value = "-9999", allow_hyphen_values = true)]
        nodata: f32,

        /// Only read sources ending with this suffix (repeatable)
        #[arg(long = "suffix")]
        suffixes: Vec<String>,

        /// Regex source file names must match
        #[arg(long)]
        pattern: Option<String>,

        /// Largest accepted relative difference
        #[arg(short, long, default_value = "1e-6")]
        tolerance: f64,

        /// Where monthly_stats.json and overall_stats.json are written
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Also write one stats document per compared raster here
        #[arg(long)]
        records_dir: Option<PathBuf>,

        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Combine per-file stats documents into dataset-wide statistics
    Aggregate {
        /// Local directory of stats documents
        #[arg(short, long, conflicts_with = "prefix")]
        dir: Option<PathBuf>,

        /// S3 key prefix of stats documents
        #[arg(long)]
        prefix: Option<String>,

        #[arg(long)]
        bucket: Option<String>,

        /// Only use documents whose name contains this text
        #[arg(long)]
        contains: Option<String>,

        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
}

fn s3_storage(bucket: Option<&str>) -> anyhow::Result<ObjectStorage> {
    let mut config = ObjectStorageConfig::from_env();
    if let Some(bucket) = bucket {
        config.bucket = bucket.to_string();
    }
    ObjectStorage::new(&config).context("Failed to open S3 bucket")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cli.log_format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.pretty().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))?;

    match cli.command {
        Commands::Compare {
            plugin,
            source,
            source_prefix,
            recursive,
            cogs,
            cogs_prefix,
            bucket,
            nodata,
            suffixes,
            pattern,
            tolerance,
            output_dir,
            records_dir,
            format,
        } => {
            let plugin = plugin_by_name(&plugin)?;

            let fetcher: Box<dyn SourceFetcher> = match (source, source_prefix) {
                (Some(dir), _) => Box::new(DirectorySource::new(dir).recursive(recursive)),
                (None, Some(prefix)) => {
                    Box::new(StorageSource::new(s3_storage(bucket.as_deref())?, prefix))
                }
                (None, None) => anyhow::bail!("--source or --source-prefix is required"),
            };
            let mut filter = SourceFilter::new().with_suffixes(suffixes);
            if let Some(pattern) = &pattern {
                filter = filter.with_pattern(pattern)?;
            }

            let sources = summarize_sources(plugin.as_ref(), fetcher.as_ref(), &filter, nodata).await?;
            let cog_summary: Summary = match (cogs, cogs_prefix) {
                (Some(dir), _) => summarize_cog_dir(&dir)?,
                (None, Some(prefix)) => {
                    summarize_cog_prefix(&s3_storage(bucket.as_deref())?, &prefix).await?
                }
                (None, None) => anyhow::bail!("--cogs or --cogs-prefix is required"),
            };

            let written = legacy::write_legacy_files(&output_dir, &sources.raw, &cog_summary)?;
            info!(files = ?written, "Wrote stats files");

            let comparisons = compare(&sources.expected.rasters, &cog_summary.rasters);

            if let Some(dir) = &records_dir {
                std::fs::create_dir_all(dir)?;
                for record in comparisons.iter().filter_map(|c| c.to_record()) {
                    let path = dir.join(format!("{}.json", record.file_name));
                    std::fs::write(&path, serde_json::to_string(&record)?)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                }
            }

            match format.as_str() {
                "json" => {
                    let rows: Vec<_> = comparisons
                        .iter()
                        .map(|c| {
                            serde_json::json!({
                                "raster": c.key,
                                "source": c.source,
                                "cog": c.cog,
                                "max_relative_diff": c.max_relative_diff(),
                                "status": c.status(tolerance),
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                }
                _ => println!("{}", report::comparison_table(&comparisons, tolerance)),
            }

            let failed = comparisons
                .iter()
                .filter(|c| c.status(tolerance) != MatchStatus::Match)
                .count();
            if failed > 0 {
                anyhow::bail!("{} of {} rasters differ", failed, comparisons.len());
            }
            Ok(())
        }
        Commands::Aggregate {
            dir,
            prefix,
            bucket,
            contains,
            format,
        } => {
            let records = match (dir, prefix) {
                (Some(dir), _) => load_records_from_dir(&dir, contains.as_deref())?,
                (None, Some(prefix)) => {
                    let storage = s3_storage(bucket.as_deref())?;
                    load_records_from_storage(&storage, &prefix, contains.as_deref()).await?
                }
                (None, None) => anyhow::bail!("--dir or --prefix is required"),
            };

            let stats = fidelity_stats::aggregate(&records)
                .ok_or_else(|| anyhow::anyhow!("No stats documents found"))?;

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&stats)?),
                _ => println!("{}", report::aggregate_table(&stats, records.len())),
            }
            Ok(())
        }
    }
}
