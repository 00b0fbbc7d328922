//! Command-line arguments.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{FilterConfig, JobConfig, OutputConfig, SourceConfig};
use crate::config_loader::load_job_config;

#[derive(Parser, Debug)]
#[command(name = "cog-converter")]
#[command(about = "Convert gridded greenhouse-gas datasets to Cloud-Optimized GeoTIFFs")]
pub struct Cli {
    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert a dataset with one of the transformation plugins
    Convert(ConvertArgs),
    /// List the available plugins
    Plugins,
    /// Build STAC items for converted COGs and optionally publish them
    Catalog(CatalogArgs),
    /// Check that files are valid Cloud-Optimized GeoTIFFs
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Default)]
pub struct ConvertArgs {
    /// Job file; the flags below override it
    #[arg(short, long)]
    pub job: Option<PathBuf>,

    /// Plugin name (required without --job)
    #[arg(short, long)]
    pub plugin: Option<String>,

    /// Local directory of source files
    #[arg(short, long, conflicts_with = "input_prefix")]
    pub input: Option<PathBuf>,

    /// Key prefix of source files in the S3 bucket
    #[arg(long)]
    pub input_prefix: Option<String>,

    /// Descend into sub-folders of --input
    #[arg(long)]
    pub recursive: bool,

    /// Write COGs to a local directory instead of S3
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Key prefix for the COGs and reports
    #[arg(long)]
    pub output_prefix: Option<String>,

    /// Provider nodata sentinel
    #[arg(long, allow_hyphen_values = true)]
    pub nodata: Option<f32>,

    /// Only convert files ending with this suffix (repeatable)
    #[arg(long = "suffix")]
    pub suffixes: Vec<String>,

    /// Regex file names must match
    #[arg(long)]
    pub pattern: Option<String>,

    /// Skip files whose name contains this text (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,

    #[arg(long)]
    pub continue_on_error: bool,

    #[arg(long)]
    pub skip_existing: bool,

    /// Do not write files_converted.csv and metadata.json
    #[arg(long)]
    pub no_reports: bool,

    /// List the files that would be converted and exit
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Dataset definition (.yaml or .json)
    pub definition: PathBuf,

    /// Read COGs from a local directory instead of S3
    #[arg(long)]
    pub local_root: Option<PathBuf>,

    /// Write each item as <id>.json here
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// POST items to the ingestion API (STAC_INGEST_USERNAME/STAC_INGEST_PASSWORD)
    #[arg(long)]
    pub publish: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// COG files or directories of COGs
    pub paths: Vec<PathBuf>,

    /// Validate every .tif under this S3 key prefix
    #[arg(long)]
    pub s3_prefix: Option<String>,

    /// Bucket for --s3-prefix (defaults to S3_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,
}

impl ConvertArgs {
    /// The job to run: the job file with flag overrides, or one built from
    /// flags alone.
    pub fn to_job(&self) -> Result<JobConfig> {
        let mut job = match &self.job {
            Some(path) => load_job_config(path)?,
            None => self.job_from_flags()?,
        };

        if self.job.is_some() {
            if let Some(plugin) = &self.plugin {
                job.plugin = plugin.clone();
            }
            if let Some(source) = self.source_flag() {
                job.source = source;
            }
            if let Some(output) = self.output_flag() {
                job.output = output;
            }
            if !self.suffixes.is_empty() {
                job.filter.suffixes = self.suffixes.clone();
            }
            if self.pattern.is_some() {
                job.filter.pattern = self.pattern.clone();
            }
            if !self.exclude.is_empty() {
                job.filter.exclude = self.exclude.clone();
            }
        }

        if let Some(nodata) = self.nodata {
            job.nodata = nodata;
        }
        job.continue_on_error |= self.continue_on_error;
        job.skip_existing |= self.skip_existing;
        if self.no_reports {
            job.write_reports = false;
        }

        job.validate()?;
        Ok(job)
    }

    fn source_flag(&self) -> Option<SourceConfig> {
        match (&self.input, &self.input_prefix) {
            (Some(path), _) => Some(SourceConfig::Directory {
                path: path.clone(),
                recursive: self.recursive,
            }),
            (None, Some(prefix)) => Some(SourceConfig::S3 {
                bucket: None,
                prefix: prefix.clone(),
            }),
            (None, None) => None,
        }
    }

    fn output_flag(&self) -> Option<OutputConfig> {
        let prefix = self.output_prefix.clone().unwrap_or_default();
        match &self.output_dir {
            Some(path) => Some(OutputConfig::Local {
                path: path.clone(),
                prefix,
            }),
            None => self.output_prefix.is_some().then_some(OutputConfig::S3 {
                bucket: None,
                prefix,
            }),
        }
    }

    fn job_from_flags(&self) -> Result<JobConfig> {
        let plugin = self
            .plugin
            .clone()
            .ok_or_else(|| anyhow::anyhow!("--plugin is required without --job"))?;
        let source = self
            .source_flag()
            .ok_or_else(|| anyhow::anyhow!("--input or --input-prefix is required without --job"))?;
        let output = self.output_flag().unwrap_or(OutputConfig::S3 {
            bucket: None,
            prefix: String::new(),
        });

        Ok(JobConfig {
            plugin,
            source,
            filter: FilterConfig {
                suffixes: self.suffixes.clone(),
                pattern: self.pattern.clone(),
                exclude: self.exclude.clone(),
            },
            output,
            nodata: cog_common::NODATA_SENTINEL,
            cog: Default::default(),
            continue_on_error: false,
            skip_existing: false,
            write_reports: true,
        })
    }
}
