//! Conversion job configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use cog::CogOptions;
use serde::{Deserialize, Serialize};
use storage::{ObjectStorage, ObjectStorageConfig};
use transform::{
    plugin_by_name, ConversionPipeline, DirectorySource, PipelineOptions, SourceFetcher,
    SourceFilter, StorageSource,
};

/// One dataset conversion: which plugin, where the files come from and
/// where the COGs go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Plugin registry name, with or without the `_transformation` suffix.
    pub plugin: String,
    pub source: SourceConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    pub output: OutputConfig,
    /// Sentinel the provider uses for missing cells.
    #[serde(default = "default_nodata")]
    pub nodata: f32,
    #[serde(default)]
    pub cog: CogOptions,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default)]
    pub skip_existing: bool,
    #[serde(default = "default_true")]
    pub write_reports: bool,
}

fn default_nodata() -> f32 {
    cog_common::NODATA_SENTINEL
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Directory {
        path: PathBuf,
        #[serde(default)]
        recursive: bool,
    },
    S3 {
        /// Overrides `S3_BUCKET`.
        #[serde(default)]
        bucket: Option<String>,
        prefix: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub suffixes: Vec<String>,
    /// Regex matched against file names.
    #[serde(default)]
    pub pattern: Option<String>,
    /// File names to leave out.
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputConfig {
    S3 {
        #[serde(default)]
        bucket: Option<String>,
        #[serde(default)]
        prefix: String,
    },
    Local {
        path: PathBuf,
        #[serde(default)]
        prefix: String,
    },
}

impl OutputConfig {
    pub fn prefix(&self) -> &str {
        match self {
            OutputConfig::S3 { prefix, .. } | OutputConfig::Local { prefix, .. } => prefix,
        }
    }

    pub fn storage_config(&self) -> ObjectStorageConfig {
        match self {
            OutputConfig::S3 { bucket, .. } => s3_config(bucket.as_deref()),
            OutputConfig::Local { path, .. } => ObjectStorageConfig::local(path),
        }
    }
}

/// Environment S3 settings with an optional bucket override.
pub fn s3_config(bucket: Option<&str>) -> ObjectStorageConfig {
    let mut config = ObjectStorageConfig::from_env();
    if let Some(bucket) = bucket {
        config.bucket = bucket.to_string();
    }
    config
}

impl JobConfig {
    pub fn validate(&self) -> Result<()> {
        plugin_by_name(&self.plugin)?;

        match &self.source {
            SourceConfig::Directory { path, .. } => anyhow::ensure!(
                !path.as_os_str().is_empty(),
                "source.path cannot be empty"
            ),
            SourceConfig::S3 { bucket, .. } => anyhow::ensure!(
                bucket.as_deref().map_or(true, |b| !b.is_empty()),
                "source.bucket cannot be empty"
            ),
        }

        if let OutputConfig::Local { path, .. } = &self.output {
            anyhow::ensure!(
                !path.as_os_str().is_empty(),
                "output.path cannot be empty"
            );
        }

        self.source_filter()?;

        anyhow::ensure!(
            self.cog.tile_size > 0 && self.cog.tile_size % 16 == 0,
            "cog.tile_size must be a positive multiple of 16, got {}",
            self.cog.tile_size
        );
        anyhow::ensure!(
            self.cog.deflate_level <= 9,
            "cog.deflate_level must be 0-9, got {}",
            self.cog.deflate_level
        );
        anyhow::ensure!(self.nodata.is_finite(), "nodata must be a finite number");

        Ok(())
    }

    pub fn source_filter(&self) -> Result<SourceFilter> {
        let mut filter = SourceFilter::new()
            .with_suffixes(self.filter.suffixes.iter())
            .with_exclusions(self.filter.exclude.iter());
        if let Some(pattern) = &self.filter.pattern {
            filter = filter
                .with_pattern(pattern)
                .with_context(|| format!("Invalid filter pattern '{}'", pattern))?;
        }
        Ok(filter)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            provider_nodata: self.nodata,
            output_prefix: self.output.prefix().to_string(),
            cog: self.cog.clone(),
            continue_on_error: self.continue_on_error,
            skip_existing: self.skip_existing,
            write_reports: self.write_reports,
        }
    }

    fn source_fetcher(&self) -> Result<Box<dyn SourceFetcher>> {
        Ok(match &self.source {
            SourceConfig::Directory { path, recursive } => {
                Box::new(DirectorySource::new(path).recursive(*recursive))
            }
            SourceConfig::S3 { bucket, prefix } => {
                let storage = ObjectStorage::new(&s3_config(bucket.as_deref()))
                    .context("Failed to open source bucket")?;
                Box::new(StorageSource::new(storage, prefix.clone()))
            }
        })
    }

    /// Wire up the plugin, source, filter and output store.
    pub fn build_pipeline(&self) -> Result<ConversionPipeline> {
        let plugin = plugin_by_name(&self.plugin)?;
        let output = ObjectStorage::new(&self.output.storage_config())
            .context("Failed to open output storage")?;

        Ok(ConversionPipeline::new(
            plugin,
            self.source_fetcher()?,
            output,
            self.pipeline_options(),
        )
        .with_filter(self.source_filter()?))
    }
}
