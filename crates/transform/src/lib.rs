//! Dataset transformation library.
//!
//! Turns netCDF and GeoTIFF source files into Cloud-Optimized GeoTIFFs.
//!
//! # Architecture
//!
//! Each data product is a [`Transformation`] plugin mapping one source file
//! to a set of named rasters. The [`ConversionPipeline`] drives a plugin
//! over a directory or object-store prefix:
//!
//! - Discover files through a [`SourceFetcher`] and [`SourceFilter`]
//! - Run the plugin (coordinate normalization, nodata harmonization,
//!   output naming)
//! - Encode each raster as a COG and upload it
//! - Write `files_converted.csv` and the dataset's `metadata.json`

pub mod error;
pub mod filename;
pub mod pipeline;
pub mod plugin;
pub mod plugins;
pub mod report;
pub mod source;
pub mod sources;

// Re-exports
pub use error::{Result, TransformError};
pub use filename::FilenameTokens;
pub use pipeline::{ConversionPipeline, PipelineOptions};
pub use plugin::{TransformOutput, Transformation};
pub use plugins::{available_plugins, plugin_by_name};
pub use report::{ConversionRecord, ConversionReport, FileFailure};
pub use source::SourceFile;
pub use sources::{DirectorySource, SourceFetcher, SourceFilter, SourceRef, StorageSource};
