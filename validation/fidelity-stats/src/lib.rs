//! Fidelity checks for COG conversions.
//!
//! This crate provides tools to:
//! - Summarize source rasters and converted COGs (min, max, mean, std)
//! - Pair the two and flag differences above a tolerance
//! - Write the `monthly_stats.json` / `overall_stats.json` documents
//! - Aggregate per-file stats documents into dataset-wide figures

pub mod aggregate;
pub mod collect;
pub mod compare;
pub mod error;
pub mod legacy;
pub mod report;
pub mod stats;
pub mod summary;

pub use aggregate::{aggregate, Aggregate, AggregateStats, FileStatsRecord};
pub use collect::{summarize_cog_dir, summarize_cog_prefix, summarize_sources, SourceSummaries};
pub use compare::{compare, Comparison, MatchStatus};
pub use error::{FidelityError, Result};
pub use legacy::write_legacy_files;
pub use stats::{RasterStats, StatsAccumulator};
pub use summary::{StatsMap, Summary};
