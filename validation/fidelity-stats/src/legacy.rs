//! `monthly_stats.json` and `overall_stats.json`.
//!
//! Both files hold four JSON values on separate lines: a label, the source
//! statistics, a label and the COG statistics.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{FidelityError, Result};
use crate::stats::RasterStats;
use crate::summary::{StatsMap, Summary};

pub const MONTHLY_STATS_FILE: &str = "monthly_stats.json";
pub const OVERALL_STATS_FILE: &str = "overall_stats.json";

const SOURCE_LABEL: &str = "Stats for raw netCDF files.";
const COG_LABEL: &str = "Stats for transformed COG files.";

fn to_line<T: Serialize>(value: &T, context: &str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| FidelityError::json(context, e))
}

fn document<T: Serialize>(source: &T, cog: &T, context: &str) -> Result<String> {
    Ok([
        to_line(&SOURCE_LABEL, context)?,
        to_line(source, context)?,
        to_line(&COG_LABEL, context)?,
        to_line(cog, context)?,
    ]
    .join("\n"))
}

pub fn monthly_stats_json(source: &StatsMap, cog: &StatsMap) -> Result<String> {
    document(source, cog, MONTHLY_STATS_FILE)
}

fn overall_value(stats: Option<RasterStats>) -> Result<Value> {
    match stats {
        Some(s) => serde_json::to_value(s).map_err(|e| FidelityError::json(OVERALL_STATS_FILE, e)),
        None => Ok(Value::Object(Map::new())),
    }
}

pub fn overall_stats_json(source: Option<RasterStats>, cog: Option<RasterStats>) -> Result<String> {
    document(
        &overall_value(source)?,
        &overall_value(cog)?,
        OVERALL_STATS_FILE,
    )
}

/// Write both files into `dir`, returning their paths.
pub fn write_legacy_files(dir: &Path, source: &Summary, cog: &Summary) -> Result<[PathBuf; 2]> {
    std::fs::create_dir_all(dir)?;
    let monthly = dir.join(MONTHLY_STATS_FILE);
    let overall = dir.join(OVERALL_STATS_FILE);
    std::fs::write(&monthly, monthly_stats_json(&source.rasters, &cog.rasters)?)?;
    std::fs::write(
        &overall,
        overall_stats_json(source.overall_stats(), cog.overall_stats())?,
    )?;
    Ok([monthly, overall])
}
