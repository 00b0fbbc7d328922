//! Dataset-wide statistics from per-file stats documents.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use storage::ObjectStorage;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{FidelityError, Result};

/// One file's source and COG statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStatsRecord {
    #[serde(default)]
    pub file_name: String,
    pub mean_value_netcdf: f64,
    pub std_value_netcdf: f64,
    pub minimum_value_netcdf: f64,
    pub maximum_value_netcdf: f64,
    pub mean_value_cog: f64,
    pub std_value_cog: f64,
    pub minimum_value_cog: f64,
    pub maximum_value_cog: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Mean of the per-file means.
    pub mean: f64,
    /// Sample standard deviation of the per-file standard deviations;
    /// `None` for a single file.
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub netcdf: Aggregate,
    #[serde(rename = "COG")]
    pub cog: Aggregate,
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((ss / (n - 1.0)).sqrt())
}

fn aggregate_side(
    records: &[FileStatsRecord],
    pick: impl Fn(&FileStatsRecord) -> [f64; 4],
) -> Aggregate {
    let rows: Vec<[f64; 4]> = records.iter().map(pick).collect();
    let means: Vec<f64> = rows.iter().map(|r| r[0]).collect();
    let stds: Vec<f64> = rows.iter().map(|r| r[1]).collect();
    Aggregate {
        mean: means.iter().sum::<f64>() / means.len() as f64,
        std: sample_std(&stds),
        min: rows.iter().map(|r| r[2]).fold(f64::INFINITY, f64::min),
        max: rows.iter().map(|r| r[3]).fold(f64::NEG_INFINITY, f64::max),
    }
}

/// Combine per-file records; `None` when there are none.
pub fn aggregate(records: &[FileStatsRecord]) -> Option<AggregateStats> {
    if records.is_empty() {
        return None;
    }
    Some(AggregateStats {
        netcdf: aggregate_side(records, |r| {
            [
                r.mean_value_netcdf,
                r.std_value_netcdf,
                r.minimum_value_netcdf,
                r.maximum_value_netcdf,
            ]
        }),
        cog: aggregate_side(records, |r| {
            [
                r.mean_value_cog,
                r.std_value_cog,
                r.minimum_value_cog,
                r.maximum_value_cog,
            ]
        }),
    })
}

/// Records of one document: a single object or an array of objects.
pub fn parse_records(text: &str, context: &str) -> Result<Vec<FileStatsRecord>> {
    let value: Value = serde_json::from_str(text).map_err(|e| FidelityError::json(context, e))?;
    let records = match value {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<_>, _>>(),
        other => serde_json::from_value(other).map(|r| vec![r]),
    };
    records.map_err(|e| FidelityError::json(context, e))
}

fn selected(name: &str, contains: Option<&str>) -> bool {
    name.ends_with(".json") && contains.map_or(true, |c| name.contains(c))
}

/// Records from every `.json` under `dir` whose name contains `contains`.
pub fn load_records_from_dir(dir: &Path, contains: Option<&str>) -> Result<Vec<FileStatsRecord>> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| selected(&p.to_string_lossy(), contains))
        .collect();
    paths.sort();

    let mut records = Vec::new();
    for path in &paths {
        let text = std::fs::read_to_string(path)?;
        records.extend(parse_records(&text, &path.display().to_string())?);
    }
    debug!(files = paths.len(), records = records.len(), "Loaded stats documents");
    Ok(records)
}

/// Records from every `.json` object under `prefix`.
pub async fn load_records_from_storage(
    storage: &ObjectStorage,
    prefix: &str,
    contains: Option<&str>,
) -> Result<Vec<FileStatsRecord>> {
    let mut records = Vec::new();
    for object in storage.list(prefix).await? {
        if !selected(&object.key, contains) {
            continue;
        }
        let bytes = storage.get(&object.key).await?;
        let text = String::from_utf8_lossy(&bytes);
        records.extend(parse_records(&text, &object.key)?);
    }
    Ok(records)
}
