//! Conversion bookkeeping written next to the COGs.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransformError};

/// One row of `files_converted.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub file_name: String,
    #[serde(rename = "COGs_created")]
    pub cogs_created: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub file_name: String,
    pub error: String,
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct ConversionReport {
    /// Files listed at the source before filtering.
    pub files_found: usize,
    /// Files handed to the plugin.
    pub files_selected: usize,
    pub files_converted: usize,
    pub records: Vec<ConversionRecord>,
    /// COGs not rewritten because they already existed.
    pub skipped: Vec<String>,
    pub failures: Vec<FileFailure>,
    pub bytes_written: u64,
}

impl ConversionReport {
    pub fn cogs_written(&self) -> usize {
        self.records.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Render `files_converted.csv` with a `file_name,COGs_created` header.
pub fn files_converted_csv(records: &[ConversionRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if records.is_empty() {
        writer.write_record(["file_name", "COGs_created"])?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| TransformError::Report(e.to_string()))
}
