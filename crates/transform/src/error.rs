//! Error types for the transform crate.

use cog_common::CogError;
use grid_processor::RasterError;
use netcdf_parser::NetCdfError;
use projection::ProjectionError;
use thiserror::Error;

/// Errors raised while turning a source file into COGs.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse NetCDF data: {0}")]
    NetCdf(#[from] NetCdfError),

    #[error("Raster operation failed: {0}")]
    Raster(#[from] RasterError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Cog(#[from] CogError),

    #[error("Missing required data in {file}: {message}")]
    MissingData { file: String, message: String },

    #[error("Cannot derive output filename from '{name}': {reason}")]
    Filename { name: String, reason: String },

    #[error("Two outputs of {file} map to the same filename {key}")]
    DuplicateOutput { file: String, key: String },

    #[error("Unknown transformation plugin: {0}")]
    UnknownPlugin(String),

    #[error("Encoding task failed: {0}")]
    EncodeTask(String),

    #[error("Failed to list sources: {0}")]
    SourceListing(String),

    #[error("Failed to write report: {0}")]
    Report(String),
}

impl TransformError {
    pub fn missing(file: impl Into<String>, message: impl Into<String>) -> Self {
        TransformError::MissingData {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn filename(name: impl Into<String>, reason: impl Into<String>) -> Self {
        TransformError::Filename {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl From<csv::Error> for TransformError {
    fn from(err: csv::Error) -> Self {
        TransformError::Report(err.to_string())
    }
}

impl From<TransformError> for CogError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::Cog(e) => e,
            TransformError::NetCdf(e) => e.into(),
            TransformError::Raster(e) => e.into(),
            TransformError::Projection(e) => e.into(),
            TransformError::UnknownPlugin(name) => CogError::InvalidParameter {
                param: "plugin".to_string(),
                message: format!("unknown plugin '{}'", name),
            },
            other => CogError::DataReadError(other.to_string()),
        }
    }
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;
