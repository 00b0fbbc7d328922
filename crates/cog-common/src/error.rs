//! Error types shared by the conversion crates.

use thiserror::Error;

/// Result type alias using CogError.
pub type CogResult<T> = Result<T, CogError>;

/// Primary error type for conversion operations.
#[derive(Debug, Error)]
pub enum CogError {
    // === Input Errors ===
    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Invalid BBOX: {0}")]
    InvalidBbox(String),

    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Unsupported calendar: {0}")]
    UnsupportedCalendar(String),

    // === Data Errors ===
    #[error("Failed to read data: {0}")]
    DataReadError(String),

    #[error("Invalid NetCDF data: {0}")]
    NetCdfError(String),

    #[error("Invalid GeoTIFF data: {0}")]
    GeoTiffError(String),

    // === Storage Errors ===
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    // === Infrastructure Errors ===
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl CogError {
    /// Short, stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CogError::InvalidParameter { .. }
            | CogError::InvalidBbox(_)
            | CogError::InvalidCrs(_)
            | CogError::InvalidTime(_)
            | CogError::UnsupportedCalendar(_) => "input",
            CogError::DataReadError(_) | CogError::NetCdfError(_) | CogError::GeoTiffError(_) => {
                "data"
            }
            CogError::StorageError(_) | CogError::NotFound(_) => "storage",
            CogError::InternalError(_) => "internal",
        }
    }
}

impl From<std::io::Error> for CogError {
    fn from(err: std::io::Error) -> Self {
        CogError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for CogError {
    fn from(err: serde_json::Error) -> Self {
        CogError::InternalError(format!("JSON error: {}", err))
    }
}
