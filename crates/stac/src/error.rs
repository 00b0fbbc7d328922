//! Error types for catalog generation and publishing.

use cog_common::CogError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StacError {
    #[error("Invalid dataset definition: {0}")]
    Definition(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("No date found in '{0}'")]
    NoDate(String),

    #[error("Item {0} has no assets")]
    NoAssets(String),

    #[error(transparent)]
    Cog(#[from] CogError),

    #[error("Raster error: {0}")]
    Raster(#[from] grid_processor::RasterError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Ingestion of {id} failed with status {status}: {body}")]
    Ingest { id: String, status: u16, body: String },

    #[error("Missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl StacError {
    pub fn pattern(pattern: &str, source: regex::Error) -> Self {
        StacError::Pattern {
            pattern: pattern.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StacError>;
