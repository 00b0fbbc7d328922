use cog_common::CogError;
use netcdf_parser::NetCdfError;
use thiserror::Error;
use transform::TransformError;

#[derive(Error, Debug)]
pub enum FidelityError {
    #[error("Transformation failed: {0}")]
    Transform(#[from] TransformError),

    #[error("netCDF error: {0}")]
    NetCdf(#[from] NetCdfError),

    #[error(transparent)]
    Cog(#[from] CogError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FidelityError {
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        FidelityError::Json {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, FidelityError>;
