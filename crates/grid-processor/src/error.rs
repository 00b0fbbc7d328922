//! Error types for raster processing.

use thiserror::Error;

/// Errors that can occur while manipulating rasters.
#[derive(Error, Debug)]
pub enum RasterError {
    /// Data length does not match the declared shape.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A named dimension is missing from the array.
    #[error("unknown dimension '{0}'")]
    UnknownDimension(String),

    /// Index outside a dimension.
    #[error("index {index} out of range for dimension '{dim}' of length {len}")]
    IndexOutOfRange {
        dim: String,
        index: usize,
        len: usize,
    },

    /// Coordinates that cannot be turned into a geotransform.
    #[error("irregular coordinates: {0}")]
    IrregularCoordinates(String),

    /// The requested region does not overlap the raster.
    #[error("requested region {requested} is outside raster bounds {raster}")]
    OutOfBounds { requested: String, raster: String },

    /// Projection error.
    #[error("projection error: {0}")]
    Projection(String),
}

impl RasterError {
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    pub fn irregular(msg: impl Into<String>) -> Self {
        Self::IrregularCoordinates(msg.into())
    }

    pub fn out_of_bounds(requested: impl Into<String>, raster: impl Into<String>) -> Self {
        Self::OutOfBounds {
            requested: requested.into(),
            raster: raster.into(),
        }
    }
}

impl From<projection::ProjectionError> for RasterError {
    fn from(err: projection::ProjectionError) -> Self {
        Self::Projection(err.to_string())
    }
}

impl From<RasterError> for cog_common::CogError {
    fn from(err: RasterError) -> Self {
        cog_common::CogError::DataReadError(err.to_string())
    }
}

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;
