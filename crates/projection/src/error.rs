use thiserror::Error;

pub type ProjectionResult<T> = Result<T, ProjectionError>;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Scan-angle axis '{0}' needs at least two values")]
    AxisTooShort(&'static str),

    #[error("Scan-angle axis '{axis}' is not regular (step {expected}, found {found})")]
    IrregularAxis {
        axis: &'static str,
        expected: f64,
        found: f64,
    },

    #[error("Unsupported sweep angle axis: {0}")]
    UnsupportedSweep(String),

    #[error("Invalid ellipsoid: {0}")]
    InvalidEllipsoid(String),
}

impl From<ProjectionError> for cog_common::CogError {
    fn from(err: ProjectionError) -> Self {
        cog_common::CogError::InvalidCrs(err.to_string())
    }
}
