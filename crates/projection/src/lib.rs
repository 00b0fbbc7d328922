//! Map projections needed to bring satellite fixed grids onto WGS84.
//!
//! Implemented from the published formulas without external dependencies.

pub mod error;
pub mod geostationary;

pub use error::{ProjectionError, ProjectionResult};
pub use geostationary::{Geostationary, GeostationaryParams};
