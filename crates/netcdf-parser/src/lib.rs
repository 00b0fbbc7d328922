//! NetCDF reading for greenhouse-gas and GOES-R ABI source files.
//!
//! Files are opened with the native netcdf library (libnetcdf + HDF5) and
//! loaded into a [`Dataset`]: named dimensions, 1-D coordinates as `f64`,
//! and every numeric data variable as a flattened `f32` array.

pub mod dataset;
pub mod error;
pub mod goes;
mod native;

pub use dataset::{AttrValue, Attributes, Coordinate, Dataset, Dimension, OpenOptions, Variable};
pub use error::{NetCdfError, NetCdfResult};
pub use goes::GoesImagerProjection;
pub use native::silence_hdf5_errors;
