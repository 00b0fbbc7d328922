//! Raster processing for COG conversion.
//!
//! Source variables arrive as named-dimension [`GridArray`]s, are sliced to
//! two spatial dimensions and turned into georeferenced [`Raster`]s, then
//! normalized (longitude convention, north-up orientation, nodata) before
//! encoding.
//!
//! # Pipeline
//!
//! ```text
//! netCDF / GeoTIFF variable
//!      │
//!      ▼
//! GridArray ──isel(time, i)──► GridArray (lat, lon)
//!      │
//!      ▼
//! Raster::wrap_longitude / orient_north_up / harmonize_nodata
//!      │
//!      ├─► reproject_geostationary (ABI fixed grids)
//!      │
//!      └─► generate_overviews ──► COG encoder
//! ```

pub mod array;
pub mod downsample;
pub mod error;
pub mod raster;
pub mod reproject;

pub use array::GridArray;
pub use downsample::{downsample_2x, generate_overviews, DownsampleMethod, OverviewLevel};
pub use error::{RasterError, Result};
pub use raster::{GeoTransform, Raster};
pub use reproject::{reproject_geostationary, Resampling};
