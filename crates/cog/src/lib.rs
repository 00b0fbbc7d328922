//! Cloud Optimized GeoTIFF support.
//!
//! - [`CogEncoder`]: single-band float32 COG writer (tiled, DEFLATE,
//!   overviews, GeoTIFF keys, `GDAL_NODATA`)
//! - [`GeoTiffReader`]: first band of any GeoTIFF into a [`Raster`]
//! - [`validate_cog`]: directory-level layout checks
//!
//! [`Raster`]: grid_processor::Raster

pub mod encoder;
mod ifd;
pub mod reader;
pub mod tags;
pub mod validate;

pub use encoder::{CogEncoder, CogOptions, Compression};
pub use reader::{read_geotiff, read_geotiff_file, GeoTiffReader};
pub use validate::{validate_cog, CogValidation, LayoutError};
