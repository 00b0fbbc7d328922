//! Common test fixtures for ghg-cog tests.
//!
//! This module provides pre-defined test data that represents common
//! scenarios in greenhouse-gas raster processing.

use std::path::Path;

use cog::{CogEncoder, CogOptions};
use grid_processor::Raster;

use crate::generators::linspace;
use crate::netcdf_fixture::NetCdfFixture;

/// Common bounding box definitions for testing.
pub mod bbox {
    /// Global bounding box (-180 to 180, -90 to 90)
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Continental United States bounding box
    pub const CONUS: (f64, f64, f64, f64) = (-130.0, 20.0, -60.0, 55.0);

    /// Region kept from GOES-East full-disk scenes
    pub const AMERICAS: (f64, f64, f64, f64) =
        (-102.8148701375, 6.1943456775, -13.3448605043, 49.6429910636);
}

/// Common time values for testing.
pub mod time {
    /// CF units used by most monthly model outputs
    pub const DAYS_SINCE_2000: &str = "days since 2000-01-01 00:00:00";

    /// Days since 2000-01-01 of the first day of each month of 2020
    pub const MONTH_STARTS_2020: [f64; 12] = [
        7305.0, 7336.0, 7365.0, 7396.0, 7426.0, 7457.0, 7487.0, 7518.0, 7549.0, 7579.0, 7610.0,
        7640.0,
    ];
}

/// Writes single-band GeoTIFFs with the workspace encoder.
pub mod geotiff {
    use super::*;

    fn encoder() -> CogEncoder {
        CogEncoder::new(CogOptions {
            tile_size: 16,
            ..Default::default()
        })
    }

    pub fn to_bytes(raster: &Raster) -> Vec<u8> {
        encoder()
            .encode(raster)
            .expect("Failed to encode GeoTIFF fixture")
    }

    pub fn write(raster: &Raster, path: impl AsRef<Path>) {
        encoder()
            .write_file(raster, path)
            .expect("Failed to write GeoTIFF fixture");
    }
}

/// Synthetic GOES-16 ABI radiance files over the CONUS sector.
pub mod goes {
    use super::*;

    pub const TIME_COVERAGE_START: &str = "2024-06-29T06:00:20.8Z";

    /// Scan-angle axes (radians) of an `nx` by `ny` CONUS sector.
    pub fn conus_axes(nx: usize, ny: usize) -> (Vec<f64>, Vec<f64>) {
        (
            linspace(-0.101360, 0.038640, nx),
            linspace(0.128226, 0.044226, ny),
        )
    }

    /// A radiance file whose `Rad` values are `row * nx + col`.
    pub fn radiance(nx: usize, ny: usize) -> NetCdfFixture {
        let (x, y) = conus_axes(nx, ny);
        let rad = (0..nx * ny).map(|i| i as f32).collect();
        NetCdfFixture::new()
            .coordinate("x", x)
            .coordinate("y", y)
            .variable("Rad", &["y", "x"], rad)
            .attr("Rad", "units", "mW m-2 sr-1 (cm-1)-1")
            .scalar("goes_imager_projection")
            .attr("goes_imager_projection", "perspective_point_height", 35_786_023.0)
            .attr("goes_imager_projection", "semi_major_axis", 6_378_137.0)
            .attr("goes_imager_projection", "semi_minor_axis", 6_356_752.314_14)
            .attr("goes_imager_projection", "longitude_of_projection_origin", -75.0)
            .attr("goes_imager_projection", "sweep_angle_axis", "x")
            .global_attr("time_coverage_start", TIME_COVERAGE_START)
    }
}
