//! Reprojection of geostationary fixed grids onto regular lat/lon grids.

use projection::Geostationary;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RasterError, Result};
use crate::raster::{GeoTransform, Raster};

/// Sampling used when pulling source pixels into the output grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    #[default]
    Nearest,
    Bilinear,
}

/// Reproject a row-major geostationary grid to EPSG:4326.
///
/// The output keeps the source pixel count and spans the on-Earth extent of
/// the source. Cells that map to space or outside the source are NaN.
pub fn reproject_geostationary(
    name: &str,
    data: &[f32],
    proj: &Geostationary,
    resampling: Resampling,
) -> Result<Raster> {
    let (width, height) = proj.dimensions();
    if data.len() != width * height {
        return Err(RasterError::shape_mismatch(format!(
            "{}: projection grid is {}x{} but data has {} values",
            name,
            width,
            height,
            data.len()
        )));
    }

    let bounds = proj.geographic_bounds().ok_or_else(|| {
        RasterError::out_of_bounds(name.to_string(), "no source pixel sees the Earth")
    })?;

    let gt = GeoTransform {
        origin_x: bounds.min_x,
        pixel_width: bounds.width() / width as f64,
        origin_y: bounds.max_y,
        pixel_height: -bounds.height() / height as f64,
    };
    debug!(
        name,
        width,
        height,
        min_lon = bounds.min_x,
        max_lon = bounds.max_x,
        min_lat = bounds.min_y,
        max_lat = bounds.max_y,
        "Reprojecting geostationary grid"
    );

    let mut output = vec![f32::NAN; width * height];
    output
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, out_row)| {
            for (col, cell) in out_row.iter_mut().enumerate() {
                let (lon, lat) = gt.pixel_center(col, row);
                *cell = match resampling {
                    Resampling::Nearest => proj
                        .nearest_pixel(lon, lat)
                        .map_or(f32::NAN, |(c, r)| data[r * width + c]),
                    Resampling::Bilinear => proj
                        .geo_to_pixel(lon, lat)
                        .map_or(f32::NAN, |(c, r)| bilinear(data, width, height, c, r)),
                };
            }
        });

    Raster::from_geotransform(name, width, height, output, gt)
}

/// Bilinear interpolation at a fractional pixel; NaN if any corner is NaN
/// or the point lies outside the grid.
fn bilinear(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    if x < 0.0 || y < 0.0 || x > (width - 1) as f64 || y > (height - 1) as f64 {
        return f32::NAN;
    }
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = (x - x0 as f64) as f32;
    let yf = (y - y0 as f64) as f32;

    let v00 = data[y0 * width + x0];
    let v10 = data[y0 * width + x1];
    let v01 = data[y1 * width + x0];
    let v11 = data[y1 * width + x1];

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

#[cfg(test)]
mod tests {
    use super::*;
    use projection::GeostationaryParams;

    fn axis(start: f64, end: f64, n: usize) -> Vec<f64> {
        let step = (end - start) / (n - 1) as f64;
        (0..n).map(|i| start + i as f64 * step).collect()
    }

    fn conus(nx: usize, ny: usize) -> Geostationary {
        Geostationary::new(
            &GeostationaryParams::goes_east(),
            &axis(-0.101360, 0.038640, nx),
            &axis(0.128226, 0.044226, ny),
        )
        .unwrap()
    }

    #[test]
    fn test_reproject_preserves_dimensions() {
        let proj = conus(80, 50);
        let data: Vec<f32> = (0..80 * 50).map(|i| i as f32).collect();

        let raster = reproject_geostationary("Rad", &data, &proj, Resampling::Nearest).unwrap();
        assert_eq!((raster.width, raster.height), (80, 50));
        assert!(raster.is_north_up());

        let bounds = raster.bounds().unwrap();
        assert!(bounds.min_x < bounds.max_x);
        assert!(bounds.min_y < bounds.max_y);
    }

    #[test]
    fn test_nearest_copies_source_values() {
        let proj = conus(40, 30);
        let data = vec![7.0f32; 40 * 30];
        let raster = reproject_geostationary("Rad", &data, &proj, Resampling::Nearest).unwrap();

        let valid: Vec<f32> = raster.data.iter().copied().filter(|v| !v.is_nan()).collect();
        assert!(!valid.is_empty());
        assert!(valid.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_reproject_rejects_wrong_length() {
        let proj = conus(10, 10);
        assert!(reproject_geostationary("Rad", &[0.0; 5], &proj, Resampling::Nearest).is_err());
    }

    #[test]
    fn test_bilinear_midpoint() {
        let data = vec![0.0, 2.0, 4.0, 6.0];
        assert!((bilinear(&data, 2, 2, 0.5, 0.5) - 3.0).abs() < 1e-6);
        assert!(bilinear(&data, 2, 2, 1.5, 0.0).is_nan());
    }
}
