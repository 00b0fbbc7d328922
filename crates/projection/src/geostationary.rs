//! Geostationary fixed-grid projection (GOES-R ABI).
//!
//! Grid coordinates are scan angles in radians as seen from a satellite
//! parked above the equator. Formulas follow the GOES-R Product Definition
//! and Users' Guide, section "ABI fixed grid", for an x-axis sweep.

use cog_common::BoundingBox;

use crate::error::{ProjectionError, ProjectionResult};

/// Relative tolerance when checking that a scan-angle axis is regular.
const AXIS_TOLERANCE: f64 = 1e-3;

/// Points sampled along each grid edge when estimating bounds.
const EDGE_SAMPLES: usize = 64;

/// CF `grid_mapping` attributes of a geostationary grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GeostationaryParams {
    pub perspective_point_height: f64,
    pub semi_major_axis: f64,
    pub semi_minor_axis: f64,
    pub longitude_of_projection_origin: f64,
    pub sweep_angle_axis: String,
}

impl GeostationaryParams {
    /// GOES-East (GOES-16) fixed grid.
    pub fn goes_east() -> Self {
        Self {
            perspective_point_height: 35_786_023.0,
            semi_major_axis: 6_378_137.0,
            semi_minor_axis: 6_356_752.314_14,
            longitude_of_projection_origin: -75.0,
            sweep_angle_axis: "x".to_string(),
        }
    }
}

/// A geostationary grid: ellipsoid, satellite position and scan-angle axes.
#[derive(Debug, Clone)]
pub struct Geostationary {
    /// Distance from Earth centre to the satellite (metres)
    sat_distance: f64,
    r_eq: f64,
    r_pol: f64,
    /// Sub-satellite longitude (radians)
    lon_0: f64,
    x0: f64,
    y0: f64,
    dx: f64,
    dy: f64,
    nx: usize,
    ny: usize,
}

impl Geostationary {
    /// Build from CF attributes and the x/y scan-angle coordinates.
    ///
    /// Axes must be regularly spaced; their first value is the centre of the
    /// first column/row.
    pub fn new(params: &GeostationaryParams, x_axis: &[f64], y_axis: &[f64]) -> ProjectionResult<Self> {
        if !params.sweep_angle_axis.eq_ignore_ascii_case("x") {
            return Err(ProjectionError::UnsupportedSweep(
                params.sweep_angle_axis.clone(),
            ));
        }
        if params.semi_major_axis <= 0.0
            || params.semi_minor_axis <= 0.0
            || params.semi_minor_axis > params.semi_major_axis
        {
            return Err(ProjectionError::InvalidEllipsoid(format!(
                "a={} b={}",
                params.semi_major_axis, params.semi_minor_axis
            )));
        }

        let dx = regular_step("x", x_axis)?;
        let dy = regular_step("y", y_axis)?;

        Ok(Self {
            sat_distance: params.perspective_point_height + params.semi_major_axis,
            r_eq: params.semi_major_axis,
            r_pol: params.semi_minor_axis,
            lon_0: params.longitude_of_projection_origin.to_radians(),
            x0: x_axis[0],
            y0: y_axis[0],
            dx,
            dy,
            nx: x_axis.len(),
            ny: y_axis.len(),
        })
    }

    /// Grid size as (columns, rows).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    /// Fractional (column, row) of a scan angle.
    #[inline]
    pub fn scan_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.x0) / self.dx, (y - self.y0) / self.dy)
    }

    #[inline]
    pub fn pixel_to_scan(&self, col: f64, row: f64) -> (f64, f64) {
        (self.x0 + col * self.dx, self.y0 + row * self.dy)
    }

    /// Scan angles (radians) to (lon, lat) degrees; `None` when looking past the limb.
    pub fn scan_to_geo(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let (sin_x, cos_x) = x.sin_cos();
        let (sin_y, cos_y) = y.sin_cos();
        let flattening = (self.r_eq / self.r_pol).powi(2);
        let h = self.sat_distance;

        let a = sin_x * sin_x + cos_x * cos_x * (cos_y * cos_y + flattening * sin_y * sin_y);
        let b = -2.0 * h * cos_x * cos_y;
        let c = h * h - self.r_eq * self.r_eq;

        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return None;
        }
        let range = (-b - disc.sqrt()) / (2.0 * a);

        let s_x = range * cos_x * cos_y;
        let s_y = -range * sin_x;
        let s_z = range * cos_x * sin_y;

        let lat = (flattening * s_z / (h - s_x).hypot(s_y)).atan();
        let lon = self.lon_0 - (s_y / (h - s_x)).atan();

        Some((lon.to_degrees(), lat.to_degrees()))
    }

    /// (lon, lat) degrees to scan angles; `None` when hidden from the satellite.
    pub fn geo_to_scan(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let phi = lat.to_radians();
        let dlon = lon.to_radians() - self.lon_0;
        let h = self.sat_distance;

        let ratio = (self.r_pol / self.r_eq).powi(2);
        let phi_c = (ratio * phi.tan()).atan();
        let e2 = 1.0 - ratio;
        let r_c = self.r_pol / (1.0 - e2 * phi_c.cos().powi(2)).sqrt();

        let s_x = h - r_c * phi_c.cos() * dlon.cos();
        let s_y = -r_c * phi_c.cos() * dlon.sin();
        let s_z = r_c * phi_c.sin();

        if h * (h - s_x) < s_y * s_y + s_z * s_z / ratio {
            return None;
        }

        let norm = (s_x * s_x + s_y * s_y + s_z * s_z).sqrt();
        let x = (-s_y / norm).asin();
        let y = (s_z / s_x).atan();
        Some((x, y))
    }

    /// Fractional (column, row) of a geographic point.
    pub fn geo_to_pixel(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let (x, y) = self.geo_to_scan(lon, lat)?;
        Some(self.scan_to_pixel(x, y))
    }

    /// Nearest (column, row) inside the grid, if any.
    pub fn nearest_pixel(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        let (col, row) = self.geo_to_pixel(lon, lat)?;
        let (col, row) = (col.round(), row.round());
        if col < 0.0 || row < 0.0 || col >= self.nx as f64 || row >= self.ny as f64 {
            return None;
        }
        Some((col as usize, row as usize))
    }

    /// Approximate lon/lat extent of the on-Earth part of the grid.
    ///
    /// Edges are sampled, plus the centre column and row so that a full-disk
    /// grid (whose edges lie in space) still yields an extent. `None` when no
    /// sample hits the Earth.
    pub fn geographic_bounds(&self) -> Option<BoundingBox> {
        let last_col = (self.nx - 1) as f64;
        let last_row = (self.ny - 1) as f64;
        let mut bounds: Option<BoundingBox> = None;

        for step in 0..=EDGE_SAMPLES {
            let f = step as f64 / EDGE_SAMPLES as f64;
            let samples = [
                (f * last_col, 0.0),
                (f * last_col, last_row),
                (0.0, f * last_row),
                (last_col, f * last_row),
                (f * last_col, last_row / 2.0),
                (last_col / 2.0, f * last_row),
            ];

            for (col, row) in samples {
                let (x, y) = self.pixel_to_scan(col, row);
                if let Some((lon, lat)) = self.scan_to_geo(x, y) {
                    let point = BoundingBox::new(lon, lat, lon, lat);
                    bounds = Some(match bounds {
                        Some(b) => b.union(&point),
                        None => point,
                    });
                }
            }
        }
        bounds
    }
}

fn regular_step(name: &'static str, axis: &[f64]) -> ProjectionResult<f64> {
    if axis.len() < 2 {
        return Err(ProjectionError::AxisTooShort(name));
    }
    let step = (axis[axis.len() - 1] - axis[0]) / (axis.len() - 1) as f64;
    if step == 0.0 {
        return Err(ProjectionError::IrregularAxis {
            axis: name,
            expected: 0.0,
            found: 0.0,
        });
    }

    for pair in axis.windows(2) {
        let found = pair[1] - pair[0];
        if ((found - step) / step).abs() > AXIS_TOLERANCE {
            return Err(ProjectionError::IrregularAxis {
                axis: name,
                expected: step,
                found,
            });
        }
    }
    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(start: f64, end: f64, n: usize) -> Vec<f64> {
        let step = (end - start) / (n - 1) as f64;
        (0..n).map(|i| start + i as f64 * step).collect()
    }

    /// CONUS-like sector: x west to east, y north to south.
    fn conus() -> Geostationary {
        Geostationary::new(
            &GeostationaryParams::goes_east(),
            &axis(-0.101360, 0.038640, 101),
            &axis(0.128226, 0.044226, 61),
        )
        .unwrap()
    }

    #[test]
    fn test_nadir_is_sub_satellite_point() {
        let proj = conus();
        let (lon, lat) = proj.scan_to_geo(0.0, 0.0).unwrap();
        assert!((lon + 75.0).abs() < 1e-9, "got {}", lon);
        assert!(lat.abs() < 1e-9, "got {}", lat);
    }

    #[test]
    fn test_geo_scan_roundtrip() {
        let proj = conus();
        for (lon, lat) in [(-95.0, 39.0), (-75.0, 0.0), (-120.0, 45.0), (-60.0, -20.0)] {
            let (x, y) = proj.geo_to_scan(lon, lat).unwrap();
            let (lon2, lat2) = proj.scan_to_geo(x, y).unwrap();
            assert!((lon - lon2).abs() < 1e-6, "lon {} vs {}", lon, lon2);
            assert!((lat - lat2).abs() < 1e-6, "lat {} vs {}", lat, lat2);
        }
    }

    #[test]
    fn test_kansas_falls_inside_conus_grid() {
        let proj = conus();
        let (col, row) = proj.nearest_pixel(-95.0, 39.0).unwrap();
        assert!(col < 101 && row < 61);
    }

    #[test]
    fn test_far_side_not_visible() {
        let proj = conus();
        assert!(proj.geo_to_scan(105.0, 0.0).is_none());
        assert!(proj.scan_to_geo(0.3, 0.3).is_none());
    }

    #[test]
    fn test_conus_bounds() {
        let b = conus().geographic_bounds().unwrap();
        assert!(b.min_x < -130.0, "min_lon {}", b.min_x);
        assert!(b.max_x > -60.0, "max_lon {}", b.max_x);
        assert!(b.min_y > 10.0 && b.min_y < 20.0, "min_lat {}", b.min_y);
        assert!(b.max_y > 50.0, "max_lat {}", b.max_y);
    }

    #[test]
    fn test_full_disk_bounds_from_centre_samples() {
        let proj = Geostationary::new(
            &GeostationaryParams::goes_east(),
            &axis(-0.151844, 0.151844, 201),
            &axis(0.151844, -0.151844, 201),
        )
        .unwrap();
        let b = proj.geographic_bounds().unwrap();
        assert!(b.min_y < -60.0 && b.max_y > 60.0);
    }

    #[test]
    fn test_rejects_bad_axes_and_sweep() {
        let params = GeostationaryParams::goes_east();
        assert!(matches!(
            Geostationary::new(&params, &[0.1], &axis(0.0, 1.0, 3)),
            Err(ProjectionError::AxisTooShort("x"))
        ));
        assert!(matches!(
            Geostationary::new(&params, &[0.0, 0.1, 0.5], &axis(0.0, 1.0, 3)),
            Err(ProjectionError::IrregularAxis { axis: "x", .. })
        ));

        let mut y_sweep = params.clone();
        y_sweep.sweep_angle_axis = "y".into();
        assert!(Geostationary::new(&y_sweep, &axis(0.0, 1.0, 3), &axis(0.0, 1.0, 3)).is_err());
    }
}
