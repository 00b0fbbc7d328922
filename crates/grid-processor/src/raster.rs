//! Georeferenced 2-D rasters and the coordinate normalizations applied
//! before encoding.
//!
//! Data is row-major with row 0 first; `x[col]` and `y[row]` hold pixel
//! centre coordinates.

use std::collections::BTreeMap;

use cog_common::{BoundingBox, Crs};
use serde::{Deserialize, Serialize};

use crate::error::{RasterError, Result};

/// Relative tolerance when checking that coordinates are evenly spaced.
const SPACING_TOLERANCE: f64 = 1e-3;

/// Affine transform from pixel edges, GDAL order without the rotation terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X of the left edge of column 0
    pub origin_x: f64,
    pub pixel_width: f64,
    /// Y of the top edge of row 0
    pub origin_y: f64,
    /// Negative for north-up rasters
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub nodata: Option<f32>,
    pub crs: Crs,
    pub attributes: BTreeMap<String, String>,
    /// Pixel size `(width, height)` when it came from a geotransform. Axes
    /// with a single coordinate take their step from here.
    pub resolution: Option<(f64, f64)>,
}

impl Raster {
    pub fn new(
        name: impl Into<String>,
        width: usize,
        height: usize,
        data: Vec<f32>,
        x: Vec<f64>,
        y: Vec<f64>,
    ) -> Result<Self> {
        let name = name.into();
        if data.len() != width * height || x.len() != width || y.len() != height {
            return Err(RasterError::shape_mismatch(format!(
                "{}: {}x{} raster with {} values, {} x and {} y coordinates",
                name,
                width,
                height,
                data.len(),
                x.len(),
                y.len()
            )));
        }
        Ok(Self {
            name,
            width,
            height,
            data,
            x,
            y,
            nodata: None,
            crs: Crs::wgs84(),
            attributes: BTreeMap::new(),
            resolution: None,
        })
    }

    /// Build coordinates from a geotransform.
    pub fn from_geotransform(
        name: impl Into<String>,
        width: usize,
        height: usize,
        data: Vec<f32>,
        gt: GeoTransform,
    ) -> Result<Self> {
        let x = (0..width).map(|c| gt.pixel_center(c, 0).0).collect();
        let y = (0..height).map(|r| gt.pixel_center(0, r).1).collect();
        let mut raster = Self::new(name, width, height, data, x, y)?;
        raster.resolution = Some((gt.pixel_width, gt.pixel_height));
        Ok(raster)
    }

    #[inline]
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.data[row * self.width + col])
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_north_up(&self) -> bool {
        self.y.len() < 2 || self.y[0] > self.y[self.y.len() - 1]
    }

    // ========================================================================
    // Coordinate normalization
    // ========================================================================

    /// `coord * scale + offset` on the x axis (index grids to degrees).
    pub fn rescale_x(&mut self, scale: f64, offset: f64) {
        self.x.iter_mut().for_each(|v| *v = *v * scale + offset);
        if let Some((dx, _)) = &mut self.resolution {
            *dx *= scale;
        }
    }

    pub fn rescale_y(&mut self, scale: f64, offset: f64) {
        self.y.iter_mut().for_each(|v| *v = *v * scale + offset);
        if let Some((_, dy)) = &mut self.resolution {
            *dy *= scale;
        }
    }

    /// Map longitudes onto [-180, 180) and sort columns west to east.
    pub fn wrap_longitude(&mut self) {
        self.x
            .iter_mut()
            .for_each(|lon| *lon = (*lon + 180.0).rem_euclid(360.0) - 180.0);
        self.sort_x();
    }

    /// Stable sort of columns by ascending x.
    pub fn sort_x(&mut self) {
        let order = sorted_order(&self.x);
        if order.iter().enumerate().all(|(i, &j)| i == j) {
            return;
        }

        let mut data = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(self.width) {
            data.extend(order.iter().map(|&c| row[c]));
        }
        self.x = order.iter().map(|&c| self.x[c]).collect();
        self.data = data;
    }

    /// Stable sort of rows by ascending y.
    pub fn sort_y_ascending(&mut self) {
        let order = sorted_order(&self.y);
        if order.iter().enumerate().all(|(i, &j)| i == j) {
            return;
        }

        let mut data = Vec::with_capacity(self.data.len());
        for &r in &order {
            data.extend_from_slice(&self.data[r * self.width..(r + 1) * self.width]);
        }
        self.y = order.iter().map(|&r| self.y[r]).collect();
        self.data = data;
    }

    /// Reverse row order.
    pub fn flip_y(&mut self) {
        let width = self.width;
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(width).rev() {
            data.extend_from_slice(row);
        }
        self.data = data;
        self.y.reverse();
        if let Some((_, dy)) = &mut self.resolution {
            *dy = -*dy;
        }
    }

    /// Rows ordered by descending latitude.
    pub fn orient_north_up(&mut self) {
        self.sort_y_ascending();
        if self.height > 1 {
            self.flip_y();
        }
    }

    // ========================================================================
    // Nodata
    // ========================================================================

    /// Replace cells equal to `from` (NaN matches NaN) with `to`.
    pub fn replace_value(&mut self, from: f32, to: f32) {
        if from.is_nan() {
            return self.replace_nan(to);
        }
        self.data
            .iter_mut()
            .filter(|v| **v == from)
            .for_each(|v| *v = to);
    }

    pub fn replace_nan(&mut self, to: f32) {
        self.data
            .iter_mut()
            .filter(|v| v.is_nan())
            .for_each(|v| *v = to);
    }

    pub fn set_nodata(&mut self, nodata: f32) {
        self.nodata = Some(nodata);
    }

    /// Substitute the provider sentinel and tag the harmonized one.
    pub fn harmonize_nodata(&mut self, provider: f32, harmonized: f32) {
        self.replace_value(provider, harmonized);
        self.set_nodata(harmonized);
    }

    pub fn is_nodata(&self, v: f32) -> bool {
        v.is_nan() || self.nodata.is_some_and(|nd| v == nd)
    }

    pub fn map_values(&mut self, f: impl Fn(f32) -> f32) {
        self.data.iter_mut().for_each(|v| *v = f(*v));
    }

    // ========================================================================
    // Georeferencing
    // ========================================================================

    /// A single-row raster is treated as north-up, so its pixel height is
    /// always negative.
    pub fn geotransform(&self) -> Result<GeoTransform> {
        let dx = axis_step("x", &self.x, self.resolution.map(|(w, _)| w.abs()))?;
        let dy = axis_step("y", &self.y, self.resolution.map(|(_, h)| -h.abs()))?;
        Ok(GeoTransform {
            origin_x: self.x[0] - dx / 2.0,
            pixel_width: dx,
            origin_y: self.y[0] - dy / 2.0,
            pixel_height: dy,
        })
    }

    /// Outer pixel-edge bounds.
    pub fn bounds(&self) -> Result<BoundingBox> {
        let gt = self.geotransform()?;
        let x1 = gt.origin_x + gt.pixel_width * self.width as f64;
        let y1 = gt.origin_y + gt.pixel_height * self.height as f64;
        Ok(BoundingBox::new(
            gt.origin_x.min(x1),
            gt.origin_y.min(y1),
            gt.origin_x.max(x1),
            gt.origin_y.max(y1),
        ))
    }

    /// Keep rows and columns whose centres fall inside `bbox`.
    pub fn clip_to_bbox(&self, bbox: &BoundingBox) -> Result<Raster> {
        let cols: Vec<usize> = (0..self.width)
            .filter(|&c| self.x[c] >= bbox.min_x && self.x[c] <= bbox.max_x)
            .collect();
        let rows: Vec<usize> = (0..self.height)
            .filter(|&r| self.y[r] >= bbox.min_y && self.y[r] <= bbox.max_y)
            .collect();

        if cols.is_empty() || rows.is_empty() {
            let extent = self
                .bounds()
                .map(|b| format!("{:?}", b.to_array()))
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(RasterError::out_of_bounds(
                format!("{:?}", bbox.to_array()),
                extent,
            ));
        }

        let mut data = Vec::with_capacity(cols.len() * rows.len());
        for &r in &rows {
            data.extend(cols.iter().map(|&c| self.data[r * self.width + c]));
        }

        Ok(Raster {
            name: self.name.clone(),
            width: cols.len(),
            height: rows.len(),
            data,
            x: cols.iter().map(|&c| self.x[c]).collect(),
            y: rows.iter().map(|&r| self.y[r]).collect(),
            nodata: self.nodata,
            crs: self.crs,
            attributes: self.attributes.clone(),
            resolution: self
                .geotransform()
                .ok()
                .map(|gt| (gt.pixel_width, gt.pixel_height))
                .or(self.resolution),
        })
    }
}

fn sorted_order(coords: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..coords.len()).collect();
    order.sort_by(|&a, &b| coords[a].total_cmp(&coords[b]));
    order
}

/// Step along an axis; a lone coordinate falls back to `known`.
fn axis_step(axis: &str, coords: &[f64], known: Option<f64>) -> Result<f64> {
    match known {
        Some(step) if coords.len() == 1 && step != 0.0 && step.is_finite() => Ok(step),
        _ => regular_spacing(axis, coords),
    }
}

fn regular_spacing(axis: &str, coords: &[f64]) -> Result<f64> {
    if coords.len() < 2 {
        return Err(RasterError::irregular(format!(
            "{} axis needs two coordinates to derive a resolution",
            axis
        )));
    }
    let step = (coords[coords.len() - 1] - coords[0]) / (coords.len() - 1) as f64;
    if step == 0.0 || !step.is_finite() {
        return Err(RasterError::irregular(format!("{} axis has zero extent", axis)));
    }
    for pair in coords.windows(2) {
        let d = pair[1] - pair[0];
        if ((d - step) / step).abs() > SPACING_TOLERANCE {
            return Err(RasterError::irregular(format!(
                "{} axis step {} deviates from mean step {}",
                axis, d, step
            )));
        }
    }
    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4 columns over longitudes 0..360, 2 rows ascending latitude.
    fn global_0_360() -> Raster {
        Raster::new(
            "co2",
            4,
            2,
            vec![0.0, 1.0, 2.0, 3.0, 10.0, 11.0, 12.0, 13.0],
            vec![45.0, 135.0, 225.0, 315.0],
            vec![-45.0, 45.0],
        )
        .unwrap()
    }

    #[test]
    fn test_wrap_longitude_reorders_columns() {
        let mut r = global_0_360();
        r.wrap_longitude();
        assert_eq!(r.x, vec![-135.0, -45.0, 45.0, 135.0]);
        assert_eq!(&r.data[..4], &[2.0, 3.0, 0.0, 1.0]);
        assert_eq!(&r.data[4..], &[12.0, 13.0, 10.0, 11.0]);
    }

    #[test]
    fn test_wrap_longitude_maps_180_to_west() {
        let mut r = Raster::new("v", 2, 1, vec![1.0, 2.0], vec![0.0, 180.0], vec![0.0]).unwrap();
        r.wrap_longitude();
        assert_eq!(r.x, vec![-180.0, 0.0]);
        assert_eq!(r.data, vec![2.0, 1.0]);
    }

    #[test]
    fn test_orient_north_up() {
        let mut r = global_0_360();
        assert!(!r.is_north_up());
        r.orient_north_up();
        assert!(r.is_north_up());
        assert_eq!(r.y, vec![45.0, -45.0]);
        assert_eq!(&r.data[..4], &[10.0, 11.0, 12.0, 13.0]);

        // Already descending stays descending.
        r.orient_north_up();
        assert_eq!(r.y, vec![45.0, -45.0]);
    }

    #[test]
    fn test_replace_value_and_nan() {
        let mut r = Raster::new(
            "v",
            3,
            1,
            vec![-1.0, f32::NAN, 5.0],
            vec![0.0, 1.0, 2.0],
            vec![0.0],
        )
        .unwrap();
        r.harmonize_nodata(-1.0, -9999.0);
        assert_eq!(r.data[0], -9999.0);
        assert!(r.data[1].is_nan());
        r.replace_nan(-9999.0);
        assert_eq!(r.data, vec![-9999.0, -9999.0, 5.0]);
        assert_eq!(r.nodata, Some(-9999.0));
        assert!(r.is_nodata(-9999.0));
    }

    #[test]
    fn test_geotransform_and_bounds() {
        let mut r = global_0_360();
        r.wrap_longitude();
        r.orient_north_up();
        let gt = r.geotransform().unwrap();
        assert_eq!(gt.origin_x, -180.0);
        assert_eq!(gt.pixel_width, 90.0);
        assert_eq!(gt.origin_y, 90.0);
        assert_eq!(gt.pixel_height, -90.0);
        assert_eq!(
            r.bounds().unwrap(),
            BoundingBox::new(-180.0, -90.0, 180.0, 90.0)
        );
    }

    #[test]
    fn test_geotransform_rejects_irregular() {
        let r = Raster::new("v", 3, 1, vec![0.0; 3], vec![0.0, 1.0, 5.0], vec![0.0]).unwrap();
        assert!(matches!(
            r.geotransform(),
            Err(RasterError::IrregularCoordinates(_))
        ));
    }

    #[test]
    fn test_from_geotransform_roundtrip() {
        let gt = GeoTransform {
            origin_x: -10.0,
            pixel_width: 0.5,
            origin_y: 5.0,
            pixel_height: -0.5,
        };
        let r = Raster::from_geotransform("v", 4, 2, vec![0.0; 8], gt).unwrap();
        assert_eq!(r.x[0], -9.75);
        assert_eq!(r.y[1], 4.25);
        assert_eq!(r.geotransform().unwrap(), gt);
    }

    #[test]
    fn test_single_row_keeps_resolution() {
        let gt = GeoTransform {
            origin_x: -10.0,
            pixel_width: 0.5,
            origin_y: 5.0,
            pixel_height: -0.25,
        };
        let r = Raster::from_geotransform("row", 4, 1, vec![0.0; 4], gt).unwrap();
        assert_eq!(r.geotransform().unwrap(), gt);

        let pixel = Raster::from_geotransform("pixel", 1, 1, vec![1.0], gt).unwrap();
        assert_eq!(pixel.geotransform().unwrap(), gt);
        assert_eq!(
            pixel.bounds().unwrap(),
            BoundingBox::new(-10.0, 4.75, -9.5, 5.0)
        );

        // Without a known resolution a lone coordinate is still an error.
        let bare = Raster::new("bare", 2, 1, vec![0.0; 2], vec![0.0, 1.0], vec![0.0]).unwrap();
        assert!(bare.geotransform().is_err());
    }

    #[test]
    fn test_clip_to_thin_strip_keeps_resolution() {
        let mut r = global_0_360();
        r.wrap_longitude();
        r.orient_north_up();
        let strip = r
            .clip_to_bbox(&BoundingBox::new(-180.0, 0.0, 180.0, 60.0))
            .unwrap();
        assert_eq!(strip.height, 1);
        let gt = strip.geotransform().unwrap();
        assert_eq!(gt.pixel_height, -90.0);
        assert_eq!(gt.origin_y, 90.0);
    }

    #[test]
    fn test_clip_to_bbox() {
        let mut r = global_0_360();
        r.wrap_longitude();
        let clipped = r
            .clip_to_bbox(&BoundingBox::new(-100.0, 0.0, 50.0, 60.0))
            .unwrap();
        assert_eq!(clipped.x, vec![-45.0, 45.0]);
        assert_eq!(clipped.y, vec![45.0]);
        assert_eq!(clipped.data, vec![13.0, 10.0]);

        assert!(r
            .clip_to_bbox(&BoundingBox::new(200.0, 0.0, 210.0, 10.0))
            .is_err());
    }
}
