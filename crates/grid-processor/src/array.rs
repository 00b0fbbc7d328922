//! Named-dimension arrays.
//!
//! A [`GridArray`] is the shape a netCDF variable arrives in: any number of
//! named dimensions, flattened row-major. Plugins slice it down to two
//! spatial dimensions and then turn it into a [`Raster`].

use crate::error::{RasterError, Result};
use crate::raster::Raster;

#[derive(Debug, Clone, PartialEq)]
pub struct GridArray {
    pub name: String,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl GridArray {
    pub fn new(
        name: impl Into<String>,
        dims: Vec<String>,
        shape: Vec<usize>,
        data: Vec<f32>,
    ) -> Result<Self> {
        let name = name.into();
        if dims.len() != shape.len() {
            return Err(RasterError::shape_mismatch(format!(
                "{}: {} dimension names for {} axes",
                name,
                dims.len(),
                shape.len()
            )));
        }
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(RasterError::shape_mismatch(format!(
                "{}: shape {:?} needs {} values, got {}",
                name,
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            name,
            dims,
            shape,
            data,
        })
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn axis(&self, dim: &str) -> Result<usize> {
        self.dims
            .iter()
            .position(|d| d == dim)
            .ok_or_else(|| RasterError::UnknownDimension(dim.to_string()))
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.dims.iter().any(|d| d == dim)
    }

    pub fn len_of(&self, dim: &str) -> Result<usize> {
        Ok(self.shape[self.axis(dim)?])
    }

    pub fn rename_dim(&mut self, from: &str, to: &str) {
        for d in self.dims.iter_mut().filter(|d| d.as_str() == from) {
            *d = to.to_string();
        }
    }

    /// Select one index along `dim`, dropping that dimension.
    pub fn isel(&self, dim: &str, index: usize) -> Result<GridArray> {
        let axis = self.axis(dim)?;
        let len = self.shape[axis];
        if index >= len {
            return Err(RasterError::IndexOutOfRange {
                dim: dim.to_string(),
                index,
                len,
            });
        }

        let inner: usize = self.shape[axis + 1..].iter().product();
        let outer: usize = self.shape[..axis].iter().product();
        let mut data = Vec::with_capacity(outer * inner);
        for o in 0..outer {
            let start = (o * len + index) * inner;
            data.extend_from_slice(&self.data[start..start + inner]);
        }

        let mut dims = self.dims.clone();
        let mut shape = self.shape.clone();
        dims.remove(axis);
        shape.remove(axis);

        Ok(GridArray {
            name: self.name.clone(),
            dims,
            shape,
            data,
        })
    }

    /// Drop every length-1 dimension other than those listed in `keep`.
    pub fn squeeze_except(&self, keep: &[&str]) -> Result<GridArray> {
        let mut out = self.clone();
        while let Some(dim) = out
            .dims
            .iter()
            .zip(&out.shape)
            .find(|(d, n)| **n == 1 && !keep.contains(&d.as_str()))
            .map(|(d, _)| d.clone())
        {
            out = out.isel(&dim, 0)?;
        }
        Ok(out)
    }

    /// Elementwise sum; NaN in either operand propagates.
    pub fn add(&self, other: &GridArray) -> Result<GridArray> {
        if self.dims != other.dims || self.shape != other.shape {
            return Err(RasterError::shape_mismatch(format!(
                "cannot add {} {:?}{:?} to {} {:?}{:?}",
                other.name, other.dims, other.shape, self.name, self.dims, self.shape
            )));
        }
        Ok(GridArray {
            name: self.name.clone(),
            dims: self.dims.clone(),
            shape: self.shape.clone(),
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a + b)
                .collect(),
        })
    }

    pub fn map(mut self, f: impl Fn(f32) -> f32) -> GridArray {
        self.data.iter_mut().for_each(|v| *v = f(*v));
        self
    }

    /// Turn a 2-D array into a raster with rows along `y_dim`.
    pub fn to_raster(
        &self,
        x_dim: &str,
        y_dim: &str,
        x_coords: Vec<f64>,
        y_coords: Vec<f64>,
    ) -> Result<Raster> {
        if self.ndim() != 2 {
            return Err(RasterError::shape_mismatch(format!(
                "{} has dimensions {:?}; select down to ({}, {}) first",
                self.name, self.dims, y_dim, x_dim
            )));
        }
        let x_axis = self.axis(x_dim)?;
        let y_axis = self.axis(y_dim)?;
        let (width, height) = (self.shape[x_axis], self.shape[y_axis]);

        if x_coords.len() != width || y_coords.len() != height {
            return Err(RasterError::shape_mismatch(format!(
                "{}: {}x{} grid with {} x and {} y coordinates",
                self.name,
                width,
                height,
                x_coords.len(),
                y_coords.len()
            )));
        }

        let data = if y_axis == 0 {
            self.data.clone()
        } else {
            // Stored as (x, y); transpose to row-major (y, x).
            let mut out = vec![0.0f32; self.data.len()];
            for col in 0..width {
                for row in 0..height {
                    out[row * width + col] = self.data[col * height + row];
                }
            }
            out
        };

        Raster::new(self.name.clone(), width, height, data, x_coords, y_coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> GridArray {
        // time=2, lat=2, lon=3
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        GridArray::new(
            "flux",
            vec!["time".into(), "lat".into(), "lon".into()],
            vec![2, 2, 3],
            data,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = GridArray::new("x", vec!["a".into()], vec![3], vec![0.0; 2]);
        assert!(matches!(err, Err(RasterError::ShapeMismatch(_))));
    }

    #[test]
    fn test_isel_leading_dimension() {
        let second = cube().isel("time", 1).unwrap();
        assert_eq!(second.dims, vec!["lat", "lon"]);
        assert_eq!(second.data, vec![6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn test_isel_middle_dimension() {
        let row = cube().isel("lat", 1).unwrap();
        assert_eq!(row.shape, vec![2, 3]);
        assert_eq!(row.data, vec![3.0, 4.0, 5.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn test_isel_out_of_range() {
        assert!(matches!(
            cube().isel("time", 2),
            Err(RasterError::IndexOutOfRange { len: 2, .. })
        ));
        assert!(cube().isel("depth", 0).is_err());
    }

    #[test]
    fn test_squeeze_except_keeps_spatial() {
        let arr = GridArray::new(
            "v",
            vec!["time".into(), "lat".into(), "lon".into()],
            vec![1, 1, 2],
            vec![1.0, 2.0],
        )
        .unwrap();
        let squeezed = arr.squeeze_except(&["lat", "lon"]).unwrap();
        assert_eq!(squeezed.dims, vec!["lat", "lon"]);
    }

    #[test]
    fn test_add_propagates_nan() {
        let a = cube().isel("time", 0).unwrap();
        let mut b = a.clone();
        b.data[0] = f32::NAN;
        let sum = a.add(&b).unwrap();
        assert!(sum.data[0].is_nan());
        assert_eq!(sum.data[1], 2.0);
        assert!(a.add(&cube()).is_err());
    }

    #[test]
    fn test_to_raster_transposes_lon_lat_order() {
        // Stored (lon=3, lat=2)
        let arr = GridArray::new(
            "v",
            vec!["lon".into(), "lat".into()],
            vec![3, 2],
            vec![0.0, 10.0, 1.0, 11.0, 2.0, 12.0],
        )
        .unwrap();
        let raster = arr
            .to_raster("lon", "lat", vec![0.0, 1.0, 2.0], vec![0.0, 1.0])
            .unwrap();
        assert_eq!(raster.data, vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
    }
}
