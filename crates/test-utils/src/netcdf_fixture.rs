//! Small netCDF files built in code.
//!
//! ```ignore
//! use test_utils::{NetCdfFixture, lat_centers, lon_centers};
//!
//! let bytes = NetCdfFixture::new()
//!     .coordinate("lon", lon_centers(4, 0.0))
//!     .coordinate("lat", lat_centers(2))
//!     .variable("co2", &["lat", "lon"], vec![0.0; 8])
//!     .attr("co2", "units", "ppm")
//!     .to_bytes();
//! ```

use std::path::Path;

/// Attribute value accepted by the fixture writer.
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureAttr {
    Text(String),
    Number(f64),
}

impl From<&str> for FixtureAttr {
    fn from(v: &str) -> Self {
        FixtureAttr::Text(v.to_string())
    }
}

impl From<String> for FixtureAttr {
    fn from(v: String) -> Self {
        FixtureAttr::Text(v)
    }
}

impl From<f64> for FixtureAttr {
    fn from(v: f64) -> Self {
        FixtureAttr::Number(v)
    }
}

#[derive(Debug, Clone)]
struct FixtureVar {
    name: String,
    dims: Vec<String>,
    values: Vec<f32>,
    fill_value: Option<f32>,
    attrs: Vec<(String, FixtureAttr)>,
}

#[derive(Debug, Clone)]
struct FixtureCoord {
    name: String,
    values: Vec<f64>,
    attrs: Vec<(String, FixtureAttr)>,
}

/// Builder for a netCDF-4 file with `f64` coordinates and `f32` variables.
#[derive(Debug, Clone, Default)]
pub struct NetCdfFixture {
    dims: Vec<(String, usize)>,
    coords: Vec<FixtureCoord>,
    vars: Vec<FixtureVar>,
    scalars: Vec<FixtureCoord>,
    globals: Vec<(String, FixtureAttr)>,
}

impl NetCdfFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a dimension without a coordinate variable.
    pub fn dimension(mut self, name: &str, len: usize) -> Self {
        if !self.dims.iter().any(|(d, _)| d == name) {
            self.dims.push((name.to_string(), len));
        }
        self
    }

    /// A coordinate variable and its dimension.
    pub fn coordinate(mut self, name: &str, values: Vec<f64>) -> Self {
        self = self.dimension(name, values.len());
        self.coords.push(FixtureCoord {
            name: name.to_string(),
            values,
            attrs: Vec::new(),
        });
        self
    }

    /// A data variable in row-major order over `dims`.
    pub fn variable(mut self, name: &str, dims: &[&str], values: Vec<f32>) -> Self {
        self.vars.push(FixtureVar {
            name: name.to_string(),
            dims: dims.iter().map(|d| d.to_string()).collect(),
            values,
            fill_value: None,
            attrs: Vec::new(),
        });
        self
    }

    /// A dimensionless variable, used for grid-mapping attributes.
    pub fn scalar(mut self, name: &str) -> Self {
        self.scalars.push(FixtureCoord {
            name: name.to_string(),
            values: Vec::new(),
            attrs: Vec::new(),
        });
        self
    }

    /// Set `_FillValue` on a data variable.
    pub fn fill_value(mut self, var: &str, fill: f32) -> Self {
        if let Some(v) = self.vars.iter_mut().find(|v| v.name == var) {
            v.fill_value = Some(fill);
        }
        self
    }

    /// Attach an attribute to a variable, coordinate or scalar by name.
    pub fn attr(mut self, target: &str, key: &str, value: impl Into<FixtureAttr>) -> Self {
        let entry = (key.to_string(), value.into());
        if let Some(v) = self.vars.iter_mut().find(|v| v.name == target) {
            v.attrs.push(entry);
        } else if let Some(c) = self
            .coords
            .iter_mut()
            .chain(self.scalars.iter_mut())
            .find(|c| c.name == target)
        {
            c.attrs.push(entry);
        }
        self
    }

    pub fn global_attr(mut self, key: &str, value: impl Into<FixtureAttr>) -> Self {
        self.globals.push((key.to_string(), value.into()));
        self
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), netcdf::Error> {
        let mut file = netcdf::create(path.as_ref())?;

        for (name, len) in &self.dims {
            file.add_dimension(name, *len)?;
        }
        for (key, value) in &self.globals {
            match value {
                FixtureAttr::Text(s) => file.add_attribute(key, s.as_str())?,
                FixtureAttr::Number(n) => file.add_attribute(key, *n)?,
            };
        }

        for coord in &self.coords {
            let mut var = file.add_variable::<f64>(&coord.name, &[coord.name.as_str()])?;
            put_attrs(&mut var, &coord.attrs)?;
            var.put_values(&coord.values, ..)?;
        }

        for scalar in &self.scalars {
            let mut var = file.add_variable::<i32>(&scalar.name, &[])?;
            put_attrs(&mut var, &scalar.attrs)?;
        }

        for data in &self.vars {
            let dims: Vec<&str> = data.dims.iter().map(String::as_str).collect();
            let mut var = file.add_variable::<f32>(&data.name, &dims)?;
            if let Some(fill) = data.fill_value {
                var.set_fill_value(fill)?;
            }
            put_attrs(&mut var, &data.attrs)?;
            var.put_values(&data.values, ..)?;
        }
        Ok(())
    }

    /// Write to a temporary file and return its bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let dir = tempfile::tempdir().expect("Failed to create temporary directory");
        let path = dir.path().join("fixture.nc");
        self.write(&path).expect("Failed to write netCDF fixture");
        std::fs::read(&path).expect("Failed to read netCDF fixture")
    }
}

fn put_attrs(var: &mut netcdf::VariableMut, attrs: &[(String, FixtureAttr)]) -> Result<(), netcdf::Error> {
    for (key, value) in attrs {
        match value {
            FixtureAttr::Text(s) => var.put_attribute(key, s.as_str())?,
            FixtureAttr::Number(n) => var.put_attribute(key, *n)?,
        };
    }
    Ok(())
}
