//! In-memory view of a netCDF file.
//!
//! A [`Dataset`] is read eagerly: every numeric variable is converted to
//! `f32` (coordinates to `f64`), and the underlying file handle is released
//! before `open` returns.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::error::{NetCdfError, NetCdfResult};
use crate::native::{convert_attr, get_f64_attr, silence_hdf5_errors, StagedFile};

/// Attribute value after conversion from the library's typed variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Number(f64),
    Numbers(Vec<f64>),
}

impl AttrValue {
    /// Numeric value; the first element for arrays.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            AttrValue::Numbers(v) => v.first().copied(),
            AttrValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

pub type Attributes = BTreeMap<String, AttrValue>;

/// Decoding switches applied while reading variables.
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    /// Replace `_FillValue` cells with NaN.
    pub mask_fill_value: bool,
    /// Apply `scale_factor` / `add_offset` when present.
    pub apply_scale_offset: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            mask_fill_value: false,
            apply_scale_offset: true,
        }
    }
}

impl OpenOptions {
    pub fn masked() -> Self {
        Self {
            mask_fill_value: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
}

/// A data variable, flattened row-major over `dims`.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
    pub attributes: Attributes,
}

impl Variable {
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        self.attr(name).and_then(AttrValue::as_f64)
    }

    pub fn fill_value(&self) -> Option<f64> {
        self.attr_f64("_FillValue")
    }

    /// Position of `dim` in this variable's dimension list.
    pub fn dim_index(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }
}

/// A one-dimensional coordinate variable (named after its dimension).
#[derive(Debug, Clone)]
pub struct Coordinate {
    pub name: String,
    pub values: Vec<f64>,
    pub attributes: Attributes,
}

impl Coordinate {
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(AttrValue::as_str)
    }

    /// Decode CF time values using the `units` and `calendar` attributes.
    pub fn decode_times(&self) -> NetCdfResult<Vec<NaiveDateTime>> {
        let units = self.attr_str("units").ok_or_else(|| {
            NetCdfError::MissingData(format!("units attribute on '{}'", self.name))
        })?;
        let calendar = self.attr_str("calendar");

        self.values
            .iter()
            .map(|&v| {
                cog_common::decode_cf_time(v, units, calendar)
                    .map_err(|e| NetCdfError::InvalidFormat(format!("{}: {}", self.name, e)))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub dimensions: Vec<Dimension>,
    pub coordinates: Vec<Coordinate>,
    pub variables: Vec<Variable>,
    pub attributes: Attributes,
}

impl Dataset {
    /// Open a file with default decoding (scale/offset on, fill masking off).
    pub fn open(path: impl AsRef<Path>) -> NetCdfResult<Self> {
        Self::open_with(path, OpenOptions::default())
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open_with(path: impl AsRef<Path>, options: OpenOptions) -> NetCdfResult<Self> {
        silence_hdf5_errors();

        let file = netcdf::open(path.as_ref())?;
        let dataset = Self::load(&file, options)?;

        debug!(
            dimensions = dataset.dimensions.len(),
            coordinates = dataset.coordinates.len(),
            variables = dataset.variables.len(),
            "Loaded netCDF dataset"
        );
        Ok(dataset)
    }

    /// Read a dataset held in memory (staged through a temporary file).
    pub fn from_bytes(bytes: &[u8], options: OpenOptions) -> NetCdfResult<Self> {
        let staged = StagedFile::write(bytes)?;
        Self::open_with(staged.path(), options)
    }

    fn load(file: &netcdf::File, options: OpenOptions) -> NetCdfResult<Self> {
        let dimensions = file
            .dimensions()
            .map(|d| Dimension {
                name: d.name(),
                len: d.len(),
            })
            .collect();

        let attributes = file
            .attributes()
            .filter_map(|attr| {
                let value = attr.value().ok().and_then(convert_attr)?;
                Some((attr.name().to_string(), value))
            })
            .collect();

        let mut coordinates = Vec::new();
        let mut variables = Vec::new();

        for var in file.variables() {
            let name = var.name();
            let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
            let attributes = read_attributes(&var);

            if dims.len() == 1 && dims[0] == name {
                match read_coordinate(&var, options) {
                    Ok(values) => coordinates.push(Coordinate {
                        name,
                        values,
                        attributes,
                    }),
                    Err(e) => debug!(variable = %name, error = %e, "Skipping non-numeric coordinate"),
                }
                continue;
            }

            match read_values(&var, options) {
                Ok(values) => variables.push(Variable {
                    name,
                    shape: var.dimensions().iter().map(|d| d.len()).collect(),
                    dims,
                    values,
                    attributes,
                }),
                Err(e) => debug!(variable = %name, error = %e, "Skipping non-numeric variable"),
            }
        }

        Ok(Self {
            dimensions,
            coordinates,
            variables,
            attributes,
        })
    }

    pub fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dimensions.iter().find(|d| d.name == name).map(|d| d.len)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Variable or a `MissingData` error.
    pub fn require_variable(&self, name: &str) -> NetCdfResult<&Variable> {
        self.variable(name)
            .ok_or_else(|| NetCdfError::MissingData(format!("variable '{}'", name)))
    }

    /// Non-coordinate variables in file order.
    pub fn data_vars(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn data_var_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn coord(&self, name: &str) -> Option<&Coordinate> {
        self.coordinates.iter().find(|c| c.name == name)
    }

    /// First coordinate found among `names`, e.g. `["lon", "longitude", "x"]`.
    pub fn coord_any(&self, names: &[&str]) -> NetCdfResult<&Coordinate> {
        names
            .iter()
            .find_map(|n| self.coord(n))
            .ok_or_else(|| NetCdfError::MissingData(format!("coordinate {}", names.join("/"))))
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attr(name).and_then(AttrValue::as_str)
    }

    /// GOES `time_coverage_start` global attribute.
    pub fn time_coverage_start(&self) -> Option<&str> {
        self.attr_str("time_coverage_start")
    }

    /// Description written as `metadata.json` next to the converted COGs.
    pub fn metadata_json(&self) -> serde_json::Value {
        let dims: BTreeMap<&str, usize> = self
            .dimensions
            .iter()
            .map(|d| (d.name.as_str(), d.len))
            .collect();

        json!({
            "attrs": self.attributes,
            "data_dimensions": dims,
            "data_variables": self.data_var_names(),
        })
    }
}

fn read_attributes(var: &netcdf::Variable) -> Attributes {
    var.attributes()
        .filter_map(|attr| {
            let value = attr.value().ok().and_then(convert_attr)?;
            Some((attr.name().to_string(), value))
        })
        .collect()
}

fn read_values(var: &netcdf::Variable, options: OpenOptions) -> NetCdfResult<Vec<f32>> {
    let mut values: Vec<f32> = var.get_values(..)?;

    let fill = if options.mask_fill_value {
        get_f64_attr(var, "_FillValue").map(|f| f as f32)
    } else {
        None
    };
    let (scale, offset) = if options.apply_scale_offset {
        (
            get_f64_attr(var, "scale_factor").map(|v| v as f32),
            get_f64_attr(var, "add_offset").map(|v| v as f32),
        )
    } else {
        (None, None)
    };

    if fill.is_none() && scale.is_none() && offset.is_none() {
        return Ok(values);
    }

    let scale = scale.unwrap_or(1.0);
    let offset = offset.unwrap_or(0.0);
    for v in values.iter_mut() {
        if fill.is_some_and(|f| *v == f) {
            *v = f32::NAN;
        } else {
            *v = *v * scale + offset;
        }
    }
    Ok(values)
}

fn read_coordinate(var: &netcdf::Variable, options: OpenOptions) -> NetCdfResult<Vec<f64>> {
    let mut values: Vec<f64> = var.get_values(..)?;
    if options.apply_scale_offset {
        let scale = get_f64_attr(var, "scale_factor").unwrap_or(1.0);
        let offset = get_f64_attr(var, "add_offset").unwrap_or(0.0);
        if scale != 1.0 || offset != 0.0 {
            values.iter_mut().for_each(|v| *v = *v * scale + offset);
        }
    }
    Ok(values)
}
