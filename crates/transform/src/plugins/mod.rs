//! Dataset-specific transformation plugins and the registry that names them.

mod casagfed;
mod ceos;
mod cmip6;
mod ecco_darwin;
mod epa;
mod geos_oco2;
mod geotiff;
mod goes;
mod gosat;
mod lpjwsl;
mod tm5;

pub use casagfed::CasaGfedCarbonFlux;
pub use ceos::CeosCh4Budget;
pub use cmip6::Cmip6Climdex;
pub use ecco_darwin::EccoDarwin;
pub use epa::EpaCh4Emission;
pub use geos_oco2::GeosOco2;
pub use geotiff::{Gpw, OdiacFfco2V2022, OdiacFfco2V2024};
pub use goes::{GoesRadF, GoesRadFC08};
pub use gosat::GosatCh4;
pub use lpjwsl::LpjwslWetlandCh4;
pub use tm5::Tm54dvarCh4Flux;

use cog_common::{Crs, NODATA_SENTINEL};
use grid_processor::{GridArray, Raster};
use netcdf_parser::{Dataset, Variable};
use tracing::debug;

use crate::error::{Result, TransformError};
use crate::plugin::{TransformOutput, Transformation};
use crate::source::SourceFile;

/// Every registered plugin, in listing order.
pub fn available_plugins() -> Vec<Box<dyn Transformation>> {
    vec![
        Box::new(EccoDarwin),
        Box::new(GeosOco2),
        Box::new(GosatCh4),
        Box::new(Gpw),
        Box::new(OdiacFfco2V2024),
        Box::new(Tm54dvarCh4Flux),
        Box::new(GoesRadF),
        Box::new(GoesRadFC08),
        Box::new(CasaGfedCarbonFlux),
        Box::new(EpaCh4Emission),
        Box::new(LpjwslWetlandCh4),
        Box::new(Cmip6Climdex),
        Box::new(CeosCh4Budget),
        Box::new(OdiacFfco2V2022),
    ]
}

/// Look up a plugin by name. A trailing `_transformation` is ignored so
/// job files may use either form.
pub fn plugin_by_name(name: &str) -> Result<Box<dyn Transformation>> {
    let wanted = name.trim().trim_end_matches("_transformation");
    available_plugins()
        .into_iter()
        .find(|p| p.name().eq_ignore_ascii_case(wanted))
        .ok_or_else(|| TransformError::UnknownPlugin(name.to_string()))
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Output map that refuses to overwrite an earlier entry.
pub(crate) struct Outputs {
    file: String,
    map: TransformOutput,
}

impl Outputs {
    pub(crate) fn new(source: &SourceFile) -> Self {
        Self {
            file: source.name.clone(),
            map: TransformOutput::new(),
        }
    }

    pub(crate) fn insert(&mut self, key: String, raster: Raster) -> Result<()> {
        if self.map.contains_key(&key) {
            return Err(TransformError::DuplicateOutput {
                file: self.file.clone(),
                key,
            });
        }
        debug!(file = %self.file, cog = %key, width = raster.width, height = raster.height, "Derived COG");
        self.map.insert(key, raster);
        Ok(())
    }

    pub(crate) fn finish(self) -> TransformOutput {
        self.map
    }
}

/// First of `candidates` that is a dimension of `ds`.
pub(crate) fn find_dim<'a>(ds: &Dataset, candidates: &[&'a str], file: &str) -> Result<&'a str> {
    candidates
        .iter()
        .copied()
        .find(|d| ds.dimension_len(d).is_some())
        .ok_or_else(|| TransformError::missing(file, format!("dimension {}", candidates.join("/"))))
}

/// Variables that span both spatial dimensions, in file order.
pub(crate) fn spatial_vars<'a>(ds: &'a Dataset, x_dim: &str, y_dim: &str) -> Vec<&'a Variable> {
    ds.data_vars()
        .filter(|v| {
            let spatial = v.dim_index(x_dim).is_some() && v.dim_index(y_dim).is_some();
            if !spatial {
                debug!(variable = %v.name, "Skipping non-spatial variable");
            }
            spatial
        })
        .collect()
}

/// Slice a variable down to its two spatial dimensions.
///
/// Each `(dim, index)` selection is applied when the variable has that
/// dimension; remaining length-1 dimensions are dropped.
pub(crate) fn select(
    var: &Variable,
    selections: &[(&str, usize)],
    x_dim: &str,
    y_dim: &str,
) -> Result<GridArray> {
    let mut array = GridArray::new(
        var.name.clone(),
        var.dims.clone(),
        var.shape.clone(),
        var.values.clone(),
    )?;
    for &(dim, index) in selections {
        if array.has_dim(dim) {
            array = array.isel(dim, index)?;
        }
    }
    Ok(array.squeeze_except(&[x_dim, y_dim])?)
}

/// Coordinate values along `dim`, or indices when the file has no
/// coordinate variable for it.
pub(crate) fn axis_values(ds: &Dataset, dim: &str, len: usize) -> Vec<f64> {
    match ds.coord(dim) {
        Some(c) if c.values.len() == len => c.values.clone(),
        _ => (0..len).map(|i| i as f64).collect(),
    }
}

/// Attach coordinates to a 2-D array.
pub(crate) fn spatial_raster(
    ds: &Dataset,
    array: &GridArray,
    x_dim: &str,
    y_dim: &str,
) -> Result<Raster> {
    let x = axis_values(ds, x_dim, array.len_of(x_dim)?);
    let y = axis_values(ds, y_dim, array.len_of(y_dim)?);
    Ok(array.to_raster(x_dim, y_dim, x, y)?)
}

/// Longitudes onto [-180, 180) sorted west to east, rows north to south.
pub(crate) fn normalize(raster: &mut Raster) {
    raster.wrap_longitude();
    raster.orient_north_up();
}

/// Replace the provider sentinel and NaN with the harmonized sentinel and
/// stamp WGS84.
pub(crate) fn harmonize(raster: &mut Raster, provider_nodata: f32) {
    raster.replace_nan(NODATA_SENTINEL);
    raster.harmonize_nodata(provider_nodata, NODATA_SENTINEL);
    raster.crs = Crs::wgs84();
}

/// Copy `units`/`long_name` and note the source variable.
pub(crate) fn annotate(raster: &mut Raster, source: &SourceFile, var: &Variable) {
    raster
        .attributes
        .insert("source".to_string(), source.file_name().to_string());
    raster
        .attributes
        .insert("variable".to_string(), var.name.clone());
    for key in ["units", "long_name"] {
        if let Some(value) = var.attr(key).and_then(|v| v.as_str()) {
            raster.attributes.insert(key.to_string(), value.to_string());
        }
    }
}

/// Mask the provider sentinel to NaN before arithmetic on the values.
pub(crate) fn mask_value(array: GridArray, nodata: f32) -> GridArray {
    array.map(|v| if v == nodata { f32::NAN } else { v })
}
