//! ECCO-Darwin ocean CO2 flux (monthly, 1/4 degree index grid).

use crate::error::{Result, TransformError};
use crate::filename::FilenameTokens;
use crate::plugin::{TransformOutput, Transformation};
use crate::source::SourceFile;

use super::{annotate, harmonize, normalize, select, spatial_raster, Outputs};

/// Columns and rows of the native grid; `x`/`y` hold cell indices.
const GRID_COLUMNS: f64 = 1440.0;
const GRID_ROWS: f64 = 721.0;

/// The first two data variables are grid bookkeeping.
const SKIPPED_VARIABLES: usize = 2;

pub struct EccoDarwin;

impl EccoDarwin {
    /// `CO2_flux_2020_01.nc` -> `CO2_flux_202001.tif`
    fn cog_name(name: &str) -> Result<FilenameTokens> {
        let mut tokens = FilenameTokens::parse(name);
        tokens.pop()?;
        let merged = format!("{}{}", tokens.get_from_end(2)?, tokens.get_from_end(1)?);
        tokens.set_last(merged)?;
        tokens.remove_from_end(2)?;
        Ok(tokens)
    }
}

impl Transformation for EccoDarwin {
    fn name(&self) -> &'static str {
        "ecco_darwin"
    }

    fn description(&self) -> &'static str {
        "ECCO-Darwin air-sea CO2 flux, index grid rescaled to degrees"
    }

    fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput> {
        let ds = source.open_netcdf()?;
        let vars: Vec<_> = ds.data_vars().skip(SKIPPED_VARIABLES).collect();
        if vars.is_empty() {
            return Err(TransformError::missing(&source.name, "no flux variables"));
        }

        let steps = ds.dimension_len("time").unwrap_or(1);
        let dates = if steps > 1 {
            Some(ds.coord_any(&["time"])?.decode_times()?)
        } else {
            None
        };

        let mut outputs = Outputs::new(source);
        for step in 0..steps {
            for var in &vars {
                let array = select(var, &[("time", step)], "x", "y")?;
                let mut raster = spatial_raster(&ds, &array, "x", "y")?;
                raster.rescale_x(360.0 / GRID_COLUMNS, -180.0);
                raster.rescale_y(180.0 / GRID_ROWS, -90.0);
                normalize(&mut raster);
                harmonize(&mut raster, nodata);
                annotate(&mut raster, source, var);

                let tokens = Self::cog_name(&source.name)?;
                // Multi-month files carry the month in the name.
                let key = match &dates {
                    Some(d) => format!("{}_{}.tif", tokens.join(), d[step].format("%Y%m")),
                    None => tokens.cog_name(),
                };
                outputs.insert(key, raster.with_name(var.name.clone()))?;
            }
        }
        Ok(outputs.finish())
    }
}
