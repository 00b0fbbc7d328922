//! CMIP6 climate extreme indices (yearly).

use crate::error::{Result, TransformError};
use crate::filename::FilenameTokens;
use crate::plugin::{TransformOutput, Transformation};
use crate::source::SourceFile;

use super::{annotate, harmonize, normalize, select, spatial_raster, spatial_vars, Outputs};

pub struct Cmip6Climdex;

impl Cmip6Climdex {
    /// Tokens split on `_` only, so the extension stays on the last token
    /// and is replaced by the year.
    fn cog_name(name: &str, var: &str, year: &str) -> Result<String> {
        let mut tokens = FilenameTokens::parse_with(name, &['_']);
        tokens.set_last(year)?;
        tokens.push(var);
        Ok(tokens.cog_name())
    }
}

impl Transformation for Cmip6Climdex {
    fn name(&self) -> &'static str {
        "cmip6_climdex"
    }

    fn description(&self) -> &'static str {
        "CMIP6 climdex indices, one COG per variable and year (historical runs skipped)"
    }

    fn accepts(&self, name: &str) -> bool {
        name.ends_with(".nc") && !name.contains("historical")
    }

    fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput> {
        let ds = source.open_netcdf()?;
        let vars = spatial_vars(&ds, "lon", "lat");
        if vars.is_empty() {
            return Err(TransformError::missing(&source.name, "no lat/lon variables"));
        }
        let times = ds.coord_any(&["time"])?.decode_times()?;

        let mut outputs = Outputs::new(source);
        for (step, time) in times.iter().enumerate() {
            let year = time.format("%Y").to_string();
            for var in &vars {
                let array = select(var, &[("time", step)], "lon", "lat")?;
                let mut raster = spatial_raster(&ds, &array, "lon", "lat")?;
                normalize(&mut raster);
                harmonize(&mut raster, nodata);
                annotate(&mut raster, source, var);

                let key = Self::cog_name(&source.name, &var.name, &year)?;
                outputs.insert(key, raster.with_name(var.name.clone()))?;
            }
        }
        Ok(outputs.finish())
    }
}
