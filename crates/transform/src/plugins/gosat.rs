//! GOSAT-based CH4 budget (yearly).

use crate::error::{Result, TransformError};
use crate::filename::FilenameTokens;
use crate::plugin::{TransformOutput, Transformation};
use crate::source::SourceFile;

use super::{annotate, harmonize, normalize, select, spatial_raster, spatial_vars, Outputs};

pub struct GosatCh4;

impl GosatCh4 {
    fn cog_name(name: &str, var: &str) -> Result<String> {
        let mut tokens = FilenameTokens::parse(name);
        tokens.pop()?;
        tokens.insert(2, var);
        Ok(tokens.cog_name())
    }
}

impl Transformation for GosatCh4 {
    fn name(&self) -> &'static str {
        "gosat_ch4"
    }

    fn description(&self) -> &'static str {
        "GOSAT-based CH4 budget, one COG per variable"
    }

    fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput> {
        let ds = source.open_netcdf()?;
        let vars = spatial_vars(&ds, "lon", "lat");
        if vars.is_empty() {
            return Err(TransformError::missing(&source.name, "no lat/lon variables"));
        }

        let mut outputs = Outputs::new(source);
        for var in vars {
            let array = select(var, &[], "lon", "lat")?;
            let mut raster = spatial_raster(&ds, &array, "lon", "lat")?;
            normalize(&mut raster);
            harmonize(&mut raster, nodata);
            annotate(&mut raster, source, var);

            let key = Self::cog_name(&source.name, &var.name)?;
            outputs.insert(key, raster.with_name(var.name.clone()))?;
        }
        Ok(outputs.finish())
    }
}
