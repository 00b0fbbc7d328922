//! OCO-2 GEOS Level 3 daily XCO2.

use crate::error::{Result, TransformError};
use crate::filename::FilenameTokens;
use crate::plugin::{TransformOutput, Transformation};
use crate::source::SourceFile;

use super::{annotate, harmonize, normalize, select, spatial_raster, spatial_vars, Outputs};

pub struct GeosOco2;

impl GeosOco2 {
    /// `oco2_GEOS_L3CO2_day_20150101_B10206Ar.nc4` with `XCO2` ->
    /// `oco2_GEOS_XCO2_L3CO2_day_B10206Ar_20150101.tif`
    fn cog_name(name: &str, var: &str) -> Result<String> {
        let mut tokens = FilenameTokens::parse(name);
        let date = tokens.get_from_end(3)?.to_string();
        tokens.set_last(date)?;
        tokens.insert(2, var);
        tokens.remove_from_end(3)?;
        Ok(tokens.cog_name())
    }
}

impl Transformation for GeosOco2 {
    fn name(&self) -> &'static str {
        "geos_oco2"
    }

    fn description(&self) -> &'static str {
        "OCO-2 GEOS L3 daily column CO2, one COG per variable and day"
    }

    fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput> {
        let ds = source.open_netcdf()?;
        let vars = spatial_vars(&ds, "lon", "lat");
        if vars.is_empty() {
            return Err(TransformError::missing(&source.name, "no lat/lon variables"));
        }

        let mut outputs = Outputs::new(source);
        for step in 0..ds.dimension_len("time").unwrap_or(1) {
            for var in &vars {
                let array = select(var, &[("time", step)], "lon", "lat")?;
                let mut raster = spatial_raster(&ds, &array, "lon", "lat")?;
                normalize(&mut raster);
                harmonize(&mut raster, nodata);
                annotate(&mut raster, source, var);

                let key = Self::cog_name(&source.name, &var.name)?;
                outputs.insert(key, raster.with_name(var.name.clone()))?;
            }
        }
        Ok(outputs.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cog_name() {
        assert_eq!(
            GeosOco2::cog_name("oco2_GEOS_L3CO2_day_20150101_B10206Ar.nc4", "XCO2").unwrap(),
            "oco2_GEOS_XCO2_L3CO2_day_B10206Ar_20150101.tif"
        );
    }
}
