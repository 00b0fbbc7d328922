//! CASA-GFED3 monthly carbon flux.

use crate::error::{Result, TransformError};
use crate::filename::FilenameTokens;
use crate::plugin::{TransformOutput, Transformation};
use crate::source::SourceFile;

use super::{annotate, find_dim, harmonize, normalize, select, spatial_raster, Outputs};

pub struct CasaGfedCarbonFlux;

impl CasaGfedCarbonFlux {
    fn cog_name(name: &str, var: &str, date: &str) -> Result<String> {
        let mut tokens = FilenameTokens::parse(name);
        tokens.pop()?;
        tokens.set_last(date)?;
        tokens.insert(2, var);
        Ok(tokens.cog_name())
    }
}

impl Transformation for CasaGfedCarbonFlux {
    fn name(&self) -> &'static str {
        "casagfed_carbonflux"
    }

    fn description(&self) -> &'static str {
        "CASA-GFED3 carbon flux, one COG per variable and month (last variable skipped)"
    }

    fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput> {
        let ds = source.open_netcdf()?;
        let x = find_dim(&ds, &["longitude", "lon"], &source.name)?;
        let y = find_dim(&ds, &["latitude", "lat"], &source.name)?;

        // The trailing variable holds time bounds.
        let all: Vec<_> = ds.data_vars().collect();
        let vars = &all[..all.len().saturating_sub(1)];
        if vars.is_empty() {
            return Err(TransformError::missing(&source.name, "no flux variables"));
        }

        let times = ds.coord_any(&["time"])?.decode_times()?;

        let mut outputs = Outputs::new(source);
        for (step, time) in times.iter().enumerate() {
            let date = time.format("%Y%m").to_string();
            for var in vars {
                let array = select(var, &[("time", step)], x, y)?;
                let mut raster = spatial_raster(&ds, &array, x, y)?;
                normalize(&mut raster);
                harmonize(&mut raster, nodata);
                annotate(&mut raster, source, var);

                let key = Self::cog_name(&source.name, &var.name, &date)?;
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
            CasaGfedCarbonFlux::cog_name("GEOSCarb_CASAGFED3v3_Flux.Monthly.x720_y360.2003.nc", "NPP", "200301")
                .unwrap(),
            "GEOSCarb_CASAGFED3v3_NPP_Flux_Monthly_x720_y360_200301.tif"
        );
    }
}
