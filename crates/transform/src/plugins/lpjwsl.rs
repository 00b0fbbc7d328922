//! LPJ-wsl wetland CH4 emissions (monthly).

use crate::error::{Result, TransformError};
use crate::filename::FilenameTokens;
use crate::plugin::{TransformOutput, Transformation};
use crate::source::SourceFile;

use super::{
    annotate, find_dim, harmonize, mask_value, normalize, select, spatial_raster, spatial_vars,
    Outputs,
};

/// Raw time values advance by this much per month.
const TIME_UNITS_PER_MONTH: f64 = 732.0;

/// Published layers are scaled by a factor of 1000.
const SCALE: f32 = 1000.0;

pub struct LpjwslWetlandCh4;

impl LpjwslWetlandCh4 {
    /// Two-digit month from an undecoded time value.
    fn month(raw_time: f64) -> String {
        format!("{:02}", (raw_time / TIME_UNITS_PER_MONTH) as i64 + 1)
    }

    fn cog_name(name: &str, var: &str, month: &str) -> Result<String> {
        let mut tokens = FilenameTokens::parse(name);
        tokens.pop()?;
        let last = format!("{}{}", tokens.get_from_end(1)?, month);
        tokens.set_last(last)?;
        tokens.insert(2, var);
        Ok(tokens.cog_name())
    }
}

impl Transformation for LpjwslWetlandCh4 {
    fn name(&self) -> &'static str {
        "lpjwsl_wetlandch4"
    }

    fn description(&self) -> &'static str {
        "LPJ-wsl wetland CH4, one COG per variable and month, scaled x1000"
    }

    fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput> {
        let ds = source.open_netcdf()?;
        let x = find_dim(&ds, &["longitude", "lon"], &source.name)?;
        let y = find_dim(&ds, &["latitude", "lat"], &source.name)?;
        let vars = spatial_vars(&ds, x, y);
        if vars.is_empty() {
            return Err(TransformError::missing(&source.name, "no emission variables"));
        }

        let times = ds.coord_any(&["time"])?.values.clone();

        let mut outputs = Outputs::new(source);
        for (step, &raw) in times.iter().enumerate() {
            let month = Self::month(raw);
            for var in &vars {
                let array = mask_value(select(var, &[("time", step)], x, y)?, nodata)
                    .map(|v| v * SCALE);
                let mut raster = spatial_raster(&ds, &array, x, y)?;
                normalize(&mut raster);
                harmonize(&mut raster, nodata);
                annotate(&mut raster, source, var);

                let key = Self::cog_name(&source.name, &var.name, &month)?;
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
    fn test_month_from_raw_time() {
        assert_eq!(LpjwslWetlandCh4::month(0.0), "01");
        assert_eq!(LpjwslWetlandCh4::month(731.9), "01");
        assert_eq!(LpjwslWetlandCh4::month(8052.0), "12");
    }

    #[test]
    fn test_cog_name() {
        assert_eq!(
            LpjwslWetlandCh4::cog_name("LPJ_wsl_CH4_emissions_2020.nc", "ch4", "07").unwrap(),
            "LPJ_wsl_ch4_CH4_emissions_202007.tif"
        );
    }
}
