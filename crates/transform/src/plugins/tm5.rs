//! TM5-4DVar CH4 flux, one file per year with a `months` dimension.

use crate::error::{Result, TransformError};
use crate::filename::FilenameTokens;
use crate::plugin::{TransformOutput, Transformation};
use crate::source::SourceFile;

use super::{
    annotate, find_dim, harmonize, normalize, select, spatial_raster, spatial_vars, Outputs,
};

pub struct Tm54dvarCh4Flux;

impl Tm54dvarCh4Flux {
    /// Year token just before the extension.
    fn year(name: &str) -> Result<i32> {
        let tokens = FilenameTokens::parse(name);
        let token = tokens.get_from_end(2)?;
        token
            .parse()
            .map_err(|_| TransformError::filename(name, format!("'{}' is not a year", token)))
    }

    fn cog_name(name: &str, var: &str, date: &str) -> Result<String> {
        let mut tokens = FilenameTokens::parse(name);
        tokens.pop()?;
        tokens.set_last(date)?;
        tokens.insert(2, var);
        Ok(tokens.cog_name())
    }
}

impl Transformation for Tm54dvarCh4Flux {
    fn name(&self) -> &'static str {
        "tm54dvar_ch4flux"
    }

    fn description(&self) -> &'static str {
        "TM5-4DVar CH4 flux, one COG per variable and month (global totals skipped)"
    }

    fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput> {
        let year = Self::year(&source.name)?;
        let ds = source.open_netcdf()?;
        let x = find_dim(&ds, &["longitude", "lon"], &source.name)?;
        let y = find_dim(&ds, &["latitude", "lat"], &source.name)?;
        let months = ds
            .dimension_len("months")
            .ok_or_else(|| TransformError::missing(&source.name, "dimension months"))?;

        let vars: Vec<_> = spatial_vars(&ds, x, y)
            .into_iter()
            .filter(|v| !v.name.contains("global"))
            .collect();

        let mut outputs = Outputs::new(source);
        for month in 0..months {
            let date = format!("{:04}{:02}", year, month + 1);
            for var in &vars {
                let array = select(var, &[("months", month)], x, y)?;
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
