//! CEOS CH4 inverse-flux budget (yearly, index latitude grid).

use crate::error::{Result, TransformError};
use crate::filename::FilenameTokens;
use crate::plugin::{TransformOutput, Transformation};
use crate::source::SourceFile;

use super::{annotate, find_dim, harmonize, normalize, select, spatial_raster, Outputs};

/// The first two data variables are grid bookkeeping.
const SKIPPED_VARIABLES: usize = 2;

pub struct CeosCh4Budget;

impl CeosCh4Budget {
    fn cog_name(name: &str, var: &str) -> Result<String> {
        let mut tokens = FilenameTokens::parse(name);
        tokens.pop()?;
        tokens.insert(2, var);
        Ok(tokens.cog_name())
    }
}

impl Transformation for CeosCh4Budget {
    fn name(&self) -> &'static str {
        "ceos_ch4budget"
    }

    fn description(&self) -> &'static str {
        "CEOS CH4 inverse-flux budget, latitude shifted from 0..180 to -90..90"
    }

    fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput> {
        let ds = source.open_netcdf()?;
        let x = find_dim(&ds, &["dimx", "lon"], &source.name)?;
        let y = find_dim(&ds, &["dimy", "lat"], &source.name)?;

        let vars: Vec<_> = ds.data_vars().skip(SKIPPED_VARIABLES).collect();
        if vars.is_empty() {
            return Err(TransformError::missing(&source.name, "no flux variables"));
        }

        let mut outputs = Outputs::new(source);
        for var in vars {
            let array = select(var, &[], x, y)?;
            let mut raster = spatial_raster(&ds, &array, x, y)?;
            raster.rescale_y(1.0, -90.0);
            normalize(&mut raster);
            harmonize(&mut raster, nodata);
            annotate(&mut raster, source, var);

            let key = Self::cog_name(&source.name, &var.name)?;
            outputs.insert(key, raster.with_name(var.name.clone()))?;
        }
        Ok(outputs.finish())
    }
}
