//! The transformation plugin contract.

use std::collections::BTreeMap;

use grid_processor::Raster;

use crate::error::Result;
use crate::source::SourceFile;

/// COG filename to the raster written under it.
pub type TransformOutput = BTreeMap<String, Raster>;

/// Per-product conversion of one source file into COG-ready rasters.
///
/// Every returned raster is geographic WGS84 with rows ordered north to
/// south, longitudes in [-180, 180) and the provider's nodata sentinel
/// replaced by [`cog_common::NODATA_SENTINEL`].
pub trait Transformation: Send + Sync {
    /// Registry name, e.g. `geos_oco2`.
    fn name(&self) -> &'static str;

    /// One-line description for `plugins` listings.
    fn description(&self) -> &'static str;

    /// Whether a discovered file should be handed to this plugin.
    fn accepts(&self, _name: &str) -> bool {
        true
    }

    /// Convert `source`, where `nodata` is the provider's sentinel.
    fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Passthrough;

    impl Transformation for Passthrough {
        fn name(&self) -> &'static str {
            "passthrough"
        }

        fn description(&self) -> &'static str {
            "returns nothing"
        }

        fn transform(&self, _source: &SourceFile, _nodata: f32) -> Result<TransformOutput> {
            Ok(TransformOutput::new())
        }
    }

    #[test]
    fn test_default_accepts_every_file() {
        let plugin = Passthrough;
        assert!(plugin.accepts("GOSAT_CH4_2019_flux.nc"));
        assert!(plugin.accepts("README.txt"));
        let file = SourceFile::new("a.nc", Vec::new());
        assert!(plugin.transform(&file, -9999.0).unwrap().is_empty());
    }
}
