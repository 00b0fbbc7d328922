//! GeoTIFF sources: gridded population and ODIAC fossil-fuel CO2.

use crate::error::{Result, TransformError};
use crate::filename::FilenameTokens;
use crate::plugin::{TransformOutput, Transformation};
use crate::source::SourceFile;

use super::{harmonize, normalize, Outputs};

fn read(source: &SourceFile, nodata: f32) -> Result<grid_processor::Raster> {
    let mut raster = source.read_geotiff()?;
    normalize(&mut raster);
    harmonize(&mut raster, nodata);
    raster
        .attributes
        .insert("source".to_string(), source.file_name().to_string());
    Ok(raster)
}

// ============================================================================
// Gridded Population of the World
// ============================================================================

pub struct Gpw;

impl Gpw {
    /// The year token is repeated at the end of the name.
    fn cog_name(name: &str) -> Result<String> {
        let mut tokens = FilenameTokens::parse(name);
        tokens.pop()?;
        let year = tokens.get_from_end(3)?.to_string();
        tokens.push(year);
        Ok(tokens.cog_name())
    }
}

impl Transformation for Gpw {
    fn name(&self) -> &'static str {
        "gpw"
    }

    fn description(&self) -> &'static str {
        "SEDAC gridded population density GeoTIFFs"
    }

    fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput> {
        let raster = read(source, nodata)?;
        let mut outputs = Outputs::new(source);
        outputs.insert(Self::cog_name(&source.name)?, raster)?;
        Ok(outputs.finish())
    }
}

// ============================================================================
// ODIAC fossil-fuel CO2
// ============================================================================

/// 2024 release: zero emission cells become nodata, names are kept.
pub struct OdiacFfco2V2024;

impl Transformation for OdiacFfco2V2024 {
    fn name(&self) -> &'static str {
        "odiac_ffco2_v2024"
    }

    fn description(&self) -> &'static str {
        "ODIAC monthly fossil-fuel CO2 (2024 release), zero cells masked"
    }

    fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput> {
        let mut raster = read(source, nodata)?;
        raster.replace_value(0.0, cog_common::NODATA_SENTINEL);

        let mut outputs = Outputs::new(source);
        outputs.insert(source.file_name().to_string(), raster)?;
        Ok(outputs.finish())
    }
}

/// 2022 release: files sit in one folder per year and carry only a
/// `YYMM` token.
pub struct OdiacFfco2V2022;

impl OdiacFfco2V2022 {
    /// `2022/odiac2022_1km_excl_intl_2201.tif` -> `odiac2022_1km_excl_intl_202201.tif`
    fn cog_name(source: &SourceFile) -> Result<String> {
        let folder = source.parent_folder().ok_or_else(|| {
            TransformError::filename(&source.name, "file is not inside a year folder")
        })?;

        let mut tokens = FilenameTokens::parse(&source.name);
        tokens.pop()?;
        let last = tokens.get_from_end(1)?;
        let month = last
            .get(last.len().saturating_sub(2)..)
            .unwrap_or(last)
            .to_string();
        tokens.set_last(format!("{}{}", folder, month))?;
        Ok(tokens.cog_name())
    }
}

impl Transformation for OdiacFfco2V2022 {
    fn name(&self) -> &'static str {
        "odiac_ffco2_v2022"
    }

    fn description(&self) -> &'static str {
        "ODIAC monthly fossil-fuel CO2 (2022 release), year taken from the folder"
    }

    fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput> {
        let raster = read(source, nodata)?;
        let mut outputs = Outputs::new(source);
        outputs.insert(Self::cog_name(source)?, raster)?;
        Ok(outputs.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpw_cog_name() {
        assert_eq!(
            Gpw::cog_name("gpw_v4_population_density_rev11_2020_30_sec.tif").unwrap(),
            "gpw_v4_population_density_rev11_2020_30_sec_2020.tif"
        );
    }

    #[test]
    fn test_odiac_2022_cog_name() {
        let source = SourceFile::new("ODIAC/2022/odiac2022_1km_excl_intl_2201.tif", Vec::new());
        assert_eq!(
            OdiacFfco2V2022::cog_name(&source).unwrap(),
            "odiac2022_1km_excl_intl_202201.tif"
        );

        let loose = SourceFile::new("odiac2022_1km_excl_intl_2201.tif", Vec::new());
        assert!(OdiacFfco2V2022::cog_name(&loose).is_err());
    }
}
