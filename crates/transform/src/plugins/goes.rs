//! GOES-16 ABI full-disk radiance, reprojected to WGS84 and clipped to the
//! Americas.

use chrono::{Duration, NaiveDate};
use cog_common::{day_of_year_to_date, BoundingBox};
use grid_processor::{reproject_geostationary, Raster, Resampling};
use netcdf_parser::goes::scan_axes;
use netcdf_parser::{Dataset, GoesImagerProjection};
use projection::{Geostationary, GeostationaryParams};
use tracing::info;

use crate::error::{Result, TransformError};
use crate::plugin::{TransformOutput, Transformation};
use crate::source::SourceFile;

use super::{harmonize, select, Outputs};

const RADIANCE_VARIABLE: &str = "Rad";

/// Area of interest kept after reprojection.
fn area_of_interest() -> BoundingBox {
    BoundingBox::new(-102.8148701375, 6.1943456775, -13.3448605043, 49.6429910636)
}

/// Reproject `variable` from the fixed grid to a clipped lat/lon raster.
fn to_wgs84(ds: &Dataset, variable: &str, file: &str) -> Result<Raster> {
    let imager = GoesImagerProjection::from_dataset(ds)?;
    let params = GeostationaryParams {
        perspective_point_height: imager.perspective_point_height,
        semi_major_axis: imager.semi_major_axis,
        semi_minor_axis: imager.semi_minor_axis,
        longitude_of_projection_origin: imager.longitude_of_projection_origin,
        sweep_angle_axis: imager.sweep_angle_axis,
    };
    let (x_axis, y_axis) = scan_axes(ds)?;
    let geos = Geostationary::new(&params, x_axis, y_axis)?;

    let var = ds
        .variable(variable)
        .ok_or_else(|| TransformError::missing(file, format!("variable '{}'", variable)))?;
    let scan = select(var, &[], "x", "y")?
        .to_raster("x", "y", x_axis.to_vec(), y_axis.to_vec())?;

    let reprojected = reproject_geostationary(variable, &scan.data, &geos, Resampling::Nearest)?;
    Ok(reprojected.clip_to_bbox(&area_of_interest())?)
}

fn transform_with(
    source: &SourceFile,
    nodata: f32,
    cog_name: impl FnOnce(&Dataset) -> Result<String>,
) -> Result<TransformOutput> {
    let ds = source.open_netcdf()?;
    let key = cog_name(&ds)?;

    let mut raster = to_wgs84(&ds, RADIANCE_VARIABLE, &source.name)?;
    harmonize(&mut raster, nodata);
    raster
        .attributes
        .insert("source".to_string(), source.file_name().to_string());

    info!(
        file = %source.name,
        cog = %key,
        width = raster.width,
        height = raster.height,
        "Reprojected GOES radiance"
    );

    let mut outputs = Outputs::new(source);
    outputs.insert(key, raster)?;
    Ok(outputs.finish())
}

/// Five characters of the ABI mode and channel, e.g. `M6C13`.
fn band(file_name: &str, marker: &str) -> Result<String> {
    let head = file_name
        .split(marker)
        .next()
        .filter(|_| file_name.contains(marker))
        .ok_or_else(|| TransformError::filename(file_name, format!("no '{}' marker", marker)))?;
    let start = head
        .char_indices()
        .rev()
        .nth(4)
        .map(|(i, _)| i)
        .unwrap_or(0);
    Ok(head[start..].to_string())
}

// ============================================================================
// Named from time_coverage_start
// ============================================================================

pub struct GoesRadF;

impl GoesRadF {
    /// `2021-06-29T17:00:21.4Z` -> `2021-06-29T17:00:21`
    fn timestamp(time_coverage_start: &str) -> String {
        let (date, time) = time_coverage_start
            .split_once('T')
            .unwrap_or((time_coverage_start, ""));
        let joined = format!("{}T{}", date, time.replace('.', ""));
        joined.chars().take(19).collect()
    }

    fn cog_name(file_name: &str, ds: &Dataset) -> Result<String> {
        let start = ds
            .time_coverage_start()
            .ok_or_else(|| TransformError::missing(file_name, "attribute time_coverage_start"))?;
        Ok(format!(
            "G16ABI_{}_{}Z.tif",
            band(file_name, "_G16")?,
            Self::timestamp(start)
        ))
    }
}

impl Transformation for GoesRadF {
    fn name(&self) -> &'static str {
        "goes_radf"
    }

    fn description(&self) -> &'static str {
        "GOES-16 ABI L1b full-disk radiance, nearest-neighbour to WGS84, clipped to the Americas"
    }

    fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput> {
        transform_with(source, nodata, |ds| Self::cog_name(source.file_name(), ds))
    }
}

// ============================================================================
// Named from the scan start in the file name
// ============================================================================

pub struct GoesRadFC08;

impl GoesRadFC08 {
    /// `..._G16_s20241810600208_...` -> `2024-06-29T06:00:00Z`
    fn timestamp(file_name: &str) -> Result<String> {
        let bad = |reason: &str| TransformError::filename(file_name, reason.to_string());
        let (_, after) = file_name
            .split_once("_G16_s")
            .ok_or_else(|| bad("no '_G16_s' scan start"))?;
        let stamp = after.get(..11).ok_or_else(|| bad("scan start is too short"))?;

        let field = |range: std::ops::Range<usize>| -> Result<u32> {
            stamp
                .get(range)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| bad("scan start is not numeric"))
        };
        let year = field(0..4)? as i32;
        let doy = field(4..7)?;
        let hour = field(7..9)?;
        let minute = field(9..11)?;

        let date: NaiveDate =
            day_of_year_to_date(year, doy).ok_or_else(|| bad("day of year out of range"))?;
        let when = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| bad("invalid scan start"))?
            + Duration::hours(hour as i64)
            + Duration::minutes(minute as i64);
        Ok(when.format("%Y-%m-%dT%H:%M:00Z").to_string())
    }

    fn cog_name(file_name: &str) -> Result<String> {
        Ok(format!(
            "G16ABI_{}_{}.tif",
            band(file_name, "_G16_s")?,
            Self::timestamp(file_name)?
        ))
    }
}

impl Transformation for GoesRadFC08 {
    fn name(&self) -> &'static str {
        "goes_radf_c08"
    }

    fn description(&self) -> &'static str {
        "GOES-16 ABI L1b full-disk radiance, named from the scan start day-of-year"
    }

    fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput> {
        let key = Self::cog_name(source.file_name())?;
        transform_with(source, nodata, |_| Ok(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "OR_ABI-L1b-RadF-M6C08_G16_s20241810600208_e20241810609516_c20241810609566.nc";

    #[test]
    fn test_band() {
        assert_eq!(band(FILE, "_G16").unwrap(), "M6C08");
        assert_eq!(band(FILE, "_G16_s").unwrap(), "M6C08");
        assert!(band("no_marker.nc", "_G16").is_err());
    }

    #[test]
    fn test_radf_timestamp() {
        assert_eq!(
            GoesRadF::timestamp("2024-06-29T06:00:20.8Z"),
            "2024-06-29T06:00:20"
        );
    }

    #[test]
    fn test_c08_cog_name() {
        assert_eq!(
            GoesRadFC08::cog_name(FILE).unwrap(),
            "G16ABI_M6C08_2024-06-29T06:00:00Z.tif"
        );
        assert!(GoesRadFC08::cog_name("OR_ABI_G16_s2024.nc").is_err());
    }
}
