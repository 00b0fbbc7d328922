//! GOES-R ABI helpers.
//!
//! ABI L1b radiance files carry a scalar `goes_imager_projection` variable
//! whose attributes describe the fixed grid, plus `x`/`y` scan-angle
//! coordinates in radians.

use chrono::{NaiveDateTime, ParseError};

use crate::dataset::Dataset;
use crate::error::{NetCdfError, NetCdfResult};

pub const PROJECTION_VARIABLE: &str = "goes_imager_projection";

/// Fixed-grid projection parameters as stored in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct GoesImagerProjection {
    /// Satellite height above the ellipsoid (metres)
    pub perspective_point_height: f64,
    pub semi_major_axis: f64,
    pub semi_minor_axis: f64,
    /// Sub-satellite longitude (degrees)
    pub longitude_of_projection_origin: f64,
    pub sweep_angle_axis: String,
}

impl GoesImagerProjection {
    pub fn from_dataset(ds: &Dataset) -> NetCdfResult<Self> {
        let var = ds.require_variable(PROJECTION_VARIABLE)?;
        let required = |name: &str| {
            var.attr_f64(name).ok_or_else(|| {
                NetCdfError::MissingData(format!("{}:{}", PROJECTION_VARIABLE, name))
            })
        };

        Ok(Self {
            perspective_point_height: required("perspective_point_height")?,
            semi_major_axis: required("semi_major_axis")?,
            semi_minor_axis: required("semi_minor_axis")?,
            longitude_of_projection_origin: required("longitude_of_projection_origin")?,
            sweep_angle_axis: var
                .attr("sweep_angle_axis")
                .and_then(|v| v.as_str())
                .unwrap_or("x")
                .to_string(),
        })
    }
}

/// Scan-angle axes (radians) of an ABI fixed grid.
pub fn scan_axes(ds: &Dataset) -> NetCdfResult<(&[f64], &[f64])> {
    let x = ds
        .coord("x")
        .ok_or_else(|| NetCdfError::MissingData("x scan-angle coordinate".to_string()))?;
    let y = ds
        .coord("y")
        .ok_or_else(|| NetCdfError::MissingData("y scan-angle coordinate".to_string()))?;
    Ok((&x.values, &y.values))
}

/// Parse the `time_coverage_start` attribute, e.g. `2021-06-29T17:00:21.4Z`.
pub fn parse_time_coverage(value: &str) -> Result<NaiveDateTime, ParseError> {
    NaiveDateTime::parse_from_str(value.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{AttrValue, Attributes, Variable};
    use chrono::{Datelike, Timelike};

    fn projection_var(attrs: &[(&str, f64)]) -> Variable {
        let mut attributes = Attributes::new();
        for (k, v) in attrs {
            attributes.insert(k.to_string(), AttrValue::Number(*v));
        }
        attributes.insert("sweep_angle_axis".into(), AttrValue::Text("x".into()));
        Variable {
            name: PROJECTION_VARIABLE.into(),
            dims: vec![],
            shape: vec![],
            values: vec![-2147483647.0],
            attributes,
        }
    }

    #[test]
    fn test_projection_from_dataset() {
        let mut ds = Dataset::default();
        ds.variables.push(projection_var(&[
            ("perspective_point_height", 35786023.0),
            ("semi_major_axis", 6378137.0),
            ("semi_minor_axis", 6356752.31414),
            ("longitude_of_projection_origin", -75.0),
        ]));

        let proj = GoesImagerProjection::from_dataset(&ds).unwrap();
        assert_eq!(proj.longitude_of_projection_origin, -75.0);
        assert_eq!(proj.sweep_angle_axis, "x");
    }

    #[test]
    fn test_projection_missing_attribute() {
        let mut ds = Dataset::default();
        ds.variables
            .push(projection_var(&[("perspective_point_height", 35786023.0)]));
        assert!(GoesImagerProjection::from_dataset(&ds).is_err());
    }

    #[test]
    fn test_parse_time_coverage() {
        let t = parse_time_coverage("2021-06-29T17:00:21.4Z").unwrap();
        assert_eq!(t.year(), 2021);
        assert_eq!(t.ordinal(), 180);
        assert_eq!(t.second(), 21);
    }
}
