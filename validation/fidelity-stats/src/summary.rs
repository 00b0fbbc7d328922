//! Per-raster statistics keyed the way the legacy stats files key them.

use std::collections::BTreeMap;

use chrono::Datelike;
use cog_common::month_name;
use grid_processor::Raster;
use netcdf_parser::{Dataset, Variable};
use tracing::debug;

use crate::stats::{RasterStats, StatsAccumulator};

pub type StatsMap = BTreeMap<String, RasterStats>;

const LAT_NAMES: &[&str] = &["lat", "latitude", "y"];
const LON_NAMES: &[&str] = &["lon", "longitude", "x"];

/// Stats per raster plus the accumulated stats over every cell.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub rasters: StatsMap,
    pub overall: StatsAccumulator,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the valid cells of one raster under `key`.
    pub fn add(&mut self, key: impl Into<String>, values: &[f32], nodata: Option<f32>) {
        let key = key.into();
        let mut acc = StatsAccumulator::new();
        acc.push_all(values, nodata);
        self.overall.merge(&acc);
        match acc.finish() {
            Some(stats) => {
                self.rasters.insert(key, stats);
            }
            None => debug!(key = %key, "No valid cells"),
        }
    }

    pub fn add_raster(&mut self, key: impl Into<String>, raster: &Raster) {
        self.add(key, &raster.data, raster.nodata);
    }

    pub fn merge(&mut self, other: Summary) {
        self.overall.merge(&other.overall);
        self.rasters.extend(other.rasters);
    }

    pub fn overall_stats(&self) -> Option<RasterStats> {
        self.overall.finish()
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }
}

/// Final path segment without its extension.
pub fn file_stem(name: &str) -> &str {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    }
}

/// `<var>_<stem tokens after the first>_<month name>`, skipping empty parts.
pub fn netcdf_key(var: &str, file_name: &str, month: Option<u32>) -> String {
    let stem = file_stem(file_name);
    let mut parts: Vec<&str> = vec![var];
    parts.extend(stem.split('_').skip(1).filter(|t| !t.is_empty()));
    if let Some(name) = month.and_then(month_name) {
        parts.push(name);
    }
    parts.join("_")
}

fn is_spatial(var: &Variable) -> bool {
    let n = var.dims.len();
    n >= 2
        && LAT_NAMES.contains(&var.dims[n - 2].as_str())
        && LON_NAMES.contains(&var.dims[n - 1].as_str())
}

/// Month of each step along a variable's leading dimension, from its time
/// coordinate when it decodes, otherwise from the step position.
fn step_months(dataset: &Dataset, var: &Variable) -> Vec<u32> {
    let steps = var.shape.first().copied().unwrap_or(1);
    let decoded = var
        .dims
        .first()
        .and_then(|dim| dataset.coord(dim))
        .and_then(|coord| coord.decode_times().ok())
        .filter(|times| times.len() == steps);

    match decoded {
        Some(times) => times.iter().map(|t| t.month()).collect(),
        None => (0..steps).map(|i| (i % 12) as u32 + 1).collect(),
    }
}

/// Stats of every 2-D slice of every spatial data variable.
///
/// Slices along a leading time dimension get the month of that step in
/// their key; further leading dimensions add the slice index.
pub fn netcdf_summary(dataset: &Dataset, file_name: &str, nodata: Option<f32>) -> Summary {
    let mut summary = Summary::new();

    for var in dataset.data_vars().filter(|v| is_spatial(v)) {
        let n = var.shape.len();
        let plane = var.shape[n - 2] * var.shape[n - 1];
        if plane == 0 {
            continue;
        }

        if n == 2 {
            summary.add(netcdf_key(&var.name, file_name, None), &var.values, nodata);
            continue;
        }

        let months = step_months(dataset, var);
        let inner: usize = var.shape[1..n - 2].iter().product();
        for (i, slice) in var.values.chunks(plane).enumerate() {
            let step = i / inner.max(1);
            let mut key = netcdf_key(&var.name, file_name, months.get(step).copied());
            if inner > 1 {
                key = format!("{}_{}", key, i % inner);
            }
            summary.add(key, slice, nodata);
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use netcdf_parser::Coordinate;

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("a/b/GEOS_OCO2_2015-01-01.nc4"), "GEOS_OCO2_2015-01-01");
        assert_eq!(file_stem("cog.tif"), "cog");
        assert_eq!(file_stem(".hidden"), ".hidden");
    }

    #[test]
    fn test_netcdf_key() {
        assert_eq!(
            netcdf_key("emis_total", "TM5_4DVar_2015.nc", Some(3)),
            "emis_total_4DVar_2015_March"
        );
        assert_eq!(netcdf_key("flux", "single.nc", None), "flux");
    }

    fn variable(name: &str, dims: &[&str], shape: &[usize], values: Vec<f32>) -> Variable {
        Variable {
            name: name.to_string(),
            dims: dims.iter().map(|d| d.to_string()).collect(),
            shape: shape.to_vec(),
            values,
            attributes: Default::default(),
        }
    }

    #[test]
    fn test_netcdf_summary_per_month() {
        let mut time_attrs = netcdf_parser::Attributes::new();
        time_attrs.insert(
            "units".to_string(),
            netcdf_parser::AttrValue::Text("days since 2015-01-01".to_string()),
        );
        let dataset = Dataset {
            coordinates: vec![Coordinate {
                name: "time".to_string(),
                values: vec![0.0, 31.0],
                attributes: time_attrs,
            }],
            variables: vec![
                variable(
                    "emis_total",
                    &["time", "lat", "lon"],
                    &[2, 1, 2],
                    vec![1.0, 3.0, f32::NAN, 10.0],
                ),
                variable("time_bnds", &["time", "nv"], &[2, 2], vec![0.0; 4]),
            ],
            ..Default::default()
        };

        let summary = netcdf_summary(&dataset, "TM5_ch4_2015.nc", None);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary.rasters["emis_total_ch4_2015_January"].mean, 2.0);
        assert_eq!(summary.rasters["emis_total_ch4_2015_February"].max, 10.0);

        let overall = summary.overall_stats().unwrap();
        assert_eq!(overall.count, 3);
        assert_eq!(overall.min, 1.0);
    }

    #[test]
    fn test_netcdf_summary_without_time_coordinate() {
        let dataset = Dataset {
            variables: vec![variable(
                "flux",
                &["month", "latitude", "longitude"],
                &[13, 1, 1],
                (0..13).map(|i| i as f32).collect(),
            )],
            ..Default::default()
        };
        let summary = netcdf_summary(&dataset, "x_2020.nc", Some(0.0));
        // Step 0 is all nodata; step 12 wraps to January.
        assert_eq!(summary.len(), 12);
        assert_eq!(summary.rasters["flux_2020_January"].mean, 12.0);
        assert!(summary.rasters.contains_key("flux_2020_December"));
    }
}
