//! Summary statistics over raster cells.

use serde::{Deserialize, Serialize};

/// Default `_FillValue` of netCDF float variables, treated as missing even
/// when a file does not declare it.
pub const NETCDF_DEFAULT_FILL: f32 = 9.969_21e36;

/// Statistics of the valid cells of one raster.
///
/// Serialized with the `*_value` keys of the legacy stats files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterStats {
    #[serde(rename = "min_value")]
    pub min: f64,
    #[serde(rename = "max_value")]
    pub max: f64,
    #[serde(rename = "mean_value")]
    pub mean: f64,
    /// Population standard deviation.
    #[serde(rename = "std_value")]
    pub std: f64,
    #[serde(skip)]
    pub count: u64,
}

impl RasterStats {
    /// Stats of `values`, or `None` when every cell is missing.
    pub fn from_values(values: &[f32], nodata: Option<f32>) -> Option<Self> {
        let mut acc = StatsAccumulator::new();
        acc.push_all(values, nodata);
        acc.finish()
    }
}

/// Whether a cell holds an observation.
pub fn is_valid(value: f32, nodata: Option<f32>) -> bool {
    !value.is_nan() && value != NETCDF_DEFAULT_FILL && nodata.map_or(true, |n| value != n)
}

/// Running mean and squared deviations (Welford), mergeable across
/// rasters with Chan's pairwise update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsAccumulator {
    count: u64,
    mean: f64,
    /// Sum of squared deviations from `mean`
    m2: f64,
    min: f64,
    max: f64,
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Add every valid cell of `values`.
    pub fn push_all(&mut self, values: &[f32], nodata: Option<f32>) {
        for &v in values.iter().filter(|&&v| is_valid(v, nodata)) {
            self.push(v as f64);
        }
    }

    pub fn merge(&mut self, other: &StatsAccumulator) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let (n_a, n_b) = (self.count as f64, other.count as f64);
        let n = n_a + n_b;
        let delta = other.mean - self.mean;
        self.mean += delta * n_b / n;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n;
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn finish(&self) -> Option<RasterStats> {
        if self.count == 0 {
            return None;
        }
        let variance = (self.m2 / self.count as f64).max(0.0);
        Some(RasterStats {
            min: self.min,
            max: self.max,
            mean: self.mean,
            std: variance.sqrt(),
            count: self.count,
        })
    }
}
