//! Pairing source and COG statistics.

use serde::{Deserialize, Serialize};

use crate::aggregate::FileStatsRecord;
use crate::stats::RasterStats;
use crate::summary::StatsMap;

/// Source and COG stats for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub key: String,
    pub source: Option<RasterStats>,
    pub cog: Option<RasterStats>,
}

/// Relative difference, 0 when both are equal.
pub fn relative_diff(a: f64, b: f64) -> f64 {
    if a == b {
        return 0.0;
    }
    (a - b).abs() / a.abs().max(b.abs())
}

impl Comparison {
    /// Largest relative difference over min, max, mean and std.
    pub fn max_relative_diff(&self) -> Option<f64> {
        let (s, c) = (self.source?, self.cog?);
        Some(
            [
                relative_diff(s.min, c.min),
                relative_diff(s.max, c.max),
                relative_diff(s.mean, c.mean),
                relative_diff(s.std, c.std),
            ]
            .into_iter()
            .fold(0.0, f64::max),
        )
    }

    pub fn status(&self, tolerance: f64) -> MatchStatus {
        match (self.source, self.cog) {
            (None, _) => MatchStatus::MissingSource,
            (_, None) => MatchStatus::MissingCog,
            (Some(s), Some(c)) if s.count != c.count => MatchStatus::Mismatch,
            _ => match self.max_relative_diff() {
                Some(d) if d <= tolerance => MatchStatus::Match,
                _ => MatchStatus::Mismatch,
            },
        }
    }

    /// Row of a per-file stats document, when both sides exist.
    pub fn to_record(&self) -> Option<FileStatsRecord> {
        let (s, c) = (self.source?, self.cog?);
        Some(FileStatsRecord {
            file_name: self.key.clone(),
            mean_value_netcdf: s.mean,
            std_value_netcdf: s.std,
            minimum_value_netcdf: s.min,
            maximum_value_netcdf: s.max,
            mean_value_cog: c.mean,
            std_value_cog: c.std,
            minimum_value_cog: c.min,
            maximum_value_cog: c.max,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Match,
    Mismatch,
    MissingSource,
    MissingCog,
}

/// Pair the two maps by key; keys present on one side only are kept.
pub fn compare(source: &StatsMap, cogs: &StatsMap) -> Vec<Comparison> {
    let mut keys: Vec<&String> = source.keys().chain(cogs.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .map(|key| Comparison {
            key: key.clone(),
            source: source.get(key).copied(),
            cog: cogs.get(key).copied(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(values: &[f32]) -> RasterStats {
        RasterStats::from_values(values, None).unwrap()
    }

    #[test]
    fn test_relative_diff() {
        assert_eq!(relative_diff(0.0, 0.0), 0.0);
        assert_eq!(relative_diff(2.0, 1.0), 0.5);
        assert_eq!(relative_diff(-1.0, 1.0), 2.0);
    }

    #[test]
    fn test_compare_and_status() {
        let source = StatsMap::from([
            ("a".to_string(), stats(&[1.0, 2.0])),
            ("b".to_string(), stats(&[1.0, 2.0])),
            ("only_source".to_string(), stats(&[1.0])),
        ]);
        let cogs = StatsMap::from([
            ("a".to_string(), stats(&[1.0, 2.0])),
            ("b".to_string(), stats(&[1.0, 2.5])),
            ("only_cog".to_string(), stats(&[1.0])),
        ]);

        let result = compare(&source, &cogs);
        let keys: Vec<&str> = result.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "only_cog", "only_source"]);

        assert_eq!(result[0].status(1e-6), MatchStatus::Match);
        assert_eq!(result[1].status(1e-6), MatchStatus::Mismatch);
        assert_eq!(result[1].status(0.5), MatchStatus::Match);
        assert_eq!(result[2].status(1e-6), MatchStatus::MissingSource);
        assert_eq!(result[3].status(1e-6), MatchStatus::MissingCog);

        let record = result[1].to_record().unwrap();
        assert_eq!(record.maximum_value_netcdf, 2.0);
        assert_eq!(record.maximum_value_cog, 2.5);
        assert!(result[2].to_record().is_none());
    }

    #[test]
    fn test_count_difference_is_mismatch() {
        let source = StatsMap::from([("a".to_string(), stats(&[1.0, 1.0]))]);
        let cogs = StatsMap::from([("a".to_string(), stats(&[1.0]))]);
        assert_eq!(compare(&source, &cogs)[0].status(1.0), MatchStatus::Mismatch);
    }
}
