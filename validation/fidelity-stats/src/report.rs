//! Console tables.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

use crate::aggregate::{Aggregate, AggregateStats};
use crate::compare::{Comparison, MatchStatus};
use crate::stats::RasterStats;

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    table
}

fn fmt_stats(stats: Option<RasterStats>) -> String {
    match stats {
        Some(s) => format!("{:.6e} / {:.6e} / {:.6e} / {:.6e}", s.min, s.max, s.mean, s.std),
        None => "-".to_string(),
    }
}

fn status_label(status: MatchStatus) -> &'static str {
    match status {
        MatchStatus::Match => "ok",
        MatchStatus::Mismatch => "MISMATCH",
        MatchStatus::MissingSource => "no source",
        MatchStatus::MissingCog => "no COG",
    }
}

/// One row per compared raster.
pub fn comparison_table(comparisons: &[Comparison], tolerance: f64) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Raster",
        "Source min / max / mean / std",
        "COG min / max / mean / std",
        "Max rel. diff",
        "Status",
    ]);
    for c in comparisons {
        table.add_row(vec![
            c.key.clone(),
            fmt_stats(c.source),
            fmt_stats(c.cog),
            c.max_relative_diff()
                .map(|d| format!("{:.3e}", d))
                .unwrap_or_else(|| "-".to_string()),
            status_label(c.status(tolerance)).to_string(),
        ]);
    }
    table
}

fn aggregate_row(label: &str, a: &Aggregate) -> Vec<String> {
    vec![
        label.to_string(),
        format!("{:.6e}", a.mean),
        a.std.map(|s| format!("{:.6e}", s)).unwrap_or_else(|| "-".to_string()),
        format!("{:.6e}", a.min),
        format!("{:.6e}", a.max),
    ]
}

pub fn aggregate_table(stats: &AggregateStats, files: usize) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        format!("{} files", files),
        "mean".to_string(),
        "std".to_string(),
        "min".to_string(),
        "max".to_string(),
    ]);
    table.add_row(aggregate_row("netCDF", &stats.netcdf));
    table.add_row(aggregate_row("COG", &stats.cog));
    table
}
