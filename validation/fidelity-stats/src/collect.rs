//! Build summaries from source files and converted COGs.

use std::path::{Path, PathBuf};

use storage::ObjectStorage;
use tracing::{debug, info, instrument};
use transform::{SourceFetcher, SourceFilter, Transformation};
use walkdir::WalkDir;

use crate::error::Result;
use crate::summary::{file_stem, netcdf_summary, Summary};

/// Statistics of a dataset's source files.
#[derive(Debug, Clone, Default)]
pub struct SourceSummaries {
    /// Source data as read, keyed `<var>_<date tokens>_<month>` for
    /// netCDF and by file stem for GeoTIFF.
    pub raw: Summary,
    /// Plugin output before encoding, keyed by COG stem.
    pub expected: Summary,
}

/// Read every selected source, summarize it and run the plugin over it.
#[instrument(skip_all, fields(plugin = plugin.name(), source = %fetcher.location()))]
pub async fn summarize_sources(
    plugin: &dyn Transformation,
    fetcher: &dyn SourceFetcher,
    filter: &SourceFilter,
    nodata: f32,
) -> Result<SourceSummaries> {
    let mut summaries = SourceSummaries::default();

    let sources: Vec<_> = fetcher
        .list_sources()
        .await?
        .into_iter()
        .filter(|s| filter.matches(s) && plugin.accepts(&s.name))
        .collect();

    for source in &sources {
        let file = fetcher.fetch(source).await?;

        if file.is_netcdf() {
            let dataset = file.open_netcdf()?;
            summaries
                .raw
                .merge(netcdf_summary(&dataset, file.file_name(), Some(nodata)));
        } else {
            let raster = file.read_geotiff()?;
            let provider = raster.nodata.unwrap_or(nodata);
            summaries
                .raw
                .add(file_stem(&file.name), &raster.data, Some(provider));
        }

        let outputs = plugin.transform(&file, nodata)?;
        debug!(file = %file.name, outputs = outputs.len(), "Summarized source");
        for (cog_name, raster) in &outputs {
            summaries.expected.add_raster(file_stem(cog_name), raster);
        }
    }

    info!(
        files = sources.len(),
        raw = summaries.raw.len(),
        expected = summaries.expected.len(),
        "Summarized sources"
    );
    Ok(summaries)
}

fn is_tiff(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".tif") || lower.ends_with(".tiff")
}

/// Every GeoTIFF under `dir`, keyed by file stem.
pub fn summarize_cog_dir(dir: &Path) -> Result<Summary> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_tiff(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path())
        .collect();
    paths.sort();

    let mut summary = Summary::new();
    for path in &paths {
        let raster = cog::read_geotiff_file(path)?;
        summary.add_raster(file_stem(&path.to_string_lossy()), &raster);
    }
    debug!(dir = %dir.display(), cogs = paths.len(), "Summarized COGs");
    Ok(summary)
}

/// Every GeoTIFF object under `prefix`, keyed by file stem.
pub async fn summarize_cog_prefix(storage: &ObjectStorage, prefix: &str) -> Result<Summary> {
    let mut summary = Summary::new();
    for object in storage.list(prefix).await? {
        if !is_tiff(&object.key) {
            continue;
        }
        let bytes = storage.get(&object.key).await?;
        let raster = cog::read_geotiff(&object.key, &bytes)?;
        summary.add_raster(file_stem(&object.key), &raster);
    }
    Ok(summary)
}
