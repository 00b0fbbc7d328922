//! Batch conversion: discover, transform, encode, upload.

use bytes::Bytes;
use cog::{CogEncoder, CogOptions};
use serde::{Deserialize, Serialize};
use storage::{ObjectStorage, StoragePath};
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, TransformError};
use crate::plugin::Transformation;
use crate::report::{files_converted_csv, ConversionRecord, ConversionReport, FileFailure};
use crate::source::SourceFile;
use crate::sources::{SourceFetcher, SourceFilter, SourceRef};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Sentinel the data provider uses for missing cells.
    pub provider_nodata: f32,
    /// Key prefix the COGs and reports are written under.
    pub output_prefix: String,
    pub cog: CogOptions,
    /// Log failed files and move on instead of aborting.
    pub continue_on_error: bool,
    /// Leave COGs that already exist untouched.
    pub skip_existing: bool,
    /// Write `files_converted.csv` and `metadata.json`.
    pub write_reports: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            provider_nodata: cog_common::NODATA_SENTINEL,
            output_prefix: String::new(),
            cog: CogOptions::default(),
            continue_on_error: false,
            skip_existing: false,
            write_reports: true,
        }
    }
}

pub struct ConversionPipeline {
    plugin: Box<dyn Transformation>,
    source: Box<dyn SourceFetcher>,
    output: ObjectStorage,
    filter: SourceFilter,
    encoder: CogEncoder,
    options: PipelineOptions,
}

impl ConversionPipeline {
    pub fn new(
        plugin: Box<dyn Transformation>,
        source: Box<dyn SourceFetcher>,
        output: ObjectStorage,
        options: PipelineOptions,
    ) -> Self {
        Self {
            plugin,
            source,
            output,
            filter: SourceFilter::default(),
            encoder: CogEncoder::new(options.cog.clone()),
            options,
        }
    }

    pub fn with_filter(mut self, filter: SourceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Files the run would convert, in processing order.
    pub async fn discover(&self) -> Result<(usize, Vec<SourceRef>)> {
        let listed = self.source.list_sources().await?;
        let found = listed.len();
        let selected = listed
            .into_iter()
            .filter(|s| self.filter.matches(s) && self.plugin.accepts(&s.name))
            .collect();
        Ok((found, selected))
    }

    #[instrument(skip(self), fields(plugin = self.plugin.name(), source = %self.source.location()))]
    pub async fn run(&self) -> Result<ConversionReport> {
        let (found, selected) = self.discover().await?;
        info!(found, selected = selected.len(), "Discovered source files");

        let mut report = ConversionReport {
            files_found: found,
            files_selected: selected.len(),
            ..Default::default()
        };
        let mut last_netcdf: Option<SourceFile> = None;

        for source in &selected {
            match self.convert_file(source, &mut report).await {
                Ok(file) => {
                    report.files_converted += 1;
                    if file.is_netcdf() {
                        last_netcdf = Some(file);
                    }
                }
                Err(e) if self.options.continue_on_error => {
                    warn!(file = %source.name, error = %e, "Conversion failed, continuing");
                    report.failures.push(FileFailure {
                        file_name: source.name.clone(),
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        if self.options.write_reports {
            self.write_reports(&report, last_netcdf.as_ref()).await?;
        }

        info!(
            converted = report.files_converted,
            cogs = report.cogs_written(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            bytes = report.bytes_written,
            "Conversion finished"
        );
        Ok(report)
    }

    /// Convert one file, returning it so the caller can describe it later.
    async fn convert_file(
        &self,
        source: &SourceRef,
        report: &mut ConversionReport,
    ) -> Result<SourceFile> {
        let file = self.source.fetch(source).await?;
        let outputs = self
            .plugin
            .transform(&file, self.options.provider_nodata)?;
        if outputs.is_empty() {
            warn!(file = %file.name, "Plugin produced no COGs");
        }

        for (cog_name, raster) in outputs {
            let key = StoragePath::cog(&self.options.output_prefix, &cog_name);
            if self.options.skip_existing && self.output.exists(&key).await? {
                debug!(key = %key, "COG exists, skipping");
                report.skipped.push(cog_name);
                continue;
            }

            let encoder = self.encoder.clone();
            let encoded = tokio::task::spawn_blocking(move || encoder.encode(&raster))
                .await
                .map_err(|e| TransformError::EncodeTask(e.to_string()))??;
            let size = encoded.len() as u64;
            self.output.put(&key, Bytes::from(encoded)).await?;

            info!(file = %file.name, cog = %cog_name, bytes = size, "Wrote COG");
            report.bytes_written += size;
            report.records.push(ConversionRecord {
                file_name: source.name.clone(),
                cogs_created: cog_name,
            });
        }
        Ok(file)
    }

    async fn write_reports(
        &self,
        report: &ConversionReport,
        last_netcdf: Option<&SourceFile>,
    ) -> Result<()> {
        let prefix = &self.options.output_prefix;

        let csv = files_converted_csv(&report.records)?;
        self.output
            .put(&StoragePath::files_converted(prefix), Bytes::from(csv))
            .await?;

        if let Some(file) = last_netcdf {
            let metadata = file.open_netcdf()?.metadata_json();
            let body = serde_json::to_vec_pretty(&metadata)
                .map_err(|e| TransformError::Report(e.to_string()))?;
            self.output
                .put(&StoragePath::metadata_json(prefix), Bytes::from(body))
                .await?;
            debug!(file = %file.name, "Wrote dataset metadata");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::TransformOutput;
    use crate::sources::StorageSource;
    use grid_processor::Raster;

    /// Writes one small raster per file, failing on names containing `bad`.
    struct Constant;

    impl Transformation for Constant {
        fn name(&self) -> &'static str {
            "constant"
        }

        fn description(&self) -> &'static str {
            "test plugin"
        }

        fn accepts(&self, name: &str) -> bool {
            !name.ends_with(".txt")
        }

        fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput> {
            if source.name.contains("bad") {
                return Err(TransformError::missing(&source.name, "broken on purpose"));
            }
            let raster = Raster::new(
                "v",
                2,
                2,
                vec![1.0, nodata, 3.0, 4.0],
                vec![-0.5, 0.5],
                vec![0.5, -0.5],
            )
            .unwrap();
            let stem = source.file_name().split('.').next().unwrap_or_default();
            let mut out = TransformOutput::new();
            out.insert(format!("{}_v.tif", stem), raster);
            Ok(out)
        }
    }

    async fn seeded(names: &[&str]) -> ObjectStorage {
        let storage = ObjectStorage::in_memory("bucket");
        for name in names {
            storage
                .put(&format!("raw/{}", name), Bytes::from_static(b"x"))
                .await
                .unwrap();
        }
        storage
    }

    fn pipeline(storage: &ObjectStorage, options: PipelineOptions) -> ConversionPipeline {
        ConversionPipeline::new(
            Box::new(Constant),
            Box::new(StorageSource::new(storage.clone(), "raw")),
            storage.clone(),
            options,
        )
    }

    fn options() -> PipelineOptions {
        PipelineOptions {
            output_prefix: "cogs".to_string(),
            cog: CogOptions {
                tile_size: 16,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_writes_cogs_and_csv() {
        let storage = seeded(&["a.tif", "b.tif", "notes.txt"]).await;
        let report = pipeline(&storage, options()).run().await.unwrap();

        assert_eq!(report.files_found, 3);
        assert_eq!(report.files_selected, 2);
        assert_eq!(report.files_converted, 2);
        assert_eq!(report.cogs_written(), 2);
        assert!(storage.exists("cogs/a_v.tif").await.unwrap());
        assert!(storage.exists("cogs/b_v.tif").await.unwrap());

        let csv = storage.get("cogs/files_converted.csv").await.unwrap();
        assert_eq!(
            std::str::from_utf8(&csv).unwrap(),
            "file_name,COGs_created\nraw/a.tif,a_v.tif\nraw/b.tif,b_v.tif\n"
        );
        // No netCDF input, so no metadata.json.
        assert!(!storage.exists("cogs/metadata.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_error_aborts_by_default() {
        let storage = seeded(&["a.tif", "bad.tif", "c.tif"]).await;
        let err = pipeline(&storage, options()).run().await.unwrap_err();
        assert!(matches!(err, TransformError::MissingData { .. }));
        assert!(!storage.exists("cogs/files_converted.csv").await.unwrap());
    }

    #[tokio::test]
    async fn test_continue_on_error() {
        let storage = seeded(&["a.tif", "bad.tif", "c.tif"]).await;
        let report = pipeline(
            &storage,
            PipelineOptions {
                continue_on_error: true,
                ..options()
            },
        )
        .run()
        .await
        .unwrap();

        assert_eq!(report.files_converted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file_name, "raw/bad.tif");
        assert!(!report.is_success());
        assert!(storage.exists("cogs/c_v.tif").await.unwrap());
    }

    #[tokio::test]
    async fn test_skip_existing() {
        let storage = seeded(&["a.tif"]).await;
        storage
            .put("cogs/a_v.tif", Bytes::from_static(b"old"))
            .await
            .unwrap();

        let report = pipeline(
            &storage,
            PipelineOptions {
                skip_existing: true,
                ..options()
            },
        )
        .run()
        .await
        .unwrap();

        assert_eq!(report.skipped, vec!["a_v.tif".to_string()]);
        assert_eq!(report.cogs_written(), 0);
        let kept = storage.get("cogs/a_v.tif").await.unwrap();
        assert_eq!(&kept[..], b"old");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_from_spawned_task() {
        let storage = seeded(&["a.tif", "b.tif"]).await;
        let job = pipeline(&storage, options());
        let report = tokio::spawn(async move { job.run().await })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.cogs_written(), 2);
        let bytes = storage.get("cogs/b_v.tif").await.unwrap();
        let raster = cog::read_geotiff("b_v", &bytes).unwrap();
        assert_eq!(raster.data, vec![1.0, -9999.0, 3.0, 4.0]);
    }
}
