//! Subcommand handlers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cog::{validate_cog, CogValidation};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use stac::{write_items, CatalogBuilder, DatasetDefinition, PublisherConfig, StacPublisher};
use storage::{ObjectStorage, ObjectStorageConfig};
use tracing::{info, warn};
use transform::{available_plugins, ConversionReport};
use walkdir::WalkDir;

use crate::cli::{CatalogArgs, ConvertArgs, ValidateArgs};
use crate::config::s3_config;

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    table
}

// ============================================================================
// convert
// ============================================================================

pub async fn convert(args: &ConvertArgs) -> Result<()> {
    let job = args.to_job()?;
    let pipeline = job.build_pipeline()?;
    info!(plugin = %job.plugin, prefix = %job.output.prefix(), "Starting conversion");

    if args.dry_run {
        let (found, selected) = pipeline.discover().await?;
        let mut table = new_table();
        table.set_header(vec!["Source file", "Size (bytes)"]);
        for source in &selected {
            table.add_row(vec![source.name.clone(), source.size.to_string()]);
        }
        println!("{table}");
        println!("{} of {} files selected", selected.len(), found);
        return Ok(());
    }

    let report = pipeline.run().await?;
    println!("{}", conversion_summary(&job.plugin, &report));

    if !report.is_success() {
        anyhow::bail!("{} file(s) failed to convert", report.failures.len());
    }
    Ok(())
}

fn conversion_summary(plugin: &str, report: &ConversionReport) -> Table {
    let mut table = new_table();
    table.set_header(vec![format!("Conversion: {}", plugin), String::new()]);
    table.add_row(vec!["Files found".to_string(), report.files_found.to_string()]);
    table.add_row(vec!["Files selected".to_string(), report.files_selected.to_string()]);
    table.add_row(vec!["Files converted".to_string(), report.files_converted.to_string()]);
    table.add_row(vec!["COGs written".to_string(), report.cogs_written().to_string()]);
    table.add_row(vec!["COGs skipped".to_string(), report.skipped.len().to_string()]);
    table.add_row(vec![
        "Bytes written".to_string(),
        report.bytes_written.to_string(),
    ]);
    for failure in &report.failures {
        table.add_row(vec![format!("FAILED {}", failure.file_name), failure.error.clone()]);
    }
    table
}

// ============================================================================
// plugins
// ============================================================================

pub fn plugins() {
    let mut table = new_table();
    table.set_header(vec!["Plugin", "Description"]);
    for plugin in available_plugins() {
        table.add_row(vec![plugin.name(), plugin.description()]);
    }
    println!("{table}");
}

// ============================================================================
// catalog
// ============================================================================

pub async fn catalog(args: &CatalogArgs) -> Result<()> {
    let definition = DatasetDefinition::load(&args.definition)
        .with_context(|| format!("Failed to load dataset definition {:?}", args.definition))?;

    let config = match &args.local_root {
        Some(root) => ObjectStorageConfig::local(root),
        None => s3_config(definition.bucket.as_deref()),
    };
    let storage = ObjectStorage::new(&config).context("Failed to open COG storage")?;

    let collection = definition.collection.clone();
    let builder = CatalogBuilder::new(definition, storage)?;
    let items = builder.build_all().await?;
    if items.is_empty() {
        warn!(collection = %collection, "No items found");
    }

    if let Some(dir) = &args.output_dir {
        let written = write_items(dir, &items).await?;
        info!(dir = %dir.display(), items = written.len(), "Wrote item files");
    }

    if args.publish {
        let publisher = StacPublisher::new(PublisherConfig::from_env()?);
        let outcomes = publisher.publish_all(&items).await?;
        info!(collection = %collection, published = outcomes.len(), "Published items");
    }

    if args.output_dir.is_none() && !args.publish {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    let mut table = new_table();
    table.set_header(vec!["Item", "Assets", "bbox"]);
    for item in &items {
        table.add_row(vec![
            item.id.clone(),
            item.assets.len().to_string(),
            format!("{:?}", item.bbox),
        ]);
    }
    println!("{table}");
    Ok(())
}

// ============================================================================
// validate
// ============================================================================

fn is_tiff(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("tif" | "tiff")
    )
}

fn collect_local(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_tiff(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    files
}

pub async fn validate(args: &ValidateArgs) -> Result<()> {
    let mut results: Vec<(String, CogValidation)> = Vec::new();

    for path in collect_local(&args.paths) {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        results.push((path.display().to_string(), validate_cog(&bytes)));
    }

    if let Some(prefix) = &args.s3_prefix {
        let storage = ObjectStorage::new(&s3_config(args.bucket.as_deref()))
            .context("Failed to open S3 bucket")?;
        for object in storage.list(prefix).await? {
            if !is_tiff(Path::new(&object.key)) {
                continue;
            }
            let bytes = storage.get(&object.key).await?;
            results.push((storage.uri(&object.key), validate_cog(&bytes)));
        }
    }

    anyhow::ensure!(!results.is_empty(), "No GeoTIFF files to validate");

    let mut table = new_table();
    table.set_header(vec!["File", "Valid", "Levels", "BigTIFF", "Problems"]);
    let mut invalid = 0;
    for (name, result) in &results {
        if !result.valid {
            invalid += 1;
        }
        let problems: Vec<String> = result
            .errors
            .iter()
            .map(|e| format!("error: {e}"))
            .chain(result.warnings.iter().map(|w| format!("warning: {w}")))
            .collect();
        table.add_row(vec![
            name.clone(),
            if result.valid { "yes" } else { "NO" }.to_string(),
            result.levels.len().to_string(),
            result.bigtiff.to_string(),
            problems.join("\n"),
        ]);
    }
    println!("{table}");

    if invalid > 0 {
        anyhow::bail!("{} of {} files are not valid COGs", invalid, results.len());
    }
    Ok(())
}
