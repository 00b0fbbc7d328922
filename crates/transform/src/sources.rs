//! Where source files come from: a local directory tree or an object-store
//! prefix.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use storage::ObjectStorage;
use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::error::{Result, TransformError};
use crate::source::SourceFile;

/// A discovered file, not yet fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    /// Path relative to the source root, `/`-separated, or the object key.
    pub name: String,
    pub size: u64,
}

impl SourceRef {
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Lists and fetches the files of one data source.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Every file under the source, sorted by name.
    async fn list_sources(&self) -> Result<Vec<SourceRef>>;

    /// Fetch the bytes of a listed file.
    async fn fetch(&self, source: &SourceRef) -> Result<SourceFile>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}

// ============================================================================
// Local directory
// ============================================================================

pub struct DirectorySource {
    root: PathBuf,
    recursive: bool,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: false,
        }
    }

    /// Descend into sub-folders; names keep the relative folder path.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl SourceFetcher for DirectorySource {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn list_sources(&self) -> Result<Vec<SourceRef>> {
        let root = self.root.clone();
        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let entries = tokio::task::spawn_blocking(move || -> Result<Vec<SourceRef>> {
            let mut found = Vec::new();
            for entry in WalkDir::new(&root)
                .min_depth(1)
                .max_depth(max_depth)
                .sort_by_file_name()
            {
                let entry = entry.map_err(|e| TransformError::SourceListing(e.to_string()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(&root)
                    .unwrap_or(entry.path())
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                found.push(SourceRef {
                    name: relative,
                    size,
                });
            }
            Ok(found)
        })
        .await
        .map_err(|e| TransformError::SourceListing(e.to_string()))??;

        debug!(count = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn fetch(&self, source: &SourceRef) -> Result<SourceFile> {
        let bytes = tokio::fs::read(self.root.join(&source.name)).await?;
        Ok(SourceFile::new(source.name.clone(), bytes))
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

// ============================================================================
// Object-store prefix
// ============================================================================

pub struct StorageSource {
    storage: ObjectStorage,
    prefix: String,
}

impl StorageSource {
    pub fn new(storage: ObjectStorage, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl SourceFetcher for StorageSource {
    async fn list_sources(&self) -> Result<Vec<SourceRef>> {
        let objects = self.storage.list(&self.prefix).await?;
        Ok(objects
            .into_iter()
            .map(|o| SourceRef {
                name: o.key,
                size: o.size as u64,
            })
            .collect())
    }

    async fn fetch(&self, source: &SourceRef) -> Result<SourceFile> {
        let bytes = self.storage.get(&source.name).await?;
        Ok(SourceFile::new(source.name.clone(), bytes))
    }

    fn location(&self) -> String {
        self.storage.uri(&self.prefix)
    }
}

// ============================================================================
// Filtering
// ============================================================================

/// Selects which discovered files are converted.
///
/// A file passes when its name ends with one of `suffixes` (any when
/// empty), its file name matches `pattern` (when set) and its name
/// contains none of `exclude`.
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    suffixes: Vec<String>,
    pattern: Option<Regex>,
    exclude: Vec<String>,
}

impl SourceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suffixes = suffixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            TransformError::SourceListing(format!("invalid pattern '{}': {}", pattern, e))
        })?;
        self.pattern = Some(regex);
        Ok(self)
    }

    pub fn with_exclusions<I, S>(mut self, exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = exclude.into_iter().map(Into::into).collect();
        self
    }

    pub fn matches(&self, source: &SourceRef) -> bool {
        let name = source.name.as_str();
        if !self.suffixes.is_empty() && !self.suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            return false;
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(source.file_name()) {
                return false;
            }
        }
        !self.exclude.iter().any(|e| name.contains(e.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn src(name: &str) -> SourceRef {
        SourceRef {
            name: name.to_string(),
            size: 0,
        }
    }

    #[test]
    fn test_filter_suffix_pattern_and_exclusions() {
        let filter = SourceFilter::new()
            .with_suffixes([".nc", ".nc4"])
            .with_pattern(r"^tmax")
            .unwrap()
            .with_exclusions(["historical"]);

        assert!(filter.matches(&src("climdex/tmaxXF_ssp245_2015.nc")));
        assert!(filter.matches(&src("tmaxXF_ssp245_2015.nc4")));
        assert!(!filter.matches(&src("tmaxXF_ssp245_2015.tif")));
        assert!(!filter.matches(&src("climdex/tmin_ssp245_2015.nc")));
        assert!(!filter.matches(&src("tmaxXF_historical_1990.nc")));
    }

    #[test]
    fn test_empty_filter_accepts_everything() {
        assert!(SourceFilter::new().matches(&src("anything.bin")));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(SourceFilter::new().with_pattern("(unclosed").is_err());
    }

    #[tokio::test]
    async fn test_directory_source_lists_sorted_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("2022")).unwrap();
        std::fs::write(dir.path().join("b.nc"), b"b").unwrap();
        std::fs::write(dir.path().join("a.nc"), b"aa").unwrap();
        std::fs::write(dir.path().join("2022").join("c.tif"), b"c").unwrap();

        let flat = DirectorySource::new(dir.path());
        let names: Vec<_> = flat
            .list_sources()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["a.nc", "b.nc"]);

        let deep = DirectorySource::new(dir.path()).recursive(true);
        let listed = deep.list_sources().await.unwrap();
        let names: Vec<_> = listed.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["2022/c.tif", "a.nc", "b.nc"]);

        let file = deep.fetch(&listed[1]).await.unwrap();
        assert_eq!(file.bytes, Bytes::from_static(b"aa"));
        assert_eq!(listed[0].file_name(), "c.tif");
    }

    #[tokio::test]
    async fn test_storage_source() {
        let storage = ObjectStorage::in_memory("test-bucket");
        storage
            .put("raw/ecco/a.nc", Bytes::from_static(b"data"))
            .await
            .unwrap();
        storage
            .put("other/b.nc", Bytes::from_static(b"x"))
            .await
            .unwrap();

        let source = StorageSource::new(storage, "raw/ecco");
        let listed = source.list_sources().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "raw/ecco/a.nc");
        assert_eq!(listed[0].size, 4);

        let file = source.fetch(&listed[0]).await.unwrap();
        assert_eq!(file.file_name(), "a.nc");
    }
}
