//! Source files handed to transformation plugins.

use bytes::Bytes;
use grid_processor::Raster;
use netcdf_parser::{Dataset, OpenOptions};

use crate::error::Result;

const NETCDF_SUFFIXES: &[&str] = &[".nc", ".nc4", ".netcdf"];

/// One input file held in memory.
///
/// `name` is the path or object key the file was found under; plugins
/// tokenize its final segment and some read the parent folder.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        self.name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.name)
    }

    /// Name of the folder holding the file, if the name has one.
    pub fn parent_folder(&self) -> Option<&str> {
        let mut segments = self.name.rsplit(['/', '\\']).filter(|s| !s.is_empty());
        segments.next()?;
        segments.next()
    }

    pub fn is_netcdf(&self) -> bool {
        let lower = self.name.to_ascii_lowercase();
        NETCDF_SUFFIXES.iter().any(|s| lower.ends_with(s))
    }

    /// Decode as netCDF with fill values masked to NaN.
    pub fn open_netcdf(&self) -> Result<Dataset> {
        Ok(Dataset::from_bytes(&self.bytes, OpenOptions::masked())?)
    }

    /// Decode the first band of a GeoTIFF.
    pub fn read_geotiff(&self) -> Result<Raster> {
        Ok(cog::read_geotiff(self.file_name(), &self.bytes)?)
    }
}
