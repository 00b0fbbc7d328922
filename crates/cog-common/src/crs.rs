//! Coordinate Reference System identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CogError;
use crate::WGS84_EPSG;

/// An EPSG-coded coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    pub fn from_epsg(epsg: u32) -> Self {
        Self { epsg }
    }

    /// Geographic WGS84, the only CRS produced by the transformation plugins.
    pub fn wgs84() -> Self {
        Self { epsg: WGS84_EPSG }
    }

    /// Parse "EPSG:4326", "epsg:4326" or "CRS:84".
    pub fn parse(s: &str) -> Result<Self, CogError> {
        let normalized = s.trim().to_uppercase();
        if normalized == "CRS:84" {
            return Ok(Self::wgs84());
        }
        normalized
            .strip_prefix("EPSG:")
            .and_then(|code| code.parse::<u32>().ok())
            .map(Self::from_epsg)
            .ok_or_else(|| CogError::InvalidCrs(s.to_string()))
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Geographic (lat/lon degree) systems this crate knows how to label.
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, 4326 | 4269 | 4258)
    }

    /// Citation string written into the GeoTIFF ASCII params.
    pub fn citation(&self) -> String {
        match self.epsg {
            4326 => "WGS 84".to_string(),
            4269 => "NAD83".to_string(),
            4258 => "ETRS89".to_string(),
            code => format!("EPSG:{}", code),
        }
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!(Crs::parse("epsg:4326").unwrap(), Crs::wgs84());
        assert_eq!(Crs::parse("CRS:84").unwrap().epsg(), 4326);
        assert_eq!(Crs::parse("EPSG:3857").unwrap().epsg(), 3857);
        assert!(Crs::parse("mercator").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Crs::wgs84().to_string(), "EPSG:4326");
        assert!(Crs::wgs84().is_geographic());
        assert!(!Crs::from_epsg(3857).is_geographic());
    }
}
