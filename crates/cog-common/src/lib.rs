//! Common types and utilities shared across the ghg-cog crates.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod time;

pub use bbox::BoundingBox;
pub use crs::Crs;
pub use error::{CogError, CogResult};
pub use time::{
    day_of_year_to_date, decode_cf_time, extract_dates, month_name, Calendar, CfTimeUnits,
    DateExtraction, DatetimeRange, TimeUnit,
};

/// Harmonized nodata value written into every produced COG.
pub const NODATA_SENTINEL: f32 = -9999.0;

/// EPSG code of the output CRS (geographic WGS84).
pub const WGS84_EPSG: u32 = 4326;
