//! STAC item model and construction from COG rasters.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use cog_common::{extract_dates, BoundingBox, DatetimeRange};
use grid_processor::Raster;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Result, StacError};

pub const STAC_VERSION: &str = "1.0.0";
pub const COG_MEDIA_TYPE: &str = "image/tiff; application=geotiff; profile=cloud-optimized";
pub const PROJECTION_EXTENSION: &str = "https://stac-extensions.github.io/projection/v1.1.0/schema.json";
pub const RASTER_EXTENSION: &str = "https://stac-extensions.github.io/raster/v1.1.0/schema.json";

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

impl Geometry {
    pub fn polygon(bbox: &BoundingBox) -> Self {
        Self {
            kind: "Polygon".to_string(),
            coordinates: vec![bbox.to_polygon_ring()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub href: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `proj:*` and `raster:bands` fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "type")]
    pub kind: String,
    pub stac_version: String,
    pub stac_extensions: Vec<String>,
    pub id: String,
    pub geometry: Geometry,
    pub bbox: [f64; 4],
    pub properties: Map<String, Value>,
    pub links: Vec<Link>,
    pub assets: BTreeMap<String, Asset>,
    pub collection: String,
}

// ============================================================================
// Asset metadata
// ============================================================================

/// What an item needs to know about one COG.
#[derive(Debug, Clone)]
pub struct AssetInfo {
    pub href: String,
    pub bbox: BoundingBox,
    pub title: Option<String>,
    pub description: Option<String>,
    extra: Map<String, Value>,
}

impl AssetInfo {
    /// Projection and band metadata of a decoded COG.
    pub fn from_raster(href: impl Into<String>, raster: &Raster) -> Result<Self> {
        let gt = raster.geotransform()?;
        let bbox = raster.bounds()?;

        let mut extra = Map::new();
        extra.insert("proj:epsg".into(), json!(raster.crs.epsg()));
        extra.insert("proj:geometry".into(), json!(Geometry::polygon(&bbox)));
        extra.insert("proj:bbox".into(), json!(bbox.to_array()));
        extra.insert("proj:shape".into(), json!([raster.height, raster.width]));
        extra.insert(
            "proj:transform".into(),
            json!([
                gt.pixel_width,
                0.0,
                gt.origin_x,
                0.0,
                gt.pixel_height,
                gt.origin_y,
                0.0,
                0.0,
                1.0
            ]),
        );
        extra.insert("raster:bands".into(), json!([band_info(raster)]));

        Ok(Self {
            href: href.into(),
            bbox,
            title: None,
            description: None,
            extra,
        })
    }

    pub fn with_text(mut self, title: &str, description: &str) -> Self {
        self.title = (!title.is_empty()).then(|| title.to_string());
        self.description = (!description.is_empty()).then(|| description.to_string());
        self
    }

    fn into_asset(self) -> Asset {
        Asset {
            href: self.href,
            media_type: COG_MEDIA_TYPE.to_string(),
            roles: vec!["data".to_string(), "layer".to_string()],
            title: self.title,
            description: self.description,
            extra: self.extra,
        }
    }
}

/// `raster:bands` entry with statistics over valid cells.
fn band_info(raster: &Raster) -> Value {
    let mut count = 0usize;
    let mut mean = 0.0f64;
    let mut m2 = 0.0f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in raster.data.iter().filter(|&&v| !raster.is_nodata(v)) {
        let v = v as f64;
        count += 1;
        let delta = v - mean;
        mean += delta / count as f64;
        m2 += delta * (v - mean);
        min = min.min(v);
        max = max.max(v);
    }

    let mut band = json!({
        "data_type": "float32",
        "scale": 1.0,
        "offset": 0.0,
        "sampling": "area",
    });
    if let Some(nodata) = raster.nodata {
        band["nodata"] = json!(nodata);
    }
    if count > 0 {
        let variance = (m2 / count as f64).max(0.0);
        band["statistics"] = json!({
            "minimum": min,
            "maximum": max,
            "mean": mean,
            "stddev": variance.sqrt(),
            "valid_percent": count as f64 * 100.0 / raster.data.len() as f64,
        });
    }
    band
}

// ============================================================================
// Items
// ============================================================================

fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Temporal properties for a date token such as `202001`.
pub fn datetime_properties(date_key: &str, range: Option<DatetimeRange>) -> Result<Map<String, Value>> {
    let dates = extract_dates(&format!("_{}", date_key), range)
        .ok_or_else(|| StacError::NoDate(date_key.to_string()))?;

    let mut props = Map::new();
    match (dates.start, dates.end, dates.single) {
        (Some(start), Some(end), _) => {
            props.insert("start_datetime".into(), json!(format_datetime(start)));
            props.insert("end_datetime".into(), json!(format_datetime(end)));
            props.insert("datetime".into(), Value::Null);
        }
        (_, _, Some(single)) => {
            props.insert("datetime".into(), json!(format_datetime(single)));
        }
        _ => return Err(StacError::NoDate(date_key.to_string())),
    }
    Ok(props)
}

/// Assemble an item from its assets.
///
/// The footprint is the union of the asset bounds and the collection link
/// is always added.
pub fn build_item(
    id: &str,
    collection: &str,
    date_key: &str,
    range: Option<DatetimeRange>,
    assets: Vec<(String, AssetInfo)>,
    extra_properties: &Map<String, Value>,
) -> Result<Item> {
    let bbox = assets
        .iter()
        .map(|(_, a)| a.bbox)
        .reduce(|acc, b| acc.union(&b))
        .ok_or_else(|| StacError::NoAssets(id.to_string()))?;

    let mut properties = datetime_properties(date_key, range)?;
    for (k, v) in extra_properties {
        properties.insert(k.clone(), v.clone());
    }

    Ok(Item {
        kind: "Feature".to_string(),
        stac_version: STAC_VERSION.to_string(),
        stac_extensions: vec![
            PROJECTION_EXTENSION.to_string(),
            RASTER_EXTENSION.to_string(),
        ],
        id: id.to_string(),
        geometry: Geometry::polygon(&bbox),
        bbox: bbox.to_array(),
        properties,
        links: vec![Link {
            rel: "collection".to_string(),
            href: collection.to_string(),
            media_type: Some("application/json".to_string()),
        }],
        assets: assets
            .into_iter()
            .map(|(name, info)| (name, info.into_asset()))
            .collect(),
        collection: collection.to_string(),
    })
}
