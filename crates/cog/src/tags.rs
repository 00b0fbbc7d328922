//! TIFF and GeoTIFF tag numbers and GeoKey construction.

use cog_common::Crs;

// Baseline / extension TIFF tags
pub const NEW_SUBFILE_TYPE: u16 = 254;
pub const IMAGE_WIDTH: u16 = 256;
pub const IMAGE_LENGTH: u16 = 257;
pub const BITS_PER_SAMPLE: u16 = 258;
pub const COMPRESSION: u16 = 259;
pub const PHOTOMETRIC: u16 = 262;
pub const SAMPLES_PER_PIXEL: u16 = 277;
pub const PLANAR_CONFIG: u16 = 284;
pub const TILE_WIDTH: u16 = 322;
pub const TILE_LENGTH: u16 = 323;
pub const TILE_OFFSETS: u16 = 324;
pub const TILE_BYTE_COUNTS: u16 = 325;
pub const SAMPLE_FORMAT: u16 = 339;

// GeoTIFF tags
pub const MODEL_PIXEL_SCALE: u16 = 33550;
pub const MODEL_TIEPOINT: u16 = 33922;
pub const GEO_KEY_DIRECTORY: u16 = 34735;
pub const GEO_ASCII_PARAMS: u16 = 34737;

// GDAL private tag holding the nodata value as text
pub const GDAL_NODATA: u16 = 42113;

// Field values
pub const SUBFILE_REDUCED_RESOLUTION: u32 = 1;
pub const COMPRESSION_NONE: u16 = 1;
pub const COMPRESSION_ADOBE_DEFLATE: u16 = 8;
pub const PHOTOMETRIC_MIN_IS_BLACK: u16 = 1;
pub const PLANAR_CHUNKY: u16 = 1;
pub const SAMPLE_FORMAT_IEEE_FP: u16 = 3;

// GeoKeys
const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const GEOG_CITATION: u16 = 2049;
const PROJECTED_CS_TYPE: u16 = 3072;
const PCS_CITATION: u16 = 3073;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// GeoKeyDirectory contents plus the ASCII params it points into.
pub fn geo_keys(crs: &Crs) -> (Vec<u16>, String) {
    let citation = format!("{}|", crs.citation());
    // EPSG codes above u16 range cannot be expressed as a GeoKey.
    let code = u16::try_from(crs.epsg()).unwrap_or(32767);

    let (model, crs_key, citation_key) = if crs.is_geographic() {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE, GEOG_CITATION)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE, PCS_CITATION)
    };

    let keys: [[u16; 4]; 4] = [
        [GT_MODEL_TYPE, 0, 1, model],
        [GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA],
        [crs_key, 0, 1, code],
        [citation_key, GEO_ASCII_PARAMS, citation.len() as u16, 0],
    ];

    let mut directory = vec![1, 1, 0, keys.len() as u16];
    directory.extend(keys.iter().flatten());
    (directory, citation)
}

/// EPSG code recorded in a GeoKeyDirectory, if any.
pub fn epsg_from_geo_keys(directory: &[u16]) -> Option<u32> {
    let count = *directory.get(3)? as usize;
    directory
        .get(4..4 + count * 4)?
        .chunks_exact(4)
        .find(|key| (key[0] == GEOGRAPHIC_TYPE || key[0] == PROJECTED_CS_TYPE) && key[1] == 0)
        .map(|key| key[3] as u32)
}
