//! Cloud Optimized GeoTIFF writer.
//!
//! Output layout:
//!
//! ```text
//! header │ IFD 0 (full res) │ IFD 1 │ … │ IFD n │ tiles n │ … │ tiles 1 │ tiles 0
//! ```
//!
//! All directories come first so a reader can learn the whole pyramid from
//! one leading range request, and the smallest overview's tiles come before
//! the larger levels.

use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use cog_common::{CogError, CogResult, Crs};
use flate2::write::ZlibEncoder;
use grid_processor::{generate_overviews, DownsampleMethod, GeoTransform, Raster};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::ifd::{FieldValue, Ifd};
use crate::tags;

const CLASSIC_HEADER_LEN: usize = 8;
const BIGTIFF_HEADER_LEN: usize = 16;

/// Tile compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Deflate,
}

impl Compression {
    fn tag_value(self) -> u16 {
        match self {
            Compression::None => tags::COMPRESSION_NONE,
            Compression::Deflate => tags::COMPRESSION_ADOBE_DEFLATE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CogOptions {
    /// Tile edge in pixels; a multiple of 16.
    pub tile_size: u32,
    pub compression: Compression,
    /// zlib level 0-9
    pub deflate_level: u32,
    pub overview_method: DownsampleMethod,
    /// Write BigTIFF even when the file would fit in classic TIFF.
    pub force_bigtiff: bool,
}

impl Default for CogOptions {
    fn default() -> Self {
        Self {
            tile_size: 512,
            compression: Compression::Deflate,
            deflate_level: 6,
            overview_method: DownsampleMethod::Average,
            force_bigtiff: false,
        }
    }
}

/// One pyramid level, its tiles already compressed.
struct EncodedLevel {
    width: usize,
    height: usize,
    tiles: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct CogEncoder {
    options: CogOptions,
}

impl CogEncoder {
    pub fn new(options: CogOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CogOptions {
        &self.options
    }

    /// Encode a single-band float32 COG.
    #[instrument(skip(self, raster), fields(name = %raster.name, width = raster.width, height = raster.height))]
    pub fn encode(&self, raster: &Raster) -> CogResult<Vec<u8>> {
        let tile = self.options.tile_size as usize;
        if tile == 0 || tile % 16 != 0 {
            return Err(CogError::InvalidParameter {
                param: "tile_size".to_string(),
                message: format!("{} is not a positive multiple of 16", tile),
            });
        }
        if raster.width == 0 || raster.height == 0 {
            return Err(CogError::GeoTiffError(format!("{} is empty", raster.name)));
        }

        let raster: Cow<Raster> = if raster.is_north_up() {
            Cow::Borrowed(raster)
        } else {
            let mut flipped = raster.clone();
            flipped.flip_y();
            Cow::Owned(flipped)
        };
        let gt = raster.geotransform()?;

        let overviews = generate_overviews(
            &raster.data,
            raster.width,
            raster.height,
            tile,
            self.options.overview_method,
            raster.nodata,
        );

        let mut levels = Vec::with_capacity(overviews.len() + 1);
        levels.push(self.encode_level(&raster.data, raster.width, raster.height, raster.nodata)?);
        for ov in &overviews {
            levels.push(self.encode_level(&ov.data, ov.width, ov.height, raster.nodata)?);
        }

        let tile_bytes: usize = levels
            .iter()
            .flat_map(|l| l.tiles.iter())
            .map(Vec::len)
            .sum();

        let geo = GeoInfo {
            gt,
            crs: raster.crs,
            nodata: raster.nodata,
        };

        let mut big = self.options.force_bigtiff;
        if !big {
            let classic_len = CLASSIC_HEADER_LEN
                + self
                    .build_ifds(&levels, &geo, false, None)
                    .iter()
                    .map(|i| i.encoded_len(false))
                    .sum::<usize>()
                + tile_bytes;
            big = classic_len > u32::MAX as usize;
        }

        let bytes = self.assemble(&levels, &geo, big, tile_bytes);
        debug!(
            size = bytes.len(),
            overviews = overviews.len(),
            bigtiff = big,
            "Encoded COG"
        );
        Ok(bytes)
    }

    /// Encode and write to `path`, returning the byte count.
    pub fn write_file(&self, raster: &Raster, path: impl AsRef<Path>) -> CogResult<u64> {
        let bytes = self.encode(raster)?;
        std::fs::write(path.as_ref(), &bytes)?;
        Ok(bytes.len() as u64)
    }

    fn encode_level(
        &self,
        data: &[f32],
        width: usize,
        height: usize,
        nodata: Option<f32>,
    ) -> CogResult<EncodedLevel> {
        let ts = self.options.tile_size as usize;
        let across = width.div_ceil(ts);
        let down = height.div_ceil(ts);
        let fill = nodata.unwrap_or(0.0);

        let tiles = (0..across * down)
            .into_par_iter()
            .map(|index| {
                let (tx, ty) = (index % across, index / across);
                let mut raw = Vec::with_capacity(ts * ts * 4);
                for row in 0..ts {
                    let y = ty * ts + row;
                    for col in 0..ts {
                        let x = tx * ts + col;
                        let v = if x < width && y < height {
                            data[y * width + x]
                        } else {
                            fill
                        };
                        raw.extend_from_slice(&v.to_le_bytes());
                    }
                }
                self.compress(raw)
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        Ok(EncodedLevel {
            width,
            height,
            tiles,
        })
    }

    fn compress(&self, raw: Vec<u8>) -> std::io::Result<Vec<u8>> {
        match self.options.compression {
            Compression::None => Ok(raw),
            Compression::Deflate => {
                let level = flate2::Compression::new(self.options.deflate_level.min(9));
                let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), level);
                encoder.write_all(&raw)?;
                encoder.finish()
            }
        }
    }

    /// Directories for every level. Without `offsets`, tile offsets are
    /// zero placeholders (sizes are unaffected).
    fn build_ifds(
        &self,
        levels: &[EncodedLevel],
        geo: &GeoInfo,
        big: bool,
        offsets: Option<&[Vec<u64>]>,
    ) -> Vec<Ifd> {
        let ts = self.options.tile_size;

        levels
            .iter()
            .enumerate()
            .map(|(i, level)| {
                let mut ifd = Ifd::default();
                let subfile = if i == 0 {
                    0
                } else {
                    tags::SUBFILE_REDUCED_RESOLUTION
                };
                ifd.set(tags::NEW_SUBFILE_TYPE, FieldValue::Long(vec![subfile]));
                ifd.set(tags::IMAGE_WIDTH, FieldValue::Long(vec![level.width as u32]));
                ifd.set(tags::IMAGE_LENGTH, FieldValue::Long(vec![level.height as u32]));
                ifd.set(tags::BITS_PER_SAMPLE, FieldValue::Short(vec![32]));
                ifd.set(
                    tags::COMPRESSION,
                    FieldValue::Short(vec![self.options.compression.tag_value()]),
                );
                ifd.set(
                    tags::PHOTOMETRIC,
                    FieldValue::Short(vec![tags::PHOTOMETRIC_MIN_IS_BLACK]),
                );
                ifd.set(tags::SAMPLES_PER_PIXEL, FieldValue::Short(vec![1]));
                ifd.set(tags::PLANAR_CONFIG, FieldValue::Short(vec![tags::PLANAR_CHUNKY]));
                ifd.set(tags::TILE_WIDTH, FieldValue::Long(vec![ts]));
                ifd.set(tags::TILE_LENGTH, FieldValue::Long(vec![ts]));
                ifd.set(
                    tags::SAMPLE_FORMAT,
                    FieldValue::Short(vec![tags::SAMPLE_FORMAT_IEEE_FP]),
                );

                let tile_offsets = offsets
                    .map(|o| o[i].clone())
                    .unwrap_or_else(|| vec![0; level.tiles.len()]);
                let counts: Vec<u64> = level.tiles.iter().map(|t| t.len() as u64).collect();
                if big {
                    ifd.set(tags::TILE_OFFSETS, FieldValue::Long8(tile_offsets));
                    ifd.set(tags::TILE_BYTE_COUNTS, FieldValue::Long8(counts));
                } else {
                    ifd.set(
                        tags::TILE_OFFSETS,
                        FieldValue::Long(tile_offsets.iter().map(|&o| o as u32).collect()),
                    );
                    ifd.set(
                        tags::TILE_BYTE_COUNTS,
                        FieldValue::Long(counts.iter().map(|&c| c as u32).collect()),
                    );
                }

                if let Some(nd) = geo.nodata {
                    ifd.set(tags::GDAL_NODATA, FieldValue::Ascii(format_nodata(nd)));
                }

                if i == 0 {
                    let (keys, ascii) = tags::geo_keys(&geo.crs);
                    ifd.set(
                        tags::MODEL_PIXEL_SCALE,
                        FieldValue::Double(vec![geo.gt.pixel_width, -geo.gt.pixel_height, 0.0]),
                    );
                    ifd.set(
                        tags::MODEL_TIEPOINT,
                        FieldValue::Double(vec![
                            0.0,
                            0.0,
                            0.0,
                            geo.gt.origin_x,
                            geo.gt.origin_y,
                            0.0,
                        ]),
                    );
                    ifd.set(tags::GEO_KEY_DIRECTORY, FieldValue::Short(keys));
                    ifd.set(tags::GEO_ASCII_PARAMS, FieldValue::Ascii(ascii));
                }
                ifd
            })
            .collect()
    }

    fn assemble(&self, levels: &[EncodedLevel], geo: &GeoInfo, big: bool, tile_bytes: usize) -> Vec<u8> {
        let header_len = if big {
            BIGTIFF_HEADER_LEN
        } else {
            CLASSIC_HEADER_LEN
        };
        let ifd_lens: Vec<usize> = self
            .build_ifds(levels, geo, big, None)
            .iter()
            .map(|i| i.encoded_len(big))
            .collect();
        let data_start = header_len + ifd_lens.iter().sum::<usize>();

        // Smallest overview first.
        let mut offsets: Vec<Vec<u64>> = vec![Vec::new(); levels.len()];
        let mut cursor = data_start as u64;
        for (i, level) in levels.iter().enumerate().rev() {
            for t in &level.tiles {
                offsets[i].push(cursor);
                cursor += t.len() as u64;
            }
        }

        let ifds = self.build_ifds(levels, geo, big, Some(&offsets));
        let mut out = Vec::with_capacity(data_start + tile_bytes);

        out.extend_from_slice(b"II");
        if big {
            out.extend_from_slice(&43u16.to_le_bytes());
            out.extend_from_slice(&8u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&(header_len as u64).to_le_bytes());
        } else {
            out.extend_from_slice(&42u16.to_le_bytes());
            out.extend_from_slice(&(header_len as u32).to_le_bytes());
        }

        let mut ifd_start = header_len;
        for (i, ifd) in ifds.iter().enumerate() {
            let next = if i + 1 < ifds.len() {
                (ifd_start + ifd_lens[i]) as u64
            } else {
                0
            };
            ifd.write(&mut out, big, next);
            ifd_start += ifd_lens[i];
        }

        for level in levels.iter().rev() {
            for t in &level.tiles {
                out.extend_from_slice(t);
            }
        }
        out
    }
}

struct GeoInfo {
    gt: GeoTransform,
    crs: Crs,
    nodata: Option<f32>,
}

/// GDAL_NODATA text form: integral values without a fraction.
fn format_nodata(v: f32) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(width: usize, height: usize) -> Raster {
        let data = (0..width * height).map(|i| i as f32).collect();
        let gt = GeoTransform {
            origin_x: -180.0,
            pixel_width: 360.0 / width as f64,
            origin_y: 90.0,
            pixel_height: -180.0 / height as f64,
        };
        let mut r = Raster::from_geotransform("test", width, height, data, gt).unwrap();
        r.set_nodata(-9999.0);
        r
    }

    #[test]
    fn test_format_nodata() {
        assert_eq!(format_nodata(-9999.0), "-9999");
        assert_eq!(format_nodata(0.5), "0.5");
        assert_eq!(format_nodata(f32::NAN), "nan");
    }

    #[test]
    fn test_classic_header() {
        let bytes = CogEncoder::default().encode(&raster(40, 20)).unwrap();
        assert_eq!(&bytes[..4], &[b'I', b'I', 42, 0]);
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 8);
    }

    #[test]
    fn test_forced_bigtiff_header() {
        let encoder = CogEncoder::new(CogOptions {
            force_bigtiff: true,
            ..Default::default()
        });
        let bytes = encoder.encode(&raster(40, 20)).unwrap();
        assert_eq!(&bytes[..4], &[b'I', b'I', 43, 0]);
        assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), 16);
    }

    #[test]
    fn test_rejects_bad_tile_size() {
        let encoder = CogEncoder::new(CogOptions {
            tile_size: 100,
            ..Default::default()
        });
        assert!(matches!(
            encoder.encode(&raster(10, 10)),
            Err(CogError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_irregular_raster_is_rejected() {
        let r = Raster::new("bad", 3, 2, vec![0.0; 6], vec![0.0, 1.0, 4.0], vec![1.0, 0.0]).unwrap();
        assert!(CogEncoder::default().encode(&r).is_err());
    }
}
