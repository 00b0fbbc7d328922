//! GeoTIFF reading through the `tiff` crate.

use std::io::Cursor;
use std::path::Path;

use cog_common::{CogError, CogResult, Crs};
use grid_processor::{GeoTransform, Raster};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

use crate::tags::epsg_from_geo_keys;

fn tiff_err(err: tiff::TiffError) -> CogError {
    CogError::GeoTiffError(err.to_string())
}

/// Reads the first band of a GeoTIFF (or COG) as `f32`.
pub struct GeoTiffReader<'a> {
    name: String,
    decoder: Decoder<Cursor<&'a [u8]>>,
}

impl<'a> GeoTiffReader<'a> {
    pub fn new(name: impl Into<String>, bytes: &'a [u8]) -> CogResult<Self> {
        let decoder = Decoder::new(Cursor::new(bytes))
            .map_err(tiff_err)?
            .with_limits(Limits::unlimited());
        Ok(Self {
            name: name.into(),
            decoder,
        })
    }

    /// Full-resolution first band with georeferencing and nodata.
    pub fn read_raster(&mut self) -> CogResult<Raster> {
        let (width, height) = self.decoder.dimensions().map_err(tiff_err)?;
        let (width, height) = (width as usize, height as usize);

        let samples = match self.decoder.colortype().map_err(tiff_err)? {
            ColorType::Gray(_) | ColorType::Palette(_) => 1,
            ColorType::GrayA(_) => 2,
            ColorType::RGB(_) | ColorType::YCbCr(_) => 3,
            ColorType::RGBA(_) | ColorType::CMYK(_) => 4,
        };

        let values = decoding_to_f32(self.decoder.read_image().map_err(tiff_err)?)?;
        let data: Vec<f32> = if samples == 1 {
            values
        } else {
            values.iter().step_by(samples).copied().collect()
        };

        let gt = self.geotransform()?;
        let mut raster = Raster::from_geotransform(self.name.clone(), width, height, data, gt)?;
        raster.nodata = self.nodata()?;
        raster.crs = self.crs()?;

        debug!(name = %self.name, width, height, nodata = ?raster.nodata, "Read GeoTIFF");
        Ok(raster)
    }

    /// Number of reduced-resolution images after the first.
    pub fn overview_count(mut self) -> CogResult<usize> {
        let mut count = 0;
        while self.decoder.more_images() {
            self.decoder.next_image().map_err(tiff_err)?;
            count += 1;
        }
        Ok(count)
    }

    fn tag_f64s(&mut self, tag: Tag) -> CogResult<Option<Vec<f64>>> {
        match self.decoder.find_tag(tag).map_err(tiff_err)? {
            Some(v) => Ok(Some(v.into_f64_vec().map_err(tiff_err)?)),
            None => Ok(None),
        }
    }

    fn geotransform(&mut self) -> CogResult<GeoTransform> {
        let scale = self.tag_f64s(Tag::ModelPixelScaleTag)?;
        let tiepoint = self.tag_f64s(Tag::ModelTiepointTag)?;

        if let (Some(s), Some(t)) = (scale, tiepoint) {
            if s.len() >= 2 && t.len() >= 6 {
                return Ok(GeoTransform {
                    origin_x: t[3] - t[0] * s[0],
                    pixel_width: s[0],
                    origin_y: t[4] + t[1] * s[1],
                    pixel_height: -s[1],
                });
            }
        }

        if let Some(m) = self.tag_f64s(Tag::ModelTransformationTag)? {
            if m.len() >= 8 && m[1] == 0.0 && m[4] == 0.0 {
                return Ok(GeoTransform {
                    origin_x: m[3],
                    pixel_width: m[0],
                    origin_y: m[7],
                    pixel_height: m[5],
                });
            }
        }

        Err(CogError::GeoTiffError(format!(
            "{} has no usable georeferencing",
            self.name
        )))
    }

    fn nodata(&mut self) -> CogResult<Option<f32>> {
        let Some(value) = self.decoder.find_tag(Tag::GdalNodata).map_err(tiff_err)? else {
            return Ok(None);
        };
        let text = value.into_string().map_err(tiff_err)?;
        let text = text.trim_matches(char::from(0)).trim();
        text.parse::<f32>()
            .map(Some)
            .map_err(|_| CogError::GeoTiffError(format!("invalid GDAL_NODATA '{}'", text)))
    }

    fn crs(&mut self) -> CogResult<Crs> {
        let Some(value) = self.decoder.find_tag(Tag::GeoKeyDirectoryTag).map_err(tiff_err)? else {
            return Ok(Crs::wgs84());
        };
        let keys: Vec<u16> = value
            .into_u32_vec()
            .map_err(tiff_err)?
            .into_iter()
            .map(|k| k as u16)
            .collect();
        Ok(epsg_from_geo_keys(&keys)
            .map(Crs::from_epsg)
            .unwrap_or_default())
    }
}

/// Read a GeoTIFF held in memory.
pub fn read_geotiff(name: &str, bytes: &[u8]) -> CogResult<Raster> {
    GeoTiffReader::new(name, bytes)?.read_raster()
}

/// Read a GeoTIFF file; the raster is named after the file stem.
pub fn read_geotiff_file(path: impl AsRef<Path>) -> CogResult<Raster> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    read_geotiff(&name, &bytes)
}

fn decoding_to_f32(result: DecodingResult) -> CogResult<Vec<f32>> {
    Ok(match result {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(CogError::GeoTiffError(
                "unsupported sample format".to_string(),
            ))
        }
    })
}
