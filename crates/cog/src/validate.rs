//! Structural COG checks.
//!
//! Only the TIFF directory structure is inspected; pixel data is never
//! decompressed.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::tags;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CogValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub bigtiff: bool,
    /// (width, height) per IFD, full resolution first
    pub levels: Vec<(u64, u64)>,
}

/// Reasons the TIFF directory structure could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("not a TIFF file")]
    NotTiff,

    #[error("unknown TIFF version {0}")]
    UnknownVersion(u16),

    #[error("read of {len} bytes at {offset} past end of file")]
    PastEnd { offset: u64, len: usize },

    #[error("offset {base} + {add} overflows")]
    Overflow { base: u64, add: u64 },

    #[error("IFD at {offset} declares {count} entries, more than the file holds")]
    TooManyEntries { offset: u64, count: u64 },

    #[error("tag {tag} declares {count} values, more than the file holds")]
    TooManyValues { tag: u16, count: u64 },

    #[error("IFD chain loops")]
    ChainLoops,
}

type LayoutResult<T> = Result<T, LayoutError>;

fn add(base: u64, add: u64) -> LayoutResult<u64> {
    base.checked_add(add)
        .ok_or(LayoutError::Overflow { base, add })
}

struct ByteView<'a> {
    bytes: &'a [u8],
    little_endian: bool,
}

impl ByteView<'_> {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn slice<const N: usize>(&self, at: u64) -> LayoutResult<[u8; N]> {
        let past_end = LayoutError::PastEnd { offset: at, len: N };
        let start = usize::try_from(at).map_err(|_| past_end.clone())?;
        let end = start.checked_add(N).ok_or_else(|| past_end.clone())?;
        self.bytes
            .get(start..end)
            .and_then(|s| s.try_into().ok())
            .ok_or(past_end)
    }

    fn u16(&self, at: u64) -> LayoutResult<u16> {
        let b = self.slice::<2>(at)?;
        Ok(if self.little_endian {
            u16::from_le_bytes(b)
        } else {
            u16::from_be_bytes(b)
        })
    }

    fn u32(&self, at: u64) -> LayoutResult<u32> {
        let b = self.slice::<4>(at)?;
        Ok(if self.little_endian {
            u32::from_le_bytes(b)
        } else {
            u32::from_be_bytes(b)
        })
    }

    fn u64(&self, at: u64) -> LayoutResult<u64> {
        let b = self.slice::<8>(at)?;
        Ok(if self.little_endian {
            u64::from_le_bytes(b)
        } else {
            u64::from_be_bytes(b)
        })
    }
}

struct ParsedIfd {
    offset: u64,
    /// Integer-typed fields only
    fields: HashMap<u16, Vec<u64>>,
}

impl ParsedIfd {
    fn first(&self, tag: u16) -> Option<u64> {
        self.fields.get(&tag).and_then(|v| v.first().copied())
    }
}

fn parse(bytes: &[u8]) -> LayoutResult<(bool, Vec<ParsedIfd>)> {
    let little_endian = match bytes.get(..2) {
        Some(b"II") => true,
        Some(b"MM") => false,
        _ => return Err(LayoutError::NotTiff),
    };
    let view = ByteView {
        bytes,
        little_endian,
    };

    let big = match view.u16(2)? {
        42 => false,
        43 => true,
        other => return Err(LayoutError::UnknownVersion(other)),
    };

    let mut next = if big {
        view.u64(8)?
    } else {
        view.u32(4)? as u64
    };
    let mut ifds = Vec::new();

    while next != 0 {
        if ifds.iter().any(|i: &ParsedIfd| i.offset == next) {
            return Err(LayoutError::ChainLoops);
        }

        let (count, entry_start, entry_len) = if big {
            (view.u64(next)?, add(next, 8)?, 20u64)
        } else {
            (view.u16(next)? as u64, add(next, 2)?, 12u64)
        };
        let entries_len = count
            .checked_mul(entry_len)
            .filter(|&n| n <= view.len())
            .ok_or(LayoutError::TooManyEntries {
                offset: next,
                count,
            })?;

        let mut fields = HashMap::new();
        for e in 0..count {
            let at = add(entry_start, e * entry_len)?;
            let tag = view.u16(at)?;
            let field_type = view.u16(add(at, 2)?)?;
            let n = if big {
                view.u64(add(at, 4)?)?
            } else {
                view.u32(add(at, 4)?)? as u64
            };
            let size = match field_type {
                1 => 1u64,
                3 => 2,
                4 => 4,
                16 => 8,
                _ => continue,
            };
            let total = n
                .checked_mul(size)
                .filter(|&t| t <= view.len())
                .ok_or(LayoutError::TooManyValues { tag, count: n })?;

            let inline = if big { 8 } else { 4 };
            let value_at = if total <= inline {
                add(at, if big { 12 } else { 8 })?
            } else if big {
                view.u64(add(at, 12)?)?
            } else {
                view.u32(add(at, 8)?)? as u64
            };

            let values = (0..n)
                .map(|k| {
                    let p = add(value_at, k * size)?;
                    match size {
                        1 => view.slice::<1>(p).map(|b| b[0] as u64),
                        2 => view.u16(p).map(u64::from),
                        4 => view.u32(p).map(u64::from),
                        _ => view.u64(p),
                    }
                })
                .collect::<LayoutResult<Vec<u64>>>()?;
            fields.insert(tag, values);
        }

        ifds.push(ParsedIfd {
            offset: next,
            fields,
        });
        let next_at = add(entry_start, entries_len)?;
        next = if big {
            view.u64(next_at)?
        } else {
            view.u32(next_at)? as u64
        };
    }

    Ok((big, ifds))
}

/// Check that `bytes` is laid out as a Cloud Optimized GeoTIFF.
pub fn validate_cog(bytes: &[u8]) -> CogValidation {
    let mut report = CogValidation::default();

    let (big, ifds) = match parse(bytes) {
        Ok(parsed) => parsed,
        Err(e) => {
            report.errors.push(e.to_string());
            return report;
        }
    };
    report.bigtiff = big;

    if ifds.is_empty() {
        report.errors.push("file has no image directory".to_string());
        return report;
    }

    let mut data_ranges: Vec<(u64, u64)> = Vec::with_capacity(ifds.len());

    for (i, ifd) in ifds.iter().enumerate() {
        let width = ifd.first(tags::IMAGE_WIDTH).unwrap_or(0);
        let height = ifd.first(tags::IMAGE_LENGTH).unwrap_or(0);
        report.levels.push((width, height));

        if ifd.first(tags::TILE_WIDTH).is_none() || ifd.first(tags::TILE_LENGTH).is_none() {
            report.errors.push(format!("IFD {} is not tiled", i));
            continue;
        }

        let offsets = ifd.fields.get(&tags::TILE_OFFSETS).cloned().unwrap_or_default();
        let counts = ifd
            .fields
            .get(&tags::TILE_BYTE_COUNTS)
            .cloned()
            .unwrap_or_default();
        if offsets.is_empty() || offsets.len() != counts.len() {
            report
                .errors
                .push(format!("IFD {} has inconsistent tile offsets/byte counts", i));
            continue;
        }

        for (o, c) in offsets.iter().zip(&counts) {
            if o.checked_add(*c).map_or(true, |end| end > bytes.len() as u64) {
                report
                    .errors
                    .push(format!("IFD {} references tile data past end of file", i));
                break;
            }
        }

        let lo = offsets.iter().copied().min().unwrap_or(0);
        let hi = offsets.iter().copied().max().unwrap_or(0);
        data_ranges.push((lo, hi));

        if i > 0 {
            let (prev_w, prev_h) = report.levels[i - 1];
            if width > prev_w || height > prev_h {
                report.errors.push(format!(
                    "overview {} ({}x{}) is larger than the previous level ({}x{})",
                    i, width, height, prev_w, prev_h
                ));
            }
            if ifd.first(tags::NEW_SUBFILE_TYPE).unwrap_or(0) & 1 == 0 {
                report
                    .warnings
                    .push(format!("IFD {} is not flagged as reduced resolution", i));
            }
        }
    }

    let first_data = data_ranges.iter().map(|r| r.0).min().unwrap_or(u64::MAX);
    if ifds.iter().any(|ifd| ifd.offset > first_data) {
        report
            .errors
            .push("image directories must precede tile data".to_string());
    }

    // Smaller levels (later IFDs) must have their data earlier in the file.
    for i in 1..data_ranges.len() {
        if data_ranges[i].1 > data_ranges[i - 1].0 {
            report.errors.push(format!(
                "tile data of level {} must precede tile data of level {}",
                i,
                i - 1
            ));
        }
    }

    if let (Some(&(w, h)), Some(ifd)) = (report.levels.first(), ifds.first()) {
        let tw = ifd.first(tags::TILE_WIDTH).unwrap_or(u64::MAX);
        let th = ifd.first(tags::TILE_LENGTH).unwrap_or(u64::MAX);
        if (w > tw || h > th) && ifds.len() == 1 {
            report
                .warnings
                .push("image larger than one tile has no overviews".to_string());
        }
    }

    report.valid = report.errors.is_empty();
    report
}
