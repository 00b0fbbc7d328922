//! Little-endian IFD serialization for classic TIFF and BigTIFF.

use std::collections::BTreeMap;

/// Typed field payload.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldValue {
    Short(Vec<u16>),
    Long(Vec<u32>),
    Long8(Vec<u64>),
    Double(Vec<f64>),
    Ascii(String),
}

impl FieldValue {
    fn field_type(&self) -> u16 {
        match self {
            FieldValue::Ascii(_) => 2,
            FieldValue::Short(_) => 3,
            FieldValue::Long(_) => 4,
            FieldValue::Double(_) => 12,
            FieldValue::Long8(_) => 16,
        }
    }

    fn count(&self) -> usize {
        match self {
            FieldValue::Short(v) => v.len(),
            FieldValue::Long(v) => v.len(),
            FieldValue::Long8(v) => v.len(),
            FieldValue::Double(v) => v.len(),
            // NUL terminated
            FieldValue::Ascii(s) => s.len() + 1,
        }
    }

    fn byte_len(&self) -> usize {
        match self {
            FieldValue::Short(v) => v.len() * 2,
            FieldValue::Long(v) => v.len() * 4,
            FieldValue::Long8(v) => v.len() * 8,
            FieldValue::Double(v) => v.len() * 8,
            FieldValue::Ascii(s) => s.len() + 1,
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            FieldValue::Short(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            FieldValue::Long(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            FieldValue::Long8(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            FieldValue::Double(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            FieldValue::Ascii(s) => {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
        }
    }
}

/// An image file directory, entries kept sorted by tag.
#[derive(Debug, Clone, Default)]
pub(crate) struct Ifd {
    entries: BTreeMap<u16, FieldValue>,
}

impl Ifd {
    pub(crate) fn set(&mut self, tag: u16, value: FieldValue) {
        self.entries.insert(tag, value);
    }

    fn inline_limit(big: bool) -> usize {
        if big {
            8
        } else {
            4
        }
    }

    fn table_len(&self, big: bool) -> usize {
        if big {
            8 + self.entries.len() * 20 + 8
        } else {
            2 + self.entries.len() * 12 + 4
        }
    }

    /// Bytes this IFD occupies including out-of-line values.
    pub(crate) fn encoded_len(&self, big: bool) -> usize {
        let limit = Self::inline_limit(big);
        self.table_len(big)
            + self
                .entries
                .values()
                .map(FieldValue::byte_len)
                .filter(|&len| len > limit)
                .map(|len| len + len % 2)
                .sum::<usize>()
    }

    /// Append this IFD at `out.len()`, which must be its absolute file offset.
    pub(crate) fn write(&self, out: &mut Vec<u8>, big: bool, next_ifd: u64) {
        let start = out.len();
        let limit = Self::inline_limit(big);
        let mut ool_cursor = start + self.table_len(big);
        let mut ool = Vec::new();

        if big {
            out.extend_from_slice(&(self.entries.len() as u64).to_le_bytes());
        } else {
            out.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        }

        for (tag, value) in &self.entries {
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&value.field_type().to_le_bytes());
            if big {
                out.extend_from_slice(&(value.count() as u64).to_le_bytes());
            } else {
                out.extend_from_slice(&(value.count() as u32).to_le_bytes());
            }

            let len = value.byte_len();
            if len <= limit {
                let mark = out.len();
                value.write(out);
                out.resize(mark + limit, 0);
            } else {
                if big {
                    out.extend_from_slice(&(ool_cursor as u64).to_le_bytes());
                } else {
                    out.extend_from_slice(&(ool_cursor as u32).to_le_bytes());
                }
                value.write(&mut ool);
                if len % 2 == 1 {
                    ool.push(0);
                }
                ool_cursor += len + len % 2;
            }
        }

        if big {
            out.extend_from_slice(&next_ifd.to_le_bytes());
        } else {
            out.extend_from_slice(&(next_ifd as u32).to_le_bytes());
        }
        out.extend_from_slice(&ool);
        debug_assert_eq!(out.len() - start, self.encoded_len(big));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_and_out_of_line_values() {
        let mut ifd = Ifd::default();
        ifd.set(256, FieldValue::Long(vec![100]));
        ifd.set(33550, FieldValue::Double(vec![1.0, 1.0, 0.0]));
        ifd.set(42113, FieldValue::Ascii("-9999".to_string()));

        let mut out = vec![0u8; 8];
        ifd.write(&mut out, false, 0);

        // 2 + 3*12 + 4 table, 24 bytes of doubles, 6 bytes of ascii
        assert_eq!(out.len() - 8, 2 + 36 + 4 + 24 + 6);
        assert_eq!(ifd.encoded_len(false), out.len() - 8);

        // First entry is tag 256 with the value inline
        assert_eq!(u16::from_le_bytes([out[10], out[11]]), 256);
        assert_eq!(u32::from_le_bytes([out[18], out[19], out[20], out[21]]), 100);

        // Doubles stored right after the table
        let offset = u32::from_le_bytes([out[30], out[31], out[32], out[33]]) as usize;
        assert_eq!(offset, 8 + 42);
    }

    #[test]
    fn test_bigtiff_inlines_eight_bytes() {
        let mut ifd = Ifd::default();
        ifd.set(324, FieldValue::Long8(vec![123_456_789_012]));
        assert_eq!(ifd.encoded_len(true), 8 + 20 + 8);
        assert_eq!(ifd.encoded_len(false), 2 + 12 + 4 + 8);
    }
}
