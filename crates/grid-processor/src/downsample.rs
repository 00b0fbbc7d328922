//! Downsampling for COG overview levels.
//!
//! Each level halves the previous one (rounding up, so edge blocks may be
//! partial) until it fits in a single tile.

use serde::{Deserialize, Serialize};

/// Method used to combine a 2x2 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownsampleMethod {
    /// Average of the valid cells in the block
    #[default]
    Average,
    /// Top-left cell of the block
    Nearest,
    /// Maximum of the valid cells
    Max,
}

/// Downsample a row-major grid by a factor of 2.
///
/// Cells that are NaN or equal to `nodata` are ignored; a block with no
/// valid cell becomes `nodata` (or NaN when there is none).
///
/// Returns `(data, new_width, new_height)` with dimensions rounded up.
pub fn downsample_2x(
    data: &[f32],
    width: usize,
    height: usize,
    method: DownsampleMethod,
    nodata: Option<f32>,
) -> (Vec<f32>, usize, usize) {
    let new_width = width.div_ceil(2);
    let new_height = height.div_ceil(2);
    let missing = nodata.unwrap_or(f32::NAN);
    let is_valid = |v: f32| !v.is_nan() && nodata.map_or(true, |nd| v != nd);

    let mut output = vec![missing; new_width * new_height];
    let mut block = [0.0f32; 4];

    for out_y in 0..new_height {
        for out_x in 0..new_width {
            let mut count = 0;
            for (dy, dx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                let (x, y) = (out_x * 2 + dx, out_y * 2 + dy);
                if x < width && y < height {
                    let v = data[y * width + x];
                    if is_valid(v) {
                        block[count] = v;
                        count += 1;
                    } else if dx == 0 && dy == 0 && method == DownsampleMethod::Nearest {
                        break;
                    }
                }
            }

            if count == 0 {
                continue;
            }
            output[out_y * new_width + out_x] = match method {
                DownsampleMethod::Average => {
                    block[..count].iter().map(|&v| v as f64).sum::<f64>() as f32 / count as f32
                }
                DownsampleMethod::Max => block[..count]
                    .iter()
                    .copied()
                    .fold(f32::NEG_INFINITY, f32::max),
                DownsampleMethod::Nearest => block[0],
            };
        }
    }

    (output, new_width, new_height)
}

/// One reduced-resolution level.
#[derive(Debug, Clone)]
pub struct OverviewLevel {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    /// Decimation factor relative to full resolution (2, 4, 8, ...)
    pub scale: u32,
}

/// Generate overview levels until a level fits in one `tile_size` tile.
///
/// Full resolution is not included. A grid that already fits in one tile
/// gets no overviews.
pub fn generate_overviews(
    data: &[f32],
    width: usize,
    height: usize,
    tile_size: usize,
    method: DownsampleMethod,
    nodata: Option<f32>,
) -> Vec<OverviewLevel> {
    let mut levels: Vec<OverviewLevel> = Vec::new();
    let (mut w, mut h) = (width, height);
    let mut scale = 1u32;

    while w > tile_size || h > tile_size {
        let source = levels.last().map_or(data, |l| l.data.as_slice());
        let (next, nw, nh) = downsample_2x(source, w, h, method, nodata);
        scale *= 2;
        levels.push(OverviewLevel {
            data: next,
            width: nw,
            height: nh,
            scale,
        });
        w = nw;
        h = nh;
    }

    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downsample_2x_average() {
        // 4x4 grid with values 1-16
        let data: Vec<f32> = (1..=16).map(|x| x as f32).collect();
        let (result, w, h) = downsample_2x(&data, 4, 4, DownsampleMethod::Average, None);

        assert_eq!((w, h), (2, 2));
        // Top-left 2x2 block: 1,2,5,6 -> mean = 3.5
        assert!((result[0] - 3.5).abs() < 0.001);
        // Top-right 2x2 block: 3,4,7,8 -> mean = 5.5
        assert!((result[1] - 5.5).abs() < 0.001);
    }

    #[test]
    fn test_downsample_2x_max_and_nearest() {
        let data: Vec<f32> = (1..=16).map(|x| x as f32).collect();
        let (max, _, _) = downsample_2x(&data, 4, 4, DownsampleMethod::Max, None);
        assert_eq!(max[0], 6.0);
        assert_eq!(max[1], 8.0);

        let (nearest, _, _) = downsample_2x(&data, 4, 4, DownsampleMethod::Nearest, None);
        assert_eq!(nearest[0], 1.0);
        assert_eq!(nearest[1], 3.0);
    }

    #[test]
    fn test_downsample_ignores_nodata() {
        let data = vec![1.0, -9999.0, 3.0, f32::NAN];
        let (result, w, h) = downsample_2x(&data, 2, 2, DownsampleMethod::Average, Some(-9999.0));
        assert_eq!((w, h), (1, 1));
        assert!((result[0] - 2.0).abs() < 1e-6);

        let empty = vec![-9999.0; 4];
        let (result, _, _) = downsample_2x(&empty, 2, 2, DownsampleMethod::Average, Some(-9999.0));
        assert_eq!(result[0], -9999.0);
    }

    #[test]
    fn test_downsample_odd_dimensions_round_up() {
        // 3x3: right column and bottom row form partial blocks
        let data: Vec<f32> = (0..9).map(|x| x as f32).collect();
        let (result, w, h) = downsample_2x(&data, 3, 3, DownsampleMethod::Average, None);
        assert_eq!((w, h), (2, 2));
        assert_eq!(result[1], (2.0 + 5.0) / 2.0);
        assert_eq!(result[2], (6.0 + 7.0) / 2.0);
        assert_eq!(result[3], 8.0);
    }

    #[test]
    fn test_generate_overviews_until_one_tile() {
        let data = vec![1.0f32; 1100 * 600];
        let levels = generate_overviews(&data, 1100, 600, 256, DownsampleMethod::Average, None);

        let dims: Vec<(usize, usize)> = levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(dims, vec![(550, 300), (275, 150), (138, 75)]);
        assert_eq!(levels.last().map(|l| l.scale), Some(8));
    }

    #[test]
    fn test_no_overviews_for_single_tile() {
        let data = vec![0.0f32; 100];
        assert!(generate_overviews(&data, 10, 10, 512, DownsampleMethod::Average, None).is_empty());
    }
}
