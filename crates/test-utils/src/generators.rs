//! Test data generators for synthetic gridded data.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

use cog_common::NODATA_SENTINEL;
use grid_processor::Raster;

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read/written correctly
/// by checking that grid[row][col] == col * 1000 + row.
///
/// # Arguments
///
/// * `width` - Number of columns
/// * `height` - Number of rows
///
/// # Returns
///
/// A `Vec<f32>` in row-major order (row 0 first, then row 1, etc.)
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50); // 10 * 5
/// assert_eq!(grid[0], 0.0);   // col=0, row=0 -> 0*1000 + 0
/// assert_eq!(grid[1], 1000.0); // col=1, row=0 -> 1*1000 + 0
/// assert_eq!(grid[10], 1.0);  // col=0, row=1 -> 0*1000 + 1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a sparse, non-negative grid resembling an emission inventory.
///
/// About a quarter of the cells carry a value in [0, 50); the rest are 0.
/// The pattern is deterministic for a given `seed`.
pub fn create_emission_grid(width: usize, height: usize, seed: u32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let hash = simple_hash(col as u32, row as u32, seed);
            let value = if hash % 4 == 0 {
                (hash % 5000) as f32 / 100.0
            } else {
                0.0
            };
            data.push(value);
        }
    }
    data
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

/// Creates a grid with NaN values at specified positions.
///
/// # Arguments
///
/// * `width` - Number of columns
/// * `height` - Number of rows
/// * `nan_positions` - List of (col, row) positions that should be NaN
///
/// # Returns
///
/// A `Vec<f32>` with NaN at specified positions, zeros elsewhere.
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = vec![0.0f32; width * height];
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}

// ============================================================================
// Coordinates
// ============================================================================

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![start; n];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + i as f64 * step).collect()
}

/// Pixel-centre longitudes of a global grid with `n` columns starting at
/// `west` (use `0.0` for a 0..360 grid, `-180.0` for -180..180).
pub fn lon_centers(n: usize, west: f64) -> Vec<f64> {
    let step = 360.0 / n as f64;
    (0..n).map(|i| west + (i as f64 + 0.5) * step).collect()
}

/// Pixel-centre latitudes of a global grid with `n` rows, south to north.
pub fn lat_centers(n: usize) -> Vec<f64> {
    let step = 180.0 / n as f64;
    (0..n).map(|i| -90.0 + (i as f64 + 0.5) * step).collect()
}

/// A north-up global WGS84 raster filled with [`create_test_grid`] values
/// and the harmonized nodata sentinel.
pub fn create_test_raster(width: usize, height: usize) -> Raster {
    let mut y = lat_centers(height);
    y.reverse();
    let mut raster = Raster::new(
        "test",
        width,
        height,
        create_test_grid(width, height),
        lon_centers(width, -180.0),
        y,
    )
    .expect("test raster dimensions are consistent");
    raster.set_nodata(NODATA_SENTINEL);
    raster
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_grid() {
        let grid = create_test_grid(3, 2);
        assert_eq!(grid, vec![0.0, 1000.0, 2000.0, 1.0, 1001.0, 2001.0]);
    }

    #[test]
    fn test_emission_grid_is_deterministic_and_sparse() {
        let a = create_emission_grid(50, 40, 7);
        let b = create_emission_grid(50, 40, 7);
        assert_eq!(a, b);
        let zeros = a.iter().filter(|&&v| v == 0.0).count();
        assert!(zeros > a.len() / 2);
        assert!(a.iter().all(|&v| (0.0..50.0).contains(&v)));
    }

    #[test]
    fn test_grid_with_nans() {
        let grid = create_grid_with_nans(4, 4, &[(1, 2), (9, 9)]);
        assert!(grid[2 * 4 + 1].is_nan());
        assert_eq!(grid.iter().filter(|v| v.is_nan()).count(), 1);
    }

    #[test]
    fn test_coordinates() {
        assert_eq!(linspace(0.0, 1.0, 3), vec![0.0, 0.5, 1.0]);
        assert_eq!(lon_centers(4, 0.0), vec![45.0, 135.0, 225.0, 315.0]);
        assert_eq!(lat_centers(2), vec![-45.0, 45.0]);
    }

    #[test]
    fn test_create_test_raster() {
        let raster = create_test_raster(8, 4);
        assert!(raster.is_north_up());
        assert_eq!(raster.nodata, Some(NODATA_SENTINEL));
        assert_eq!(raster.get(1, 0), Some(1000.0));
    }
}
