//! Tile sizes for derived files.

use ucsf_core::header::AxisHeader;

/// Upper bound on `4 × samples per tile`, in bytes.
pub const TILE_BYTE_BUDGET: u64 = 32 * 1024;

/// Copy `axes` with tile sizes that fit [`TILE_BYTE_BUDGET`].
///
/// Every axis starts at half its point count (at least 1). While a tile is
/// too large, the largest tile size is halved, the first axis winning ties.
pub fn optimize_tile_size(axes: &[AxisHeader]) -> Vec<AxisHeader> {
    let mut sizes: Vec<u32> = axes.iter().map(|a| (a.data_points / 2).max(1)).collect();
    loop {
        let bytes = sizes.iter().fold(4u64, |acc, &s| acc * s as u64);
        if bytes < TILE_BYTE_BUDGET {
            break;
        }
        let mut largest = 0;
        for (i, &s) in sizes.iter().enumerate() {
            if s > sizes[largest] {
                largest = i;
            }
        }
        if sizes[largest] <= 1 {
            break;
        }
        sizes[largest] /= 2;
    }
    axes.iter()
        .zip(sizes)
        .map(|(a, ts)| a.with_tile_size(ts))
        .collect()
}
