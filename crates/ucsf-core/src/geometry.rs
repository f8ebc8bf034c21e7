//! Tile geometry: grid point ↔ (tile index, remainder) ↔ file offset.
//!
//! The data region is a row-major sequence of tiles (last axis fastest),
//! and each tile is a row-major block of `f32` samples. Both levels use the
//! same stride formula, over tile counts and over tile sizes respectively.

use crate::header::{data_offset, AxisHeader, MAX_DIMS};
use thiserror::Error;

/// Tile coordinates, one per axis. Entries past `ndim` are zero.
pub type TileIndex = [i64; MAX_DIMS];
/// Absolute grid coordinates, one per axis. Entries past `ndim` are zero.
pub type GridPoint = [i64; MAX_DIMS];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("axis {axis} out of range for a {ndim}-dimensional spectrum")]
    AxisOutOfRange { axis: usize, ndim: usize },
    #[error("tile index {0:?} lies outside the data region")]
    TileOutOfRange(Vec<i64>),
    #[error("{0}")]
    Invalid(String),
}

/// Copy a coordinate slice into a fixed-size point, checking its length.
pub fn to_point(coords: &[i64], ndim: usize) -> Result<GridPoint, GeometryError> {
    if coords.len() != ndim {
        return Err(GeometryError::DimensionMismatch {
            expected: ndim,
            got: coords.len(),
        });
    }
    let mut pt = [0i64; MAX_DIMS];
    pt[..ndim].copy_from_slice(coords);
    Ok(pt)
}

/// Geometry of the tiled data region of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLayout {
    ndim: usize,
    data_points: [i64; MAX_DIMS],
    tile_size: [i64; MAX_DIMS],
    tile_count: [i64; MAX_DIMS],
    cube_size: usize,
    data_offset: u64,
}

impl TileLayout {
    pub fn new(axes: &[AxisHeader]) -> Result<Self, GeometryError> {
        let ndim = axes.len();
        if ndim == 0 || ndim > MAX_DIMS {
            return Err(GeometryError::Invalid(format!(
                "unsupported dimension count {}",
                ndim
            )));
        }

        let mut layout = Self {
            ndim,
            data_points: [1; MAX_DIMS],
            tile_size: [1; MAX_DIMS],
            tile_count: [1; MAX_DIMS],
            cube_size: 1,
            data_offset: data_offset(ndim),
        };
        for (i, ah) in axes.iter().enumerate() {
            if ah.tile_size == 0 || ah.data_points == 0 {
                return Err(GeometryError::Invalid(format!(
                    "axis {} has zero points or zero tile size",
                    i + 1
                )));
            }
            layout.data_points[i] = ah.data_points as i64;
            layout.tile_size[i] = ah.tile_size as i64;
            layout.tile_count[i] = ah.tile_count() as i64;
            layout.cube_size *= ah.tile_size as usize;
        }
        Ok(layout)
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    pub fn data_points(&self, axis: usize) -> i64 {
        self.data_points[axis]
    }

    pub fn tile_size(&self, axis: usize) -> i64 {
        self.tile_size[axis]
    }

    pub fn tile_count(&self, axis: usize) -> i64 {
        self.tile_count[axis]
    }

    /// Samples per tile.
    pub fn cube_size(&self) -> usize {
        self.cube_size
    }

    /// Bytes per tile.
    pub fn cube_bytes(&self) -> usize {
        self.cube_size * 4
    }

    /// Byte offset of the first tile (size of the header block).
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Total number of tiles in the file.
    pub fn tile_total(&self) -> usize {
        self.tile_count[..self.ndim].iter().product::<i64>() as usize
    }

    /// Expected file size for this geometry.
    pub fn file_bytes(&self) -> u64 {
        self.data_offset + (self.tile_total() * self.cube_bytes()) as u64
    }

    /// Grid point → (tile index, remainder within the tile). Uses floor
    /// division so coordinates just off the grid map to tile -1.
    pub fn grid_to_tile(&self, grid: &GridPoint) -> (TileIndex, GridPoint) {
        let mut tile = [0i64; MAX_DIMS];
        let mut rem = [0i64; MAX_DIMS];
        for i in 0..self.ndim {
            tile[i] = grid[i].div_euclid(self.tile_size[i]);
            rem[i] = grid[i].rem_euclid(self.tile_size[i]);
        }
        (tile, rem)
    }

    /// Inverse of [`grid_to_tile`](Self::grid_to_tile).
    pub fn tile_and_remainder_to_grid(&self, tile: &TileIndex, rem: &GridPoint) -> GridPoint {
        let mut grid = [0i64; MAX_DIMS];
        for i in 0..self.ndim {
            grid[i] = tile[i] * self.tile_size[i] + rem[i];
        }
        grid
    }

    /// Row-major offset of a remainder inside a tile, in samples.
    pub fn remainder_index(&self, rem: &GridPoint) -> usize {
        let mut idx = 0i64;
        for i in 0..self.ndim {
            idx = idx * self.tile_size[i] + rem[i];
        }
        idx as usize
    }

    /// Row-major position of a tile in the data region. May be negative or
    /// past the end for tiles outside the grid.
    pub fn tile_linear_index(&self, tile: &TileIndex) -> i64 {
        let mut idx = 0i64;
        for i in 0..self.ndim {
            idx = idx * self.tile_count[i] + tile[i];
        }
        idx
    }

    /// `data_offset + cube_bytes × linear index`.
    pub fn tile_byte_offset(&self, tile: &TileIndex) -> i64 {
        self.data_offset as i64 + self.cube_bytes() as i64 * self.tile_linear_index(tile)
    }

    /// Every component within `[0, tile_count)`.
    pub fn tile_in_range(&self, tile: &TileIndex) -> bool {
        (0..self.ndim).all(|i| tile[i] >= 0 && tile[i] < self.tile_count[i])
    }

    /// Every component within `[0, data_points)`.
    pub fn in_grid(&self, grid: &GridPoint) -> bool {
        (0..self.ndim).all(|i| grid[i] >= 0 && grid[i] < self.data_points[i])
    }

    /// Tile index of the `linear`-th tile in file order.
    pub fn tile_from_linear(&self, linear: usize) -> TileIndex {
        let mut tile = [0i64; MAX_DIMS];
        let mut pos = linear as i64;
        for i in (0..self.ndim).rev() {
            tile[i] = pos % self.tile_count[i];
            pos /= self.tile_count[i];
        }
        tile
    }

    /// Remainder of the `idx`-th sample of a tile in storage order.
    pub fn remainder_from_linear(&self, idx: usize) -> GridPoint {
        let mut rem = [0i64; MAX_DIMS];
        let mut pos = idx as i64;
        for i in (0..self.ndim).rev() {
            rem[i] = pos % self.tile_size[i];
            pos /= self.tile_size[i];
        }
        rem
    }

    /// Grid points of one tile in storage order.
    pub fn tile_points(&self, tile: &TileIndex) -> impl Iterator<Item = GridPoint> + '_ {
        let tile = *tile;
        (0..self.cube_size).map(move |j| {
            let rem = self.remainder_from_linear(j);
            self.tile_and_remainder_to_grid(&tile, &rem)
        })
    }
}
