//! Per-worker tile reader with a bounded most-recently-used cache.
//!
//! A [`TileReader`] owns one file handle and one cache. Workers never share
//! a reader, so lookups need no locking; the only shared state is the
//! optional whole-file buffer, which is read-only.

use crate::reader::ReadError;
use crate::samples::unpack_samples;
use lru::LruCache;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::sync::Arc;
use ucsf_core::geometry::{GeometryError, GridPoint, TileIndex, TileLayout};

/// Default number of tiles kept per worker.
pub const DEFAULT_TILE_CACHE: usize = 256;

/// One tile of samples. Cloning shares the sample buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub position: TileIndex,
    pub values: Arc<[f32]>,
}

/// Cache hit/miss counters of one reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Tiles substituted with zeros because they fell outside the data region.
    pub zero_fills: u64,
}

pub struct TileReader {
    layout: Arc<TileLayout>,
    file: File,
    file_size: u64,
    whole_file: Option<Arc<[u8]>>,
    cache: LruCache<TileIndex, Tile>,
    zero: Arc<[f32]>,
    strict: bool,
    stats: CacheStats,
}

impl TileReader {
    pub(crate) fn new(
        layout: Arc<TileLayout>,
        file: File,
        file_size: u64,
        whole_file: Option<Arc<[u8]>>,
        capacity: usize,
        strict: bool,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let zero: Arc<[f32]> = vec![0.0f32; layout.cube_size()].into();
        Self {
            layout,
            file,
            file_size,
            whole_file,
            cache: LruCache::new(capacity),
            zero,
            strict,
            stats: CacheStats::default(),
        }
    }

    pub fn layout(&self) -> &TileLayout {
        &self.layout
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of tiles currently cached.
    pub fn cached_tiles(&self) -> usize {
        self.cache.len()
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    /// Fetch a tile, promoting it to most recently used. A miss reads the
    /// tile and may evict the least recently used one.
    pub fn read_tile(&mut self, tile: &TileIndex) -> Result<Tile, ReadError> {
        if let Some(hit) = self.cache.get(tile) {
            self.stats.hits += 1;
            return Ok(hit.clone());
        }
        let loaded = self.load_tile(tile)?;
        self.cache.put(*tile, loaded.clone());
        Ok(loaded)
    }

    /// Value at one grid point.
    pub fn value(&mut self, grid: &GridPoint) -> Result<f32, ReadError> {
        let (tile, rem) = self.layout.grid_to_tile(grid);
        let idx = self.layout.remainder_index(&rem);
        if let Some(hit) = self.cache.get(&tile) {
            self.stats.hits += 1;
            return Ok(hit.values[idx]);
        }
        let loaded = self.load_tile(&tile)?;
        let v = loaded.values[idx];
        self.cache.put(tile, loaded);
        Ok(v)
    }

    fn load_tile(&mut self, tile: &TileIndex) -> Result<Tile, ReadError> {
        self.stats.misses += 1;

        let cube_bytes = self.layout.cube_bytes() as i64;
        let offset = self.layout.tile_byte_offset(tile);
        let outside = !self.layout.tile_in_range(tile)
            || offset < self.layout.data_offset() as i64
            || offset + cube_bytes > self.file_size as i64;
        if outside {
            if self.strict {
                return Err(GeometryError::TileOutOfRange(
                    tile[..self.layout.ndim()].to_vec(),
                )
                .into());
            }
            log::debug!(
                "tile {:?} lies outside the data region, substituting zeros",
                &tile[..self.layout.ndim()]
            );
            self.stats.zero_fills += 1;
            return Ok(Tile {
                position: *tile,
                values: Arc::clone(&self.zero),
            });
        }

        let start = offset as usize;
        let end = start + cube_bytes as usize;
        let values = match &self.whole_file {
            Some(buf) => unpack_samples(&buf[start..end]),
            None => {
                let mut raw = vec![0u8; cube_bytes as usize];
                self.file.seek(SeekFrom::Start(offset as u64))?;
                self.file.read_exact(&mut raw)?;
                unpack_samples(&raw)
            }
        };
        Ok(Tile {
            position: *tile,
            values: values.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_test_file;
    use ucsf_core::geometry::to_point;

    fn reader_for(path: &std::path::Path, capacity: usize, strict: bool) -> TileReader {
        let file = File::open(path).unwrap();
        let size = file.metadata().unwrap().len();
        let mut head = vec![0u8; 180 + 2 * 128];
        File::open(path).unwrap().read_exact(&mut head).unwrap();
        let axes: Vec<_> = (0..2)
            .map(|i| {
                let off = 180 + i * 128;
                ucsf_core::header::decode_axis_header(&head[off..off + 128], i).unwrap()
            })
            .collect();
        let layout = Arc::new(TileLayout::new(&axes).unwrap());
        TileReader::new(layout, file, size, None, capacity, strict)
    }

    #[test]
    fn test_value_matches_source_grid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.ucsf");
        write_test_file(&path, &[6, 5], &[4, 2], |g| (g[0] * 10 + g[1]) as f32);

        let mut reader = reader_for(&path, 8, false);
        for x in 0..6 {
            for y in 0..5 {
                let v = reader.value(&to_point(&[x, y], 2).unwrap()).unwrap();
                assert_eq!(v, (x * 10 + y) as f32);
            }
        }
    }

    #[test]
    fn test_cache_bounded_and_promotes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.ucsf");
        write_test_file(&path, &[8, 8], &[2, 2], |_| 1.0);

        let mut reader = reader_for(&path, 2, false);
        reader.read_tile(&[0, 0, 0, 0]).unwrap();
        reader.read_tile(&[0, 1, 0, 0]).unwrap();
        // touch the first so the second becomes the eviction victim
        reader.read_tile(&[0, 0, 0, 0]).unwrap();
        reader.read_tile(&[1, 0, 0, 0]).unwrap();
        assert_eq!(reader.cached_tiles(), 2);

        let before = reader.stats();
        reader.read_tile(&[0, 0, 0, 0]).unwrap();
        assert_eq!(reader.stats().hits, before.hits + 1);
        reader.read_tile(&[0, 1, 0, 0]).unwrap();
        assert_eq!(reader.stats().misses, before.misses + 1);
    }

    #[test]
    fn test_out_of_range_tile_lenient_and_strict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.ucsf");
        write_test_file(&path, &[4, 4], &[2, 2], |_| 3.0);

        let mut lenient = reader_for(&path, 4, false);
        let tile = lenient.read_tile(&[-1, 0, 0, 0]).unwrap();
        assert!(tile.values.iter().all(|&v| v == 0.0));
        assert_eq!(lenient.value(&to_point(&[4, 0], 2).unwrap()).unwrap(), 0.0);
        assert_eq!(lenient.stats().zero_fills, 2);

        let mut strict = reader_for(&path, 4, true);
        assert!(matches!(
            strict.read_tile(&[2, 0, 0, 0]),
            Err(ReadError::Geometry(GeometryError::TileOutOfRange(_)))
        ));
    }

    #[test]
    fn test_truncated_data_region_zero_filled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.ucsf");
        write_test_file(&path, &[4, 4], &[2, 2], |_| 5.0);
        let full = std::fs::metadata(&path).unwrap().len();
        let f = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        f.set_len(full - 4).unwrap();

        let mut reader = reader_for(&path, 4, false);
        assert_eq!(reader.value(&to_point(&[0, 0], 2).unwrap()).unwrap(), 5.0);
        assert_eq!(reader.value(&to_point(&[3, 3], 2).unwrap()).unwrap(), 0.0);
    }
}
