//! UCSF file I/O: a read session with per-worker tile caches, and a tile
//! writer with an overwrite guard.

pub mod reader;
pub mod samples;
pub mod tile;
pub mod writer;

pub use reader::{OpenOptions, ReadError, UcsfFile};
pub use tile::{CacheStats, Tile, TileReader, DEFAULT_TILE_CACHE};
pub use writer::{check_output, create_output, write_spectrum, UcsfWriter, WriteError};
