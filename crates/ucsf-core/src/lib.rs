//! UCSF core types: file and axis headers, tile geometry, and the
//! grid ↔ ppm coordinate mapping.
//!
//! UCSF is the tiled big-endian format Sparky uses for NMR spectra of one
//! to four dimensions.

pub mod coords;
pub mod enums;
pub mod geometry;
pub mod header;

pub use coords::*;
pub use enums::*;
pub use geometry::*;
pub use header::*;
