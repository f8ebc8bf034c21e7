//! Derived UCSF files: value transforms, projections, plane splits, axis
//! swaps and centre shifts.
//!
//! Every writer validates its geometry before creating the output, refuses
//! to replace an existing file unless asked to, and writes tiles strictly in
//! file order. Axes are 0-based.

pub mod error;
pub mod planes;
pub mod projection;
pub mod reshape;
pub mod tiling;
pub mod transform;

pub use error::TransformError;
pub use planes::{auto_split_axis, plane_file_names, write_planes, PlaneOptions};
pub use projection::{write_projection, ProjectionMode, Reducer, SampleFilter};
pub use reshape::{write_shifted, write_swapped_axes};
pub use tiling::optimize_tile_size;
pub use transform::{write_transform, Transform, TransformMode};

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::Path;
    use ucsf_core::geometry::GridPoint;
    use ucsf_core::header::AxisHeader;

    pub fn axis(nucleus: &str, points: u32) -> AxisHeader {
        AxisHeader {
            nucleus: nucleus.to_string(),
            data_points: points,
            tile_size: points,
            spectrometer_freq: 80.0,
            spectral_width: 2400.0,
            center: 118.0,
        }
    }

    pub fn write_cube<F>(path: &Path, points: &[u32], tiles: &[u32], sample: F)
    where
        F: FnMut(&GridPoint) -> f32,
    {
        let axes: Vec<AxisHeader> = points
            .iter()
            .zip(tiles)
            .map(|(&p, &t)| axis("13C", p).with_tile_size(t))
            .collect();
        ucsf_io::write_spectrum(path, &axes, true, sample).unwrap();
    }
}
