//! Command implementations behind the `ucsftool` subcommands.
//!
//! Each command opens its input, runs one library operation, records it
//! in the reproducibility log and returns what the CLI reports. Axes are
//! 1-based (`w1..wN`) at this level and converted before reaching the
//! libraries.

pub mod picking;
pub mod reshaping;

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use ucsf_io::{OpenOptions, ReadError, UcsfFile, WriteError};
use ucsf_pick::PickError;
use ucsf_transform::TransformError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Pick(#[from] PickError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

/// 0-based index of CLI axis `w{axis}`.
pub fn axis_index(axis: usize) -> Result<usize, PipelineError> {
    if axis == 0 {
        return Err(PipelineError::Usage("axes are numbered from w1".to_string()));
    }
    Ok(axis - 1)
}

pub fn open_spectrum(path: &Path, workers: usize) -> Result<UcsfFile, PipelineError> {
    let opts = OpenOptions::default().with_workers(workers);
    Ok(UcsfFile::open(path, &opts)?)
}

/// `<input stem>.<ext>` next to the input.
pub fn sibling_path(input: &Path, ext: &str) -> PathBuf {
    input.with_extension(ext)
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::Path;
    use ucsf_core::geometry::GridPoint;
    use ucsf_core::header::AxisHeader;

    pub fn write_spectrum<F>(path: &Path, points: &[u32], sample: F)
    where
        F: FnMut(&GridPoint) -> f32,
    {
        let axes: Vec<AxisHeader> = points
            .iter()
            .zip(["1H", "15N", "13C", "1H"])
            .enumerate()
            .map(|(i, (&p, nucleus))| AxisHeader {
                nucleus: nucleus.to_string(),
                data_points: p,
                tile_size: 8,
                spectrometer_freq: 600.0 / (i + 1) as f32,
                spectral_width: 3000.0,
                center: 5.0 + 50.0 * i as f32,
            })
            .collect();
        ucsf_io::write_spectrum(path, &axes, true, sample).unwrap();
    }

    /// Gaussian bump of `height` at `centre` on a floor of 1.0.
    pub fn bump(g: &GridPoint, centre: &[i64], height: f32) -> f32 {
        let d2: i64 = centre
            .iter()
            .enumerate()
            .map(|(i, c)| (g[i] - c) * (g[i] - c))
            .sum();
        1.0 + height * (-(d2 as f32) / 8.0).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_index() {
        assert_eq!(axis_index(1).unwrap(), 0);
        assert_eq!(axis_index(3).unwrap(), 2);
        assert!(matches!(axis_index(0), Err(PipelineError::Usage(_))));
    }

    #[test]
    fn test_sibling_path() {
        assert_eq!(
            sibling_path(Path::new("/data/hsqc.ucsf"), "list"),
            PathBuf::from("/data/hsqc.list")
        );
    }
}
