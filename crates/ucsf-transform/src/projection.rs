//! Projections: collapse one axis of a 3D or 4D spectrum.

use crate::error::{check_axis, check_reducible, TransformError};
use crate::tiling::optimize_tile_size;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use ucsf_core::geometry::GridPoint;
use ucsf_core::header::{AxisHeader, FileHeader, MAX_DIMS};
use ucsf_io::{UcsfFile, UcsfWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Average,
    Sum,
    Min,
    Max,
}

/// Which samples along the projected axis take part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFilter {
    All,
    /// Values `> 0` only.
    Positive,
    /// Values `< 0` only.
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionMode {
    pub reducer: Reducer,
    pub filter: SampleFilter,
    /// Take absolute values before filtering.
    pub absolute: bool,
}

impl ProjectionMode {
    pub fn new(reducer: Reducer, filter: SampleFilter) -> Self {
        Self {
            reducer,
            filter,
            absolute: false,
        }
    }

    /// Maximum of absolute values, ignoring zeros.
    pub fn absolute() -> Self {
        Self {
            reducer: Reducer::Max,
            filter: SampleFilter::Positive,
            absolute: true,
        }
    }

    /// Reduce one line of samples. No admitted sample gives 0.
    pub fn reduce(&self, values: &[f32]) -> f32 {
        let admitted = values
            .iter()
            .map(|&v| if self.absolute { v.abs() } else { v })
            .filter(|&v| match self.filter {
                SampleFilter::All => true,
                SampleFilter::Positive => v > 0.0,
                SampleFilter::Negative => v < 0.0,
            });

        let mut count = 0usize;
        let mut sum = 0.0f64;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for v in admitted {
            count += 1;
            sum += v as f64;
            min = min.min(v);
            max = max.max(v);
        }
        if count == 0 {
            return 0.0;
        }
        match self.reducer {
            Reducer::Average => (sum / count as f64) as f32,
            Reducer::Sum => sum as f32,
            Reducer::Min => min,
            Reducer::Max => max,
        }
    }
}

impl FromStr for ProjectionMode {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_lowercase();
        if s == "abs" || s == "absolute" {
            return Ok(Self::absolute());
        }
        let (filter, rest) = if let Some(r) = s.strip_prefix("pos_") {
            (SampleFilter::Positive, r)
        } else if let Some(r) = s.strip_prefix("neg_") {
            (SampleFilter::Negative, r)
        } else {
            (SampleFilter::All, s.as_str())
        };
        let reducer = match rest {
            "avg" => Reducer::Average,
            "sum" => Reducer::Sum,
            "min" => Reducer::Min,
            "max" => Reducer::Max,
            _ => {
                return Err(TransformError::InvalidMode(format!(
                    "'{}' (expected avg, sum, min, max with optional pos_/neg_ prefix, or abs)",
                    s
                )))
            }
        };
        Ok(Self::new(reducer, filter))
    }
}

impl fmt::Display for ProjectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            return write!(f, "abs");
        }
        let prefix = match self.filter {
            SampleFilter::All => "",
            SampleFilter::Positive => "pos_",
            SampleFilter::Negative => "neg_",
        };
        let name = match self.reducer {
            Reducer::Average => "avg",
            Reducer::Sum => "sum",
            Reducer::Min => "min",
            Reducer::Max => "max",
        };
        write!(f, "{}{}", prefix, name)
    }
}

/// Insert a coordinate for `axis` into an (N−1)-dimensional point.
pub(crate) fn insert_axis(g: &GridPoint, axis: usize, ndim: usize, value: i64) -> GridPoint {
    let mut out = [0i64; MAX_DIMS];
    let mut j = 0;
    for (i, slot) in out.iter_mut().enumerate().take(ndim) {
        if i == axis {
            *slot = value;
        } else {
            *slot = g[j];
            j += 1;
        }
    }
    out
}

/// Headers of `file` with `axis` removed and re-optimised tile sizes.
pub(crate) fn reduced_headers(file: &UcsfFile, axis: usize) -> (FileHeader, Vec<AxisHeader>) {
    let kept: Vec<AxisHeader> = file
        .axes()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != axis)
        .map(|(_, a)| a.clone())
        .collect();
    let header = FileHeader {
        dim_count: kept.len() as u8,
        ..file.header().clone()
    };
    (header, optimize_tile_size(&kept))
}

/// Write the projection of `file` along 0-based `axis`.
pub fn write_projection(
    file: &mut UcsfFile,
    out: &Path,
    axis: usize,
    mode: ProjectionMode,
    overwrite: bool,
) -> Result<(), TransformError> {
    let ndim = file.ndim();
    check_reducible(ndim, "projection")?;
    check_axis(axis, ndim)?;

    let (header, axes) = reduced_headers(file, axis);
    let depth = file.layout().data_points(axis);
    let mut writer = UcsfWriter::create(out, &header, &axes, overwrite)?;

    let mut line = Vec::with_capacity(depth as usize);
    writer.fill_tiles(|g| -> Result<f32, TransformError> {
        line.clear();
        let mut src = insert_axis(g, axis, ndim, 0);
        for k in 0..depth {
            src[axis] = k;
            line.push(file.value_at(&src)?);
        }
        Ok(mode.reduce(&line))
    })?;
    writer.finish()?;
    log::info!("Wrote {} projection of w{} to {}", mode, axis + 1, out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_cube;
    use ucsf_io::OpenOptions;

    #[test]
    fn test_parse_modes() {
        let m: ProjectionMode = "pos_avg".parse().unwrap();
        assert_eq!(m, ProjectionMode::new(Reducer::Average, SampleFilter::Positive));
        assert_eq!("abs".parse::<ProjectionMode>().unwrap(), ProjectionMode::absolute());
        assert_eq!("neg_min".parse::<ProjectionMode>().unwrap().to_string(), "neg_min");
        assert!("median".parse::<ProjectionMode>().is_err());
    }

    #[test]
    fn test_reduce() {
        let line = [3.0, -1.0, 0.0, -4.0, 2.0];
        let mode = |s: &str| s.parse::<ProjectionMode>().unwrap();
        assert_eq!(mode("avg").reduce(&line), 0.0);
        assert_eq!(mode("sum").reduce(&line), 0.0);
        assert_eq!(mode("min").reduce(&line), -4.0);
        assert_eq!(mode("max").reduce(&line), 3.0);
        assert_eq!(mode("pos_avg").reduce(&line), 2.5);
        assert_eq!(mode("neg_sum").reduce(&line), -5.0);
        assert_eq!(mode("abs").reduce(&line), 4.0);
        assert_eq!(mode("neg_max").reduce(&[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_insert_axis() {
        assert_eq!(insert_axis(&[4, 5, 0, 0], 1, 3, 9), [4, 9, 5, 0]);
        assert_eq!(insert_axis(&[4, 5, 0, 0], 2, 3, 9), [4, 5, 9, 0]);
    }

    #[test]
    fn test_write_projection_3d() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("cube.ucsf");
        let dst = dir.path().join("proj.ucsf");
        write_cube(&src, &[4, 3, 5], &[2, 2, 2], |g| (g[0] * 100 + g[1] * 10 + g[2]) as f32);

        let mut file = UcsfFile::open(&src, &OpenOptions::default()).unwrap();
        write_projection(&mut file, &dst, 1, "max".parse().unwrap(), false).unwrap();

        let mut proj = UcsfFile::open(&dst, &OpenOptions::default()).unwrap();
        assert_eq!(proj.ndim(), 2);
        assert_eq!(proj.axes()[0].data_points, 4);
        assert_eq!(proj.axes()[1].data_points, 5);
        for x in 0..4 {
            for z in 0..5 {
                assert_eq!(proj.value(&[x, z]).unwrap(), (x * 100 + 20 + z) as f32);
            }
        }
    }

    #[test]
    fn test_projection_needs_three_dims() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("plane.ucsf");
        let dst = dir.path().join("proj.ucsf");
        write_cube(&src, &[4, 4], &[2, 2], |_| 1.0);

        let mut file = UcsfFile::open(&src, &OpenOptions::default()).unwrap();
        let err = write_projection(&mut file, &dst, 0, ProjectionMode::absolute(), false);
        assert!(matches!(err, Err(TransformError::Geometry(_))));
        assert!(!dst.exists());
    }
}
