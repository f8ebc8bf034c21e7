//! Split a 3D or 4D spectrum into (N−1)-dimensional planes.

use crate::error::{check_axis, check_reducible, TransformError};
use crate::projection::{insert_axis, reduced_headers};
use std::path::{Path, PathBuf};
use ucsf_core::header::AxisHeader;
use ucsf_io::{check_output, UcsfFile, UcsfWriter};

/// Nuclei that are usually real spectral dimensions.
const COMMON_NUCLEI: [&str; 3] = ["1H", "15N", "13C"];

#[derive(Debug, Clone, PartialEq)]
pub struct PlaneOptions {
    /// 0-based axis to split along; chosen by [`auto_split_axis`] when unset.
    pub axis: Option<usize>,
    /// Write planes from the last index down.
    pub reverse: bool,
    /// Number of the first plane.
    pub start: f64,
    /// Increment between plane numbers.
    pub step: f64,
    pub overwrite: bool,
}

impl Default for PlaneOptions {
    fn default() -> Self {
        Self {
            axis: None,
            reverse: false,
            start: 1.0,
            step: 1.0,
            overwrite: false,
        }
    }
}

/// First axis whose nucleus is not 1H, 15N or 13C (e.g. a relaxation or
/// time axis); failing that, the axis with the fewest points.
pub fn auto_split_axis(axes: &[AxisHeader]) -> usize {
    if let Some(i) = axes
        .iter()
        .position(|a| !COMMON_NUCLEI.contains(&a.nucleus.as_str()))
    {
        return i;
    }
    let mut best = 0;
    for (i, a) in axes.iter().enumerate() {
        if a.data_points < axes[best].data_points {
            best = i;
        }
    }
    best
}

/// `{prefix}_{n}.ucsf` for `count` planes numbered `start, start + step, …`.
///
/// Integral start and step give zero-padded integers, padded to the width
/// of `step × count + start`; otherwise numbers get three decimals.
pub fn plane_file_names(prefix: &str, count: usize, start: f64, step: f64) -> Vec<PathBuf> {
    let max_num = step * count as f64 + start;
    let integral = start.fract() == 0.0 && step.fract() == 0.0;
    (0..count)
        .map(|i| {
            let n = step * i as f64 + start;
            let label = if integral {
                let n = n as i64;
                match max_num {
                    m if m < 10.0 || m >= 100_000.0 => format!("{}", n),
                    m if m < 100.0 => format!("{:02}", n),
                    m if m < 1000.0 => format!("{:03}", n),
                    m if m < 10_000.0 => format!("{:04}", n),
                    _ => format!("{:05}", n),
                }
            } else {
                match max_num {
                    m if m < 10.0 => format!("{:05.3}", n),
                    m if m < 100.0 => format!("{:06.3}", n),
                    m if m < 1000.0 => format!("{:07.3}", n),
                    m if m < 10_000.0 => format!("{:08.3}", n),
                    m if m < 100_000.0 => format!("{:09.3}", n),
                    _ => format!("{:.3}", n),
                }
            };
            PathBuf::from(format!("{}_{}.ucsf", prefix, label))
        })
        .collect()
}

/// Write one file per index along the split axis. Every output name is
/// checked before the first file is written. Returns the files in the
/// order written.
pub fn write_planes(
    file: &mut UcsfFile,
    prefix: &str,
    opts: &PlaneOptions,
) -> Result<Vec<PathBuf>, TransformError> {
    let ndim = file.ndim();
    check_reducible(ndim, "plane split")?;
    let axis = opts.axis.unwrap_or_else(|| auto_split_axis(file.axes()));
    check_axis(axis, ndim)?;

    let (header, axes) = reduced_headers(file, axis);
    let depth = file.layout().data_points(axis);
    let names = plane_file_names(prefix, depth as usize, opts.start, opts.step);
    for name in &names {
        check_output(name, opts.overwrite)?;
    }
    log::info!("Splitting w{} into {} planes", axis + 1, depth);

    for (i, name) in names.iter().enumerate() {
        let index = if opts.reverse { depth - 1 - i as i64 } else { i as i64 };
        write_plane(file, name, &header, &axes, axis, index, opts.overwrite)?;
    }
    Ok(names)
}

fn write_plane(
    file: &mut UcsfFile,
    path: &Path,
    header: &ucsf_core::header::FileHeader,
    axes: &[AxisHeader],
    axis: usize,
    index: i64,
    overwrite: bool,
) -> Result<(), TransformError> {
    let ndim = file.ndim();
    let mut writer = UcsfWriter::create(path, header, axes, overwrite)?;
    writer.fill_tiles(|g| -> Result<f32, TransformError> {
        Ok(file.value_at(&insert_axis(g, axis, ndim, index))?)
    })?;
    writer.finish()?;
    log::debug!("Wrote plane {} to {}", index, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{axis, write_cube};
    use ucsf_io::OpenOptions;

    #[test]
    fn test_auto_axis() {
        let mut axes = vec![axis("1H", 64), axis("15N", 32), axis("13C", 48)];
        assert_eq!(auto_split_axis(&axes), 1);
        axes[2].nucleus = "T2".to_string();
        assert_eq!(auto_split_axis(&axes), 2);
    }

    #[test]
    fn test_integer_names() {
        let names = plane_file_names("p", 12, 1.0, 1.0);
        assert_eq!(names[0], PathBuf::from("p_01.ucsf"));
        assert_eq!(names[11], PathBuf::from("p_12.ucsf"));

        let names = plane_file_names("p", 5, 1.0, 1.0);
        assert_eq!(names[4], PathBuf::from("p_5.ucsf"));

        let names = plane_file_names("p", 40, 0.0, 25.0);
        assert_eq!(names[3], PathBuf::from("p_0075.ucsf"));
    }

    #[test]
    fn test_decimal_names() {
        let names = plane_file_names("t", 3, 0.5, 0.25);
        assert_eq!(
            names,
            vec![
                PathBuf::from("t_0.500.ucsf"),
                PathBuf::from("t_0.750.ucsf"),
                PathBuf::from("t_1.000.ucsf"),
            ]
        );
        let names = plane_file_names("t", 3, 10.5, 1.5);
        assert_eq!(names[0], PathBuf::from("t_10.500.ucsf"));
    }

    #[test]
    fn test_write_planes_direct_and_reversed() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("cube.ucsf");
        write_cube(&src, &[3, 4, 2], &[2, 2, 2], |g| (g[0] * 100 + g[1] * 10 + g[2]) as f32);
        let mut file = UcsfFile::open(&src, &OpenOptions::default()).unwrap();

        let prefix = dir.path().join("plane").display().to_string();
        let opts = PlaneOptions {
            axis: Some(2),
            ..PlaneOptions::default()
        };
        let names = write_planes(&mut file, &prefix, &opts).unwrap();
        assert_eq!(names.len(), 2);
        let mut first = UcsfFile::open(&names[0], &OpenOptions::default()).unwrap();
        assert_eq!(first.ndim(), 2);
        assert_eq!(first.value(&[2, 3]).unwrap(), 230.0);

        let rev = PlaneOptions {
            axis: Some(2),
            reverse: true,
            overwrite: true,
            ..PlaneOptions::default()
        };
        let names = write_planes(&mut file, &prefix, &rev).unwrap();
        let mut first = UcsfFile::open(&names[0], &OpenOptions::default()).unwrap();
        assert_eq!(first.value(&[2, 3]).unwrap(), 231.0);
    }

    #[test]
    fn test_existing_plane_blocks_all_writes() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("cube.ucsf");
        write_cube(&src, &[2, 2, 3], &[2, 2, 2], |_| 1.0);
        let mut file = UcsfFile::open(&src, &OpenOptions::default()).unwrap();

        let prefix = dir.path().join("plane").display().to_string();
        let names = plane_file_names(&prefix, 3, 1.0, 1.0);
        std::fs::write(&names[2], b"keep").unwrap();

        let opts = PlaneOptions {
            axis: Some(2),
            ..PlaneOptions::default()
        };
        let err = write_planes(&mut file, &prefix, &opts).unwrap_err();
        assert!(err.is_exists());
        assert!(!names[0].exists());
        assert_eq!(std::fs::read(&names[2]).unwrap(), b"keep");
    }
}
