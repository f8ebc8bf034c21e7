//! Sub-grid peak refinement by per-axis quadratic interpolation.

use crate::error::PickError;
use crate::scanner::{GridPeak, Height};
use ucsf_core::coords::interpolate;
use ucsf_core::geometry::{to_point, GridPoint};
use ucsf_io::UcsfFile;

/// A peak position in ppm with its interpolated height.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinedPeak {
    pub shifts: Vec<f64>,
    pub height: f32,
}

impl Height for RefinedPeak {
    fn height(&self) -> f32 {
        self.height
    }
}

/// Refine one grid point.
///
/// Each axis is interpolated through the point and its two neighbours on
/// that axis, the other coordinates held fixed. The reported height is the
/// one from the last axis, not a combined fit.
pub fn refine_peak(file: &mut UcsfFile, grid: &[i64]) -> Result<RefinedPeak, PickError> {
    let ndim = file.ndim();
    let pt = to_point(grid, ndim)?;
    let centre = sample_or_zero(file, &pt)? as f64;

    let mut shifts = vec![0.0; ndim];
    let mut height = centre;
    for axis in 0..ndim {
        let mut prev = pt;
        let mut next = pt;
        prev[axis] -= 1;
        next[axis] += 1;
        let left = sample_or_zero(file, &prev)? as f64;
        let right = sample_or_zero(file, &next)? as f64;

        let (pos, value) = interpolate(left, centre, right);
        shifts[axis] = file.mapper().grid_to_shift(pt[axis] as f64 + pos - 1.0, axis);
        height = value;
    }
    Ok(RefinedPeak {
        shifts,
        height: height as f32,
    })
}

/// Refine the grid point nearest to a ppm position.
pub fn refine_by_shifts(file: &mut UcsfFile, shifts: &[f64]) -> Result<RefinedPeak, PickError> {
    let grid = file.mapper().shifts_to_grids(shifts)?;
    refine_peak(file, &grid)
}

pub fn refine_peaks(file: &mut UcsfFile, peaks: &[GridPeak]) -> Result<Vec<RefinedPeak>, PickError> {
    peaks.iter().map(|p| refine_peak(file, &p.position)).collect()
}

/// Refine a list of ppm positions.
pub fn refine_shift_list(
    file: &mut UcsfFile,
    peaks: &[Vec<f64>],
) -> Result<Vec<RefinedPeak>, PickError> {
    peaks.iter().map(|s| refine_by_shifts(file, s)).collect()
}

fn sample_or_zero(file: &mut UcsfFile, pt: &GridPoint) -> Result<f32, PickError> {
    if !file.layout().in_grid(pt) {
        return Ok(0.0);
    }
    Ok(file.value_at(pt)?)
}
