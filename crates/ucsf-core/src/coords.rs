//! Grid index ↔ chemical shift (ppm) conversion and three-point
//! quadratic interpolation.
//!
//! Grid index 0 sits at the downfield edge, `center + width/2`, and the
//! shift decreases by `width / freq / points` per grid step.

use crate::geometry::GeometryError;
use crate::header::AxisHeader;

/// Calibration of one axis, cached from its header.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AxisCalibration {
    /// ppm of grid index 0.
    origin: f64,
    /// ppm per grid step.
    step: f64,
}

/// Per-axis grid ↔ ppm converter. Axes are 0-based.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateMapper {
    axes: Vec<AxisCalibration>,
}

impl CoordinateMapper {
    pub fn new(axes: &[AxisHeader]) -> Self {
        Self {
            axes: axes
                .iter()
                .map(|ah| AxisCalibration {
                    origin: ah.freq_max(),
                    step: ah.ppm_per_point(),
                })
                .collect(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// ppm spacing of one grid step on `axis`.
    pub fn ppm_per_point(&self, axis: usize) -> f64 {
        self.axes[axis].step
    }

    /// `center + width/2/freq − grid × width/freq/points`. Fractional grid
    /// positions are allowed so refined peaks can be converted.
    pub fn grid_to_shift(&self, grid: f64, axis: usize) -> f64 {
        let cal = &self.axes[axis];
        cal.origin - cal.step * grid
    }

    /// Nearest grid index to a shift (`floor(x + 0.5)`).
    pub fn shift_to_grid(&self, ppm: f64, axis: usize) -> i64 {
        let cal = &self.axes[axis];
        ((cal.origin - ppm) / cal.step + 0.5).floor() as i64
    }

    pub fn grids_to_shifts(&self, grid: &[i64]) -> Vec<f64> {
        grid.iter()
            .enumerate()
            .map(|(axis, &g)| self.grid_to_shift(g as f64, axis))
            .collect()
    }

    pub fn shifts_to_grids(&self, shifts: &[f64]) -> Result<Vec<i64>, GeometryError> {
        if shifts.len() != self.ndim() {
            return Err(GeometryError::DimensionMismatch {
                expected: self.ndim(),
                got: shifts.len(),
            });
        }
        Ok(shifts
            .iter()
            .enumerate()
            .map(|(axis, &s)| self.shift_to_grid(s, axis))
            .collect())
    }

    /// Convert neighbourhood half-widths in ppm to grid half-widths,
    /// `ppm / ppm_per_point + 1` truncated.
    pub fn shift_buffers_to_grid(&self, buffers: &[f64]) -> Result<Vec<usize>, GeometryError> {
        if buffers.len() != self.ndim() {
            return Err(GeometryError::DimensionMismatch {
                expected: self.ndim(),
                got: buffers.len(),
            });
        }
        Ok(buffers
            .iter()
            .enumerate()
            .map(|(axis, &b)| (b.abs() / self.axes[axis].step.abs() + 1.0) as usize)
            .collect())
    }
}

/// Fit a parabola through `(0, left)`, `(1, centre)`, `(2, right)` and
/// return the vertex position and height.
///
/// Zero curvature returns `(1, centre)`. A vertex outside `[0, 2]` would be
/// an extrapolation, so the centre sample is returned unmodified instead.
pub fn interpolate(left: f64, centre: f64, right: f64) -> (f64, f64) {
    let a0 = left;
    let a1 = -1.5 * left + 2.0 * centre - 0.5 * right;
    let a2 = 0.5 * left - centre + 0.5 * right;
    if a2 == 0.0 {
        return (1.0, centre);
    }
    let x = -0.5 * a1 / a2;
    if !(0.0..=2.0).contains(&x) {
        return (1.0, centre);
    }
    (x, a2 * x * x + a1 * x + a0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> CoordinateMapper {
        CoordinateMapper::new(&[
            AxisHeader {
                nucleus: "1H".to_string(),
                data_points: 1024,
                tile_size: 128,
                spectrometer_freq: 600.0,
                spectral_width: 7200.0,
                center: 4.7,
            },
            AxisHeader {
                nucleus: "15N".to_string(),
                data_points: 256,
                tile_size: 32,
                spectrometer_freq: 60.8,
                spectral_width: 2432.0,
                center: 118.0,
            },
        ])
    }

    #[test]
    fn test_grid_zero_is_downfield_edge() {
        let m = mapper();
        assert!((m.grid_to_shift(0.0, 0) - (4.7 + 6.0)).abs() < 1e-6);
        assert!((m.grid_to_shift(512.0, 0) - 4.7).abs() < 1e-6);
        assert!((m.grid_to_shift(128.0, 1) - 118.0).abs() < 1e-4);
    }

    #[test]
    fn test_shift_grid_roundtrip() {
        let m = mapper();
        for g in [0i64, 1, 17, 511, 1023] {
            assert_eq!(m.shift_to_grid(m.grid_to_shift(g as f64, 0), 0), g);
        }
        // half a step past a grid point rounds to the next one
        let half = m.grid_to_shift(10.0, 0) - 0.51 * m.ppm_per_point(0);
        assert_eq!(m.shift_to_grid(half, 0), 11);
    }

    #[test]
    fn test_shift_buffers_to_grid() {
        let m = mapper();
        let step = m.ppm_per_point(1);
        let buffers = m.shift_buffers_to_grid(&[0.0, 2.5 * step]).unwrap();
        assert_eq!(buffers, vec![1, 3]);
        assert!(m.shift_buffers_to_grid(&[0.1]).is_err());
    }

    #[test]
    fn test_interpolate_symmetric() {
        let (x, v) = interpolate(1.0, 3.0, 1.0);
        assert!((x - 1.0).abs() < 1e-12);
        assert!((v - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_interpolate_monotonic_falls_back() {
        let (x, v) = interpolate(1.0, 2.0, 4.0);
        assert_eq!(x, 1.0);
        assert_eq!(v, 2.0);
    }

    #[test]
    fn test_interpolate_flat_and_skewed() {
        assert_eq!(interpolate(5.0, 5.0, 5.0), (1.0, 5.0));
        let (x, v) = interpolate(2.0, 4.0, 3.0);
        assert!(x > 1.0 && x < 1.5);
        assert!(v > 4.0);
    }
}
