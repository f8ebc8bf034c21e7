//! Noise level estimation from random grid samples.

use crate::error::PickError;
use rand::Rng;
use ucsf_io::UcsfFile;

/// Samples drawn by the auto-pick pipeline.
pub const AUTO_PICK_NOISE_SAMPLES: usize = 100;
/// Samples drawn when refining an existing peak list.
pub const REFINE_NOISE_SAMPLES: usize = 60;

/// Median of `count` absolute values at uniformly drawn grid points
/// (with replacement).
///
/// Even counts return the upper of the two middle elements, `sorted[count / 2]`,
/// not their mean.
pub fn sample_noise<R: Rng>(
    file: &mut UcsfFile,
    count: usize,
    rng: &mut R,
) -> Result<f32, PickError> {
    if count == 0 {
        return Err(PickError::EmptySample);
    }
    let ndim = file.ndim();
    let points: Vec<i64> = (0..ndim).map(|axis| file.layout().data_points(axis)).collect();

    let mut heights = Vec::with_capacity(count);
    let mut grid = vec![0i64; ndim];
    for _ in 0..count {
        for (axis, g) in grid.iter_mut().enumerate() {
            *g = rng.gen_range(0..points[axis]);
        }
        heights.push(file.value(&grid)?.abs());
    }

    let noise = upper_median(&mut heights).ok_or(PickError::EmptySample)?;
    log::debug!("Noise level {} from {} samples", noise, count);
    Ok(noise)
}

/// `sorted[len / 2]`.
pub fn upper_median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    Some(values[values.len() / 2])
}
