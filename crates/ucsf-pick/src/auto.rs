//! Automatic picking: noise estimate, threshold, scan, count filter and
//! refinement in one call.

use crate::error::PickError;
use crate::noise::{sample_noise, AUTO_PICK_NOISE_SAMPLES, REFINE_NOISE_SAMPLES};
use crate::peaklist::read_peak_list;
use crate::refine::{refine_peaks, RefinedPeak};
use crate::scanner::{
    check_buffers, filter_by_count, find_peaks, find_peaks_at, Restraint, ScanParams,
    DEFAULT_CHUNK_SIZE,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use ucsf_core::enums::Sign;
use ucsf_core::geometry::{to_point, GridPoint};
use ucsf_io::UcsfFile;

/// Default neighbourhood half-width on every axis.
pub const DEFAULT_GRID_BUFFER: usize = 2;
/// Default threshold as a multiple of the noise level.
pub const DEFAULT_NOISE_MULTIPLIER: f32 = 8.0;

/// Auto-pick settings. Serializable so a run can be repeated from a saved
/// JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickOptions {
    /// Grid half-widths per axis; [`DEFAULT_GRID_BUFFER`] on every axis when unset.
    pub grid_buffers: Option<Vec<usize>>,
    pub sign: Sign,
    /// Keep only the strongest peaks.
    pub max_count: Option<usize>,
    /// Explicit threshold. Otherwise `noise × noise_multiplier`, truncated.
    pub threshold: Option<f32>,
    pub noise_multiplier: f32,
    pub noise_samples: usize,
    /// ppm centres per axis to restrict the scan to.
    pub restraint: Option<Vec<Vec<f64>>>,
    pub restraint_buffers: Option<Vec<usize>>,
    /// Seed for noise sampling; random when unset.
    pub seed: Option<u64>,
    pub chunk_size: usize,
}

impl Default for PickOptions {
    fn default() -> Self {
        Self {
            grid_buffers: None,
            sign: Sign::Both,
            max_count: None,
            threshold: None,
            noise_multiplier: DEFAULT_NOISE_MULTIPLIER,
            noise_samples: AUTO_PICK_NOISE_SAMPLES,
            restraint: None,
            restraint_buffers: None,
            seed: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl PickOptions {
    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn buffers(&self, ndim: usize) -> Vec<usize> {
        self.grid_buffers
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_GRID_BUFFER; ndim])
    }
}

/// Outcome of an auto-pick run.
#[derive(Debug, Clone, PartialEq)]
pub struct PickReport {
    pub noise: f32,
    pub threshold: f32,
    /// Peaks found before the count filter.
    pub found: usize,
    pub peaks: Vec<RefinedPeak>,
}

pub fn auto_pick_peaks(
    file: &mut UcsfFile,
    opts: &PickOptions,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<PickReport, PickError> {
    let noise = sample_noise(file, opts.noise_samples, &mut opts.rng())?;
    let threshold = opts
        .threshold
        .unwrap_or_else(|| (noise * opts.noise_multiplier).trunc());
    log::info!("Noise level: {}, threshold: {}", noise, threshold);

    let mut params = ScanParams::new(threshold, opts.buffers(file.ndim()))
        .with_sign(opts.sign)
        .with_max_count(opts.max_count);
    params.chunk_size = opts.chunk_size;
    params.cancel = cancel;
    if let Some(shifts) = &opts.restraint {
        params = params.with_restraint(Restraint {
            shifts: shifts.clone(),
            buffers: opts.restraint_buffers.clone(),
        });
    }

    let mut peaks = find_peaks(file, &params)?;
    let found = peaks.len();
    if let Some(max) = opts.max_count {
        peaks = filter_by_count(peaks, max);
        log::info!("Filtered by peak count: {} ---> {}", found, peaks.len());
    }

    let peaks = refine_peaks(file, &peaks)?;
    Ok(PickReport {
        noise,
        threshold,
        found,
        peaks,
    })
}

/// Re-pick around the peaks of an existing SPARKY list.
///
/// Every listed peak is widened to its grid neighbourhood; those points are
/// tested in list order against a `noise × multiplier` threshold from
/// [`REFINE_NOISE_SAMPLES`] samples, and the survivors are refined.
pub fn refine_sparky_peaks<P: AsRef<Path>>(
    file: &mut UcsfFile,
    list: P,
    opts: &PickOptions,
) -> Result<Vec<RefinedPeak>, PickError> {
    let buffers = opts.buffers(file.ndim());
    check_buffers(&buffers, file.ndim())?;
    let noise = sample_noise(file, REFINE_NOISE_SAMPLES, &mut opts.rng())?;
    let threshold = opts.threshold.unwrap_or(noise * opts.noise_multiplier);

    let listed = read_peak_list(list, file.ndim())?;
    let points = expand_neighbourhoods(file, &listed, &buffers)?;
    log::debug!("{} listed peaks, {} candidate points", listed.len(), points.len());

    let params = ScanParams::new(threshold, buffers).with_sign(opts.sign);
    let peaks = find_peaks_at(file, points, &params)?;
    refine_peaks(file, &peaks)
}

/// Grid points within `± buffers` of each ppm position, in list order,
/// without duplicates and clipped to the grid.
pub fn expand_neighbourhoods(
    file: &UcsfFile,
    peaks: &[Vec<f64>],
    buffers: &[usize],
) -> Result<Vec<GridPoint>, PickError> {
    let ndim = file.ndim();
    check_buffers(buffers, ndim)?;
    let layout = file.layout();
    let mut seen = HashSet::new();
    let mut points = Vec::new();

    for shifts in peaks {
        let centre = to_point(&file.mapper().shifts_to_grids(shifts)?, ndim)?;
        let offsets: Vec<std::ops::RangeInclusive<i64>> = (0..ndim)
            .map(|i| -(buffers[i] as i64)..=buffers[i] as i64)
            .collect();
        let mut cur: Vec<i64> = offsets.iter().map(|r| *r.start()).collect();
        loop {
            let mut pt = centre;
            for i in 0..ndim {
                pt[i] += cur[i];
            }
            if layout.in_grid(&pt) && seen.insert(pt) {
                points.push(pt);
            }

            let mut axis = ndim;
            let finished = loop {
                if axis == 0 {
                    break true;
                }
                axis -= 1;
                if cur[axis] < *offsets[axis].end() {
                    cur[axis] += 1;
                    break false;
                }
                cur[axis] = *offsets[axis].start();
            };
            if finished {
                break;
            }
        }
    }
    Ok(points)
}
