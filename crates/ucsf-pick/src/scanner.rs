//! Parallel local-extremum search over the grid.
//!
//! The first axis is split into one contiguous band per worker. Every
//! worker walks its slab in row-major order, in chunks, with its own
//! [`TileReader`], and returns its peaks together with the smallest height
//! it admitted. The aggregator concatenates the worker results.
//!
//! A candidate is tested dimension by dimension: first the line along axis
//! 1, then the plane over axes 1-2, and so on, stopping at the first
//! failure. Inside the box every neighbour must not beat the candidate and
//! must reach 20 % of it. Neighbours outside the grid count as zero, so a
//! candidate closer to the edge than its buffer is rejected.
//!
//! Adjacency skip: while the last tested candidate was accepted, points
//! whose Manhattan distance to it is below the sum of the buffers are
//! skipped unread. This can hide a second maximum very close to an
//! accepted one. Set [`ScanParams::adjacency_skip`] to `false` to test
//! every point.

use crate::error::PickError;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use ucsf_core::enums::Sign;
use ucsf_core::geometry::{to_point, GeometryError, GridPoint};
use ucsf_core::header::MAX_DIMS;
use ucsf_io::{TileReader, UcsfFile};

/// Grid points per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

// ─── Parameters ─────────────────────────────────────────────────────────────

/// Limit the scan to grid regions around given ppm positions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Restraint {
    /// ppm centres per axis. A missing or empty list leaves that axis
    /// unrestrained.
    pub shifts: Vec<Vec<f64>>,
    /// Grid half-width around each centre, per axis. Defaults to the scan's
    /// grid buffers.
    pub buffers: Option<Vec<usize>>,
}

#[derive(Debug, Clone)]
pub struct ScanParams {
    /// Minimum admitted magnitude.
    pub threshold: f32,
    /// Neighbourhood half-width per axis, in grid points.
    pub grid_buffers: Vec<usize>,
    pub sign: Sign,
    pub restraint: Option<Restraint>,
    /// Once a worker holds more peaks than this, candidates weaker than its
    /// weakest admitted peak are skipped. Not an exact top-N cut.
    pub max_count: Option<usize>,
    pub chunk_size: usize,
    pub adjacency_skip: bool,
    /// Checked before every chunk; setting it aborts the scan.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl ScanParams {
    pub fn new(threshold: f32, grid_buffers: Vec<usize>) -> Self {
        Self {
            threshold,
            grid_buffers,
            sign: Sign::Both,
            restraint: None,
            max_count: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            adjacency_skip: true,
            cancel: None,
        }
    }

    pub fn with_sign(mut self, sign: Sign) -> Self {
        self.sign = sign;
        self
    }

    pub fn with_restraint(mut self, restraint: Restraint) -> Self {
        self.restraint = Some(restraint);
        self
    }

    pub fn with_max_count(mut self, max_count: Option<usize>) -> Self {
        self.max_count = max_count;
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn buffer_sum(&self) -> usize {
        self.grid_buffers.iter().sum()
    }
}

// ─── Results ────────────────────────────────────────────────────────────────

/// Anything carrying a peak height, for the list filters.
pub trait Height {
    fn height(&self) -> f32;
}

/// A local extremum on the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPeak {
    pub position: Vec<i64>,
    pub height: f32,
}

impl Height for GridPeak {
    fn height(&self) -> f32 {
        self.height
    }
}

/// Keep the `max_count` peaks of largest magnitude, strongest first.
pub fn filter_by_count<P: Height>(mut peaks: Vec<P>, max_count: usize) -> Vec<P> {
    peaks.sort_by(|a, b| b.height().abs().total_cmp(&a.height().abs()));
    peaks.truncate(max_count);
    peaks
}

/// Keep peaks with `|height| >= |min_height|`, in their original order.
pub fn filter_by_height<P: Height>(peaks: Vec<P>, min_height: f32) -> Vec<P> {
    let min = min_height.abs();
    peaks.into_iter().filter(|p| p.height().abs() >= min).collect()
}

// ─── Execution strategy ─────────────────────────────────────────────────────

/// How worker bands are run, chosen once per scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Bands one after another on the calling thread.
    Sequential,
    /// One pool thread per band.
    Threaded(usize),
}

impl ExecutionStrategy {
    pub fn select(workers: usize) -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        if workers <= 1 || cores <= 1 {
            Self::Sequential
        } else {
            Self::Threaded(workers)
        }
    }
}

/// Result of one worker band.
#[derive(Debug, Clone, PartialEq)]
struct WorkerOutcome {
    peaks: Vec<GridPeak>,
    /// Smallest admitted magnitude; infinite when nothing was admitted.
    min_admitted: f32,
}

// ─── Scan ───────────────────────────────────────────────────────────────────

/// Find every local extremum of the file above `params.threshold`.
///
/// Peaks come back grouped by worker band, each band in row-major order.
pub fn find_peaks(file: &mut UcsfFile, params: &ScanParams) -> Result<Vec<GridPeak>, PickError> {
    let ndim = file.ndim();
    check_buffers(&params.grid_buffers, ndim)?;

    let ranges = axis_ranges(file, params)?;
    let workers = file.workers();
    let mut bands: Vec<Vec<i64>> = vec![Vec::new(); workers];
    for &x in &ranges[0] {
        bands[file.worker_for(x)].push(x);
    }

    let strategy = ExecutionStrategy::select(workers);
    for (w, band) in bands.iter().enumerate() {
        let count = ranges[1..].iter().fold(band.len(), |acc, r| acc * r.len());
        log::debug!("Worker {}: {} points", w + 1, count);
    }
    log::debug!("Scan strategy: {:?}", strategy);

    let readers = file.readers_mut()?;
    let outcomes: Vec<WorkerOutcome> = match strategy {
        ExecutionStrategy::Sequential => readers
            .iter_mut()
            .zip(&bands)
            .enumerate()
            .map(|(w, (reader, band))| scan_band(reader, w, band, &ranges, params, workers))
            .collect::<Result<Vec<_>, _>>()?,
        ExecutionStrategy::Threaded(n) => {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
            pool.install(|| {
                readers
                    .par_iter_mut()
                    .zip(bands.par_iter())
                    .enumerate()
                    .map(|(w, (reader, band))| scan_band(reader, w, band, &ranges, params, workers))
                    .collect::<Result<Vec<_>, _>>()
            })?
        }
    };

    let min_admitted = outcomes
        .iter()
        .map(|o| o.min_admitted)
        .fold(f32::INFINITY, f32::min);
    let peaks: Vec<GridPeak> = outcomes.into_iter().flat_map(|o| o.peaks).collect();
    if min_admitted.is_finite() {
        log::debug!("Weakest admitted peak: {}", min_admitted);
    }
    log::info!("Find peaks: {} peaks", peaks.len());
    Ok(peaks)
}

/// Test an explicit list of candidate points in order, with the reader of
/// worker 0. Used to re-pick around an existing peak list.
pub fn find_peaks_at<I>(
    file: &mut UcsfFile,
    points: I,
    params: &ScanParams,
) -> Result<Vec<GridPeak>, PickError>
where
    I: IntoIterator<Item = GridPoint>,
{
    check_buffers(&params.grid_buffers, file.ndim())?;
    let reader = file.reader_mut(0)?;
    let mut outcome = WorkerOutcome {
        peaks: Vec::new(),
        min_admitted: f32::INFINITY,
    };
    scan_chunk(reader, points, params, &mut outcome)?;
    Ok(outcome.peaks)
}

pub(crate) fn check_buffers(buffers: &[usize], ndim: usize) -> Result<(), GeometryError> {
    if buffers.len() != ndim {
        return Err(GeometryError::DimensionMismatch {
            expected: ndim,
            got: buffers.len(),
        });
    }
    Ok(())
}

/// Admissible grid indices per axis, sorted. Restrained axes get the union
/// of `centre ± buffer` around every ppm centre, clamped to the grid.
fn axis_ranges(file: &UcsfFile, params: &ScanParams) -> Result<Vec<Vec<i64>>, PickError> {
    let ndim = file.ndim();
    let layout = file.layout();
    let mut ranges: Vec<Vec<i64>> = (0..ndim)
        .map(|axis| (0..layout.data_points(axis)).collect())
        .collect();

    let Some(restraint) = &params.restraint else {
        return Ok(ranges);
    };
    if restraint.shifts.len() > ndim {
        return Err(GeometryError::DimensionMismatch {
            expected: ndim,
            got: restraint.shifts.len(),
        }
        .into());
    }
    let buffers = restraint.buffers.as_ref().unwrap_or(&params.grid_buffers);
    check_buffers(buffers, ndim)?;

    for (axis, centres) in restraint.shifts.iter().enumerate() {
        if centres.is_empty() {
            continue;
        }
        let last = layout.data_points(axis) - 1;
        let b = buffers[axis] as i64;
        let mut admitted = BTreeSet::new();
        for &ppm in centres {
            let idx = file.mapper().shift_to_grid(ppm, axis);
            for g in (idx - b).max(0)..=(idx + b).min(last) {
                admitted.insert(g);
            }
        }
        ranges[axis] = admitted.into_iter().collect();
    }
    Ok(ranges)
}

fn scan_band(
    reader: &mut TileReader,
    worker: usize,
    band: &[i64],
    ranges: &[Vec<i64>],
    params: &ScanParams,
    workers: usize,
) -> Result<WorkerOutcome, PickError> {
    let mut outcome = WorkerOutcome {
        peaks: Vec::new(),
        min_admitted: f32::INFINITY,
    };
    let mut axes: Vec<&[i64]> = Vec::with_capacity(ranges.len());
    axes.push(band);
    axes.extend(ranges[1..].iter().map(|r| r.as_slice()));

    let total = axes.iter().fold(1usize, |acc, a| acc * a.len());
    let chunk_size = params.chunk_size.max(1);
    let chunk_count = total / chunk_size + 1;
    let mut points = GridProduct::new(axes);
    let mut reported = -1i64;

    for chunk in 0..chunk_count {
        if params.cancelled() {
            log::warn!("Worker {}: cancelled after {} chunks", worker + 1, chunk);
            return Err(PickError::Cancelled);
        }
        let percent = ((chunk + 1) as f64 / chunk_count as f64 * 10.0) as i64;
        if percent > reported {
            reported = percent;
            if workers == 1 {
                log::info!("Find peaks: {} / {} ({:3} %)", chunk + 1, chunk_count, percent * 10);
            } else {
                log::debug!(
                    "Worker {}: chunk {} / {} ({:3} %)",
                    worker + 1,
                    chunk + 1,
                    chunk_count,
                    percent * 10
                );
            }
        }
        scan_chunk(reader, points.by_ref().take(chunk_size), params, &mut outcome)?;
    }
    Ok(outcome)
}

fn scan_chunk<I>(
    reader: &mut TileReader,
    points: I,
    params: &ScanParams,
    outcome: &mut WorkerOutcome,
) -> Result<(), PickError>
where
    I: IntoIterator<Item = GridPoint>,
{
    let ndim = reader.layout().ndim();
    let threshold = params.threshold.abs();
    let buffer_sum = params.buffer_sum() as i64;
    let mut last_accepted: Option<GridPoint> = None;

    for pt in points {
        if let Some(prev) = &last_accepted {
            let dist: i64 = (0..ndim).map(|i| (prev[i] - pt[i]).abs()).sum();
            if dist < buffer_sum {
                continue;
            }
        }

        let value = reader.value(&pt)?;
        if value.abs() < threshold {
            continue;
        }
        if let Some(max) = params.max_count {
            if outcome.peaks.len() > max && value.abs() < outcome.min_admitted {
                continue;
            }
        }
        if !params.sign.admits(value, threshold) {
            continue;
        }

        if is_extremum(reader, &pt, value, &params.grid_buffers, params.sign)? {
            outcome.peaks.push(GridPeak {
                position: pt[..ndim].to_vec(),
                height: value,
            });
            outcome.min_admitted = outcome.min_admitted.min(value.abs());
            if params.adjacency_skip {
                last_accepted = Some(pt);
            }
        } else {
            last_accepted = None;
        }
    }
    Ok(())
}

// ─── Local extremum test ────────────────────────────────────────────────────

/// Incremental neighbourhood test of a candidate whose value is known.
fn is_extremum(
    reader: &mut TileReader,
    pt: &GridPoint,
    value: f32,
    buffers: &[usize],
    sign: Sign,
) -> Result<bool, PickError> {
    if (sign == Sign::Positive && value < 0.0) || (sign == Sign::Negative && value > 0.0) {
        return Ok(false);
    }
    let ndim = reader.layout().ndim();
    for level in 0..ndim {
        let mut half = [0i64; MAX_DIMS];
        for axis in 0..=level {
            half[axis] = buffers[axis] as i64;
        }
        if !neighbourhood_ok(reader, pt, value, &half, sign)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn neighbourhood_ok(
    reader: &mut TileReader,
    pt: &GridPoint,
    value: f32,
    half: &[i64; MAX_DIMS],
    sign: Sign,
) -> Result<bool, PickError> {
    let ndim = reader.layout().ndim();
    let mut lo = [0i64; MAX_DIMS];
    let mut hi = [0i64; MAX_DIMS];
    for i in 0..ndim {
        lo[i] = pt[i] - half[i];
        hi[i] = pt[i] + half[i];
    }

    let mut cur = lo;
    loop {
        if cur != *pt {
            let neighbour = sample_or_zero(reader, &cur)?;
            if !sign.neighbour_ok(value, neighbour) {
                return Ok(false);
            }
        }
        // odometer over the box, last axis fastest
        let mut axis = ndim;
        loop {
            if axis == 0 {
                return Ok(true);
            }
            axis -= 1;
            if cur[axis] < hi[axis] {
                cur[axis] += 1;
                break;
            }
            cur[axis] = lo[axis];
        }
    }
}

fn sample_or_zero(reader: &mut TileReader, pt: &GridPoint) -> Result<f32, PickError> {
    if !reader.layout().in_grid(pt) {
        return Ok(0.0);
    }
    Ok(reader.value(pt)?)
}

/// Local-extremum test of one grid point against its neighbourhood.
/// Returns the verdict and the point's value.
pub fn is_local_maximum(
    file: &mut UcsfFile,
    grid: &[i64],
    grid_buffers: &[usize],
    sign: Sign,
) -> Result<(bool, f32), PickError> {
    let ndim = file.ndim();
    check_buffers(grid_buffers, ndim)?;
    let pt = to_point(grid, ndim)?;
    let worker = file.worker_for(pt[0]);
    let reader = file.reader_mut(worker)?;
    let value = sample_or_zero(reader, &pt)?;
    let ok = is_extremum(reader, &pt, value, grid_buffers, sign)?;
    Ok((ok, value))
}

/// [`is_local_maximum`] with the point and half-widths given in ppm.
pub fn is_local_maximum_by_shifts(
    file: &mut UcsfFile,
    shifts: &[f64],
    shift_buffers: &[f64],
    sign: Sign,
) -> Result<(bool, f32), PickError> {
    let grid = file.mapper().shifts_to_grids(shifts)?;
    let buffers = file.mapper().shift_buffers_to_grid(shift_buffers)?;
    is_local_maximum(file, &grid, &buffers, sign)
}

// ─── Row-major point enumeration ────────────────────────────────────────────

/// Cartesian product of per-axis index lists, last axis fastest.
struct GridProduct<'a> {
    axes: Vec<&'a [i64]>,
    idx: [usize; MAX_DIMS],
    done: bool,
}

impl<'a> GridProduct<'a> {
    fn new(axes: Vec<&'a [i64]>) -> Self {
        let done = axes.is_empty() || axes.iter().any(|a| a.is_empty());
        Self {
            axes,
            idx: [0; MAX_DIMS],
            done,
        }
    }
}

impl Iterator for GridProduct<'_> {
    type Item = GridPoint;

    fn next(&mut self) -> Option<GridPoint> {
        if self.done {
            return None;
        }
        let mut pt = [0i64; MAX_DIMS];
        for (i, axis) in self.axes.iter().enumerate() {
            pt[i] = axis[self.idx[i]];
        }

        let mut i = self.axes.len();
        loop {
            if i == 0 {
                self.done = true;
                break;
            }
            i -= 1;
            self.idx[i] += 1;
            if self.idx[i] < self.axes[i].len() {
                break;
            }
            self.idx[i] = 0;
        }
        Some(pt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_grid;
    use ucsf_io::OpenOptions;

    /// 8x8, tiles 4x4: 100 at (5,5), a ring of 20 around it, 1 elsewhere.
    fn single_peak_file(dir: &std::path::Path) -> std::path::PathBuf {
        let path = dir.join("peak.ucsf");
        write_grid(&path, &[8, 8], &[4, 4], |g| {
            let (dx, dy) = ((g[0] - 5).abs(), (g[1] - 5).abs());
            match (dx, dy) {
                (0, 0) => 100.0,
                (a, b) if a <= 1 && b <= 1 => 20.0,
                _ => 1.0,
            }
        });
        path
    }

    /// 16x16: +10 at (4,4) ringed by +5, -10 at (11,11) ringed by -5.
    fn two_sign_file(dir: &std::path::Path) -> std::path::PathBuf {
        let path = dir.join("signs.ucsf");
        write_grid(&path, &[16, 16], &[8, 8], |g| {
            let near = |cx: i64, cy: i64| ((g[0] - cx).abs(), (g[1] - cy).abs());
            match (near(4, 4), near(11, 11)) {
                ((0, 0), _) => 10.0,
                ((a, b), _) if a <= 1 && b <= 1 => 5.0,
                (_, (0, 0)) => -10.0,
                (_, (a, b)) if a <= 1 && b <= 1 => -5.0,
                _ => 0.0,
            }
        });
        path
    }

    fn positions(peaks: &[GridPeak]) -> Vec<Vec<i64>> {
        let mut p: Vec<_> = peaks.iter().map(|p| p.position.clone()).collect();
        p.sort();
        p
    }

    #[test]
    fn test_single_peak_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = single_peak_file(dir.path());
        let mut file = UcsfFile::open(&path, &OpenOptions::default()).unwrap();

        let peaks = find_peaks(&mut file, &ScanParams::new(10.0, vec![1, 1])).unwrap();
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].position, vec![5, 5]);
        assert_eq!(peaks[0].height, 100.0);
    }

    #[test]
    fn test_sign_filtering() {
        let dir = tempfile::tempdir().unwrap();
        let path = two_sign_file(dir.path());
        let mut file = UcsfFile::open(&path, &OpenOptions::default()).unwrap();
        let base = ScanParams::new(6.0, vec![1, 1]);

        let pos = find_peaks(&mut file, &base.clone().with_sign(Sign::Positive)).unwrap();
        assert_eq!(positions(&pos), vec![vec![4, 4]]);

        let neg = find_peaks(&mut file, &base.clone().with_sign(Sign::Negative)).unwrap();
        assert_eq!(positions(&neg), vec![vec![11, 11]]);
        assert_eq!(neg[0].height, -10.0);

        let both = find_peaks(&mut file, &base.with_sign(Sign::Both)).unwrap();
        assert_eq!(positions(&both), vec![vec![4, 4], vec![11, 11]]);
    }

    #[test]
    fn test_scan_idempotent_across_workers() {
        let dir = tempfile::tempdir().unwrap();
        let path = two_sign_file(dir.path());
        let params = ScanParams::new(6.0, vec![1, 1]);

        let mut single = UcsfFile::open(&path, &OpenOptions::default()).unwrap();
        let first = find_peaks(&mut single, &params).unwrap();
        let second = find_peaks(&mut single, &params).unwrap();
        assert_eq!(positions(&first), positions(&second));

        let mut multi = UcsfFile::open(&path, &OpenOptions::default().with_workers(3)).unwrap();
        let threaded = find_peaks(&mut multi, &params).unwrap();
        assert_eq!(positions(&first), positions(&threaded));
    }

    #[test]
    fn test_small_chunks_same_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = two_sign_file(dir.path());
        let mut file = UcsfFile::open(&path, &OpenOptions::default()).unwrap();
        let mut params = ScanParams::new(6.0, vec![1, 1]);
        params.chunk_size = 7;
        let peaks = find_peaks(&mut file, &params).unwrap();
        assert_eq!(positions(&peaks), vec![vec![4, 4], vec![11, 11]]);
    }

    #[test]
    fn test_adjacency_skip_hides_close_maximum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("close.ucsf");
        // 100 at (10,10) and 90 at (10,13): outside each other's box but
        // within the summed buffers (3 < 4) along the scan row
        write_grid(&path, &[24, 24], &[8, 8], |g| match (g[0], g[1]) {
            (10, 10) => 100.0,
            (10, 13) => 90.0,
            _ => 25.0,
        });
        let mut file = UcsfFile::open(&path, &OpenOptions::default()).unwrap();
        let mut params = ScanParams::new(30.0, vec![2, 2]);

        let skipped = find_peaks(&mut file, &params).unwrap();
        assert_eq!(positions(&skipped), vec![vec![10, 10]]);

        params.adjacency_skip = false;
        let full = find_peaks(&mut file, &params).unwrap();
        assert_eq!(positions(&full), vec![vec![10, 10], vec![10, 13]]);
    }

    #[test]
    fn test_max_count_skips_weaker_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("many.ucsf");
        write_grid(&path, &[28, 12], &[8, 4], |g| match (g[0], g[1]) {
            (4, 6) => 100.0,
            (10, 6) => 90.0,
            (16, 6) => 50.0,
            (22, 6) => 120.0,
            _ => 25.0,
        });
        let mut file = UcsfFile::open(&path, &OpenOptions::default()).unwrap();
        let params = ScanParams::new(30.0, vec![1, 1]);

        let all = find_peaks(&mut file, &params).unwrap();
        assert_eq!(all.len(), 4);

        // two peaks already held when (16,6) comes up; it is weaker than both
        let capped = find_peaks(&mut file, &params.with_max_count(Some(1))).unwrap();
        assert_eq!(positions(&capped), vec![vec![4, 6], vec![10, 6], vec![22, 6]]);
    }

    #[test]
    fn test_edge_candidate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edge.ucsf");
        write_grid(&path, &[6, 6], &[3, 3], |g| if g[0] == 0 && g[1] == 3 { 50.0 } else { 20.0 });
        let mut file = UcsfFile::open(&path, &OpenOptions::default()).unwrap();
        let peaks = find_peaks(&mut file, &ScanParams::new(30.0, vec![1, 1])).unwrap();
        assert!(peaks.is_empty());
    }

    #[test]
    fn test_restraint_limits_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = two_sign_file(dir.path());
        let mut file = UcsfFile::open(&path, &OpenOptions::default()).unwrap();
        let near_first = file.mapper().grid_to_shift(4.0, 0);
        let restraint = Restraint {
            shifts: vec![vec![near_first], vec![]],
            buffers: Some(vec![2, 2]),
        };
        let params = ScanParams::new(6.0, vec![1, 1]).with_restraint(restraint);
        let peaks = find_peaks(&mut file, &params).unwrap();
        assert_eq!(positions(&peaks), vec![vec![4, 4]]);
    }

    #[test]
    fn test_malformed_buffers_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = single_peak_file(dir.path());
        let mut file = UcsfFile::open(&path, &OpenOptions::default()).unwrap();
        assert!(matches!(
            find_peaks(&mut file, &ScanParams::new(10.0, vec![1, 1, 1])),
            Err(PickError::Geometry(GeometryError::DimensionMismatch { expected: 2, got: 3 }))
        ));
    }

    #[test]
    fn test_cancelled_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = single_peak_file(dir.path());
        let mut file = UcsfFile::open(&path, &OpenOptions::default()).unwrap();
        let mut params = ScanParams::new(10.0, vec![1, 1]);
        params.cancel = Some(Arc::new(AtomicBool::new(true)));
        assert!(matches!(find_peaks(&mut file, &params), Err(PickError::Cancelled)));
    }

    #[test]
    fn test_local_maximum_queries() {
        let dir = tempfile::tempdir().unwrap();
        let path = single_peak_file(dir.path());
        let mut file = UcsfFile::open(&path, &OpenOptions::default()).unwrap();

        assert_eq!(is_local_maximum(&mut file, &[5, 5], &[1, 1], Sign::Positive).unwrap(), (true, 100.0));
        assert!(!is_local_maximum(&mut file, &[4, 5], &[1, 1], Sign::Positive).unwrap().0);
        assert!(!is_local_maximum(&mut file, &[5, 5], &[1, 1], Sign::Negative).unwrap().0);

        let shifts = file.mapper().grids_to_shifts(&[5, 5]);
        let (ok, v) = is_local_maximum_by_shifts(&mut file, &shifts, &[0.0, 0.0], Sign::Both).unwrap();
        assert!(ok);
        assert_eq!(v, 100.0);
    }

    #[test]
    fn test_filters() {
        let peaks = vec![
            GridPeak { position: vec![0], height: 5.0 },
            GridPeak { position: vec![1], height: -12.0 },
            GridPeak { position: vec![2], height: 8.0 },
        ];
        let top = filter_by_count(peaks.clone(), 2);
        assert_eq!(top.iter().map(|p| p.height).collect::<Vec<_>>(), vec![-12.0, 8.0]);
        let high = filter_by_height(peaks, -8.0);
        assert_eq!(high.iter().map(|p| p.height).collect::<Vec<_>>(), vec![-12.0, 8.0]);
    }

    #[test]
    fn test_grid_product_order() {
        let a = [0i64, 2];
        let b = [5i64, 6, 7];
        let pts: Vec<_> = GridProduct::new(vec![&a[..], &b[..]]).map(|p| (p[0], p[1])).collect();
        assert_eq!(pts, vec![(0, 5), (0, 6), (0, 7), (2, 5), (2, 6), (2, 7)]);
        assert_eq!(GridProduct::new(vec![&a[..], &[][..]]).count(), 0);
    }
}
