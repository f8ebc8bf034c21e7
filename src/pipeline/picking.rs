//! Noise, picking and peak list commands.

use super::{open_spectrum, PipelineError};
use crate::log::reproducibility::ReproLog;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use ucsf_core::enums::Sign;
use ucsf_io::check_output;
use ucsf_pick::{
    auto_pick_peaks, refine_sparky_peaks, sample_noise, write_refined, PickOptions, PickReport,
    RefinedPeak,
};
use ucsf_transform::{write_projection, ProjectionMode};

/// Grid half-width around each projection peak when picking the 3D file.
pub const PICK3D_RESTRAINT_BUFFER: usize = 4;

/// Projections used by [`pick3d`]: file tag, projected axis and the two
/// axes that remain.
const PROJECTIONS: [(&str, usize, [usize; 2]); 3] =
    [("xy", 2, [0, 1]), ("xz", 1, [0, 2]), ("yz", 0, [1, 2])];

/// Load pick settings saved as JSON. Missing fields take their defaults.
pub fn load_options(path: &Path) -> Result<PickOptions, PipelineError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn pick_flags(opts: &PickOptions) -> String {
    let mut flags = Vec::new();
    match opts.threshold {
        Some(t) => flags.push(format!("-t {}", t)),
        None => flags.push(format!("-m {}", opts.noise_multiplier)),
    }
    if let Some(n) = opts.max_count {
        flags.push(format!("-n {}", n));
    }
    if let Some(b) = &opts.grid_buffers {
        let b: Vec<String> = b.iter().map(|v| v.to_string()).collect();
        flags.push(format!("-R {}", b.join(",")));
    }
    if opts.sign != Sign::Both {
        flags.push(format!("--sign={}", opts.sign.as_i32()));
    }
    if let Some(seed) = opts.seed {
        flags.push(format!("--seed {}", seed));
    }
    flags.join(" ")
}

pub fn info(input: &Path, log: &mut ReproLog) -> Result<String, PipelineError> {
    let file = open_spectrum(input, 1)?;
    log.add_entry(
        "Info",
        &format!("{}D spectrum, {} bytes", file.ndim(), file.file_size()),
        &format!("ucsftool info -i {}", input.display()),
    );
    Ok(file.file_info())
}

/// Median absolute value of `samples` random grid points.
pub fn noise(
    input: &Path,
    samples: usize,
    seed: Option<u64>,
    log: &mut ReproLog,
) -> Result<f32, PipelineError> {
    let mut file = open_spectrum(input, 1)?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let level = sample_noise(&mut file, samples, &mut rng)?;
    let seed_flag = seed.map(|s| format!(" --seed {}", s)).unwrap_or_default();
    log.add_entry(
        "Noise",
        &format!("Median |value| of {} samples: {}", samples, level),
        &format!("ucsftool noise -i {} -s {}{}", input.display(), samples, seed_flag),
    );
    Ok(level)
}

/// Auto-pick `input` and write the refined peaks to `output`. The output
/// is checked before any work is done.
pub fn pick(
    input: &Path,
    output: &Path,
    opts: &PickOptions,
    workers: usize,
    overwrite: bool,
    log: &mut ReproLog,
) -> Result<PickReport, PipelineError> {
    check_output(output, overwrite)?;
    let mut file = open_spectrum(input, workers)?;
    let report = auto_pick_peaks(&mut file, opts, None)?;
    write_refined(output, file.ndim(), &report.peaks)?;

    log.add_entry(
        "Pick",
        &format!(
            "noise {}, threshold {}: {} found, {} written",
            report.noise,
            report.threshold,
            report.found,
            report.peaks.len()
        ),
        &format!(
            "ucsftool pick -i {} -o {} -c {} {}{}",
            input.display(),
            output.display(),
            workers,
            pick_flags(opts),
            if overwrite { " -w" } else { "" }
        ),
    )
    .produced(output);
    Ok(report)
}

/// Re-pick around the peaks of an existing SPARKY list.
pub fn refine(
    input: &Path,
    list: &Path,
    output: &Path,
    opts: &PickOptions,
    overwrite: bool,
    log: &mut ReproLog,
) -> Result<Vec<RefinedPeak>, PipelineError> {
    check_output(output, overwrite)?;
    let mut file = open_spectrum(input, 1)?;
    let peaks = refine_sparky_peaks(&mut file, list, opts)?;
    write_refined(output, file.ndim(), &peaks)?;

    log.add_entry(
        "Refine",
        &format!("{} peaks refined from {}", peaks.len(), list.display()),
        &format!(
            "ucsftool refine -i {} -l {} -o {} {}{}",
            input.display(),
            list.display(),
            output.display(),
            pick_flags(opts),
            if overwrite { " -w" } else { "" }
        ),
    )
    .produced(output);
    Ok(peaks)
}

/// `<stem>_<tag>.ucsf` in `work_dir`, or next to the input.
pub fn projection_path(input: &Path, work_dir: Option<&Path>, tag: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "spectrum".to_string());
    let name = format!("{}_{}.ucsf", stem, tag);
    match work_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

/// Projection-restrained picking of a 3D spectrum.
///
/// The three absolute-value projections are written (replacing earlier
/// ones) and picked for positive peaks. Their ppm positions, gathered per
/// axis, restrain the 3D pick to within [`PICK3D_RESTRAINT_BUFFER`] grid
/// points. If some axis gets no projection peak, nothing is picked.
pub fn pick3d(
    input: &Path,
    output: &Path,
    work_dir: Option<&Path>,
    opts: &PickOptions,
    workers: usize,
    overwrite: bool,
    log: &mut ReproLog,
) -> Result<Vec<RefinedPeak>, PipelineError> {
    check_output(output, overwrite)?;
    let mut file = open_spectrum(input, workers)?;
    if file.ndim() != 3 {
        return Err(PipelineError::Usage(format!(
            "pick3d needs a 3D spectrum, {} has {} axes",
            input.display(),
            file.ndim()
        )));
    }

    let mut restraint: Vec<Vec<f64>> = vec![Vec::new(); 3];
    let mut written = Vec::with_capacity(PROJECTIONS.len() + 1);
    for (tag, axis, kept) in PROJECTIONS {
        let path = projection_path(input, work_dir, tag);
        log::info!("Making projection: {}", path.display());
        write_projection(&mut file, &path, axis, ProjectionMode::absolute(), true)?;

        let mut proj = open_spectrum(&path, workers)?;
        let proj_opts = PickOptions {
            sign: Sign::Positive,
            seed: opts.seed,
            ..PickOptions::default()
        };
        let report = auto_pick_peaks(&mut proj, &proj_opts, None)?;
        log::info!("{} peaks found in {}", report.peaks.len(), path.display());
        for peak in &report.peaks {
            restraint[kept[0]].push(peak.shifts[0]);
            restraint[kept[1]].push(peak.shifts[1]);
        }
        written.push(path);
    }

    let peaks = if restraint.iter().any(|r| r.is_empty()) {
        log::warn!("A projection axis has no peaks; nothing to pick in 3D");
        Vec::new()
    } else {
        let restrained = PickOptions {
            restraint: Some(restraint),
            restraint_buffers: Some(vec![PICK3D_RESTRAINT_BUFFER; 3]),
            ..opts.clone()
        };
        auto_pick_peaks(&mut file, &restrained, None)?.peaks
    };
    write_refined(output, 3, &peaks)?;
    written.push(output.to_path_buf());

    let dir_flag = work_dir
        .map(|d| format!(" -d {}", d.display()))
        .unwrap_or_default();
    let entry = log.add_entry(
        "Pick 3D",
        &format!("{} peaks picked within projection restraints", peaks.len()),
        &format!(
            "ucsftool pick3d -i {} -o {}{} -c {} {}{}",
            input.display(),
            output.display(),
            dir_flag,
            workers,
            pick_flags(opts),
            if overwrite { " -w" } else { "" }
        ),
    );
    for path in &written {
        entry.produced(path);
    }
    Ok(peaks)
}
