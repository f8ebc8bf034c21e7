//! ucsftool: inspect, transform and peak-pick UCSF (Sparky) NMR spectra.

mod log;
mod pipeline;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::log::reproducibility::ReproLog;
use crate::pipeline::{picking, reshaping};
use ucsf_core::enums::{ShiftUnit, Sign};
use ucsf_pick::PickOptions;
use ucsf_transform::{PlaneOptions, ProjectionMode, Transform, TransformMode};

/// Threshold multiplier of the `pick` command when none is configured.
const PICK_NOISE_MULTIPLIER: f32 = 8.5;
/// Grid buffer of the `pick` command when none is configured.
const PICK_GRID_BUFFER: usize = 1;

#[derive(Parser)]
#[command(
    name = "ucsftool",
    version,
    about = "Inspect, transform and peak-pick UCSF (Sparky) NMR spectra"
)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    /// Save a reproducibility log (.json, .sh, or text otherwise)
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the axis table
    Info {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Estimate the noise level from random samples
    Noise {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value_t = ucsf_pick::noise::AUTO_PICK_NOISE_SAMPLES)]
        samples: usize,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Pick peaks and write a SPARKY peak list
    Pick {
        /// UCSF spectrum to pick
        #[arg(short, long)]
        input: PathBuf,

        /// Peak list to write [default: <input>.list]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite if the output file exists
        #[arg(short = 'w', long, default_value_t = false)]
        overwrite: bool,

        /// Number of worker threads
        #[arg(short = 'c', long = "nproc", default_value_t = 1)]
        workers: usize,

        /// Print the axis table; without -o nothing is picked
        #[arg(short = 'p', long = "print-info", default_value_t = false)]
        print_info: bool,

        #[command(flatten)]
        tuning: PickTuning,
    },

    /// Re-pick around the peaks of an existing peak list
    Refine {
        #[arg(short, long)]
        input: PathBuf,

        /// Peak list to refine
        #[arg(short, long)]
        list: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short = 'w', long, default_value_t = false)]
        overwrite: bool,

        #[command(flatten)]
        tuning: PickTuning,
    },

    /// Pick a 3D spectrum restrained by peaks of its 2D projections
    Pick3d {
        #[arg(short, long)]
        input: PathBuf,

        /// [default: <input>.list]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for the projection files [default: next to the input]
        #[arg(short = 'd', long)]
        work_dir: Option<PathBuf>,

        #[arg(short = 'w', long, default_value_t = false)]
        overwrite: bool,

        #[arg(short = 'c', long = "nproc", default_value_t = 1)]
        workers: usize,

        #[command(flatten)]
        tuning: PickTuning,
    },

    /// Apply a value transform to every sample
    Transform {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// mult, comb, subt, pow or abs
        #[arg(short, long)]
        mode: TransformMode,

        #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
        factor: f64,

        /// Exponent of the pow mode
        #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
        exponent: f64,

        #[arg(short = 'w', long, default_value_t = false)]
        overwrite: bool,
    },

    /// Project a 3D or 4D spectrum along one axis
    Project {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Axis to project along (1 = w1)
        #[arg(short, long)]
        axis: usize,

        /// avg, sum, min, max (optionally pos_/neg_ prefixed) or abs
        #[arg(short, long, default_value = "abs")]
        mode: ProjectionMode,

        #[arg(short = 'w', long, default_value_t = false)]
        overwrite: bool,
    },

    /// Split a 3D or 4D spectrum into planes
    Planes {
        #[arg(short, long)]
        input: PathBuf,

        /// Output prefix [default: input path without extension]
        #[arg(short, long)]
        prefix: Option<String>,

        /// Axis to split along (1 = w1) [default: chosen from the nuclei]
        #[arg(short, long)]
        axis: Option<usize>,

        /// Write planes from the last index down
        #[arg(short, long, default_value_t = false)]
        reverse: bool,

        #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
        start: f64,

        #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
        step: f64,

        #[arg(short = 'w', long, default_value_t = false)]
        overwrite: bool,
    },

    /// Swap two axes
    Swap {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// First axis (1 = w1)
        a: usize,

        /// Second axis
        b: usize,

        #[arg(short = 'w', long, default_value_t = false)]
        overwrite: bool,
    },

    /// Move the centre frequency of one axis
    Shift {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Axis to shift (1 = w1)
        #[arg(short, long)]
        axis: usize,

        #[arg(long, allow_hyphen_values = true)]
        amount: f64,

        /// ppm, hz or pt
        #[arg(short, long, default_value = "ppm")]
        unit: ShiftUnit,

        #[arg(short = 'w', long, default_value_t = false)]
        overwrite: bool,
    },
}

/// Pick settings shared by the picking commands. Flags given on the
/// command line override a `--config` file.
#[derive(Args)]
struct PickTuning {
    /// Intensity threshold to consider as a peak
    #[arg(short, long, allow_hyphen_values = true)]
    threshold: Option<f32>,

    /// Threshold as a multiple of the median noise level
    #[arg(short = 'm', long = "multthresh")]
    multthresh: Option<f32>,

    /// Keep this many of the strongest peaks
    #[arg(short = 'n', long = "number")]
    number: Option<usize>,

    /// Grid buffer on every axis, 1 to 5; lower is more sensitive
    #[arg(short = 'r', long = "res", value_parser = clap::value_parser!(u8).range(1..=5))]
    res: Option<u8>,

    /// Grid buffers per axis, e.g. 22 or 2,2,3
    #[arg(short = 'R', long = "ress")]
    ress: Option<String>,

    /// 1 positive, -1 negative, 0 both
    #[arg(long, allow_hyphen_values = true)]
    sign: Option<i32>,

    /// Seed for noise sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Pick settings as JSON
    #[arg(long)]
    config: Option<PathBuf>,
}

impl PickTuning {
    /// Options for an `ndim` spectrum. `defaults` are the multiplier and grid
    /// buffer to use when neither a flag nor a config file sets them.
    fn options(
        &self,
        ndim: usize,
        defaults: Option<(f32, usize)>,
    ) -> Result<PickOptions, Box<dyn std::error::Error>> {
        let mut opts = match &self.config {
            Some(path) => picking::load_options(path)?,
            None => {
                let mut opts = PickOptions::default();
                if let Some((mult, buffer)) = defaults {
                    opts.noise_multiplier = mult;
                    opts.grid_buffers = Some(vec![buffer; ndim]);
                }
                opts
            }
        };

        if let Some(t) = self.threshold {
            opts.threshold = Some(t.abs());
        }
        if let Some(m) = self.multthresh {
            opts.noise_multiplier = m;
        }
        if let Some(n) = self.number {
            opts.max_count = Some(n);
        }
        if let Some(r) = self.res {
            opts.grid_buffers = Some(vec![r as usize; ndim]);
        }
        if let Some(ress) = &self.ress {
            opts.grid_buffers = Some(parse_buffers(ress, ndim)?);
        }
        if let Some(s) = self.sign {
            opts.sign = Sign::from_i32(s)
                .ok_or_else(|| format!("invalid sign {} (expected 1, -1 or 0)", s))?;
        }
        if self.seed.is_some() {
            opts.seed = self.seed;
        }
        Ok(opts)
    }
}

/// `22` (one digit per axis) or `2,2,3`.
fn parse_buffers(s: &str, ndim: usize) -> Result<Vec<usize>, String> {
    let buffers: Option<Vec<usize>> = if s.contains(',') {
        s.split(',').map(|p| p.trim().parse().ok()).collect()
    } else {
        s.chars().map(|c| c.to_digit(10).map(|d| d as usize)).collect()
    };
    let buffers = buffers.ok_or_else(|| format!("invalid grid buffers '{}'", s))?;
    if buffers.len() != ndim {
        return Err(format!(
            "{} grid buffers given for a {}D spectrum",
            buffers.len(),
            ndim
        ));
    }
    Ok(buffers)
}

fn spectrum_ndim(path: &Path) -> Result<usize, pipeline::PipelineError> {
    Ok(pipeline::open_spectrum(path, 1)?.ndim())
}

fn run(command: Command, repro: &mut ReproLog) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Info { input } => {
            repro.set_source(&input);
            print!("{}", picking::info(&input, repro)?);
        }
        Command::Noise {
            input,
            samples,
            seed,
        } => {
            repro.set_source(&input);
            let level = picking::noise(&input, samples, seed, repro)?;
            println!("Noise level: {}", level);
        }
        Command::Pick {
            input,
            output,
            overwrite,
            workers,
            print_info,
            tuning,
        } => {
            repro.set_source(&input);
            if print_info {
                print!("{}", picking::info(&input, repro)?);
                if output.is_none() {
                    return Ok(());
                }
            }
            let output = output.unwrap_or_else(|| pipeline::sibling_path(&input, "list"));
            let ndim = spectrum_ndim(&input)?;
            let opts = tuning.options(ndim, Some((PICK_NOISE_MULTIPLIER, PICK_GRID_BUFFER)))?;
            let report = picking::pick(&input, &output, &opts, workers, overwrite, repro)?;
            println!("Noise level: {}", report.noise);
            println!("Threshold: {}", report.threshold);
            println!("Detected peak count: {}", report.found);
            println!("{} peaks written to {}", report.peaks.len(), output.display());
        }
        Command::Refine {
            input,
            list,
            output,
            overwrite,
            tuning,
        } => {
            repro.set_source(&input);
            let opts = tuning.options(spectrum_ndim(&input)?, None)?;
            let peaks = picking::refine(&input, &list, &output, &opts, overwrite, repro)?;
            println!("{} peaks written to {}", peaks.len(), output.display());
        }
        Command::Pick3d {
            input,
            output,
            work_dir,
            overwrite,
            workers,
            tuning,
        } => {
            repro.set_source(&input);
            let output = output.unwrap_or_else(|| pipeline::sibling_path(&input, "list"));
            let opts = tuning.options(spectrum_ndim(&input)?, None)?;
            let peaks = picking::pick3d(
                &input,
                &output,
                work_dir.as_deref(),
                &opts,
                workers,
                overwrite,
                repro,
            )?;
            println!("{} peaks written to {}", peaks.len(), output.display());
        }
        Command::Transform {
            input,
            output,
            mode,
            factor,
            exponent,
            overwrite,
        } => {
            repro.set_source(&input);
            let t = Transform::new(mode, factor, exponent);
            reshaping::transform(&input, &output, &t, overwrite, repro)?;
        }
        Command::Project {
            input,
            output,
            axis,
            mode,
            overwrite,
        } => {
            repro.set_source(&input);
            reshaping::project(&input, &output, axis, mode, overwrite, repro)?;
        }
        Command::Planes {
            input,
            prefix,
            axis,
            reverse,
            start,
            step,
            overwrite,
        } => {
            repro.set_source(&input);
            let prefix = prefix.unwrap_or_else(|| input.with_extension("").display().to_string());
            let opts = PlaneOptions {
                axis: None,
                reverse,
                start,
                step,
                overwrite,
            };
            let written = reshaping::planes(&input, &prefix, axis, opts, repro)?;
            for path in &written {
                println!("{}", path.display());
            }
        }
        Command::Swap {
            input,
            output,
            a,
            b,
            overwrite,
        } => {
            repro.set_source(&input);
            reshaping::swap(&input, &output, a, b, overwrite, repro)?;
        }
        Command::Shift {
            input,
            output,
            axis,
            amount,
            unit,
            overwrite,
        } => {
            repro.set_source(&input);
            reshaping::shift(&input, &output, axis, amount, unit, overwrite, repro)?;
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    ::log::debug!("ucsftool v{}", env!("CARGO_PKG_VERSION"));

    let mut repro = ReproLog::new();
    let result = run(cli.command, &mut repro);
    if let Err(e) = &result {
        repro.record_failure(e);
    }
    if let Some(path) = &cli.log {
        repro.save(path)?;
        ::log::info!("Reproducibility log saved to {}", path.display());
    }
    result
}
