//! Commands that write derived spectra: transforms, projections, planes,
//! axis swaps and centre shifts.

use super::{axis_index, open_spectrum, PipelineError};
use crate::log::reproducibility::ReproLog;
use std::path::{Path, PathBuf};
use ucsf_core::enums::ShiftUnit;
use ucsf_transform::{
    write_planes, write_projection, write_shifted, write_swapped_axes, write_transform,
    PlaneOptions, ProjectionMode, Transform,
};

fn overwrite_flag(overwrite: bool) -> &'static str {
    if overwrite {
        " -w"
    } else {
        ""
    }
}

pub fn transform(
    input: &Path,
    output: &Path,
    t: &Transform,
    overwrite: bool,
    log: &mut ReproLog,
) -> Result<(), PipelineError> {
    let mut file = open_spectrum(input, 1)?;
    write_transform(&mut file, output, t, overwrite)?;
    log.add_entry(
        "Transform",
        &format!("{} by {} (exponent {})", t.mode, t.factor, t.exponent),
        &format!(
            "ucsftool transform -i {} -o {} --mode {} --factor {} --exponent {}{}",
            input.display(),
            output.display(),
            t.mode,
            t.factor,
            t.exponent,
            overwrite_flag(overwrite)
        ),
    )
    .produced(output);
    Ok(())
}

/// Project along CLI axis `w{axis}`.
pub fn project(
    input: &Path,
    output: &Path,
    axis: usize,
    mode: ProjectionMode,
    overwrite: bool,
    log: &mut ReproLog,
) -> Result<(), PipelineError> {
    let mut file = open_spectrum(input, 1)?;
    write_projection(&mut file, output, axis_index(axis)?, mode, overwrite)?;
    log.add_entry(
        "Project",
        &format!("{} projection along w{}", mode, axis),
        &format!(
            "ucsftool project -i {} -o {} -a {} --mode {}{}",
            input.display(),
            output.display(),
            axis,
            mode,
            overwrite_flag(overwrite)
        ),
    )
    .produced(output);
    Ok(())
}

/// Split into planes. `axis` is 1-based; `None` picks the split axis from
/// the headers.
pub fn planes(
    input: &Path,
    prefix: &str,
    axis: Option<usize>,
    opts: PlaneOptions,
    log: &mut ReproLog,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut file = open_spectrum(input, 1)?;
    let opts = PlaneOptions {
        axis: axis.map(axis_index).transpose()?,
        ..opts
    };
    let written = write_planes(&mut file, prefix, &opts)?;

    let axis_flag = axis.map(|a| format!(" -a {}", a)).unwrap_or_default();
    let entry = log.add_entry(
        "Planes",
        &format!("{} planes written with prefix {}", written.len(), prefix),
        &format!(
            "ucsftool planes -i {} -p {}{} --start {} --step {}{}{}",
            input.display(),
            prefix,
            axis_flag,
            opts.start,
            opts.step,
            if opts.reverse { " --reverse" } else { "" },
            overwrite_flag(opts.overwrite)
        ),
    );
    for path in &written {
        entry.produced(path);
    }
    Ok(written)
}

/// Swap CLI axes `w{a}` and `w{b}`.
pub fn swap(
    input: &Path,
    output: &Path,
    a: usize,
    b: usize,
    overwrite: bool,
    log: &mut ReproLog,
) -> Result<(), PipelineError> {
    let mut file = open_spectrum(input, 1)?;
    write_swapped_axes(&mut file, output, axis_index(a)?, axis_index(b)?, overwrite)?;
    log.add_entry(
        "Swap",
        &format!("w{} <-> w{}", a, b),
        &format!(
            "ucsftool swap -i {} -o {} {} {}{}",
            input.display(),
            output.display(),
            a,
            b,
            overwrite_flag(overwrite)
        ),
    )
    .produced(output);
    Ok(())
}

/// Move the centre of CLI axis `w{axis}`.
pub fn shift(
    input: &Path,
    output: &Path,
    axis: usize,
    amount: f64,
    unit: ShiftUnit,
    overwrite: bool,
    log: &mut ReproLog,
) -> Result<(), PipelineError> {
    let mut file = open_spectrum(input, 1)?;
    write_shifted(&mut file, output, axis_index(axis)?, amount, unit, overwrite)?;
    log.add_entry(
        "Shift",
        &format!("w{} centre moved by {} {}", axis, amount, unit),
        &format!(
            "ucsftool shift -i {} -o {} -a {} --amount={} --unit {}{}",
            input.display(),
            output.display(),
            axis,
            amount,
            unit,
            overwrite_flag(overwrite)
        ),
    )
    .produced(output);
    Ok(())
}
