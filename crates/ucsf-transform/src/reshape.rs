//! Axis swaps and centre shifts.

use crate::error::{check_axis, TransformError};
use std::path::Path;
use ucsf_core::enums::ShiftUnit;
use ucsf_core::geometry::GeometryError;
use ucsf_core::header::AxisHeader;
use ucsf_io::{UcsfFile, UcsfWriter};

/// Write `file` with 0-based axes `a` and `b` exchanged. Each axis keeps its
/// own header, tile size included.
pub fn write_swapped_axes(
    file: &mut UcsfFile,
    out: &Path,
    a: usize,
    b: usize,
    overwrite: bool,
) -> Result<(), TransformError> {
    let ndim = file.ndim();
    check_axis(a, ndim)?;
    check_axis(b, ndim)?;
    if a == b {
        return Err(GeometryError::Invalid(format!("cannot swap w{} with itself", a + 1)).into());
    }

    let header = file.header().clone();
    let mut axes = file.axes().to_vec();
    axes.swap(a, b);

    let mut writer = UcsfWriter::create(out, &header, &axes, overwrite)?;
    writer.fill_tiles(|g| -> Result<f32, TransformError> {
        let mut src = *g;
        src.swap(a, b);
        Ok(file.value_at(&src)?)
    })?;
    writer.finish()?;
    log::info!("Wrote {} with w{} and w{} swapped", out.display(), a + 1, b + 1);
    Ok(())
}

/// Centre of `axis` moved by `amount` in `unit`. Point units move by
/// whole grid spacings.
pub fn shifted_center(axis: &AxisHeader, amount: f64, unit: ShiftUnit) -> f32 {
    let delta = match unit {
        ShiftUnit::Ppm => amount,
        ShiftUnit::Hz => amount / axis.spectrometer_freq as f64,
        ShiftUnit::Points => amount * axis.ppm_per_point(),
    };
    (axis.center as f64 + delta) as f32
}

/// Write `file` with the centre of 0-based `axis` translated. The data
/// region is copied byte for byte.
pub fn write_shifted(
    file: &mut UcsfFile,
    out: &Path,
    axis: usize,
    amount: f64,
    unit: ShiftUnit,
    overwrite: bool,
) -> Result<(), TransformError> {
    check_axis(axis, file.ndim())?;

    let header = file.header().clone();
    let mut axes = file.axes().to_vec();
    axes[axis].center = shifted_center(&axes[axis], amount, unit);

    let mut data = file.data_region()?;
    let mut writer = UcsfWriter::create(out, &header, &axes, overwrite)?;
    let bytes = writer.copy_data(&mut data)?;
    writer.finish()?;
    log::info!(
        "Wrote {}: w{} centre {} -> {} ppm ({} data bytes)",
        out.display(),
        axis + 1,
        file.axes()[axis].center,
        axes[axis].center,
        bytes
    );
    Ok(())
}
