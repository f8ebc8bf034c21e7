//! Elementwise value transforms.

use crate::error::TransformError;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use ucsf_io::{UcsfFile, UcsfWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    /// `v × factor`
    Multiply,
    /// `v + factor`
    Add,
    /// `v − factor`
    Subtract,
    /// `v × factor^exponent`
    Power,
    /// `|v|`
    Absolute,
}

impl FromStr for TransformMode {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mult" => Ok(Self::Multiply),
            "comb" => Ok(Self::Add),
            "subt" => Ok(Self::Subtract),
            "pow" => Ok(Self::Power),
            "abs" => Ok(Self::Absolute),
            other => Err(TransformError::InvalidMode(format!(
                "'{}' (expected mult, comb, subt, pow or abs)",
                other
            ))),
        }
    }
}

impl fmt::Display for TransformMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Multiply => "mult",
            Self::Add => "comb",
            Self::Subtract => "subt",
            Self::Power => "pow",
            Self::Absolute => "abs",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub mode: TransformMode,
    pub factor: f64,
    /// Only used by [`TransformMode::Power`].
    pub exponent: f64,
}

impl Transform {
    pub fn new(mode: TransformMode, factor: f64, exponent: f64) -> Self {
        Self {
            mode,
            factor,
            exponent,
        }
    }

    pub fn apply(&self, v: f32) -> f32 {
        let v = v as f64;
        let out = match self.mode {
            TransformMode::Multiply => v * self.factor,
            TransformMode::Add => v + self.factor,
            TransformMode::Subtract => v - self.factor,
            TransformMode::Power => v * self.factor.powf(self.exponent),
            TransformMode::Absolute => v.abs(),
        };
        out as f32
    }
}

/// Write a copy of `file` with `transform` applied to every stored sample,
/// tile padding included. Headers and tiling are unchanged.
pub fn write_transform(
    file: &mut UcsfFile,
    out: &Path,
    transform: &Transform,
    overwrite: bool,
) -> Result<(), TransformError> {
    let header = file.header().clone();
    let axes = file.axes().to_vec();
    let mut writer = UcsfWriter::create(out, &header, &axes, overwrite)?;

    let reader = file.reader_mut(0)?;
    let mut buf = Vec::with_capacity(writer.layout().cube_size());
    for linear in 0..writer.layout().tile_total() {
        let tile = writer.layout().tile_from_linear(linear);
        let source = reader.read_tile(&tile)?;
        buf.clear();
        buf.extend(source.values.iter().map(|&v| transform.apply(v)));
        writer.write_tile(&buf)?;
    }
    writer.finish()?;
    log::info!("Wrote {} ({} {})", out.display(), transform.mode, transform.factor);
    Ok(())
}
