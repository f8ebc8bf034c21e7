//! UCSF writer: header block followed by tiles in file order.

use crate::samples::pack_samples;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use ucsf_core::geometry::{GeometryError, GridPoint, TileLayout};
use ucsf_core::header::{encode_headers, AxisHeader, FileHeader, FormatError};

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Output file {} already exists (use overwrite to replace it)", .0.display())]
    Exists(PathBuf),
    #[error("Invalid header: {0}")]
    Format(#[from] FormatError),
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
}

/// Fail with [`WriteError::Exists`] if `path` exists and `overwrite` is off.
pub fn check_output(path: &Path, overwrite: bool) -> Result<(), WriteError> {
    if !overwrite && path.exists() {
        return Err(WriteError::Exists(path.to_path_buf()));
    }
    Ok(())
}

/// Create an output file. Without `overwrite` an existing file is left
/// untouched and reported as [`WriteError::Exists`].
pub fn create_output(path: &Path, overwrite: bool) -> Result<BufWriter<File>, WriteError> {
    let mut opts = fs::OpenOptions::new();
    opts.write(true);
    if overwrite {
        opts.create(true).truncate(true);
    } else {
        opts.create_new(true);
    }
    match opts.open(path) {
        Ok(f) => Ok(BufWriter::new(f)),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(WriteError::Exists(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Streams tiles of one spectrum. Tiles must arrive in row-major tile order.
pub struct UcsfWriter<W: Write> {
    writer: W,
    layout: TileLayout,
    tiles_written: usize,
}

impl UcsfWriter<BufWriter<File>> {
    /// Validate the geometry, then create `path` and write the headers.
    /// Nothing is created when validation fails.
    pub fn create(
        path: &Path,
        header: &FileHeader,
        axes: &[AxisHeader],
        overwrite: bool,
    ) -> Result<Self, WriteError> {
        validate(header, axes)?;
        let out = create_output(path, overwrite)?;
        Self::new(out, header, axes)
    }
}

impl<W: Write> UcsfWriter<W> {
    pub fn new(mut writer: W, header: &FileHeader, axes: &[AxisHeader]) -> Result<Self, WriteError> {
        let layout = validate(header, axes)?;
        encode_headers(header, axes, &mut writer)?;
        Ok(Self {
            writer,
            layout,
            tiles_written: 0,
        })
    }

    pub fn layout(&self) -> &TileLayout {
        &self.layout
    }

    pub fn tiles_written(&self) -> usize {
        self.tiles_written
    }

    /// Append one tile of `cube_size` samples.
    pub fn write_tile(&mut self, values: &[f32]) -> Result<(), WriteError> {
        if values.len() != self.layout.cube_size() {
            return Err(GeometryError::DimensionMismatch {
                expected: self.layout.cube_size(),
                got: values.len(),
            }
            .into());
        }
        if self.tiles_written >= self.layout.tile_total() {
            return Err(GeometryError::Invalid(format!(
                "tile {} past the end of a {}-tile file",
                self.tiles_written,
                self.layout.tile_total()
            ))
            .into());
        }
        self.writer.write_all(&pack_samples(values))?;
        self.tiles_written += 1;
        Ok(())
    }

    /// Write every tile, asking `sample` for each in-grid point. Padding
    /// points past the data points are written as zero without a lookup.
    pub fn fill_tiles<E, F>(&mut self, mut sample: F) -> Result<(), E>
    where
        E: From<WriteError>,
        F: FnMut(&GridPoint) -> Result<f32, E>,
    {
        let mut buf = Vec::with_capacity(self.layout.cube_size());
        for linear in self.tiles_written..self.layout.tile_total() {
            let tile = self.layout.tile_from_linear(linear);
            buf.clear();
            for grid in self.layout.tile_points(&tile) {
                buf.push(if self.layout.in_grid(&grid) {
                    sample(&grid)?
                } else {
                    0.0
                });
            }
            self.write_tile(&buf)?;
        }
        Ok(())
    }

    /// Copy a raw data region verbatim.
    pub fn copy_data<R: Read>(&mut self, data: &mut R) -> Result<u64, WriteError> {
        let n = io::copy(data, &mut self.writer)?;
        self.tiles_written = self.layout.tile_total();
        Ok(n)
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W, WriteError> {
        if self.tiles_written < self.layout.tile_total() {
            log::warn!(
                "UCSF output finished after {} of {} tiles",
                self.tiles_written,
                self.layout.tile_total()
            );
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

fn validate(header: &FileHeader, axes: &[AxisHeader]) -> Result<TileLayout, WriteError> {
    if header.ndim() != axes.len() {
        return Err(GeometryError::DimensionMismatch {
            expected: header.ndim(),
            got: axes.len(),
        }
        .into());
    }
    Ok(TileLayout::new(axes)?)
}

/// Write a complete spectrum whose samples come from `sample`.
pub fn write_spectrum<F>(
    path: &Path,
    axes: &[AxisHeader],
    overwrite: bool,
    mut sample: F,
) -> Result<(), WriteError>
where
    F: FnMut(&GridPoint) -> f32,
{
    let header = FileHeader::new(axes.len() as u8);
    let mut writer = UcsfWriter::create(path, &header, axes, overwrite)?;
    writer.fill_tiles::<WriteError, _>(|g| Ok(sample(g)))?;
    writer.finish()?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}
