use thiserror::Error;
use ucsf_core::geometry::GeometryError;
use ucsf_io::{ReadError, WriteError};

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Read error: {0}")]
    Read(#[from] ReadError),
    #[error("Write error: {0}")]
    Write(#[from] WriteError),
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("Invalid mode: {0}")]
    InvalidMode(String),
}

impl TransformError {
    /// True when the operation stopped because an output file already exists.
    pub fn is_exists(&self) -> bool {
        matches!(self, Self::Write(WriteError::Exists(_)))
    }
}

/// Fail unless `axis` is a valid 0-based axis of an `ndim` spectrum.
pub(crate) fn check_axis(axis: usize, ndim: usize) -> Result<(), GeometryError> {
    if axis >= ndim {
        return Err(GeometryError::AxisOutOfRange { axis, ndim });
    }
    Ok(())
}

/// Projections and plane splits need at least three dimensions.
pub(crate) fn check_reducible(ndim: usize, what: &str) -> Result<(), GeometryError> {
    if ndim < 3 {
        return Err(GeometryError::Invalid(format!(
            "{} needs a 3D or 4D spectrum, got {}D",
            what, ndim
        )));
    }
    Ok(())
}
