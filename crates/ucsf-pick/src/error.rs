use std::io;
use thiserror::Error;
use ucsf_core::geometry::GeometryError;
use ucsf_io::ReadError;

#[derive(Error, Debug)]
pub enum PickError {
    #[error("Read error: {0}")]
    Read(#[from] ReadError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("Noise estimation needs at least one sample")]
    EmptySample,
    #[error("Failed to start scan workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Peak scan cancelled")]
    Cancelled,
}
