//! UCSF read session: header decoding, per-worker file handles and the
//! optional whole-file buffer.

use crate::tile::{TileReader, DEFAULT_TILE_CACHE};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use ucsf_core::coords::CoordinateMapper;
use ucsf_core::geometry::{to_point, GeometryError, GridPoint, TileLayout};
use ucsf_core::header::{
    data_offset, decode_axis_header, decode_file_header, AxisHeader, FileHeader, FormatError,
    AXIS_HEADER_BYTES, FILE_HEADER_BYTES,
};

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid UCSF file: {0}")]
    Format(#[from] FormatError),
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("File too small: {size} bytes, headers need {needed}")]
    TooSmall { size: u64, needed: u64 },
    #[error("File is not open")]
    Closed,
    #[error("Worker {worker} out of range ({workers} workers)")]
    WorkerOutOfRange { worker: usize, workers: usize },
}

/// Options controlling how a file is opened.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Independent file handles and tile caches, one per scan worker.
    pub workers: usize,
    /// Read the whole file into memory when available memory exceeds three
    /// times its size. Available memory comes from `/proc/meminfo`; where
    /// that is missing (non-Linux hosts) the file is always read by tile.
    pub whole_file_cache: bool,
    /// Tiles kept per worker.
    pub cache_capacity: usize,
    /// Fail on tiles outside the data region instead of substituting zeros.
    pub strict_bounds: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            whole_file_cache: true,
            cache_capacity: DEFAULT_TILE_CACHE,
            strict_bounds: false,
        }
    }
}

impl OpenOptions {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// An open UCSF file. Headers are immutable once read.
pub struct UcsfFile {
    path: PathBuf,
    header: FileHeader,
    axes: Vec<AxisHeader>,
    layout: Arc<TileLayout>,
    mapper: CoordinateMapper,
    file_size: u64,
    readers: Vec<TileReader>,
    whole_file: bool,
}

impl UcsfFile {
    pub fn open<P: AsRef<Path>>(path: P, opts: &OpenOptions) -> Result<Self, ReadError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let file_size = file.metadata()?.len();
        if file_size < FILE_HEADER_BYTES as u64 {
            return Err(ReadError::TooSmall {
                size: file_size,
                needed: FILE_HEADER_BYTES as u64,
            });
        }

        let mut buf = vec![0u8; FILE_HEADER_BYTES];
        file.read_exact(&mut buf)?;
        let header = decode_file_header(&buf)?;
        let ndim = header.ndim();
        let needed = data_offset(ndim);
        if file_size < needed {
            return Err(ReadError::TooSmall {
                size: file_size,
                needed,
            });
        }

        let mut axes = Vec::with_capacity(ndim);
        let mut axis_buf = vec![0u8; AXIS_HEADER_BYTES];
        for axis in 0..ndim {
            file.read_exact(&mut axis_buf)?;
            axes.push(decode_axis_header(&axis_buf, axis)?);
        }

        let layout = Arc::new(TileLayout::new(&axes)?);
        if file_size < layout.file_bytes() {
            log::warn!(
                "{}: data region is short ({} of {} bytes), missing tiles read as zero",
                path.display(),
                file_size,
                layout.file_bytes()
            );
        }

        let whole: Option<Arc<[u8]>> = if opts.whole_file_cache && fits_in_memory(file_size) {
            let mut data = Vec::with_capacity(file_size as usize);
            file.seek(SeekFrom::Start(0))?;
            file.read_to_end(&mut data)?;
            log::debug!("{}: cached {} bytes in memory", path.display(), data.len());
            Some(data.into())
        } else {
            None
        };
        let whole_file = whole.is_some();

        let workers = opts.workers.max(1);
        let mut readers = Vec::with_capacity(workers);
        readers.push(TileReader::new(
            Arc::clone(&layout),
            file,
            file_size,
            whole.clone(),
            opts.cache_capacity,
            opts.strict_bounds,
        ));
        for _ in 1..workers {
            readers.push(TileReader::new(
                Arc::clone(&layout),
                File::open(&path)?,
                file_size,
                whole.clone(),
                opts.cache_capacity,
                opts.strict_bounds,
            ));
        }

        log::info!(
            "Opened {}: {}D, {} tiles, {} worker(s)",
            path.display(),
            ndim,
            layout.tile_total(),
            workers
        );

        Ok(Self {
            mapper: CoordinateMapper::new(&axes),
            path,
            header,
            axes,
            layout,
            file_size,
            readers,
            whole_file,
        })
    }

    /// Release every file handle and cached tile. Calling it twice is a no-op.
    pub fn close(&mut self) {
        if !self.readers.is_empty() {
            log::debug!("Closing {}", self.path.display());
        }
        self.readers.clear();
        self.whole_file = false;
    }

    pub fn is_open(&self) -> bool {
        !self.readers.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn axes(&self) -> &[AxisHeader] {
        &self.axes
    }

    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    pub fn layout(&self) -> &TileLayout {
        &self.layout
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn workers(&self) -> usize {
        self.readers.len()
    }

    /// Whether the whole file is held in memory.
    pub fn is_memory_cached(&self) -> bool {
        self.whole_file
    }

    /// Grid points per worker band along the first axis.
    pub fn band_width(&self) -> f64 {
        self.layout.data_points(0) as f64 / self.workers().max(1) as f64
    }

    /// Worker owning first-axis coordinate `x`: `floor(x / band)`, clamped to
    /// the last worker.
    pub fn worker_for(&self, x: i64) -> usize {
        let last = self.workers().saturating_sub(1);
        let band = self.band_width();
        if band <= 0.0 || x <= 0 {
            return 0;
        }
        ((x as f64 / band).floor() as usize).min(last)
    }

    pub fn reader_mut(&mut self, worker: usize) -> Result<&mut TileReader, ReadError> {
        let workers = self.readers.len();
        if workers == 0 {
            return Err(ReadError::Closed);
        }
        self.readers
            .get_mut(worker)
            .ok_or(ReadError::WorkerOutOfRange { worker, workers })
    }

    /// Every worker's reader, for handing one to each scan thread.
    pub fn readers_mut(&mut self) -> Result<&mut [TileReader], ReadError> {
        if self.readers.is_empty() {
            return Err(ReadError::Closed);
        }
        Ok(&mut self.readers)
    }

    /// Value at a grid point given as one coordinate per axis.
    pub fn value(&mut self, grid: &[i64]) -> Result<f32, ReadError> {
        let pt = to_point(grid, self.ndim())?;
        self.value_at(&pt)
    }

    pub fn value_at(&mut self, pt: &GridPoint) -> Result<f32, ReadError> {
        let worker = self.worker_for(pt[0]);
        self.reader_mut(worker)?.value(pt)
    }

    /// Value at the grid point nearest to a ppm position.
    pub fn value_at_shifts(&mut self, shifts: &[f64]) -> Result<f32, ReadError> {
        let grid = self.mapper.shifts_to_grids(shifts)?;
        self.value(&grid)
    }

    /// Sequential reader over the raw data region, for byte-for-byte copies.
    pub fn data_region(&self) -> Result<impl Read, ReadError> {
        if !self.is_open() {
            return Err(ReadError::Closed);
        }
        let mut file = File::open(&self.path)?;
        let start = self.layout.data_offset();
        file.seek(SeekFrom::Start(start))?;
        Ok(BufReader::new(file.take(self.file_size.saturating_sub(start))))
    }

    /// Axis summary table, one column per axis.
    pub fn file_info(&self) -> String {
        let mut out = String::new();
        let mut row = |title: &str, cells: Vec<String>| {
            out.push_str(&format!("{:<20}", title));
            for c in cells {
                out.push_str(&format!("{:>12}", c));
            }
            out.push('\n');
        };
        let axes = &self.axes;
        row("axis", (1..=axes.len()).map(|i| format!("w{}", i)).collect());
        row("nucleus", axes.iter().map(|a| a.nucleus.clone()).collect());
        row("matrix size", axes.iter().map(|a| a.data_points.to_string()).collect());
        row("block size", axes.iter().map(|a| a.tile_size.to_string()).collect());
        row("upfield ppm", axes.iter().map(|a| format!("{:.3}", a.freq_min())).collect());
        row("downfield ppm", axes.iter().map(|a| format!("{:.3}", a.freq_max())).collect());
        row(
            "spectrometer MHz",
            axes.iter().map(|a| format!("{:.3}", a.spectrometer_freq)).collect(),
        );
        row(
            "spectral width Hz",
            axes.iter().map(|a| format!("{:.2}", a.spectral_width)).collect(),
        );
        out
    }
}

impl Drop for UcsfFile {
    fn drop(&mut self) {
        self.close();
    }
}

/// Whether available memory comfortably exceeds three copies of the file.
/// Unknown memory means no.
fn fits_in_memory(file_size: u64) -> bool {
    memory_allows(file_size, available_memory())
}

fn memory_allows(file_size: u64, available: Option<u64>) -> bool {
    match available {
        Some(avail) => avail > file_size.saturating_mul(3),
        None => {
            log::debug!("Available memory unknown; whole-file cache disabled");
            false
        }
    }
}

fn available_memory() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    meminfo
        .lines()
        .find(|l| l.starts_with("MemAvailable:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_test_file;

    #[test]
    fn test_memory_allows() {
        assert!(memory_allows(100, Some(301)));
        assert!(!memory_allows(100, Some(300)));
        assert!(!memory_allows(100, None));
        assert!(!memory_allows(u64::MAX, Some(u64::MAX)));
    }

    #[test]
    fn test_open_reads_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ucsf");
        write_test_file(&path, &[8, 6], &[4, 3], |g| (g[0] + g[1]) as f32);

        let f = UcsfFile::open(&path, &OpenOptions::default()).unwrap();
        assert_eq!(f.ndim(), 2);
        assert_eq!(f.axes()[0].data_points, 8);
        assert_eq!(f.axes()[1].tile_size, 3);
        assert_eq!(f.layout().tile_total(), 4);
        assert_eq!(f.file_size(), f.layout().file_bytes());
    }

    #[test]
    fn test_values_same_with_and_without_memory_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ucsf");
        write_test_file(&path, &[5, 7], &[2, 4], |g| (g[0] * 7 + g[1]) as f32 * 0.5);

        let mut disk = UcsfFile::open(
            &path,
            &OpenOptions {
                whole_file_cache: false,
                ..OpenOptions::default()
            },
        )
        .unwrap();
        let mut mem = UcsfFile::open(&path, &OpenOptions::default().with_workers(3)).unwrap();
        for x in 0..5 {
            for y in 0..7 {
                let expected = (x * 7 + y) as f32 * 0.5;
                assert_eq!(disk.value(&[x, y]).unwrap(), expected);
                assert_eq!(mem.value(&[x, y]).unwrap(), expected);
            }
        }
    }

    #[test]
    fn test_worker_bands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ucsf");
        write_test_file(&path, &[10, 2], &[4, 2], |_| 0.0);

        let f = UcsfFile::open(&path, &OpenOptions::default().with_workers(3)).unwrap();
        assert_eq!(f.workers(), 3);
        assert_eq!(f.worker_for(0), 0);
        assert_eq!(f.worker_for(3), 0);
        assert_eq!(f.worker_for(4), 1);
        assert_eq!(f.worker_for(7), 2);
        assert_eq!(f.worker_for(9), 2);
    }

    #[test]
    fn test_close_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ucsf");
        write_test_file(&path, &[4, 4], &[2, 2], |_| 1.0);

        let mut f = UcsfFile::open(&path, &OpenOptions::default()).unwrap();
        assert_eq!(f.value(&[1, 1]).unwrap(), 1.0);
        f.close();
        f.close();
        assert!(!f.is_open());
        assert!(matches!(f.value(&[1, 1]), Err(ReadError::Closed)));
    }

    #[test]
    fn test_rejects_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("small.ucsf");
        std::fs::write(&small, b"UCSF NMR").unwrap();
        assert!(matches!(
            UcsfFile::open(&small, &OpenOptions::default()),
            Err(ReadError::TooSmall { .. })
        ));

        let bad = dir.path().join("bad.ucsf");
        std::fs::write(&bad, vec![0u8; 400]).unwrap();
        assert!(matches!(
            UcsfFile::open(&bad, &OpenOptions::default()),
            Err(ReadError::Format(FormatError::BadSignature))
        ));

        let missing = dir.path().join("missing.ucsf");
        assert!(matches!(
            UcsfFile::open(&missing, &OpenOptions::default()),
            Err(ReadError::Io(_))
        ));
    }

    #[test]
    fn test_value_at_shifts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ucsf");
        write_test_file(&path, &[8, 6], &[4, 3], |g| (g[0] * 10 + g[1]) as f32);

        let mut f = UcsfFile::open(&path, &OpenOptions::default()).unwrap();
        let shifts = f.mapper().grids_to_shifts(&[5, 2]);
        assert_eq!(f.value_at_shifts(&shifts).unwrap(), 52.0);
    }

    #[test]
    fn test_value_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ucsf");
        write_test_file(&path, &[4, 4], &[2, 2], |_| 1.0);

        let mut f = UcsfFile::open(&path, &OpenOptions::default()).unwrap();
        assert!(matches!(
            f.value(&[1, 1, 1]),
            Err(ReadError::Geometry(GeometryError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_data_region_and_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ucsf");
        write_test_file(&path, &[4, 4], &[2, 2], |_| 1.0);

        let f = UcsfFile::open(&path, &OpenOptions::default()).unwrap();
        let mut raw = Vec::new();
        f.data_region().unwrap().read_to_end(&mut raw).unwrap();
        assert_eq!(raw.len(), 16 * 4);

        let info = f.file_info();
        assert!(info.contains("w1"));
        assert!(info.contains("matrix size"));
        assert_eq!(info.lines().count(), 8);
    }
}
