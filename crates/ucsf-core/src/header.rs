//! UCSF file header (180 bytes) and axis headers (128 bytes each).
//!
//! All multi-byte fields are big-endian. Only the raw fields are stored on
//! disk; tile count, fill count, margins and ppm bounds are always
//! recomputed from them, so writers never have to keep those in sync.
//!
//! File header layout:
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 10   | `"UCSF NMR"` + 2 NUL                     |
//! | 10     | 1    | dimension count                          |
//! | 11     | 1    | data component count                     |
//! | 12     | 1    | reserved (0)                             |
//! | 13     | 1    | format version                           |
//! | 14     | 30   | free-text stamp (ignored on read)        |
//! | 44     | 136  | reserved (0)                             |
//!
//! Axis header layout:
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 6    | nucleus label, NUL padded                |
//! | 8      | 4    | data point count (u32)                   |
//! | 16     | 4    | tile size (u32)                          |
//! | 20     | 4    | spectrometer frequency, MHz (f32)        |
//! | 24     | 4    | spectral width, Hz (f32)                 |
//! | 28     | 4    | centre, ppm (f32)                        |
//! | 32     | 96   | reserved (0)                             |

use byteorder::{BigEndian, ByteOrder};
use std::io::{self, Write};
use thiserror::Error;

// ─── Constants ──────────────────────────────────────────────────────────────

/// Signature at the start of every UCSF file.
pub const UCSF_SIGNATURE: &[u8; 8] = b"UCSF NMR";
/// File header size in bytes.
pub const FILE_HEADER_BYTES: usize = 180;
/// Axis header size in bytes.
pub const AXIS_HEADER_BYTES: usize = 128;
/// Highest supported dimension count.
pub const MAX_DIMS: usize = 4;
/// Width of the nucleus label field.
pub const NUCLEUS_BYTES: usize = 6;

const OFF_DIM_COUNT: usize = 10;
const OFF_COMPONENTS: usize = 11;
const OFF_VERSION: usize = 13;
const OFF_STAMP: usize = 14;
const STAMP_BYTES: usize = 30;

const OFF_POINTS: usize = 8;
const OFF_TILE_SIZE: usize = 16;
const OFF_SPEC_FREQ: usize = 20;
const OFF_SPEC_WIDTH: usize = 24;
const OFF_CENTER: usize = 28;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("UCSF NMR signature not found")]
    BadSignature,
    #[error("header truncated: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error("unsupported dimension count {0} (expected 1-4)")]
    DimCount(u8),
    #[error("axis {axis} header is invalid: {reason}")]
    Axis { axis: usize, reason: String },
}

// ─── File header ────────────────────────────────────────────────────────────

/// Decoded file header. The signature is implied: a value of this type only
/// exists for bytes that carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub dim_count: u8,
    pub component_count: u8,
    pub version: u8,
}

impl FileHeader {
    /// Header for a new real-valued file of `dim_count` dimensions.
    pub fn new(dim_count: u8) -> Self {
        Self {
            dim_count,
            component_count: 1,
            version: 2,
        }
    }

    pub fn ndim(&self) -> usize {
        self.dim_count as usize
    }

    /// Byte offset of the first tile.
    pub fn data_offset(&self) -> u64 {
        data_offset(self.ndim())
    }

    /// Serialize to exactly [`FILE_HEADER_BYTES`] bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; FILE_HEADER_BYTES];
        buf[..UCSF_SIGNATURE.len()].copy_from_slice(UCSF_SIGNATURE);
        buf[OFF_DIM_COUNT] = self.dim_count;
        buf[OFF_COMPONENTS] = self.component_count;
        buf[OFF_VERSION] = self.version;

        let stamp = format!("ucsftool {}", chrono::Local::now().format("%Y-%m-%d"));
        let n = stamp.len().min(STAMP_BYTES);
        buf[OFF_STAMP..OFF_STAMP + n].copy_from_slice(&stamp.as_bytes()[..n]);
        buf
    }
}

/// Byte offset of the data region for a file of `ndim` dimensions.
pub fn data_offset(ndim: usize) -> u64 {
    (FILE_HEADER_BYTES + AXIS_HEADER_BYTES * ndim) as u64
}

/// Decode the 180-byte file header.
pub fn decode_file_header(buf: &[u8]) -> Result<FileHeader, FormatError> {
    if buf.len() < UCSF_SIGNATURE.len() || &buf[..UCSF_SIGNATURE.len()] != UCSF_SIGNATURE {
        return Err(FormatError::BadSignature);
    }
    if buf.len() < FILE_HEADER_BYTES {
        return Err(FormatError::Truncated {
            expected: FILE_HEADER_BYTES,
            got: buf.len(),
        });
    }

    let dim_count = buf[OFF_DIM_COUNT];
    if dim_count == 0 || dim_count as usize > MAX_DIMS {
        return Err(FormatError::DimCount(dim_count));
    }

    Ok(FileHeader {
        dim_count,
        component_count: buf[OFF_COMPONENTS],
        version: buf[OFF_VERSION],
    })
}

/// Write the file header at the writer's current position.
pub fn encode_file_header<W: Write>(header: &FileHeader, writer: &mut W) -> io::Result<()> {
    writer.write_all(&header.to_bytes())
}

// ─── Axis header ────────────────────────────────────────────────────────────

/// One axis of the spectrum. Only raw on-disk fields are stored; everything
/// else is a method.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisHeader {
    /// Nucleus label such as `1H`, `15N` or `13C`.
    pub nucleus: String,
    pub data_points: u32,
    pub tile_size: u32,
    /// Spectrometer frequency in MHz.
    pub spectrometer_freq: f32,
    /// Spectral width in Hz.
    pub spectral_width: f32,
    /// Centre of the axis in ppm.
    pub center: f32,
}

impl AxisHeader {
    /// Number of tiles along this axis, `ceil(data_points / tile_size)`.
    pub fn tile_count(&self) -> u32 {
        self.data_points.div_ceil(self.tile_size.max(1))
    }

    /// Points covered by the tiles, padding included.
    pub fn fill_points(&self) -> u32 {
        self.tile_size * self.tile_count()
    }

    /// Padding points past the last data point.
    pub fn margin_points(&self) -> u32 {
        self.fill_points() - self.data_points
    }

    /// Width of the padding in ppm.
    pub fn margin_freq(&self) -> f64 {
        self.margin_points() as f64 / self.data_points as f64 * self.width_ppm()
    }

    /// Spectral width in ppm.
    pub fn width_ppm(&self) -> f64 {
        self.spectral_width as f64 / self.spectrometer_freq as f64
    }

    /// Upfield edge in ppm.
    pub fn freq_min(&self) -> f64 {
        self.center as f64 - self.width_ppm() / 2.0
    }

    /// Downfield edge in ppm; grid index 0 sits here.
    pub fn freq_max(&self) -> f64 {
        self.center as f64 + self.width_ppm() / 2.0
    }

    /// ppm spacing between adjacent grid points.
    pub fn ppm_per_point(&self) -> f64 {
        self.width_ppm() / self.data_points as f64
    }

    /// Copy of this header with a different tile size.
    pub fn with_tile_size(&self, tile_size: u32) -> Self {
        Self {
            tile_size,
            ..self.clone()
        }
    }

    /// Serialize to exactly [`AXIS_HEADER_BYTES`] bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; AXIS_HEADER_BYTES];
        let label = self.nucleus.as_bytes();
        let n = label.len().min(NUCLEUS_BYTES);
        buf[..n].copy_from_slice(&label[..n]);

        BigEndian::write_u32(&mut buf[OFF_POINTS..OFF_POINTS + 4], self.data_points);
        BigEndian::write_u32(&mut buf[OFF_TILE_SIZE..OFF_TILE_SIZE + 4], self.tile_size);
        BigEndian::write_f32(&mut buf[OFF_SPEC_FREQ..OFF_SPEC_FREQ + 4], self.spectrometer_freq);
        BigEndian::write_f32(&mut buf[OFF_SPEC_WIDTH..OFF_SPEC_WIDTH + 4], self.spectral_width);
        BigEndian::write_f32(&mut buf[OFF_CENTER..OFF_CENTER + 4], self.center);
        buf
    }
}

/// Decode one 128-byte axis header. `axis` is only used in error messages.
pub fn decode_axis_header(buf: &[u8], axis: usize) -> Result<AxisHeader, FormatError> {
    if buf.len() < AXIS_HEADER_BYTES {
        return Err(FormatError::Truncated {
            expected: AXIS_HEADER_BYTES,
            got: buf.len(),
        });
    }

    let label: Vec<u8> = buf[..NUCLEUS_BYTES].iter().copied().filter(|&b| b != 0).collect();
    let nucleus = String::from_utf8_lossy(&label).trim().to_string();

    let header = AxisHeader {
        nucleus,
        data_points: BigEndian::read_u32(&buf[OFF_POINTS..OFF_POINTS + 4]),
        tile_size: BigEndian::read_u32(&buf[OFF_TILE_SIZE..OFF_TILE_SIZE + 4]),
        spectrometer_freq: BigEndian::read_f32(&buf[OFF_SPEC_FREQ..OFF_SPEC_FREQ + 4]),
        spectral_width: BigEndian::read_f32(&buf[OFF_SPEC_WIDTH..OFF_SPEC_WIDTH + 4]),
        center: BigEndian::read_f32(&buf[OFF_CENTER..OFF_CENTER + 4]),
    };

    if header.data_points == 0 {
        return Err(FormatError::Axis {
            axis,
            reason: "data point count is zero".to_string(),
        });
    }
    if header.tile_size == 0 {
        return Err(FormatError::Axis {
            axis,
            reason: "tile size is zero".to_string(),
        });
    }
    Ok(header)
}

/// Write one axis header at the writer's current position.
pub fn encode_axis_header<W: Write>(header: &AxisHeader, writer: &mut W) -> io::Result<()> {
    writer.write_all(&header.to_bytes())
}

/// Write a complete header block: file header followed by every axis header.
pub fn encode_headers<W: Write>(
    file_header: &FileHeader,
    axes: &[AxisHeader],
    writer: &mut W,
) -> io::Result<()> {
    encode_file_header(file_header, writer)?;
    for axis in axes {
        encode_axis_header(axis, writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_axis() -> AxisHeader {
        AxisHeader {
            nucleus: "15N".to_string(),
            data_points: 100,
            tile_size: 32,
            spectrometer_freq: 60.8,
            spectral_width: 2000.0,
            center: 118.0,
        }
    }

    #[test]
    fn test_file_header_roundtrip() {
        let hdr = FileHeader::new(3);
        let bytes = hdr.to_bytes();
        assert_eq!(bytes.len(), FILE_HEADER_BYTES);
        assert_eq!(&bytes[..8], UCSF_SIGNATURE);
        let decoded = decode_file_header(&bytes).unwrap();
        assert_eq!(decoded, hdr);
        assert_eq!(decoded.data_offset(), 180 + 3 * 128);
    }

    #[test]
    fn test_bad_signature() {
        let mut bytes = FileHeader::new(2).to_bytes();
        bytes[0] = b'X';
        assert!(matches!(decode_file_header(&bytes), Err(FormatError::BadSignature)));
    }

    #[test]
    fn test_truncated_and_dim_count() {
        let bytes = FileHeader::new(2).to_bytes();
        assert!(matches!(
            decode_file_header(&bytes[..100]),
            Err(FormatError::Truncated { .. })
        ));

        let mut bytes = FileHeader::new(2).to_bytes();
        bytes[10] = 7;
        assert!(matches!(decode_file_header(&bytes), Err(FormatError::DimCount(7))));
    }

    #[test]
    fn test_axis_header_roundtrip() {
        let ah = sample_axis();
        let mut buf = Vec::new();
        encode_axis_header(&ah, &mut buf).unwrap();
        assert_eq!(buf.len(), AXIS_HEADER_BYTES);
        assert_eq!(&buf[8..12], &[0, 0, 0, 100]);

        let decoded = decode_axis_header(&buf, 0).unwrap();
        assert_eq!(decoded, ah);
        assert_eq!(decoded.tile_count(), ah.tile_count());
        assert_eq!(decoded.margin_freq(), ah.margin_freq());
    }

    #[test]
    fn test_axis_derived_fields() {
        let ah = sample_axis();
        assert_eq!(ah.tile_count(), 4);
        assert_eq!(ah.fill_points(), 128);
        assert_eq!(ah.margin_points(), 28);
        let half = 2000.0 / 60.8 / 2.0;
        assert!((ah.freq_max() - (118.0 + half)).abs() < 1e-3);
        assert!((ah.freq_min() - (118.0 - half)).abs() < 1e-3);
        assert!(ah.tile_count() * ah.tile_size >= ah.data_points);
    }

    #[test]
    fn test_nucleus_label_truncated_and_trimmed() {
        let mut ah = sample_axis();
        ah.nucleus = "13C-long".to_string();
        let decoded = decode_axis_header(&ah.to_bytes(), 0).unwrap();
        assert_eq!(decoded.nucleus, "13C-lo");
    }

    #[test]
    fn test_zero_tile_size_rejected() {
        let mut ah = sample_axis();
        ah.tile_size = 0;
        assert!(matches!(
            decode_axis_header(&ah.to_bytes(), 1),
            Err(FormatError::Axis { axis: 1, .. })
        ));
    }
}
