//! Big-endian f32 sample packing.

use byteorder::{BigEndian, ByteOrder};

/// Unpack a buffer of big-endian f32 words. Trailing bytes that do not
/// form a whole word are ignored.
pub fn unpack_samples(buf: &[u8]) -> Vec<f32> {
    let whole = buf.len() / 4 * 4;
    let mut out = vec![0.0f32; whole / 4];
    BigEndian::read_f32_into(&buf[..whole], &mut out);
    out
}

/// Pack samples as big-endian f32 words.
pub fn pack_samples(values: &[f32]) -> Vec<u8> {
    let mut buf = vec![0u8; values.len() * 4];
    BigEndian::write_f32_into(values, &mut buf);
    buf
}
