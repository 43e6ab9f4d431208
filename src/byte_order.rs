//! Byte-order conversion between the on-disk CryptoAPI layout and the
//! big-endian values handed to callers.
//!
//! CryptoAPI stores every multi-byte integer least-significant byte first.
//! Everything outside this module works with big-endian values, so the key
//! codecs only ever cross that boundary through [`from_little_endian`] and
//! [`put_little_endian`].

use crate::error::KeyFileError;

/// Copies `src` into `dst` in reverse order.
///
/// Copies `min(dst.len(), src.len())` bytes; the tail of `dst` is left untouched.
pub fn reverse_copy(dst: &mut [u8], src: &[u8]) {
    for (item1, item2) in src.iter().rev().zip(dst.iter_mut()) {
        *item2 = *item1;
    }
}

/// Converts a little-endian on-disk field into its big-endian value.
pub fn from_little_endian(field: &[u8]) -> Vec<u8> {
    let mut value = vec![0u8; field.len()];
    reverse_copy(&mut value, field);
    value
}

/// Converts a big-endian value into its little-endian on-disk form.
pub fn to_little_endian(value: &[u8]) -> Vec<u8> {
    from_little_endian(value)
}

/// Appends a big-endian value to `out` in little-endian order without an
/// intermediate buffer.
pub fn put_little_endian(out: &mut Vec<u8>, value: &[u8]) {
    out.extend(value.iter().rev());
}

/// Strips leading zero bytes from a big-endian value.
///
/// An all-zero value keeps a single zero byte so that it still denotes zero.
pub fn trim_leading_zeros(value: &[u8]) -> &[u8] {
    match value.iter().position(|&b| b != 0) {
        Some(first) => &value[first..],
        None if value.is_empty() => value,
        None => &value[value.len() - 1..],
    }
}

/// Strips trailing zero bytes from a little-endian field.
///
/// An all-zero field keeps a single zero byte.
pub fn trim_trailing_zeros(field: &[u8]) -> &[u8] {
    match field.iter().rposition(|&b| b != 0) {
        Some(last) => &field[..=last],
        None if field.is_empty() => field,
        None => &field[..1],
    }
}

/// Left-pads a big-endian value with zeros to exactly `width` bytes.
///
/// Leading zeros are stripped first; returns `None` if the significant bytes
/// still do not fit.
pub fn left_pad(value: &[u8], width: usize) -> Option<Vec<u8>> {
    let first = value.iter().position(|&b| b != 0).unwrap_or(value.len());
    let significant = &value[first..];
    if significant.len() > width {
        return None;
    }
    let mut padded = vec![0u8; width];
    padded[width - significant.len()..].copy_from_slice(significant);
    Some(padded)
}

/// Bounds-checked cursor over a little-endian record.
///
/// Every read names the field being read so truncation errors can point at it.
pub(crate) struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns the next `len` bytes, failing if fewer are available.
    pub(crate) fn take(
        &mut self,
        len: usize,
        field: &'static str,
    ) -> Result<&'a [u8], KeyFileError> {
        if len > self.remaining() {
            return Err(KeyFileError::UnexpectedEndOfFile {
                field,
                expected: len,
                available: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub(crate) fn skip(&mut self, len: usize, field: &'static str) -> Result<(), KeyFileError> {
        self.take(len, field).map(|_| ())
    }

    pub(crate) fn read_u8(&mut self, field: &'static str) -> Result<u8, KeyFileError> {
        Ok(self.take(1, field)?[0])
    }

    pub(crate) fn read_u32(&mut self, field: &'static str) -> Result<u32, KeyFileError> {
        let bytes = self.take(4, field)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_i32(&mut self, field: &'static str) -> Result<i32, KeyFileError> {
        self.read_u32(field).map(|v| v as i32)
    }
}
