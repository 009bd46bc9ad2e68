//! Bounded byte cursor over a borrowed input buffer.

use super::{Tag, MAX_LENGTH, MAX_LENGTH_BYTES, MAX_TAG_BYTES, MAX_VARINT_BYTES};
use crate::error::{Error, Result};

/// A read position inside one input buffer.
///
/// The cursor borrows the bytes it may still read; its length is the remaining
/// limit. Sub-ranges carved with [`Cursor::split_to`] share the same buffer and
/// are marked as bounded, so that running out of bytes inside them is reported
/// as a [`Error::BoundaryViolation`] rather than [`Error::TruncatedInput`].
///
/// Every read either succeeds and advances the cursor, or fails and leaves the
/// cursor untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor<'a> {
    data: &'a [u8],
    /// Absolute offset of `data[0]` in the original input
    offset: usize,
    bounded: bool,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor over a whole input buffer
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            bounded: false,
        }
    }

    /// Creates a cursor over a buffer that is itself a declared sub-range
    pub fn bounded(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            bounded: true,
        }
    }

    /// Number of bytes left before the limit
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    /// Returns true once the limit has been reached
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Absolute offset of the next byte to be read
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The unread bytes
    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    fn advance(&mut self, n: usize) {
        self.data = &self.data[n..];
        self.offset += n;
    }

    /// Error for a read at `offset` that needed `needed` bytes but found fewer
    fn shortfall(&self, needed: usize) -> Error {
        if self.bounded {
            Error::boundary_violation(
                self.offset,
                format!(
                    "read of {} bytes crosses range end ({} bytes left)",
                    needed,
                    self.remaining()
                ),
            )
        } else {
            Error::truncated(self.offset, needed, self.remaining())
        }
    }

    /// Carves the next `n` bytes off as a bounded sub-cursor.
    pub fn split_to(&mut self, n: usize) -> Result<Cursor<'a>> {
        if n > self.remaining() {
            return Err(self.shortfall(n));
        }

        let sub = Cursor {
            data: &self.data[..n],
            offset: self.offset,
            bounded: true,
        };
        self.advance(n);
        Ok(sub)
    }

    /// Decodes a varint without consuming it.
    ///
    /// Returns the value and the number of bytes it occupies.
    fn peek_varint(&self, max_bytes: usize) -> Result<(u64, usize)> {
        let first = *self.data.first().ok_or_else(|| self.shortfall(1))?;
        if first < 0x80 {
            return Ok((u64::from(first), 1));
        }

        let mut value = u64::from(first & 0x7F);
        for i in 1..max_bytes {
            let byte = *self.data.get(i).ok_or_else(|| self.shortfall(i + 1))?;
            // Bits shifted past 64 in a tenth byte are discarded
            value |= u64::from(byte & 0x7F) << (7 * i);
            if byte < 0x80 {
                return Ok((value, i + 1));
            }
        }

        Err(Error::OverlongVarint {
            offset: self.offset,
            max_bytes,
        })
    }

    /// Reads a varint of up to ten bytes
    pub fn read_varint(&mut self) -> Result<u64> {
        let (value, len) = self.peek_varint(MAX_VARINT_BYTES)?;
        self.advance(len);
        Ok(value)
    }

    /// Reads and validates a field tag.
    ///
    /// Rejects tag 0, field numbers outside `1..=MAX_FIELD_NUMBER` and wire
    /// types 6 and 7. Group wire types are returned for the caller to reject.
    pub fn read_tag(&mut self) -> Result<Tag> {
        let (raw, len) = self.peek_varint(MAX_TAG_BYTES)?;
        let tag = Tag::from_raw(raw, self.offset)?;
        self.advance(len);
        Ok(tag)
    }

    /// Reads a length prefix.
    ///
    /// The prefix is limited to five bytes and a value of at most `i32::MAX`.
    /// It is not checked against the remaining bytes; see [`Cursor::split_to`].
    pub fn read_length(&mut self) -> Result<usize> {
        let (length, len) = self.peek_varint(MAX_LENGTH_BYTES)?;
        if length > MAX_LENGTH {
            return Err(Error::InvalidLength {
                offset: self.offset,
                length,
                max: MAX_LENGTH,
            });
        }
        self.advance(len);
        Ok(length as usize)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes: [u8; N] = self
            .data
            .get(..N)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| self.shortfall(N))?;
        self.advance(N);
        Ok(bytes)
    }

    /// Reads a 32-bit little-endian unsigned integer
    pub fn read_fixed32(&mut self) -> Result<u32> {
        self.read_array::<4>().map(u32::from_le_bytes)
    }

    /// Reads a 64-bit little-endian unsigned integer
    pub fn read_fixed64(&mut self) -> Result<u64> {
        self.read_array::<8>().map(u64::from_le_bytes)
    }
}
