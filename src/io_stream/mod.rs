//! Bounds-checked byte cursor over an in-memory buffer.
//!
//! Every structural read the extractor performs goes through [`ByteCursor`]:
//! the container header, the table of contents, and the inner compression
//! framing.  The cursor owns all bounds arithmetic, so higher layers can
//! parse attacker-controlled offsets without ever indexing the buffer
//! directly.
//!
//! A short read is [`CursorError::TruncatedInput`]; an absolute seek past the
//! end is [`CursorError::OutOfRange`].  No operation has a side effect other
//! than advancing the position.
//!
//! # Endianness
//! All multi-byte reads are little-endian.  The on-disk formats handled here
//! never store big-endian fields.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CursorError {
    #[error("read of {requested} byte(s) at offset {offset} overruns a {len}-byte buffer")]
    TruncatedInput {
        offset:    usize,
        requested: usize,
        len:       usize,
    },
    #[error("seek to {pos} is past the end of a {len}-byte buffer")]
    OutOfRange { pos: usize, len: usize },
}

/// Sequential/random reader over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos:  usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Total buffer length, independent of the current position.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current absolute offset.
    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Bytes left between the current position and the end.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Read exactly `n` bytes, advancing the cursor.
    pub fn read(&mut self, n: usize) -> Result<&'a [u8], CursorError> {
        if n > self.remaining() {
            return Err(CursorError::TruncatedInput {
                offset:    self.pos,
                requested: n,
                len:       self.data.len(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        Ok(self.read(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, CursorError> {
        Ok(LittleEndian::read_u16(self.read(2)?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, CursorError> {
        Ok(LittleEndian::read_u32(self.read(4)?))
    }

    /// Advance `n` bytes without returning them.
    pub fn skip(&mut self, n: usize) -> Result<(), CursorError> {
        self.read(n).map(|_| ())
    }

    /// Reposition absolutely.  `pos == len` is valid (cursor at EOF).
    pub fn seek(&mut self, pos: usize) -> Result<(), CursorError> {
        if pos > self.data.len() {
            return Err(CursorError::OutOfRange {
                pos,
                len: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Read a null-terminated field of fixed width `max_len`.
    ///
    /// Returns the prefix before the first NUL, or all `max_len` bytes when
    /// no NUL is present.  Always consumes exactly `max_len` bytes so the
    /// cursor stays aligned to the surrounding record layout.
    pub fn read_to_zero(&mut self, max_len: usize) -> Result<&'a [u8], CursorError> {
        let raw = self.read(max_len)?;
        Ok(match raw.iter().position(|&b| b == 0) {
            Some(n) => &raw[..n],
            None    => raw,
        })
    }

    /// Everything from the current position to the end of the buffer.
    pub fn read_to_eof(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }
}
