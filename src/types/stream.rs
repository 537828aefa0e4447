//! Positioned reader over a decoded ASDU buffer.
//!
//! Keeps the absolute byte offset so structural errors can point at the
//! offending byte with a hex context window.

use crate::error::{Result, Rtu104Error};

/// Forward-only reader over a byte slice.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader over the full slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Current absolute offset into the underlying buffer.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        let slice = self.read_slice(1)?;
        Ok(slice[0])
    }

    /// Read `len` bytes.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Rtu104Error::invalid_asdu(
                format!("unexpected end of data: need {} more byte(s)", len - self.remaining()),
                self.data,
                self.pos,
            ));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Read a little-endian unsigned 16-bit value.
    pub fn read_u16_le(&mut self) -> Result<u16> {
        let slice = self.read_slice(2)?;
        Ok(u16::from_le_bytes([slice[0], slice[1]]))
    }

    /// Read a little-endian IEEE-754 32-bit float.
    pub fn read_f32_le(&mut self) -> Result<f32> {
        let slice = self.read_slice(4)?;
        Ok(f32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
    }

    /// Create a structural error at the current position.
    pub fn error_here(&self, reason: impl Into<String>) -> Rtu104Error {
        Rtu104Error::invalid_asdu(reason, self.data, self.pos)
    }

    /// Create a structural error at the previous byte.
    ///
    /// Used when a value has been read and then found invalid.
    pub fn error_at_last(&self, reason: impl Into<String>) -> Rtu104Error {
        Rtu104Error::invalid_asdu(reason, self.data, self.pos.saturating_sub(1))
    }
}
