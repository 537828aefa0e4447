//! Information object addresses (IOA).
//!
//! An IOA occupies 1 to 3 bytes on the wire depending on configuration.
//! Inside a sequence-optimized ASDU only the first object carries an
//! explicit address; the rest get implicit addresses with width 0, which
//! encode to nothing.

use bytes::{BufMut, BytesMut};

use crate::error::Result;
use crate::types::stream::ByteReader;

/// Information object address with its configured width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InfoAddress {
    value: u32,
    size: u8,
}

impl InfoAddress {
    /// Create an explicit address with the given wire width (1-3 bytes).
    ///
    /// The value is masked to the representable range of the width.
    pub fn new(value: u32, size: u8) -> Self {
        debug_assert!((1..=3).contains(&size));
        let mask = match size {
            1 => 0xFF,
            2 => 0xFFFF,
            _ => 0x00FF_FFFF,
        };
        Self {
            value: value & mask,
            size,
        }
    }

    /// Create an implicit address (width 0, encodes to nothing).
    pub const fn implicit(value: u32) -> Self {
        Self { value, size: 0 }
    }

    /// Read an address of `size` bytes (little-endian) from the input.
    pub fn read_from(input: &mut ByteReader<'_>, size: u8) -> Result<Self> {
        if size == 0 {
            return Ok(Self::default());
        }

        let bytes = input.read_slice(size as usize)?;
        let mut value = 0u32;
        for (i, b) in bytes.iter().enumerate() {
            value |= (*b as u32) << (8 * i);
        }
        Ok(Self { value, size })
    }

    /// Write the address little-endian; width 0 writes nothing.
    pub fn write_to(&self, out: &mut BytesMut) {
        for i in 0..self.size {
            out.put_u8((self.value >> (8 * i)) as u8);
        }
    }

    /// Raw address value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.value
    }

    /// Wire width in bytes; 0 for implicit addresses.
    #[inline]
    pub const fn size(&self) -> u8 {
        self.size
    }

    /// The implicit address directly after this one.
    #[must_use]
    pub const fn successor(&self) -> Self {
        Self::implicit(self.value + 1)
    }
}

impl PartialOrd for InfoAddress {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InfoAddress {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl std::fmt::Display for InfoAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_all_widths() {
        for (bytes, size, expected) in [
            (&[0xAF, 0x12, 0x34][..], 1u8, 0xAFu32),
            (&[0xAF, 0x12, 0x34][..], 2, 0x12AF),
            (&[0xAF, 0x12, 0x34][..], 3, 0x3412AF),
        ] {
            let mut reader = ByteReader::new(bytes);
            let addr = InfoAddress::read_from(&mut reader, size).unwrap();
            assert_eq!(addr.value(), expected);
            assert_eq!(addr.size(), size);

            let mut out = BytesMut::new();
            addr.write_to(&mut out);
            assert_eq!(&out[..], &bytes[..size as usize]);
        }
    }

    #[test]
    fn test_width_zero_reads_and_writes_nothing() {
        let mut reader = ByteReader::new(&[]);
        let addr = InfoAddress::read_from(&mut reader, 0).unwrap();
        assert_eq!(addr, InfoAddress::default());

        let mut out = BytesMut::new();
        InfoAddress::implicit(0xAFAF).write_to(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_successor_is_implicit() {
        let addr = InfoAddress::new(0xAFAF, 3);
        let next = addr.successor();
        assert_eq!(next.value(), 0xAFB0);
        assert_eq!(next.size(), 0);
    }

    #[test]
    fn test_truncated_address_fails() {
        let mut reader = ByteReader::new(&[0x01]);
        assert!(InfoAddress::read_from(&mut reader, 3).is_err());
    }

    #[test]
    fn test_new_masks_to_width() {
        assert_eq!(InfoAddress::new(0x123456, 2).value(), 0x3456);
        assert_eq!(InfoAddress::new(0x123456, 3).value(), 0x123456);
    }

    #[test]
    fn test_ordering_compares_values_only() {
        assert!(InfoAddress::new(1, 3) < InfoAddress::new(2, 3));
        // Width does not participate in ordering or equality of values
        assert_eq!(InfoAddress::new(5, 1).value(), InfoAddress::implicit(5).value());
    }
}
