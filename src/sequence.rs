//! 15-bit wraparound sequence numbers.
//!
//! IEC 60870-5-104 carries send and receive counters as 15-bit values that
//! wrap at 32768. Ordering between two counters is only meaningful through
//! the shortest wraparound path, never through plain integer comparison.

use crate::error::{Result, Rtu104Error};

/// A sequence number in `[0, 32767]`.
///
/// Immutable value type; arithmetic returns a fresh value and wraps at the
/// 32768 boundary in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Sequence(u16);

impl Sequence {
    /// Largest representable sequence value.
    pub const MAX: u16 = 0x7FFF;

    /// Size of the sequence space.
    const MODULUS: i32 = 0x8000;

    /// Sequence number zero.
    pub const ZERO: Sequence = Sequence(0);

    /// Create a sequence number, validating the 15-bit range.
    #[inline]
    pub fn new(value: u16) -> Result<Self> {
        if value > Self::MAX {
            return Err(Rtu104Error::SequenceOutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(&self) -> u16 {
        self.0
    }

    /// Next sequence number, wrapping 32767 -> 0.
    #[inline]
    #[must_use]
    pub const fn increment(self) -> Self {
        if self.0 >= Self::MAX {
            Self(0)
        } else {
            Self(self.0 + 1)
        }
    }

    /// Previous sequence number, wrapping 0 -> 32767.
    #[inline]
    #[must_use]
    pub const fn decrement(self) -> Self {
        if self.0 == 0 {
            Self(Self::MAX)
        } else {
            Self(self.0 - 1)
        }
    }

    /// Signed number of hops needed to reach `to` from `self`.
    ///
    /// Both the direct and the wrapped difference are computed; the one with
    /// the smaller absolute value wins. A tie resolves toward the direct
    /// difference.
    pub fn distance(&self, to: Sequence) -> i32 {
        let from = self.0 as i32;
        let to = to.0 as i32;

        let direct = to - from;
        let wrapped = if from < to {
            to - (from + Self::MODULUS)
        } else {
            (to + Self::MODULUS) - from
        };

        if direct.abs() <= wrapped.abs() {
            direct
        } else {
            wrapped
        }
    }

    /// Decode from the two on-wire bytes.
    ///
    /// Bit 0 of the low byte is reserved for frame-kind discrimination and
    /// is dropped; the remaining 15 bits are split low-7/high-8.
    #[inline]
    pub const fn decode(low: u8, high: u8) -> Self {
        Self(((low >> 1) as u16) | ((high as u16) << 7))
    }

    /// Low wire byte; bit 0 is always zero.
    #[inline]
    pub const fn encoded_low(&self) -> u8 {
        ((self.0 & 0x7F) << 1) as u8
    }

    /// High wire byte.
    #[inline]
    pub const fn encoded_high(&self) -> u8 {
        (self.0 >> 7) as u8
    }
}

impl PartialOrd for Sequence {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        let d = self.distance(*other);
        Some(match d {
            0 => std::cmp::Ordering::Equal,
            d if d > 0 => std::cmp::Ordering::Less,
            _ => std::cmp::Ordering::Greater,
        })
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
