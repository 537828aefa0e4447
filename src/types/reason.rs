//! Reason for transmission (cause of transmission).
//!
//! The reason field carries a 6-bit code plus a negative-confirmation bit
//! and a test bit. Every 6-bit code except 0 is representable; reserved and
//! custom ranges are named explicitly so decoded traffic is always
//! displayable.

use crate::error::{Result, Rtu104Error};

/// 6-bit reason code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReasonCode {
    /// Periodic, cyclic (1)
    Periodic = 1,
    /// Background scan (2)
    BackgroundScan = 2,
    /// Spontaneous (3)
    Spontaneous = 3,
    /// Initialized (4)
    Initialized = 4,
    /// Request or requested (5)
    Request = 5,
    /// Activation (6)
    Activation = 6,
    /// Activation confirmation (7)
    ConfirmActivation = 7,
    /// Deactivation (8)
    CancelActivation = 8,
    /// Deactivation confirmation (9)
    ConfirmCancellation = 9,
    /// Activation termination (10)
    FinishedActivation = 10,
    /// Return information caused by a remote command (11)
    ResponseToRemoteControl = 11,
    /// Return information caused by a local command (12)
    ResponseToLocalControl = 12,
    /// File transfer (13)
    FileTransfer = 13,

    /// Reserved code (14)
    Reserved14 = 14,
    /// Reserved code (15)
    Reserved15 = 15,
    /// Reserved code (16)
    Reserved16 = 16,
    /// Reserved code (17)
    Reserved17 = 17,
    /// Reserved code (18)
    Reserved18 = 18,
    /// Reserved code (19)
    Reserved19 = 19,

    /// Interrogated by general interrogation (20)
    GeneralInterrogation = 20,
    /// Interrogated by group 1 interrogation (21)
    Group1Interrogation = 21,
    /// Interrogated by group 2 interrogation (22)
    Group2Interrogation = 22,
    /// Interrogated by group 3 interrogation (23)
    Group3Interrogation = 23,
    /// Interrogated by group 4 interrogation (24)
    Group4Interrogation = 24,
    /// Interrogated by group 5 interrogation (25)
    Group5Interrogation = 25,
    /// Interrogated by group 6 interrogation (26)
    Group6Interrogation = 26,
    /// Interrogated by group 7 interrogation (27)
    Group7Interrogation = 27,
    /// Interrogated by group 8 interrogation (28)
    Group8Interrogation = 28,
    /// Interrogated by group 9 interrogation (29)
    Group9Interrogation = 29,
    /// Interrogated by group 10 interrogation (30)
    Group10Interrogation = 30,
    /// Interrogated by group 11 interrogation (31)
    Group11Interrogation = 31,
    /// Interrogated by group 12 interrogation (32)
    Group12Interrogation = 32,
    /// Interrogated by group 13 interrogation (33)
    Group13Interrogation = 33,
    /// Interrogated by group 14 interrogation (34)
    Group14Interrogation = 34,
    /// Interrogated by group 15 interrogation (35)
    Group15Interrogation = 35,
    /// Interrogated by group 16 interrogation (36)
    Group16Interrogation = 36,

    /// Requested by general counter request (37)
    CounterInterrogation = 37,
    /// Requested by group 1 counter request (38)
    CounterGroup1Interrogation = 38,
    /// Requested by group 2 counter request (39)
    CounterGroup2Interrogation = 39,
    /// Requested by group 3 counter request (40)
    CounterGroup3Interrogation = 40,
    /// Requested by group 4 counter request (41)
    CounterGroup4Interrogation = 41,

    /// Reserved code (42)
    Reserved42 = 42,
    /// Reserved code (43)
    Reserved43 = 43,

    /// Unknown type identification (44)
    UnknownTypeId = 44,
    /// Unknown reason for transmission (45)
    UnknownReason = 45,
    /// Unknown common address (46)
    UnknownCommonAddress = 46,
    /// Unknown information object address (47)
    UnknownInfoAddress = 47,

    /// Custom code (48)
    Custom48 = 48,
    /// Custom code (49)
    Custom49 = 49,
    /// Custom code (50)
    Custom50 = 50,
    /// Custom code (51)
    Custom51 = 51,
    /// Custom code (52)
    Custom52 = 52,
    /// Custom code (53)
    Custom53 = 53,
    /// Custom code (54)
    Custom54 = 54,
    /// Custom code (55)
    Custom55 = 55,
    /// Custom code (56)
    Custom56 = 56,
    /// Custom code (57)
    Custom57 = 57,
    /// Custom code (58)
    Custom58 = 58,
    /// Custom code (59)
    Custom59 = 59,
    /// Custom code (60)
    Custom60 = 60,
    /// Custom code (61)
    Custom61 = 61,
    /// Custom code (62)
    Custom62 = 62,
    /// Custom code (63)
    Custom63 = 63,
}

impl ReasonCode {
    /// Create a reason code from the lower 6 bits of a byte.
    ///
    /// Code 0 is not defined by the standard and is rejected.
    pub fn from_u6(value: u8) -> Result<Self> {
        let value = value & 0x3F;
        Ok(match value {
            1 => Self::Periodic,
            2 => Self::BackgroundScan,
            3 => Self::Spontaneous,
            4 => Self::Initialized,
            5 => Self::Request,
            6 => Self::Activation,
            7 => Self::ConfirmActivation,
            8 => Self::CancelActivation,
            9 => Self::ConfirmCancellation,
            10 => Self::FinishedActivation,
            11 => Self::ResponseToRemoteControl,
            12 => Self::ResponseToLocalControl,
            13 => Self::FileTransfer,
            14 => Self::Reserved14,
            15 => Self::Reserved15,
            16 => Self::Reserved16,
            17 => Self::Reserved17,
            18 => Self::Reserved18,
            19 => Self::Reserved19,
            20 => Self::GeneralInterrogation,
            21 => Self::Group1Interrogation,
            22 => Self::Group2Interrogation,
            23 => Self::Group3Interrogation,
            24 => Self::Group4Interrogation,
            25 => Self::Group5Interrogation,
            26 => Self::Group6Interrogation,
            27 => Self::Group7Interrogation,
            28 => Self::Group8Interrogation,
            29 => Self::Group9Interrogation,
            30 => Self::Group10Interrogation,
            31 => Self::Group11Interrogation,
            32 => Self::Group12Interrogation,
            33 => Self::Group13Interrogation,
            34 => Self::Group14Interrogation,
            35 => Self::Group15Interrogation,
            36 => Self::Group16Interrogation,
            37 => Self::CounterInterrogation,
            38 => Self::CounterGroup1Interrogation,
            39 => Self::CounterGroup2Interrogation,
            40 => Self::CounterGroup3Interrogation,
            41 => Self::CounterGroup4Interrogation,
            42 => Self::Reserved42,
            43 => Self::Reserved43,
            44 => Self::UnknownTypeId,
            45 => Self::UnknownReason,
            46 => Self::UnknownCommonAddress,
            47 => Self::UnknownInfoAddress,
            48 => Self::Custom48,
            49 => Self::Custom49,
            50 => Self::Custom50,
            51 => Self::Custom51,
            52 => Self::Custom52,
            53 => Self::Custom53,
            54 => Self::Custom54,
            55 => Self::Custom55,
            56 => Self::Custom56,
            57 => Self::Custom57,
            58 => Self::Custom58,
            59 => Self::Custom59,
            60 => Self::Custom60,
            61 => Self::Custom61,
            62 => Self::Custom62,
            63 => Self::Custom63,
            _ => {
                return Err(Rtu104Error::invalid_asdu(
                    "reason code 0 is undefined",
                    &[value],
                    0,
                ))
            }
        })
    }

    /// Get the raw 6-bit code.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Full reason field: code plus negative and test sub-bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reason {
    /// 6-bit reason code
    pub code: ReasonCode,
    /// Negative confirmation bit (0x40)
    pub negative: bool,
    /// Test bit (0x80)
    pub test: bool,
}

impl Reason {
    /// Create a plain reason with both sub-bits clear.
    pub const fn new(code: ReasonCode) -> Self {
        Self {
            code,
            negative: false,
            test: false,
        }
    }

    /// Decode from the wire byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        Ok(Self {
            code: ReasonCode::from_u6(byte & 0x3F)?,
            negative: (byte & 0x40) != 0,
            test: (byte & 0x80) != 0,
        })
    }

    /// Encode to the wire byte.
    pub fn as_byte(&self) -> u8 {
        let mut byte = self.code.as_u8();
        if self.negative {
            byte |= 0x40;
        }
        if self.test {
            byte |= 0x80;
        }
        byte
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)?;
        if self.negative {
            write!(f, "+NEG")?;
        }
        if self.test {
            write!(f, "+TEST")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_nonzero_code_decodes() {
        for value in 1..=63u8 {
            let code = ReasonCode::from_u6(value).unwrap();
            assert_eq!(code.as_u8(), value);
        }
    }

    #[test]
    fn test_code_zero_rejected() {
        assert!(ReasonCode::from_u6(0).is_err());
        assert!(ReasonCode::from_u6(0x40).is_err()); // masked to 0
    }

    #[test]
    fn test_reason_byte_round_trip() {
        let reason = Reason {
            code: ReasonCode::Spontaneous,
            negative: true,
            test: false,
        };
        assert_eq!(reason.as_byte(), 0x43);
        assert_eq!(Reason::from_byte(0x43).unwrap(), reason);

        let reason = Reason {
            code: ReasonCode::Activation,
            negative: false,
            test: true,
        };
        assert_eq!(reason.as_byte(), 0x86);
        assert_eq!(Reason::from_byte(0x86).unwrap(), reason);
    }

    #[test]
    fn test_display() {
        assert_eq!(Reason::new(ReasonCode::Spontaneous).to_string(), "Spontaneous");
        let reason = Reason {
            code: ReasonCode::ConfirmActivation,
            negative: true,
            test: true,
        };
        assert_eq!(reason.to_string(), "ConfirmActivation+NEG+TEST");
    }
}
