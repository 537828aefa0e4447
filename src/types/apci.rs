//! APCI control field: I-, S- and U-frame classification.
//!
//! Every APDU starts with a 6-byte header: start byte 0x68, a length byte
//! covering everything after itself, and four control field bytes. The two
//! low bits of the first control byte discriminate the frame kind:
//!
//! ```text
//! bit 0 = 0          I-frame (numbered information)
//! bits 1..0 = 01     S-frame (numbered supervisory)
//! bits 1..0 = 11     U-frame (unnumbered control)
//! ```

use std::fmt;

use crate::error::{Result, Rtu104Error};
use crate::sequence::Sequence;

/// Length of the fixed APCI header including start and length bytes.
pub const APCI_HEADER_LEN: usize = 6;

/// Start byte of every APDU.
pub const START_BYTE: u8 = 0x68;

/// Smallest valid value of the length byte (four control field bytes).
pub const MIN_FRAME_LENGTH: u8 = 4;

/// Largest valid value of the length byte.
pub const MAX_FRAME_LENGTH: u8 = 253;

/// Service handshakes carried by U-frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// Start data transfer
    Start,
    /// Stop data transfer
    Stop,
    /// Test frame (keepalive)
    Test,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "STARTDT"),
            Self::Stop => write!(f, "STOPDT"),
            Self::Test => write!(f, "TESTFR"),
        }
    }
}

/// U-frame function: one of three services, each as act or con.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UFunction {
    /// STARTDT act (0x07)
    StartActivation,
    /// STARTDT con (0x0B)
    StartConfirmation,
    /// STOPDT act (0x13)
    StopActivation,
    /// STOPDT con (0x23)
    StopConfirmation,
    /// TESTFR act (0x43)
    TestActivation,
    /// TESTFR con (0x83)
    TestConfirmation,
}

impl UFunction {
    /// Decode from the first control field byte.
    pub fn from_control_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x07 => Self::StartActivation,
            0x0B => Self::StartConfirmation,
            0x13 => Self::StopActivation,
            0x23 => Self::StopConfirmation,
            0x43 => Self::TestActivation,
            0x83 => Self::TestConfirmation,
            _ => return None,
        })
    }

    /// The first control field byte for this function.
    pub const fn control_byte(&self) -> u8 {
        match self {
            Self::StartActivation => 0x07,
            Self::StartConfirmation => 0x0B,
            Self::StopActivation => 0x13,
            Self::StopConfirmation => 0x23,
            Self::TestActivation => 0x43,
            Self::TestConfirmation => 0x83,
        }
    }

    /// The service this function belongs to.
    pub const fn kind(&self) -> ServiceKind {
        match self {
            Self::StartActivation | Self::StartConfirmation => ServiceKind::Start,
            Self::StopActivation | Self::StopConfirmation => ServiceKind::Stop,
            Self::TestActivation | Self::TestConfirmation => ServiceKind::Test,
        }
    }

    /// Check if this is a confirmation rather than an activation.
    pub const fn is_confirmation(&self) -> bool {
        matches!(
            self,
            Self::StartConfirmation | Self::StopConfirmation | Self::TestConfirmation
        )
    }

    /// The confirmation answering this activation (identity on confirmations).
    #[must_use]
    pub const fn to_confirmation(&self) -> Self {
        match self {
            Self::StartActivation | Self::StartConfirmation => Self::StartConfirmation,
            Self::StopActivation | Self::StopConfirmation => Self::StopConfirmation,
            Self::TestActivation | Self::TestConfirmation => Self::TestConfirmation,
        }
    }
}

impl fmt::Display for UFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = if self.is_confirmation() { "con" } else { "act" };
        write!(f, "{} {}", self.kind(), suffix)
    }
}

/// Decoded APCI control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Apci {
    /// Numbered information frame carrying an ASDU.
    IFrame {
        /// Sender's send counter at transmission
        send_seq: Sequence,
        /// Sender's receive counter (acknowledgment)
        recv_seq: Sequence,
    },
    /// Supervisory frame acknowledging received I-frames.
    SFrame {
        /// Sender's receive counter (acknowledgment)
        recv_seq: Sequence,
    },
    /// Unnumbered control frame.
    UFrame {
        /// Service function
        function: UFunction,
    },
}

impl Apci {
    /// Classify and decode the four control field bytes of a frame.
    ///
    /// `frame` is the complete frame starting at the 0x68 byte; offsets in
    /// errors are relative to it. Fixed bytes of S- and U-frames must be
    /// exactly zero.
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < APCI_HEADER_LEN {
            return Err(Rtu104Error::invalid_frame(
                "frame shorter than APCI header",
                frame,
                frame.len(),
            ));
        }
        let cf = &frame[2..6];

        if cf[0] & 0x01 == 0 {
            // I-frame: both counters numbered
            if cf[2] & 0x01 != 0 {
                return Err(Rtu104Error::invalid_frame(
                    "reserved bit set in receive-sequence low byte",
                    frame,
                    4,
                ));
            }
            return Ok(Self::IFrame {
                send_seq: Sequence::decode(cf[0], cf[1]),
                recv_seq: Sequence::decode(cf[2], cf[3]),
            });
        }

        if cf[0] & 0x03 == 0x01 {
            // S-frame: first two control bytes are fixed
            if cf[0] != 0x01 || cf[1] != 0x00 {
                return Err(Rtu104Error::invalid_frame(
                    "invalid fixed bytes in supervisory frame",
                    frame,
                    2,
                ));
            }
            if cf[2] & 0x01 != 0 {
                return Err(Rtu104Error::invalid_frame(
                    "reserved bit set in receive-sequence low byte",
                    frame,
                    4,
                ));
            }
            return Ok(Self::SFrame {
                recv_seq: Sequence::decode(cf[2], cf[3]),
            });
        }

        // U-frame: exactly one function bit, remaining bytes zero
        let function = UFunction::from_control_byte(cf[0]).ok_or_else(|| {
            Rtu104Error::invalid_frame("unknown unnumbered function", frame, 2)
        })?;
        if cf[1] != 0 || cf[2] != 0 || cf[3] != 0 {
            return Err(Rtu104Error::invalid_frame(
                "nonzero padding in unnumbered frame",
                frame,
                3,
            ));
        }
        Ok(Self::UFrame { function })
    }

    /// Encode the four control field bytes.
    pub fn encode(&self) -> [u8; 4] {
        match self {
            Self::IFrame { send_seq, recv_seq } => [
                send_seq.encoded_low(),
                send_seq.encoded_high(),
                recv_seq.encoded_low(),
                recv_seq.encoded_high(),
            ],
            Self::SFrame { recv_seq } => {
                [0x01, 0x00, recv_seq.encoded_low(), recv_seq.encoded_high()]
            }
            Self::UFrame { function } => [function.control_byte(), 0x00, 0x00, 0x00],
        }
    }

    /// Encode the full 6-byte header for a frame whose payload (the ASDU)
    /// is `payload_len` bytes long.
    pub fn encode_header(&self, payload_len: usize) -> [u8; APCI_HEADER_LEN] {
        let cf = self.encode();
        let length = (4 + payload_len) as u8;
        [START_BYTE, length, cf[0], cf[1], cf[2], cf[3]]
    }

    /// Check if this is an information frame.
    pub const fn is_i_frame(&self) -> bool {
        matches!(self, Self::IFrame { .. })
    }

    /// Send counter, for I-frames.
    pub const fn send_seq(&self) -> Option<Sequence> {
        match self {
            Self::IFrame { send_seq, .. } => Some(*send_seq),
            _ => None,
        }
    }

    /// Receive counter (acknowledgment), for I- and S-frames.
    pub const fn recv_seq(&self) -> Option<Sequence> {
        match self {
            Self::IFrame { recv_seq, .. } | Self::SFrame { recv_seq } => Some(*recv_seq),
            _ => None,
        }
    }
}

impl fmt::Display for Apci {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IFrame { send_seq, recv_seq } => {
                write!(f, "I(send={}, recv={})", send_seq, recv_seq)
            }
            Self::SFrame { recv_seq } => write!(f, "S(recv={})", recv_seq),
            Self::UFrame { function } => write!(f, "U({})", function),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(cf: [u8; 4]) -> [u8; 6] {
        [START_BYTE, 0x04, cf[0], cf[1], cf[2], cf[3]]
    }

    #[test]
    fn test_parse_u_frames() {
        let cases = [
            (0x07, UFunction::StartActivation),
            (0x0B, UFunction::StartConfirmation),
            (0x13, UFunction::StopActivation),
            (0x23, UFunction::StopConfirmation),
            (0x43, UFunction::TestActivation),
            (0x83, UFunction::TestConfirmation),
        ];
        for (byte, function) in cases {
            let apci = Apci::parse(&frame([byte, 0x00, 0x00, 0x00])).unwrap();
            assert_eq!(apci, Apci::UFrame { function });
            assert_eq!(apci.encode(), [byte, 0x00, 0x00, 0x00]);
        }
    }

    #[test]
    fn test_parse_u_frame_rejects_padding() {
        assert!(Apci::parse(&frame([0x07, 0x01, 0x00, 0x00])).is_err());
        assert!(Apci::parse(&frame([0x07, 0x00, 0x02, 0x00])).is_err());
        assert!(Apci::parse(&frame([0x07, 0x00, 0x00, 0x01])).is_err());
    }

    #[test]
    fn test_parse_unknown_u_function() {
        // 0x03 has the U discriminator but no defined function bit
        let err = Apci::parse(&frame([0x03, 0x00, 0x00, 0x00])).unwrap_err();
        assert!(matches!(err, Rtu104Error::InvalidFrame { offset: 2, .. }));
        // Two function bits at once
        assert!(Apci::parse(&frame([0x47, 0x00, 0x00, 0x00])).is_err());
    }

    #[test]
    fn test_parse_s_frame() {
        let apci = Apci::parse(&frame([0x01, 0x00, 0xFE, 0xFF])).unwrap();
        assert_eq!(
            apci,
            Apci::SFrame {
                recv_seq: Sequence::new(0x7FFF).unwrap()
            }
        );
        assert_eq!(apci.recv_seq().unwrap().value(), 0x7FFF);
        assert_eq!(apci.send_seq(), None);
    }

    #[test]
    fn test_parse_s_frame_rejects_nonfixed_bytes() {
        assert!(Apci::parse(&frame([0x01, 0x05, 0x00, 0x00])).is_err());
    }

    #[test]
    fn test_parse_i_frame() {
        // send 2, recv 3
        let apci = Apci::parse(&frame([0x04, 0x00, 0x06, 0x00])).unwrap();
        assert_eq!(
            apci,
            Apci::IFrame {
                send_seq: Sequence::new(2).unwrap(),
                recv_seq: Sequence::new(3).unwrap(),
            }
        );
        assert!(apci.is_i_frame());
        assert_eq!(apci.send_seq().unwrap().value(), 2);
        assert_eq!(apci.recv_seq().unwrap().value(), 3);
    }

    #[test]
    fn test_parse_i_frame_rejects_recv_reserved_bit() {
        assert!(Apci::parse(&frame([0x04, 0x00, 0x07, 0x00])).is_err());
    }

    #[test]
    fn test_encode_round_trip() {
        let samples = [
            Apci::IFrame {
                send_seq: Sequence::new(32767).unwrap(),
                recv_seq: Sequence::ZERO,
            },
            Apci::SFrame {
                recv_seq: Sequence::new(12345).unwrap(),
            },
            Apci::UFrame {
                function: UFunction::TestConfirmation,
            },
        ];
        for apci in samples {
            let cf = apci.encode();
            assert_eq!(Apci::parse(&frame(cf)).unwrap(), apci);
        }
    }

    #[test]
    fn test_encode_header() {
        let apci = Apci::UFrame {
            function: UFunction::StartActivation,
        };
        assert_eq!(
            apci.encode_header(0),
            [0x68, 0x04, 0x07, 0x00, 0x00, 0x00]
        );

        let apci = Apci::IFrame {
            send_seq: Sequence::ZERO,
            recv_seq: Sequence::ZERO,
        };
        assert_eq!(
            apci.encode_header(10),
            [0x68, 0x0E, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_confirmation_mapping() {
        assert_eq!(
            UFunction::StartActivation.to_confirmation(),
            UFunction::StartConfirmation
        );
        assert_eq!(
            UFunction::TestActivation.to_confirmation(),
            UFunction::TestConfirmation
        );
        assert!(!UFunction::StopActivation.is_confirmation());
        assert!(UFunction::StopConfirmation.is_confirmation());
        assert_eq!(UFunction::StopActivation.kind(), ServiceKind::Stop);
    }

    #[test]
    fn test_display() {
        let apci = Apci::UFrame {
            function: UFunction::StartActivation,
        };
        assert_eq!(apci.to_string(), "U(STARTDT act)");

        let apci = Apci::SFrame {
            recv_seq: Sequence::new(7).unwrap(),
        };
        assert_eq!(apci.to_string(), "S(recv=7)");
    }
}
