//! Frame-level codec between the byte stream and [`Apdu`] values.
//!
//! Framing is strict: a byte that is not the 0x68 start marker, or a
//! length byte outside `[4, 253]`, is a structural error. The stream is
//! considered unrecoverable at that point; there is no scanning ahead for
//! the next plausible frame, the session must be torn down.

use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{Result, Rtu104Error};
use crate::types::apci::{
    Apci, APCI_HEADER_LEN, MAX_FRAME_LENGTH, MIN_FRAME_LENGTH, START_BYTE,
};
use crate::types::asdu::{Asdu, AsduConfig};
use crate::types::info::InfoObjectRegistry;

/// A complete application protocol data unit: control field plus optional
/// telegram body. Only I-frames carry a body.
#[derive(Debug, Clone, PartialEq)]
pub struct Apdu {
    /// Control field
    pub apci: Apci,
    /// Telegram body, present exactly on I-frames
    pub asdu: Option<Asdu>,
}

impl Apdu {
    /// Create an I-frame APDU.
    pub fn information(apci: Apci, asdu: Asdu) -> Self {
        debug_assert!(apci.is_i_frame());
        Self {
            apci,
            asdu: Some(asdu),
        }
    }

    /// Create a supervisory or unnumbered APDU.
    pub fn control(apci: Apci) -> Self {
        debug_assert!(!apci.is_i_frame());
        Self { apci, asdu: None }
    }
}

impl std::fmt::Display for Apdu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.asdu {
            Some(asdu) => write!(f, "{} {}", self.apci, asdu),
            None => write!(f, "{}", self.apci),
        }
    }
}

/// Number of whole-frame bytes implied by a length byte.
#[inline]
fn frame_total(length_byte: u8) -> usize {
    length_byte as usize + 2
}

/// Check whether `buffer` holds at least one complete frame.
///
/// An implausible length byte is rejected right away, before the frame
/// has fully arrived.
pub fn is_frame_complete(buffer: &[u8]) -> Result<bool> {
    if buffer.len() < 2 {
        return Ok(false);
    }
    if buffer[0] != START_BYTE {
        return Err(Rtu104Error::invalid_frame(
            format!("expected start byte 0x68, got 0x{:02X}", buffer[0]),
            buffer,
            0,
        ));
    }
    let length = buffer[1];
    if !(MIN_FRAME_LENGTH..=MAX_FRAME_LENGTH).contains(&length) {
        return Err(Rtu104Error::invalid_frame(
            format!("implausible frame length {}", length),
            buffer,
            1,
        ));
    }
    Ok(buffer.len() >= frame_total(length))
}

/// Stateless framer; field widths and the object registry are shared with
/// every link of a server.
#[derive(Debug, Clone)]
pub struct TelegramCodec {
    config: AsduConfig,
    registry: Arc<InfoObjectRegistry>,
}

impl TelegramCodec {
    /// Create a codec over the given field widths and registry.
    pub fn new(config: AsduConfig, registry: Arc<InfoObjectRegistry>) -> Self {
        Self { config, registry }
    }

    /// The field-width configuration.
    pub const fn config(&self) -> &AsduConfig {
        &self.config
    }
}

impl Default for TelegramCodec {
    fn default() -> Self {
        Self::new(
            AsduConfig::default(),
            Arc::new(InfoObjectRegistry::with_builtins()),
        )
    }
}

impl Decoder for TelegramCodec {
    type Item = Apdu;
    type Error = Rtu104Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Apdu>> {
        if !is_frame_complete(src)? {
            if src.len() >= 2 {
                src.reserve(frame_total(src[1]) - src.len());
            }
            return Ok(None);
        }

        let total = frame_total(src[1]);
        let frame = src.split_to(total);
        let apci = Apci::parse(&frame)?;

        if apci.is_i_frame() {
            if total == APCI_HEADER_LEN {
                return Err(Rtu104Error::invalid_frame(
                    "information frame without a telegram body",
                    &frame,
                    1,
                ));
            }
            let asdu = Asdu::decode(&frame[APCI_HEADER_LEN..], &self.config, &self.registry)?;
            Ok(Some(Apdu::information(apci, asdu)))
        } else {
            if total != APCI_HEADER_LEN {
                return Err(Rtu104Error::invalid_frame(
                    "control frame with a payload",
                    &frame,
                    1,
                ));
            }
            Ok(Some(Apdu::control(apci)))
        }
    }
}

impl Encoder<&Apdu> for TelegramCodec {
    type Error = Rtu104Error;

    fn encode(&mut self, apdu: &Apdu, dst: &mut BytesMut) -> Result<()> {
        let payload_len = apdu
            .asdu
            .as_ref()
            .map(|a| a.encoded_len(&self.config))
            .unwrap_or(0);
        let total = APCI_HEADER_LEN + payload_len;
        if total - 2 > MAX_FRAME_LENGTH as usize {
            return Err(Rtu104Error::config(format!(
                "encoded frame length {} exceeds {}",
                total - 2,
                MAX_FRAME_LENGTH
            )));
        }

        dst.reserve(total);
        dst.put_slice(&apdu.apci.encode_header(payload_len));
        if let Some(asdu) = &apdu.asdu {
            asdu.encode_to(dst, &self.config)?;
        }
        Ok(())
    }
}
