//! ASDU encoding and decoding.
//!
//! Wire layout:
//!
//! ```text
//! +-----------+----------------+-----------+----------+----------------+
//! | type id   | SQ + count     | reason    | [origin] | common address |
//! | 1 byte    | 1 byte         | 1 byte    | 0-1 byte | 1-2 bytes      |
//! +-----------+----------------+-----------+----------+----------------+
//! | information objects ...                                            |
//! +--------------------------------------------------------------------+
//! ```
//!
//! With the sequence flag (SQ, bit 7 of the second byte) set, only the
//! first object carries an explicit address and the rest follow at
//! consecutive implicit addresses. The total length implied by the header
//! is checked against the available bytes before any object is decoded.

use bytes::BytesMut;

use crate::error::{Result, Rtu104Error};
use crate::types::address::InfoAddress;
use crate::types::info::{InfoObject, InfoObjectRegistry};
use crate::types::reason::Reason;
use crate::types::stream::ByteReader;
use crate::types::type_id::TypeId;

/// Largest object count encodable in the 7-bit count field.
pub const MAX_OBJECT_COUNT: usize = 127;

/// Field widths of the variable ASDU header parts.
///
/// Both peers of a link must agree on these out of band; nothing on the
/// wire identifies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsduConfig {
    reason_size: u8,
    ca_size: u8,
    ioa_size: u8,
}

impl AsduConfig {
    /// Create a field-width configuration.
    ///
    /// The reason field is 1 or 2 bytes (2 adds the originator address),
    /// the common address 1 or 2 bytes, the object address 1 to 3 bytes.
    pub fn new(reason_size: u8, ca_size: u8, ioa_size: u8) -> Result<Self> {
        if !(1..=2).contains(&reason_size) {
            return Err(Rtu104Error::config(format!(
                "reason size must be 1 or 2, got {}",
                reason_size
            )));
        }
        if !(1..=2).contains(&ca_size) {
            return Err(Rtu104Error::config(format!(
                "common address size must be 1 or 2, got {}",
                ca_size
            )));
        }
        if !(1..=3).contains(&ioa_size) {
            return Err(Rtu104Error::config(format!(
                "object address size must be 1 to 3, got {}",
                ioa_size
            )));
        }
        Ok(Self {
            reason_size,
            ca_size,
            ioa_size,
        })
    }

    /// Reason field width in bytes.
    #[inline]
    pub const fn reason_size(&self) -> u8 {
        self.reason_size
    }

    /// Common address width in bytes.
    #[inline]
    pub const fn ca_size(&self) -> u8 {
        self.ca_size
    }

    /// Information object address width in bytes.
    #[inline]
    pub const fn ioa_size(&self) -> u8 {
        self.ioa_size
    }

    /// Check if the originator address byte is present.
    #[inline]
    pub const fn has_origin(&self) -> bool {
        self.reason_size == 2
    }

    /// Header length in bytes under this configuration.
    const fn header_len(&self) -> usize {
        2 + self.reason_size as usize + self.ca_size as usize
    }
}

impl Default for AsduConfig {
    /// Companion-standard defaults: 2-byte reason, 2-byte common address,
    /// 3-byte object address.
    fn default() -> Self {
        Self {
            reason_size: 2,
            ca_size: 2,
            ioa_size: 3,
        }
    }
}

/// Decoded ASDU header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsduHeader {
    /// Type identification shared by all objects
    pub type_id: TypeId,
    /// Reason for transmission
    pub reason: Reason,
    /// Originator address; 0 unless the reason field is 2 bytes wide
    pub origin: u8,
    /// Common address of the ASDU
    pub common_address: u16,
}

/// A complete telegram body: header plus homogeneous object list.
#[derive(Debug, Clone, PartialEq)]
pub struct Asdu {
    /// Header fields
    pub header: AsduHeader,
    /// Whether the object list is sequence-optimized
    sequence: bool,
    objects: Vec<Box<dyn InfoObject>>,
}

impl Asdu {
    /// Create an empty ASDU.
    pub fn new(type_id: TypeId, reason: Reason, common_address: u16) -> Self {
        Self {
            header: AsduHeader {
                type_id,
                reason,
                origin: 0,
                common_address,
            },
            sequence: false,
            objects: Vec::new(),
        }
    }

    /// Set the originator address; only encoded with a 2-byte reason field.
    #[must_use]
    pub fn with_origin(mut self, origin: u8) -> Self {
        self.header.origin = origin;
        self
    }

    /// Mark the object list as sequence-optimized.
    ///
    /// Only the first object's address is encoded; appended objects are
    /// assumed to sit at consecutive addresses.
    #[must_use]
    pub fn with_sequence(mut self) -> Self {
        self.sequence = true;
        self
    }

    /// Append an information object.
    ///
    /// The object's type must match the header and the count field must
    /// have room.
    pub fn append(&mut self, object: Box<dyn InfoObject>) -> Result<()> {
        if object.type_id() != self.header.type_id {
            return Err(Rtu104Error::config(format!(
                "object type {} does not match ASDU type {}",
                object.type_id(),
                self.header.type_id
            )));
        }
        if self.objects.len() >= MAX_OBJECT_COUNT {
            return Err(Rtu104Error::config(format!(
                "object count limited to {}",
                MAX_OBJECT_COUNT
            )));
        }
        self.objects.push(object);
        Ok(())
    }

    /// The object list.
    pub fn objects(&self) -> &[Box<dyn InfoObject>] {
        &self.objects
    }

    /// Whether the object list is sequence-optimized.
    pub const fn is_sequence(&self) -> bool {
        self.sequence
    }

    /// Decode an ASDU from a complete payload slice.
    ///
    /// The implied total length (header plus `count` objects of the
    /// registered size) must match `data` exactly; nothing is decoded
    /// object-wise until that check passes.
    pub fn decode(data: &[u8], config: &AsduConfig, registry: &InfoObjectRegistry) -> Result<Self> {
        let mut input = ByteReader::new(data);

        let type_id = TypeId::from(input.read_u8()?);
        let object_size = registry
            .object_size(type_id)
            .ok_or(Rtu104Error::UnknownTypeId(type_id.as_u8()))?;

        let size_byte = input.read_u8()?;
        let sequence = (size_byte & 0x80) != 0;
        let count = (size_byte & 0x7F) as usize;

        let reason = Reason::from_byte(input.read_u8()?)?;
        let origin = if config.has_origin() {
            input.read_u8()?
        } else {
            0
        };
        let common_address = match config.ca_size() {
            1 => input.read_u8()? as u16,
            _ => input.read_u16_le()?,
        };

        let address_count = if sequence { count.min(1) } else { count };
        let expected = config.header_len()
            + object_size * count
            + config.ioa_size() as usize * address_count;
        if data.len() != expected {
            return Err(Rtu104Error::invalid_asdu(
                format!(
                    "length mismatch: header implies {} bytes, got {}",
                    expected,
                    data.len()
                ),
                data,
                input.position(),
            ));
        }

        let mut objects = Vec::with_capacity(count);
        let mut implicit: Option<InfoAddress> = None;
        for _ in 0..count {
            let mut object = registry.create(type_id)?;
            match implicit.take() {
                Some(address) => {
                    object.read(&mut input, 0)?;
                    object.set_address(address);
                }
                None => object.read(&mut input, config.ioa_size())?,
            }
            if sequence {
                implicit = Some(object.address().successor());
            }
            objects.push(object);
        }

        Ok(Self {
            header: AsduHeader {
                type_id,
                reason,
                origin,
                common_address,
            },
            sequence,
            objects,
        })
    }

    /// Encode into `out` under the given field widths.
    pub fn encode_to(&self, out: &mut BytesMut, config: &AsduConfig) -> Result<()> {
        use bytes::BufMut;

        if self.objects.len() > MAX_OBJECT_COUNT {
            return Err(Rtu104Error::config(format!(
                "object count limited to {}",
                MAX_OBJECT_COUNT
            )));
        }

        out.reserve(self.encoded_len(config));
        out.put_u8(self.header.type_id.as_u8());
        out.put_u8(self.objects.len() as u8 | if self.sequence { 0x80 } else { 0x00 });
        out.put_u8(self.header.reason.as_byte());
        if config.has_origin() {
            out.put_u8(self.header.origin);
        }
        match config.ca_size() {
            1 => out.put_u8(self.header.common_address as u8),
            _ => out.put_u16_le(self.header.common_address),
        }

        for (index, object) in self.objects.iter().enumerate() {
            if self.sequence && index > 0 {
                // Implicit address, write the payload only
                let mut with_implicit = object.clone_box();
                with_implicit.set_address(InfoAddress::implicit(0));
                with_implicit.write(out);
            } else if object.address().size() != config.ioa_size() {
                // The configured width decides the wire size, not the
                // width the object happens to carry
                let mut normalized = object.clone_box();
                normalized.set_address(InfoAddress::new(
                    object.address().value(),
                    config.ioa_size(),
                ));
                normalized.write(out);
            } else {
                object.write(out);
            }
        }
        Ok(())
    }

    /// Encoded length in bytes under the given field widths.
    pub fn encoded_len(&self, config: &AsduConfig) -> usize {
        let address_count = if self.sequence {
            self.objects.len().min(1)
        } else {
            self.objects.len()
        };
        let object_bytes: usize = self.objects.iter().map(|o| o.encoded_size()).sum();
        config.header_len() + object_bytes + config.ioa_size() as usize * address_count
    }
}

impl std::fmt::Display for Asdu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} reason={} ca={} objects={}{}",
            self.header.type_id,
            self.header.reason,
            self.header.common_address,
            self.objects.len(),
            if self.sequence { " (seq)" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::info::{Quality, SinglePointInfo};
    use crate::types::reason::ReasonCode;

    fn registry() -> InfoObjectRegistry {
        InfoObjectRegistry::with_builtins()
    }

    fn single_point(address: u32, value: bool) -> Box<dyn InfoObject> {
        Box::new(SinglePointInfo::new(
            InfoAddress::new(address, 3),
            value,
            Quality::GOOD,
        ))
    }

    #[test]
    fn test_config_validation() {
        assert!(AsduConfig::new(1, 1, 1).is_ok());
        assert!(AsduConfig::new(2, 2, 3).is_ok());
        assert!(AsduConfig::new(0, 2, 3).is_err());
        assert!(AsduConfig::new(3, 2, 3).is_err());
        assert!(AsduConfig::new(2, 0, 3).is_err());
        assert!(AsduConfig::new(2, 3, 3).is_err());
        assert!(AsduConfig::new(2, 2, 0).is_err());
        assert!(AsduConfig::new(2, 2, 4).is_err());
        assert_eq!(AsduConfig::default(), AsduConfig::new(2, 2, 3).unwrap());
    }

    #[test]
    fn test_encode_decode_unoptimized() {
        let config = AsduConfig::default();
        let registry = registry();

        let mut asdu = Asdu::new(
            TypeId::M_SP_NA_1,
            Reason::new(ReasonCode::Spontaneous),
            0x0102,
        )
        .with_origin(9);
        asdu.append(single_point(100, true)).unwrap();
        asdu.append(single_point(205, false)).unwrap();

        let mut out = BytesMut::new();
        asdu.encode_to(&mut out, &config).unwrap();
        assert_eq!(out.len(), asdu.encoded_len(&config));
        assert_eq!(
            &out[..],
            &[
                0x01, 0x02, 0x03, 0x09, 0x02, 0x01, // header
                100, 0x00, 0x00, 0x01, // IOA 100, on
                205, 0x00, 0x00, 0x00, // IOA 205, off
            ]
        );

        let decoded = Asdu::decode(&out, &config, &registry).unwrap();
        assert_eq!(decoded.header.type_id, TypeId::M_SP_NA_1);
        assert_eq!(decoded.header.origin, 9);
        assert_eq!(decoded.header.common_address, 0x0102);
        assert!(!decoded.is_sequence());
        assert_eq!(decoded.objects().len(), 2);
        assert_eq!(decoded, asdu);
    }

    #[test]
    fn test_sequence_optimized_twenty_objects() {
        let config = AsduConfig::default();
        let registry = registry();

        let mut asdu = Asdu::new(
            TypeId::M_SP_NA_1,
            Reason::new(ReasonCode::Spontaneous),
            0xAFAF,
        )
        .with_sequence();
        for i in 0..20u32 {
            asdu.append(single_point(0xAFAF + i, i % 2 == 0)).unwrap();
        }

        let mut out = BytesMut::new();
        asdu.encode_to(&mut out, &config).unwrap();
        // Header 6 + one explicit address 3 + 20 payload bytes
        assert_eq!(out.len(), 6 + 3 + 20);

        let decoded = Asdu::decode(&out, &config, &registry).unwrap();
        assert!(decoded.is_sequence());
        assert_eq!(decoded.header.common_address, 0xAFAF);
        assert_eq!(decoded.objects().len(), 20);
        assert_eq!(decoded.objects()[0].address().value(), 0xAFAF);
        assert_eq!(decoded.objects()[0].address().size(), 3);
        assert_eq!(decoded.objects()[19].address().value(), 0xAFC2);
        assert_eq!(decoded.objects()[19].address().size(), 0);

        for (i, object) in decoded.objects().iter().enumerate() {
            assert_eq!(object.address().value(), 0xAFAF + i as u32);
        }
    }

    #[test]
    fn test_decode_rejects_length_mismatch() {
        let config = AsduConfig::default();
        let registry = registry();

        let mut asdu = Asdu::new(TypeId::M_SP_NA_1, Reason::new(ReasonCode::Spontaneous), 1);
        asdu.append(single_point(5, true)).unwrap();
        let mut out = BytesMut::new();
        asdu.encode_to(&mut out, &config).unwrap();

        // Truncated
        let err = Asdu::decode(&out[..out.len() - 1], &config, &registry).unwrap_err();
        assert!(matches!(err, Rtu104Error::InvalidAsdu { .. }));

        // Trailing garbage
        let mut longer = out.to_vec();
        longer.push(0x00);
        assert!(Asdu::decode(&longer, &config, &registry).is_err());

        // Count claims more objects than present
        let mut wrong_count = out.to_vec();
        wrong_count[1] = 0x02;
        assert!(Asdu::decode(&wrong_count, &config, &registry).is_err());
    }

    #[test]
    fn test_decode_unknown_type_rejected_before_size_check() {
        let config = AsduConfig::default();
        let registry = registry();

        let data = [0xC8, 0x01, 0x03, 0x00, 0x01, 0x00];
        let err = Asdu::decode(&data, &config, &registry).unwrap_err();
        assert!(matches!(err, Rtu104Error::UnknownTypeId(200)));
    }

    #[test]
    fn test_decode_zero_code_reason_rejected() {
        let config = AsduConfig::default();
        let registry = registry();

        // Valid layout but reason byte 0x00
        let data = [0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x05, 0x00, 0x00, 0x01];
        assert!(Asdu::decode(&data, &config, &registry).is_err());
    }

    #[test]
    fn test_append_rejects_foreign_type() {
        let mut asdu = Asdu::new(TypeId::M_ME_NC_1, Reason::new(ReasonCode::Periodic), 1);
        assert!(asdu.append(single_point(1, false)).is_err());
    }

    #[test]
    fn test_append_enforces_count_limit() {
        let mut asdu = Asdu::new(TypeId::M_SP_NA_1, Reason::new(ReasonCode::Spontaneous), 1);
        for i in 0..MAX_OBJECT_COUNT as u32 {
            asdu.append(single_point(i, false)).unwrap();
        }
        assert!(asdu.append(single_point(999, false)).is_err());
    }

    #[test]
    fn test_encode_normalizes_foreign_address_width() {
        let config = AsduConfig::default();
        let registry = registry();

        // Object carries a 1-byte address under the 3-byte profile
        let mut asdu = Asdu::new(TypeId::M_SP_NA_1, Reason::new(ReasonCode::Spontaneous), 1);
        asdu.append(Box::new(SinglePointInfo::new(
            InfoAddress::new(5, 1),
            true,
            Quality::GOOD,
        )))
        .unwrap();
        asdu.append(single_point(0x2001, false)).unwrap();

        let mut out = BytesMut::new();
        asdu.encode_to(&mut out, &config).unwrap();
        // The emitted bytes match the declared size exactly
        assert_eq!(out.len(), asdu.encoded_len(&config));

        let decoded = Asdu::decode(&out, &config, &registry).unwrap();
        assert_eq!(decoded.objects().len(), 2);
        assert_eq!(decoded.objects()[0].address().value(), 5);
        assert_eq!(decoded.objects()[0].address().size(), 3);
        assert_eq!(decoded.objects()[1].address().value(), 0x2001);
    }

    #[test]
    fn test_one_byte_widths() {
        let config = AsduConfig::new(1, 1, 1).unwrap();
        let registry = registry();

        let mut asdu = Asdu::new(TypeId::M_SP_NA_1, Reason::new(ReasonCode::Request), 7);
        asdu.append(Box::new(SinglePointInfo::new(
            InfoAddress::new(0x42, 1),
            true,
            Quality::GOOD,
        )))
        .unwrap();

        let mut out = BytesMut::new();
        asdu.encode_to(&mut out, &config).unwrap();
        assert_eq!(&out[..], &[0x01, 0x01, 0x05, 0x07, 0x42, 0x01]);

        let decoded = Asdu::decode(&out, &config, &registry).unwrap();
        assert_eq!(decoded.header.origin, 0);
        assert_eq!(decoded.header.common_address, 7);
        assert_eq!(decoded.objects()[0].address().value(), 0x42);
    }
}
