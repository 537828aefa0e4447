//! Typed information objects and their registry.
//!
//! Each concrete object kind has a stable type id and a fixed payload size
//! (excluding the object address). Decoding is dispatched through an
//! explicit [`InfoObjectRegistry`] value; there is no global registration.
//! Downstream crates can register their own kinds with
//! [`RegistrationPriority::External`], which overrides the built-ins.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::error::{Result, Rtu104Error};
use crate::types::address::InfoAddress;
use crate::types::stream::ByteReader;
use crate::types::type_id::TypeId;

/// Quality descriptor flags shared by all object kinds.
///
/// The overflow flag only appears in measured-value quality bytes; state
/// values never carry it on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Quality {
    /// Overflow (OV, 0x01)
    pub overflow: bool,
    /// Blocked (BL, 0x10)
    pub blocked: bool,
    /// Substituted (SB, 0x20)
    pub substituted: bool,
    /// Not topical (NT, 0x40)
    pub not_topical: bool,
    /// Invalid (IV, 0x80)
    pub invalid: bool,
}

impl Quality {
    /// Quality with all flags clear (good).
    pub const GOOD: Quality = Quality {
        overflow: false,
        blocked: false,
        substituted: false,
        not_topical: false,
        invalid: false,
    };

    /// Decode from a quality byte, ignoring reserved bits.
    pub fn from_byte(byte: u8) -> Self {
        Self {
            overflow: (byte & 0x01) != 0,
            blocked: (byte & 0x10) != 0,
            substituted: (byte & 0x20) != 0,
            not_topical: (byte & 0x40) != 0,
            invalid: (byte & 0x80) != 0,
        }
    }

    /// Encode to a quality byte; reserved bits stay zero.
    pub fn as_byte(&self) -> u8 {
        let mut byte = 0u8;
        if self.overflow {
            byte |= 0x01;
        }
        if self.blocked {
            byte |= 0x10;
        }
        if self.substituted {
            byte |= 0x20;
        }
        if self.not_topical {
            byte |= 0x40;
        }
        if self.invalid {
            byte |= 0x80;
        }
        byte
    }

    /// High nibble only, for state values sharing a byte with their value.
    pub fn as_high_nibble(&self) -> u8 {
        self.as_byte() & 0xF0
    }

    /// Check if all flags are clear.
    pub fn is_good(&self) -> bool {
        *self == Self::GOOD
    }
}

/// Double-point state: 2-bit value with two transient encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DoublePointValue {
    /// Intermediate position (00)
    Intermediate = 0,
    /// Determined off (01)
    Off = 1,
    /// Determined on (10)
    On = 2,
    /// Faulty (11)
    Faulty = 3,
}

impl DoublePointValue {
    /// Decode from the lower two bits.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Intermediate,
            1 => Self::Off,
            2 => Self::On,
            _ => Self::Faulty,
        }
    }
}

/// A typed payload element of an ASDU.
///
/// An object owns its address: explicit (width 1-3) when it was first in a
/// sequence-optimized ASDU or the ASDU is unoptimized, implicit (width 0)
/// otherwise. `write` emits the address followed by the fixed payload, so
/// implicit addresses cost nothing on the wire.
pub trait InfoObject: fmt::Debug + Send + Sync {
    /// Stable type id of this object kind.
    fn type_id(&self) -> TypeId;

    /// The object address.
    fn address(&self) -> InfoAddress;

    /// Replace the object address (used for implicit address assignment).
    fn set_address(&mut self, address: InfoAddress);

    /// Decode address (of `address_size` bytes) and payload from the input.
    fn read(&mut self, input: &mut ByteReader<'_>, address_size: u8) -> Result<()>;

    /// Encode address and payload.
    fn write(&self, out: &mut BytesMut);

    /// Payload size in bytes, excluding the address.
    fn encoded_size(&self) -> usize;

    /// Quality flags, for kinds that carry them.
    fn quality(&self) -> Option<Quality> {
        None
    }

    /// Clone into a new boxed object.
    fn clone_box(&self) -> Box<dyn InfoObject>;

    /// Upcast for comparisons.
    fn as_any(&self) -> &dyn Any;

    /// Structural equality across boxed objects.
    fn eq_object(&self, other: &dyn InfoObject) -> bool;
}

impl Clone for Box<dyn InfoObject> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl PartialEq for Box<dyn InfoObject> {
    fn eq(&self, other: &Self) -> bool {
        self.eq_object(other.as_ref())
    }
}

macro_rules! impl_info_object_common {
    ($ty:ty, $type_id:expr, $size:expr) => {
        fn type_id(&self) -> TypeId {
            $type_id
        }

        fn address(&self) -> InfoAddress {
            self.address
        }

        fn set_address(&mut self, address: InfoAddress) {
            self.address = address;
        }

        fn encoded_size(&self) -> usize {
            $size
        }

        fn clone_box(&self) -> Box<dyn InfoObject> {
            Box::new(self.clone())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn eq_object(&self, other: &dyn InfoObject) -> bool {
            other
                .as_any()
                .downcast_ref::<$ty>()
                .is_some_and(|other| self == other)
        }
    };
}

/// Single-point information (M_SP_NA_1): boolean state with quality.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SinglePointInfo {
    /// Object address
    pub address: InfoAddress,
    /// State value
    pub value: bool,
    /// Quality flags (overflow never set)
    pub quality: Quality,
}

impl SinglePointInfo {
    /// Fixed payload size excluding the address.
    pub const DATA_SIZE: usize = 1;

    /// Create with an explicit address.
    pub fn new(address: InfoAddress, value: bool, quality: Quality) -> Self {
        Self {
            address,
            value,
            quality,
        }
    }
}

impl InfoObject for SinglePointInfo {
    impl_info_object_common!(SinglePointInfo, TypeId::M_SP_NA_1, Self::DATA_SIZE);

    fn read(&mut self, input: &mut ByteReader<'_>, address_size: u8) -> Result<()> {
        self.address = InfoAddress::read_from(input, address_size)?;

        let encoded = input.read_u8()?;
        if encoded & 0x0E != 0 {
            return Err(input.error_at_last("reserved bits set in single-point value"));
        }

        self.value = (encoded & 0x01) != 0;
        self.quality = Quality::from_byte(encoded & 0xF0);
        Ok(())
    }

    fn write(&self, out: &mut BytesMut) {
        self.address.write_to(out);

        let mut encoded = self.value as u8;
        encoded |= self.quality.as_high_nibble();
        out.put_u8(encoded);
    }

    fn quality(&self) -> Option<Quality> {
        Some(self.quality)
    }
}

/// Double-point information (M_DP_NA_1): 2-bit state with quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoublePointInfo {
    /// Object address
    pub address: InfoAddress,
    /// State value
    pub value: DoublePointValue,
    /// Quality flags (overflow never set)
    pub quality: Quality,
}

impl DoublePointInfo {
    /// Fixed payload size excluding the address.
    pub const DATA_SIZE: usize = 1;

    /// Create with an explicit address.
    pub fn new(address: InfoAddress, value: DoublePointValue, quality: Quality) -> Self {
        Self {
            address,
            value,
            quality,
        }
    }
}

impl Default for DoublePointInfo {
    fn default() -> Self {
        Self {
            address: InfoAddress::default(),
            value: DoublePointValue::Intermediate,
            quality: Quality::default(),
        }
    }
}

impl InfoObject for DoublePointInfo {
    impl_info_object_common!(DoublePointInfo, TypeId::M_DP_NA_1, Self::DATA_SIZE);

    fn read(&mut self, input: &mut ByteReader<'_>, address_size: u8) -> Result<()> {
        self.address = InfoAddress::read_from(input, address_size)?;

        let encoded = input.read_u8()?;
        if encoded & 0x0C != 0 {
            return Err(input.error_at_last("reserved bits set in double-point value"));
        }

        self.value = DoublePointValue::from_bits(encoded);
        self.quality = Quality::from_byte(encoded & 0xF0);
        Ok(())
    }

    fn write(&self, out: &mut BytesMut) {
        self.address.write_to(out);

        let mut encoded = self.value as u8;
        encoded |= self.quality.as_high_nibble();
        out.put_u8(encoded);
    }

    fn quality(&self) -> Option<Quality> {
        Some(self.quality)
    }
}

/// Measured value, scaled (M_ME_NB_1): signed 16-bit with quality byte.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeasuredScaledInfo {
    /// Object address
    pub address: InfoAddress,
    /// Scaled value
    pub value: i16,
    /// Quality flags
    pub quality: Quality,
}

impl MeasuredScaledInfo {
    /// Fixed payload size excluding the address.
    pub const DATA_SIZE: usize = 3;

    /// Create with an explicit address.
    pub fn new(address: InfoAddress, value: i16, quality: Quality) -> Self {
        Self {
            address,
            value,
            quality,
        }
    }
}

impl InfoObject for MeasuredScaledInfo {
    impl_info_object_common!(MeasuredScaledInfo, TypeId::M_ME_NB_1, Self::DATA_SIZE);

    fn read(&mut self, input: &mut ByteReader<'_>, address_size: u8) -> Result<()> {
        self.address = InfoAddress::read_from(input, address_size)?;
        self.value = input.read_u16_le()? as i16;

        let quality = input.read_u8()?;
        if quality & 0x0E != 0 {
            return Err(input.error_at_last("reserved bits set in quality descriptor"));
        }
        self.quality = Quality::from_byte(quality);
        Ok(())
    }

    fn write(&self, out: &mut BytesMut) {
        self.address.write_to(out);
        out.put_i16_le(self.value);
        out.put_u8(self.quality.as_byte());
    }

    fn quality(&self) -> Option<Quality> {
        Some(self.quality)
    }
}

/// Measured value, short floating point (M_ME_NC_1): f32 with quality byte.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeasuredFloatInfo {
    /// Object address
    pub address: InfoAddress,
    /// Measured value
    pub value: f32,
    /// Quality flags
    pub quality: Quality,
}

impl MeasuredFloatInfo {
    /// Fixed payload size excluding the address.
    pub const DATA_SIZE: usize = 5;

    /// Create with an explicit address.
    pub fn new(address: InfoAddress, value: f32, quality: Quality) -> Self {
        Self {
            address,
            value,
            quality,
        }
    }
}

impl InfoObject for MeasuredFloatInfo {
    impl_info_object_common!(MeasuredFloatInfo, TypeId::M_ME_NC_1, Self::DATA_SIZE);

    fn read(&mut self, input: &mut ByteReader<'_>, address_size: u8) -> Result<()> {
        self.address = InfoAddress::read_from(input, address_size)?;
        self.value = input.read_f32_le()?;

        let quality = input.read_u8()?;
        if quality & 0x0E != 0 {
            return Err(input.error_at_last("reserved bits set in quality descriptor"));
        }
        self.quality = Quality::from_byte(quality);
        Ok(())
    }

    fn write(&self, out: &mut BytesMut) {
        self.address.write_to(out);
        out.put_f32_le(self.value);
        out.put_u8(self.quality.as_byte());
    }

    fn quality(&self) -> Option<Quality> {
        Some(self.quality)
    }
}

/// Who registered an object kind; external registrations win conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RegistrationPriority {
    /// Registered by this crate's bootstrap.
    Internal = 0,
    /// Registered by downstream code; overrides internal entries.
    External = 1,
}

type Factory = Box<dyn Fn() -> Box<dyn InfoObject> + Send + Sync>;

struct Registration {
    priority: RegistrationPriority,
    size: usize,
    create: Factory,
}

/// Maps type ids to object factories and fixed payload sizes.
///
/// Construct once at process start ([`InfoObjectRegistry::with_builtins`])
/// and share it with every codec. The registered size must match what the
/// object's `read` actually consumes (excluding the address); it is used
/// for the structural size check before any object is decoded.
pub struct InfoObjectRegistry {
    entries: BTreeMap<u8, Registration>,
}

impl InfoObjectRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Create a registry with the built-in object kinds registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            TypeId::M_SP_NA_1,
            RegistrationPriority::Internal,
            SinglePointInfo::DATA_SIZE,
            || Box::new(SinglePointInfo::default()),
        );
        registry.register(
            TypeId::M_DP_NA_1,
            RegistrationPriority::Internal,
            DoublePointInfo::DATA_SIZE,
            || Box::new(DoublePointInfo::default()),
        );
        registry.register(
            TypeId::M_ME_NB_1,
            RegistrationPriority::Internal,
            MeasuredScaledInfo::DATA_SIZE,
            || Box::new(MeasuredScaledInfo::default()),
        );
        registry.register(
            TypeId::M_ME_NC_1,
            RegistrationPriority::Internal,
            MeasuredFloatInfo::DATA_SIZE,
            || Box::new(MeasuredFloatInfo::default()),
        );
        registry
    }

    /// Register an object kind.
    ///
    /// An existing entry is replaced only by a strictly higher priority, so
    /// external registrations win over built-ins and a second registration
    /// at the same priority is ignored.
    pub fn register<F>(
        &mut self,
        type_id: TypeId,
        priority: RegistrationPriority,
        size: usize,
        factory: F,
    ) where
        F: Fn() -> Box<dyn InfoObject> + Send + Sync + 'static,
    {
        if let Some(existing) = self.entries.get(&type_id.as_u8()) {
            if existing.priority >= priority {
                return;
            }
        }
        self.entries.insert(
            type_id.as_u8(),
            Registration {
                priority,
                size,
                create: Box::new(factory),
            },
        );
    }

    /// Check whether a type id has a registered kind.
    pub fn has_type(&self, type_id: TypeId) -> bool {
        self.entries.contains_key(&type_id.as_u8())
    }

    /// Fixed payload size (excluding address) of a registered kind.
    pub fn object_size(&self, type_id: TypeId) -> Option<usize> {
        self.entries.get(&type_id.as_u8()).map(|e| e.size)
    }

    /// Create a default-valued object of the registered kind.
    pub fn create(&self, type_id: TypeId) -> Result<Box<dyn InfoObject>> {
        self.entries
            .get(&type_id.as_u8())
            .map(|e| (e.create)())
            .ok_or(Rtu104Error::UnknownTypeId(type_id.as_u8()))
    }
}

impl Default for InfoObjectRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for InfoObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfoObjectRegistry")
            .field("types", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
