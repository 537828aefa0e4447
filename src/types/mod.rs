//! Protocol data types: control fields, telegram bodies and payloads.

pub mod address;
pub mod apci;
pub mod asdu;
pub mod info;
pub mod reason;
pub mod stream;
pub mod type_id;

pub use address::InfoAddress;
pub use apci::{Apci, ServiceKind, UFunction};
pub use asdu::{Asdu, AsduConfig, AsduHeader};
pub use info::{
    DoublePointInfo, DoublePointValue, InfoObject, InfoObjectRegistry, MeasuredFloatInfo,
    MeasuredScaledInfo, Quality, RegistrationPriority, SinglePointInfo,
};
pub use reason::{Reason, ReasonCode};
pub use stream::ByteReader;
pub use type_id::TypeId;
