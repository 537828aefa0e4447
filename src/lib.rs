//! # rtu104
//!
//! IEC 60870-5-104 session and telegram layer.
//!
//! Implements the telecontrol companion standard's TCP profile: strict
//! APDU framing, typed ASDU bodies with an extensible info-object
//! registry, and a per-connection link state machine.
//!
//! ## Features
//!
//! - **Full frame support**: I-frames, S-frames, U-frames
//! - **Standard timeouts**: t1, t2, t3, k, w parameters
//! - **Event-driven**: fire-and-forget link notifications via channels
//! - **Type safe**: strong typing for TypeId, Reason, InfoAddress,
//!   Sequence
//! - **Deterministic tests**: timers run against an injectable clock
//!
//! ## Wire format
//!
//! Frame layout:
//!
//! ```text
//! +------+--------+----------------------+------------------+
//! | 0x68 | length | control field (4 B)  | ASDU (I-frames)  |
//! +------+--------+----------------------+------------------+
//!          length = everything after the length byte, 4-253
//! ```
//!
//! A [`Link`] owns one socket and is driven by cooperative [`Link::tick`]
//! calls; a [`Server`] accepts connections and schedules the resulting
//! links in an explicit poll loop. Timers compare the injected [`Clock`]
//! against recorded timestamps, so tests run against a simulated clock
//! with no real waiting.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use rtu104::{AsduConfig, ConnectionConfig, InfoObjectRegistry, Server};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> rtu104::Result<()> {
//!     let registry = Arc::new(InfoObjectRegistry::with_builtins());
//!     let (mut server, mut events) = Server::bind(
//!         "0.0.0.0:2404",
//!         ConnectionConfig::default(),
//!         AsduConfig::default(),
//!         registry,
//!     )
//!     .await?;
//!
//!     tokio::spawn(async move { while events.recv().await.is_some() {} });
//!     server.run().await
//! }
//! ```

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod link;
pub mod sequence;
pub mod server;
pub mod socket;
pub mod types;

pub use clock::{Clock, SimulatedClock, SystemClock};
pub use codec::{Apdu, TelegramCodec};
pub use config::ConnectionConfig;
pub use error::{Result, Rtu104Error};
pub use link::{CancelToken, Link, LinkEvent, Role};
pub use sequence::Sequence;
pub use server::{Server, ServerEvent};
pub use socket::{ReadStatus, SessionSocket};
pub use types::{
    Apci, Asdu, AsduConfig, AsduHeader, DoublePointInfo, DoublePointValue, InfoAddress,
    InfoObject, InfoObjectRegistry, MeasuredFloatInfo, MeasuredScaledInfo, Quality, Reason,
    ReasonCode, RegistrationPriority, ServiceKind, SinglePointInfo, TypeId, UFunction,
};
