//! Error types for the IEC 60870-5-104 session layer.

use thiserror::Error;

/// Result type alias for rtu104 operations.
pub type Result<T> = std::result::Result<T, Rtu104Error>;

/// IEC 60870-5-104 session and codec error types.
#[derive(Debug, Error)]
pub enum Rtu104Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Not connected to remote
    #[error("Not connected")]
    NotConnected,

    /// Connection closed by peer
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Structural frame decode failure
    #[error("Invalid frame at byte {offset}: {reason} [{context}]")]
    InvalidFrame {
        /// What was wrong
        reason: String,
        /// Byte offset into the receive buffer
        offset: usize,
        /// Hex window around the offending byte
        context: String,
    },

    /// Structural ASDU decode failure
    #[error("Invalid ASDU at byte {offset}: {reason} [{context}]")]
    InvalidAsdu {
        /// What was wrong
        reason: String,
        /// Byte offset into the ASDU
        offset: usize,
        /// Hex window around the offending byte
        context: String,
    },

    /// Type identifier without a registry entry
    #[error("Unknown type ID: {0}")]
    UnknownTypeId(u8),

    /// Sequence value outside [0, 32767]
    #[error("Sequence value out of range: {0}")]
    SequenceOutOfRange(u16),

    /// Peer sent a send-sequence that is not the expected one
    #[error("Send-sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch {
        /// Locally expected value
        expected: u16,
        /// Value carried by the peer's frame
        actual: u16,
    },

    /// Peer's receive-sequence moved backwards
    #[error("Receive-sequence regression: last {last}, got {actual}")]
    SequenceRegression {
        /// Last acknowledgment recorded from the peer
        last: u16,
        /// Regressed value carried by the peer's frame
        actual: u16,
    },

    /// No confirmation for a pending service within t1
    #[error("Peer acknowledgment timeout (t1): no confirmation received")]
    PeerAckTimeout,

    /// A service handshake is already outstanding
    #[error("A service is already pending")]
    ServicePending,

    /// Too many unacknowledged sent frames
    #[error("Send window full (k={0})")]
    WindowFull(u16),

    /// Invalid or inconsistent configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Rtu104Error {
    /// Create a structural frame error with a hex context window.
    pub fn invalid_frame(reason: impl Into<String>, data: &[u8], offset: usize) -> Self {
        Self::InvalidFrame {
            reason: reason.into(),
            offset,
            context: hex_context(data, offset),
        }
    }

    /// Create a structural ASDU error with a hex context window.
    pub fn invalid_asdu(reason: impl Into<String>, data: &[u8], offset: usize) -> Self {
        Self::InvalidAsdu {
            reason: reason.into(),
            offset,
            context: hex_context(data, offset),
        }
    }

    /// Create a configuration error with a message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this error ends the session when it surfaces from a tick.
    ///
    /// Caller mistakes (a second service while one is pending, a full send
    /// window) leave the session alive; everything else closes it.
    pub fn is_session_fatal(&self) -> bool {
        !matches!(self, Self::ServicePending | Self::WindowFull(_))
    }

    /// Check if this error is a protocol-sequence violation.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::SequenceMismatch { .. } | Self::SequenceRegression { .. } | Self::PeerAckTimeout
        )
    }
}

/// Render a short hex window around `offset` for diagnostics.
fn hex_context(data: &[u8], offset: usize) -> String {
    const WINDOW: usize = 8;

    let start = offset.saturating_sub(WINDOW / 2);
    let end = (start + WINDOW).min(data.len());

    data[start.min(end)..end]
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
