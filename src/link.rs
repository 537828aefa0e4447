//! Link state machine: one peer session over one socket.
//!
//! A link is driven by repeated cooperative [`Link::tick`] calls from a
//! single task; all link state is owned by the link and mutated only from
//! its own tick and send routines. A tick reads whatever the socket has,
//! handles every fully buffered telegram, runs the acknowledgment
//! threshold check, then evaluates the three timers as plain now-minus-
//! timestamp comparisons against the injected clock.
//!
//! Timer roles:
//! - t1: a pending service handshake must be confirmed within t1, else the
//!   session ends (the only fatal timer).
//! - t2: received data must be acknowledged within t2 even below the w
//!   threshold.
//! - t3: after t3 without any traffic a test frame is sent; its
//!   confirmation is then governed by t1 like any other service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::codec::{Apdu, TelegramCodec};
use crate::config::ConnectionConfig;
use crate::error::{Result, Rtu104Error};
use crate::sequence::Sequence;
use crate::socket::{ReadStatus, SessionSocket};
use crate::types::apci::{Apci, ServiceKind, UFunction};
use crate::types::asdu::Asdu;

/// Which side of the link this node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Controlling station: initiates start/stop of data transfer.
    Master,
    /// Controlled station: follows the master's start/stop requests.
    Slave,
}

/// Fire-and-forget notifications for observers.
///
/// Delivery never blocks the link; a lagging or dropped subscriber is
/// silently skipped.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A frame left the socket.
    TelegramSent(Apci),
    /// A frame arrived, data frames with their decoded body.
    TelegramReceived(Apdu),
    /// Data transfer was enabled or disabled.
    ActiveChanged(bool),
    /// A tick completed.
    TickFinished,
    /// The session ended, with the reason.
    Closed(String),
}

/// Cooperative cancellation flag shared with the driving loop.
///
/// Cancelling never interrupts an in-flight tick; the run loop observes
/// the flag between ticks and closes the link.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create an uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingService {
    kind: ServiceKind,
    sent_at: u64,
}

/// One peer session: socket, counters, timers and handshake state.
pub struct Link<S> {
    role: Role,
    socket: S,
    codec: TelegramCodec,
    config: ConnectionConfig,
    clock: Arc<dyn Clock>,
    cancel: CancelToken,

    buffer: BytesMut,
    connected: bool,
    active: bool,
    pending: Option<PendingService>,

    /// Next send-sequence expected from the peer.
    recv_next: Sequence,
    /// Send-sequence of the next data frame sent by us.
    send_next: Sequence,
    /// Receive-sequence last announced to the peer.
    acked_by_local: Sequence,
    /// Receive-sequence last announced by the peer.
    acked_by_remote: Sequence,

    /// Since when received data awaits an acknowledgment (t2).
    ack_delay_since: Option<u64>,
    /// Last time any frame crossed the socket (t3).
    last_traffic_at: u64,

    subscribers: Vec<mpsc::UnboundedSender<LinkEvent>>,
}

impl Link<tokio::net::TcpStream> {
    /// Connect to a remote slave as master, honoring the t0 timeout.
    pub async fn connect<A: tokio::net::ToSocketAddrs>(
        addr: A,
        config: ConnectionConfig,
        codec: TelegramCodec,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let socket = tokio::time::timeout(config.t0(), tokio::net::TcpStream::connect(addr))
            .await
            .map_err(|_| {
                Rtu104Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connect timeout (t0)",
                ))
            })??;
        debug!(peer = ?socket.peer_addr().ok(), "connected");
        Ok(Self::new(Role::Master, socket, config, codec, clock))
    }
}

impl<S: SessionSocket> Link<S> {
    /// Create a link over an established socket.
    pub fn new(
        role: Role,
        socket: S,
        config: ConnectionConfig,
        codec: TelegramCodec,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            role,
            socket,
            codec,
            config,
            clock,
            cancel: CancelToken::new(),
            buffer: BytesMut::with_capacity(512),
            connected: true,
            active: false,
            pending: None,
            recv_next: Sequence::ZERO,
            send_next: Sequence::ZERO,
            acked_by_local: Sequence::ZERO,
            acked_by_remote: Sequence::ZERO,
            ack_delay_since: None,
            last_traffic_at: now,
            subscribers: Vec::new(),
        }
    }

    /// This node's role.
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Check if the socket is alive.
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Check if data transfer is enabled.
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Check if a service handshake is outstanding.
    pub fn has_pending_service(&self) -> bool {
        self.pending.is_some()
    }

    /// The cancellation token shared with the driving loop.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Subscribe to link notifications.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<LinkEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: LinkEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Run one cooperative tick: receive, handle, acknowledge, timers.
    ///
    /// A fatal error closes the link before it is returned; the caller
    /// should drop the link afterwards.
    pub async fn tick(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Rtu104Error::NotConnected);
        }
        match self.tick_inner().await {
            Ok(()) => {
                self.emit(LinkEvent::TickFinished);
                Ok(())
            }
            Err(e) => {
                if e.is_session_fatal() {
                    self.close(&e.to_string());
                }
                Err(e)
            }
        }
    }

    async fn tick_inner(&mut self) -> Result<()> {
        // 1. Drain the socket into the receive buffer
        loop {
            match self.socket.try_read(&mut self.buffer)? {
                ReadStatus::Data => continue,
                ReadStatus::Idle => break,
                ReadStatus::Closed => {
                    debug!(peer = ?self.socket.peer_addr(), "peer closed connection");
                    return Err(Rtu104Error::ConnectionClosed);
                }
            }
        }

        // 2. Handle every fully buffered telegram
        while let Some(apdu) = self.codec.decode(&mut self.buffer)? {
            self.handle_telegram(apdu).await?;
        }

        // 3. Acknowledge once w received frames are outstanding
        if self.acked_by_local.distance(self.recv_next) >= i32::from(self.config.w()) {
            self.send_ack().await?;
        }

        // 4. Timers
        let now = self.clock.now_ms();
        if let Some(pending) = self.pending {
            if now.saturating_sub(pending.sent_at) >= self.config.t1_ms() {
                warn!(service = %pending.kind, "no confirmation within t1");
                return Err(Rtu104Error::PeerAckTimeout);
            }
        }
        if let Some(since) = self.ack_delay_since {
            if now.saturating_sub(since) >= self.config.t2_ms() {
                self.send_ack().await?;
            }
        }
        if self.config.t3_ms() > 0
            && self.pending.is_none()
            && now.saturating_sub(self.last_traffic_at) >= self.config.t3_ms()
        {
            self.activate_service(ServiceKind::Test).await?;
        }

        Ok(())
    }

    async fn handle_telegram(&mut self, apdu: Apdu) -> Result<()> {
        debug!(telegram = %apdu, "received");
        self.last_traffic_at = self.clock.now_ms();
        self.emit(LinkEvent::TelegramReceived(apdu.clone()));

        match apdu.apci {
            Apci::UFrame { function } if function.is_confirmation() => {
                match self.pending {
                    Some(pending) if pending.kind == function.kind() => {
                        self.pending = None;
                        match function.kind() {
                            ServiceKind::Start => self.set_active(true),
                            ServiceKind::Stop => self.set_active(false),
                            ServiceKind::Test => {}
                        }
                    }
                    // Late or duplicate confirmations are tolerated
                    _ => debug!(function = %function, "unsolicited confirmation ignored"),
                }
            }
            Apci::UFrame { function } => {
                self.transmit(&Apdu::control(Apci::UFrame {
                    function: function.to_confirmation(),
                }))
                .await?;
                if self.role == Role::Slave {
                    match function.kind() {
                        ServiceKind::Start => self.set_active(true),
                        ServiceKind::Stop => self.set_active(false),
                        ServiceKind::Test => {}
                    }
                }
            }
            Apci::SFrame { recv_seq } => self.record_peer_ack(recv_seq)?,
            Apci::IFrame { send_seq, recv_seq } => {
                self.record_peer_ack(recv_seq)?;
                if send_seq != self.recv_next {
                    return Err(Rtu104Error::SequenceMismatch {
                        expected: self.recv_next.value(),
                        actual: send_seq.value(),
                    });
                }
                self.recv_next = self.recv_next.increment();
                if self.ack_delay_since.is_none() {
                    self.ack_delay_since = Some(self.clock.now_ms());
                }
            }
        }
        Ok(())
    }

    /// Record the peer's receive-sequence; it may only move forward.
    fn record_peer_ack(&mut self, recv_seq: Sequence) -> Result<()> {
        if self.acked_by_remote.distance(recv_seq) < 0 {
            return Err(Rtu104Error::SequenceRegression {
                last: self.acked_by_remote.value(),
                actual: recv_seq.value(),
            });
        }
        self.acked_by_remote = recv_seq;
        Ok(())
    }

    /// Request start of data transfer.
    pub async fn start(&mut self) -> Result<()> {
        self.activate_service(ServiceKind::Start).await
    }

    /// Request stop of data transfer.
    pub async fn stop(&mut self) -> Result<()> {
        self.activate_service(ServiceKind::Stop).await
    }

    /// Send a test frame handshake.
    pub async fn test(&mut self) -> Result<()> {
        self.activate_service(ServiceKind::Test).await
    }

    async fn activate_service(&mut self, kind: ServiceKind) -> Result<()> {
        if !self.connected {
            return Err(Rtu104Error::NotConnected);
        }
        if self.pending.is_some() {
            return Err(Rtu104Error::ServicePending);
        }
        let function = match kind {
            ServiceKind::Start => UFunction::StartActivation,
            ServiceKind::Stop => UFunction::StopActivation,
            ServiceKind::Test => UFunction::TestActivation,
        };
        self.transmit(&Apdu::control(Apci::UFrame { function }))
            .await?;
        self.pending = Some(PendingService {
            kind,
            sent_at: self.clock.now_ms(),
        });
        Ok(())
    }

    /// Send a telegram body as a data frame.
    ///
    /// Fails without side effects while data transfer is inactive or the
    /// send window already holds k unacknowledged frames.
    pub async fn send_asdu(&mut self, asdu: Asdu) -> Result<()> {
        if !self.connected || !self.active {
            return Err(Rtu104Error::NotConnected);
        }
        if self.acked_by_remote.distance(self.send_next) >= i32::from(self.config.k()) {
            return Err(Rtu104Error::WindowFull(self.config.k()));
        }

        let apdu = Apdu::information(
            Apci::IFrame {
                send_seq: self.send_next,
                recv_seq: self.recv_next,
            },
            asdu,
        );
        self.transmit(&apdu).await?;
        self.send_next = self.send_next.increment();
        // The data frame piggybacks the acknowledgment
        self.acked_by_local = self.recv_next;
        self.ack_delay_since = None;
        Ok(())
    }

    /// Send an acknowledgment frame carrying the current receive counter.
    async fn send_ack(&mut self) -> Result<()> {
        self.transmit(&Apdu::control(Apci::SFrame {
            recv_seq: self.recv_next,
        }))
        .await?;
        self.acked_by_local = self.recv_next;
        self.ack_delay_since = None;
        Ok(())
    }

    async fn transmit(&mut self, apdu: &Apdu) -> Result<()> {
        let mut out = BytesMut::new();
        self.codec.encode(apdu, &mut out)?;
        self.socket.send(&out).await?;
        debug!(telegram = %apdu, "sent");
        self.last_traffic_at = self.clock.now_ms();
        self.emit(LinkEvent::TelegramSent(apdu.apci));
        Ok(())
    }

    fn set_active(&mut self, active: bool) {
        if self.active != active {
            self.active = active;
            self.emit(LinkEvent::ActiveChanged(active));
        }
    }

    /// Tear the session down, notifying observers with the reason.
    pub fn close(&mut self, reason: &str) {
        if !self.connected {
            return;
        }
        debug!(peer = ?self.socket.peer_addr(), reason, "closing link");
        self.connected = false;
        self.set_active(false);
        self.pending = None;
        self.emit(LinkEvent::Closed(reason.to_string()));
    }
}

impl<S> std::fmt::Debug for Link<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("role", &self.role)
            .field("connected", &self.connected)
            .field("active", &self.active)
            .field("recv_next", &self.recv_next)
            .field("send_next", &self.send_next)
            .finish()
    }
}
