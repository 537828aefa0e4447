//! Transport abstraction used by the link layer.
//!
//! A link never blocks on its socket: reads are non-blocking polls feeding
//! the receive buffer, writes go through an async `send`. The trait exists
//! so the link state machine can run against an in-memory transport in
//! tests.

use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::error::Result;

/// Outcome of a non-blocking read poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Nothing available right now.
    Idle,
    /// One or more bytes were appended to the buffer.
    Data,
    /// The peer closed the connection.
    Closed,
}

/// Byte transport of one link.
#[allow(async_fn_in_trait)]
pub trait SessionSocket {
    /// Poll for readable bytes, appending them to `buf` without blocking.
    fn try_read(&mut self, buf: &mut BytesMut) -> Result<ReadStatus>;

    /// Write a complete frame to the peer.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Peer address, when the transport has one.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl SessionSocket for TcpStream {
    fn try_read(&mut self, buf: &mut BytesMut) -> Result<ReadStatus> {
        // Capacity must be nonzero first, otherwise a zero-byte read is
        // indistinguishable from the peer closing.
        buf.reserve(256);
        match TcpStream::try_read_buf(self, buf) {
            Ok(0) => Ok(ReadStatus::Closed),
            Ok(_) => Ok(ReadStatus::Data),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(ReadStatus::Idle),
            Err(e) => Err(e.into()),
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.write_all(data).await?;
        Ok(())
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        TcpStream::peer_addr(self).ok()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MockSocket;
    use super::*;

    #[test]
    fn test_mock_read_reports_data_then_idle_then_closed() {
        let mut socket = MockSocket::new();
        let mut buf = BytesMut::new();

        socket.push_inbound(&[0x68, 0x04]);
        assert_eq!(socket.try_read(&mut buf).unwrap(), ReadStatus::Data);
        assert_eq!(&buf[..], &[0x68, 0x04]);
        assert_eq!(socket.try_read(&mut buf).unwrap(), ReadStatus::Idle);

        socket.close();
        assert_eq!(socket.try_read(&mut buf).unwrap(), ReadStatus::Closed);
    }

    #[test]
    fn test_mock_send_records_whole_frames() {
        let mut socket = MockSocket::new();
        tokio_test::block_on(socket.send(&[0x68, 0x04, 0x07, 0x00, 0x00, 0x00])).unwrap();
        tokio_test::block_on(socket.send(&[0x68, 0x04, 0x43, 0x00, 0x00, 0x00])).unwrap();

        let sent = socket.take_sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0][2], 0x07);
        assert_eq!(sent[1][2], 0x43);
        assert!(socket.take_sent().is_empty());
    }
}
