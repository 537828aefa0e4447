//! Listening endpoint driving a set of slave links.
//!
//! One explicit scheduler loop per server: each pass attempts a
//! non-blocking accept, runs one tick on every live link, drops links
//! whose tick reported closed or whose cancel token fired, then yields
//! briefly. Links never share mutable state; a new link is only added
//! between ticks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use futures::future::poll_fn;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::codec::TelegramCodec;
use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::link::{CancelToken, Link, LinkEvent, Role};
use crate::types::asdu::AsduConfig;
use crate::types::info::InfoObjectRegistry;

/// Delay between scheduler passes when the sockets are quiet.
const IDLE_TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Lifecycle notifications of a server's links.
#[derive(Debug)]
pub enum ServerEvent {
    /// A connection was accepted and a link created for it.
    LinkUp {
        /// Peer address
        peer: SocketAddr,
        /// Notification stream of the new link
        events: mpsc::UnboundedReceiver<LinkEvent>,
    },
    /// A link ended and was removed.
    LinkDown {
        /// Peer address
        peer: SocketAddr,
        /// Why the link ended
        reason: String,
    },
}

/// TCP endpoint accepting master connections as slave links.
pub struct Server {
    listener: TcpListener,
    config: ConnectionConfig,
    asdu_config: AsduConfig,
    registry: Arc<InfoObjectRegistry>,
    clock: Arc<dyn Clock>,
    cancel: CancelToken,
    links: Vec<(SocketAddr, Link<TcpStream>)>,
    events: mpsc::UnboundedSender<ServerEvent>,
}

impl Server {
    /// Bind a listening endpoint with the system clock.
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        config: ConnectionConfig,
        asdu_config: AsduConfig,
        registry: Arc<InfoObjectRegistry>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ServerEvent>)> {
        Self::bind_with_clock(addr, config, asdu_config, registry, Arc::new(SystemClock::new()))
            .await
    }

    /// Bind a listening endpoint with an explicit clock source.
    pub async fn bind_with_clock<A: ToSocketAddrs>(
        addr: A,
        config: ConnectionConfig,
        asdu_config: AsduConfig,
        registry: Arc<InfoObjectRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ServerEvent>)> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "listening");

        let (tx, rx) = mpsc::unbounded_channel();
        let server = Self {
            listener,
            config,
            asdu_config,
            registry,
            clock,
            cancel: CancelToken::new(),
            links: Vec::new(),
            events: tx,
        };
        Ok((server, rx))
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of live links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Cancellation token stopping the run loop between passes.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Drive the scheduler until cancelled.
    pub async fn run(&mut self) -> Result<()> {
        while !self.cancel.is_cancelled() {
            self.run_once().await?;
            tokio::time::sleep(IDLE_TICK_INTERVAL).await;
        }
        info!("server cancelled, closing {} link(s)", self.links.len());
        for (peer, link) in &mut self.links {
            link.close("server shut down");
            let _ = self.events.send(ServerEvent::LinkDown {
                peer: *peer,
                reason: "server shut down".to_string(),
            });
        }
        self.links.clear();
        Ok(())
    }

    /// One scheduler pass: accept, tick every link, reap the closed ones.
    pub async fn run_once(&mut self) -> Result<()> {
        if let Some((socket, peer)) = self.try_accept().await? {
            self.add_link(socket, peer);
        }

        let mut index = 0;
        while index < self.links.len() {
            let (peer, link) = &mut self.links[index];
            let reason = if link.cancel_token().is_cancelled() {
                link.close("cancelled");
                "cancelled".to_string()
            } else {
                match link.tick().await {
                    Ok(()) => {
                        index += 1;
                        continue;
                    }
                    Err(e) => {
                        warn!(%peer, error = %e, "link tick failed");
                        e.to_string()
                    }
                }
            };

            let (peer, _link) = self.links.swap_remove(index);
            let _ = self.events.send(ServerEvent::LinkDown { peer, reason });
        }
        Ok(())
    }

    /// Poll the listener once without waiting for a connection.
    async fn try_accept(&mut self) -> Result<Option<(TcpStream, SocketAddr)>> {
        let accepted = poll_fn(|cx| match self.listener.poll_accept(cx) {
            Poll::Ready(result) => Poll::Ready(Some(result)),
            Poll::Pending => Poll::Ready(None),
        })
        .await;

        match accepted {
            Some(Ok(pair)) => Ok(Some(pair)),
            Some(Err(e)) => {
                warn!(error = %e, "accept failed");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn add_link(&mut self, socket: TcpStream, peer: SocketAddr) {
        debug!(%peer, "accepted connection");
        let mut link = Link::new(
            Role::Slave,
            socket,
            self.config.clone(),
            TelegramCodec::new(self.asdu_config, Arc::clone(&self.registry)),
            Arc::clone(&self.clock),
        );
        let events = link.subscribe();
        self.links.push((peer, link));

        let _ = self.events.send(ServerEvent::LinkUp { peer, events });
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("links", &self.links.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn bound_server() -> (Server, mpsc::UnboundedReceiver<ServerEvent>, SocketAddr) {
        let (server, events) = Server::bind(
            "127.0.0.1:0",
            ConnectionConfig::default(),
            AsduConfig::default(),
            Arc::new(InfoObjectRegistry::with_builtins()),
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        (server, events, addr)
    }

    #[tokio::test]
    async fn test_accept_creates_slave_link() {
        let (mut server, mut events, addr) = bound_server().await;

        let client = TcpStream::connect(addr).await.unwrap();
        // The accept is edge-polled; a pass or two picks it up
        for _ in 0..10 {
            server.run_once().await.unwrap();
            if server.link_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(server.link_count(), 1);
        assert!(matches!(
            events.try_recv(),
            Ok(ServerEvent::LinkUp { .. })
        ));
        drop(client);
    }

    #[tokio::test]
    async fn test_closed_link_is_reaped() {
        let (mut server, mut events, addr) = bound_server().await;

        let client = TcpStream::connect(addr).await.unwrap();
        for _ in 0..10 {
            server.run_once().await.unwrap();
            if server.link_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(server.link_count(), 1);
        let _ = events.try_recv();

        drop(client);
        for _ in 0..10 {
            server.run_once().await.unwrap();
            if server.link_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(server.link_count(), 0);
        assert!(matches!(
            events.try_recv(),
            Ok(ServerEvent::LinkDown { .. })
        ));
    }

    #[tokio::test]
    async fn test_garbage_stream_tears_link_down() {
        let (mut server, mut events, addr) = bound_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        for _ in 0..10 {
            server.run_once().await.unwrap();
            if server.link_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let _ = events.try_recv();

        client.write_all(&[0xFF, 0xFF, 0xFF, 0xFF]).await.unwrap();
        client.flush().await.unwrap();
        for _ in 0..20 {
            server.run_once().await.unwrap();
            if server.link_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(server.link_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_closes_links() {
        let (mut server, _events, _addr) = bound_server().await;
        server.cancel_token().cancel();
        server.run().await.unwrap();
        assert_eq!(server.link_count(), 0);
    }
}
