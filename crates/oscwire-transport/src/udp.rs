use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::inbox::{PacketInbox, DEFAULT_INBOX_CAPACITY};
use crate::stream::DEFAULT_POLL_INTERVAL;
use crate::traits::PacketTransport;

/// Port boards listen on for OSC over UDP.
pub const DEFAULT_DEVICE_PORT: u16 = 10000;

/// Default largest datagram accepted: 16 KiB.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 16 * 1024;

/// Configuration for a [`UdpTransport`].
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// Local address to bind. Default: `0.0.0.0:0` (any interface, ephemeral port).
    pub bind: SocketAddr,
    /// Fixed destination. When unset, packets go back to whoever sent the last
    /// received packet.
    pub remote: Option<SocketAddr>,
    /// Reply to the sender's IP at this port instead of its source port.
    pub reply_port: Option<u16>,
    /// Allow sending to broadcast addresses.
    pub broadcast: bool,
    /// Read timeout the reader thread polls with.
    pub poll_interval: Duration,
    pub max_datagram_size: usize,
    /// Received datagrams held before the oldest are dropped.
    pub inbox_capacity: usize,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)),
            remote: None,
            reply_port: None,
            broadcast: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }
}

impl UdpConfig {
    /// Host side: talk to one board.
    pub fn to_board(remote: SocketAddr) -> Self {
        Self {
            remote: Some(remote),
            ..Self::default()
        }
    }

    /// Device side: listen on `port` and reply to senders.
    pub fn device(port: u16) -> Self {
        Self {
            bind: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)),
            ..Self::default()
        }
    }
}

struct Connection {
    socket: Arc<UdpSocket>,
    inbox: Arc<PacketInbox>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

/// One datagram per packet.
///
/// Without a configured `remote`, `send` replies to the source of the most
/// recently received packet (optionally redirected to `reply_port`).
pub struct UdpTransport {
    config: UdpConfig,
    conn: Option<Connection>,
    last_peer: Option<SocketAddr>,
}

impl UdpTransport {
    pub fn new(config: UdpConfig) -> Self {
        Self {
            config,
            conn: None,
            last_peer: None,
        }
    }

    pub fn config(&self) -> &UdpConfig {
        &self.config
    }

    /// Bound local address, once connected.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.conn
            .as_ref()
            .and_then(|conn| conn.socket.local_addr().ok())
    }

    /// Datagrams dropped since connect because the owner fell behind.
    pub fn dropped_packets(&self) -> u64 {
        self.conn.as_ref().map_or(0, |conn| conn.inbox.dropped())
    }

    /// Source of the most recently received packet.
    pub fn last_peer(&self) -> Option<SocketAddr> {
        self.last_peer
    }

    /// Where `send` will deliver right now.
    pub fn destination(&self) -> Option<SocketAddr> {
        if let Some(remote) = self.config.remote {
            return Some(remote);
        }
        self.last_peer.map(|mut peer| {
            if let Some(port) = self.config.reply_port {
                peer.set_port(port);
            }
            peer
        })
    }

    /// Send one packet to an explicit address.
    pub fn send_to(&mut self, packet: &[u8], addr: SocketAddr) -> Result<usize> {
        let max = self.config.max_datagram_size;
        if packet.len() > max {
            return Err(TransportError::PacketTooLarge {
                size: packet.len(),
                max,
            });
        }
        let conn = self.conn.as_ref().ok_or(TransportError::NotConnected)?;
        conn.socket
            .send_to(packet, addr)
            .map_err(|source| TransportError::Undeliverable { to: addr, source })
    }

    /// Take the next packet with its source address.
    pub fn recv_from_timeout(&mut self, timeout: Duration) -> Result<Option<(Bytes, SocketAddr)>> {
        let conn = self.conn.as_ref().ok_or(TransportError::NotConnected)?;
        match conn.inbox.pop_timeout(timeout)? {
            Some(packet) => {
                self.last_peer = packet.from;
                Ok(packet.from.map(|from| (packet.data, from)))
            }
            None => Ok(None),
        }
    }
}

impl PacketTransport for UdpTransport {
    fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let bind_err = |source| TransportError::Bind {
            addr: self.config.bind.to_string(),
            source,
        };
        let socket = UdpSocket::bind(self.config.bind).map_err(bind_err)?;
        socket.set_broadcast(self.config.broadcast).map_err(bind_err)?;
        socket
            .set_read_timeout(Some(self.config.poll_interval))
            .map_err(bind_err)?;
        let socket = Arc::new(socket);

        let inbox = Arc::new(PacketInbox::new(self.config.inbox_capacity));
        inbox.reopen();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let socket = Arc::clone(&socket);
            let inbox = Arc::clone(&inbox);
            let stop = Arc::clone(&stop);
            let max = self.config.max_datagram_size;
            std::thread::Builder::new()
                .name("oscwire-udp-reader".into())
                .spawn(move || read_loop(&socket, &inbox, &stop, max))?
        };

        info!(local = ?socket.local_addr().ok(), remote = ?self.config.remote, "udp transport open");
        self.last_peer = None;
        self.conn = Some(Connection {
            socket,
            inbox,
            stop,
            reader: Some(handle),
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        conn.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = conn.reader.take() {
            let _ = handle.join();
        }
        conn.inbox.clear_and_close();
        debug!("udp transport closed");
    }

    fn is_open(&self) -> bool {
        self.conn
            .as_ref()
            .is_some_and(|conn| !conn.inbox.is_closed())
    }

    fn send(&mut self, packet: &[u8]) -> Result<usize> {
        let dest = self.destination().ok_or(TransportError::NoReturnAddress)?;
        self.send_to(packet, dest)
    }

    fn has_packet_waiting(&mut self) -> bool {
        self.conn.as_ref().is_some_and(|conn| conn.inbox.len() > 0)
    }

    fn pending_packet_size(&mut self) -> Option<usize> {
        self.conn.as_ref().and_then(|conn| conn.inbox.peek_len())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        let conn = self.conn.as_ref().ok_or(TransportError::NotConnected)?;
        match conn.inbox.take_into(buf)? {
            Some((n, from)) => {
                self.last_peer = from;
                Ok(n)
            }
            None => Ok(0),
        }
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        let conn = self.conn.as_ref().ok_or(TransportError::NotConnected)?;
        match conn.inbox.pop_timeout(timeout)? {
            Some(packet) => {
                self.last_peer = packet.from;
                Ok(Some(packet.data))
            }
            None => Ok(None),
        }
    }

    fn location(&self) -> String {
        match (self.config.remote, self.local_addr()) {
            (Some(remote), _) => remote.to_string(),
            (None, Some(local)) => format!("udp:{local}"),
            (None, None) => format!("udp:{}", self.config.bind),
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn read_loop(socket: &UdpSocket, inbox: &PacketInbox, stop: &AtomicBool, max: usize) {
    // One spare byte detects datagrams the OS would otherwise truncate silently.
    let mut buf = vec![0u8; max + 1];
    while !stop.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((n, from)) if n > max => {
                warn!(%from, max, "dropping oversized datagram");
            }
            Ok((n, from)) => {
                if inbox.push(Bytes::copy_from_slice(&buf[..n]), Some(from)) {
                    debug!(%from, dropped = inbox.dropped(), "inbox full, dropped oldest datagram");
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) => {}
            // ICMP port-unreachable from an earlier send surfaces here on some platforms.
            Err(err) if err.kind() == ErrorKind::ConnectionReset => {
                debug!(error = %err, "ignoring udp connection reset");
            }
            Err(err) => {
                warn!(error = %err, "udp receive failed");
                break;
            }
        }
    }
    inbox.close();
}
