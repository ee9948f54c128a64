use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::{Framing, StreamConfig, StreamPair, StreamTransport};

/// Listening TCP socket; each accepted connection becomes its own
/// length-prefixed [`StreamTransport`].
pub struct TcpAcceptor {
    listener: TcpListener,
    config: StreamConfig,
}

impl TcpAcceptor {
    /// Bind and listen. Accepted connections use length-prefixed framing.
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let listener = TcpListener::bind(&addr).map_err(|source| TransportError::Bind {
            addr: format!("{addr:?}"),
            source,
        })?;
        info!(local = ?listener.local_addr().ok(), "listening for tcp sessions");
        Ok(Self {
            listener,
            config: StreamConfig {
                framing: Framing::LengthPrefixed,
                ..StreamConfig::default()
            },
        })
    }

    /// Override the per-connection configuration.
    pub fn with_config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept one connection (blocking). The returned transport is already open.
    pub fn accept(&self) -> Result<(StreamTransport, SocketAddr)> {
        use crate::traits::PacketTransport;

        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted tcp session");
        let pair = StreamPair::from_tcp(stream, &self.config).map_err(TransportError::Accept)?;
        let mut transport = StreamTransport::from_pair(pair, peer.to_string(), self.config.clone());
        transport.connect()?;
        Ok((transport, peer))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::traits::PacketTransport;

    #[test]
    fn accept_and_exchange_packets() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").unwrap();
        let addr = acceptor.local_addr().unwrap();

        let client = std::thread::spawn(move || {
            let mut client = StreamTransport::tcp_client(addr.to_string());
            client.connect().unwrap();
            client.send(b"/hello\0\0").unwrap();
            let reply = client.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
            assert_eq!(reply.as_ref(), b"/world\0\0");
        });

        let (mut session, peer) = acceptor.accept().unwrap();
        assert_eq!(session.location(), peer.to_string());
        let packet = session.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(packet.as_ref(), b"/hello\0\0");
        session.send(b"/world\0\0").unwrap();

        client.join().unwrap();
    }

    #[test]
    fn connect_to_closed_port_fails() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let mut client = StreamTransport::tcp_client(addr.to_string());
        assert!(matches!(client.connect(), Err(TransportError::Connect { .. })));
    }
}
