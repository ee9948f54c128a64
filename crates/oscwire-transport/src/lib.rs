//! Packet transports between a host and OSC boards.
//!
//! Every adapter implements [`PacketTransport`] and moves whole wire packets:
//! - [`StreamTransport`]: serial / USB CDC with SLIP framing, or TCP with a
//!   4-byte length prefix
//! - [`UdpTransport`]: one datagram per packet, replies to the last sender
//! - [`IntakeTransport`]: device side, fed byte-by-byte through a bounded byte ring
//! - [`TcpAcceptor`]: one `StreamTransport` per accepted TCP session

pub mod error;
mod inbox;
pub mod intake;
pub mod length_prefix;
pub mod ring;
pub mod stream;
pub mod tcp;
pub mod traits;
pub mod udp;

pub use error::{Result, TransportError};
pub use inbox::DEFAULT_INBOX_CAPACITY;
pub use intake::{ByteIntake, IntakeTransport};
pub use ring::{byte_ring, RingConsumer, RingProducer, RingWait};
pub use stream::{
    Framing, PairOpener, SerialConfig, StreamConfig, StreamOpener, StreamPair, StreamTransport,
    TcpConnector, DEFAULT_BAUD_RATE, DEFAULT_POLL_INTERVAL,
};
pub use tcp::TcpAcceptor;
pub use traits::PacketTransport;
pub use udp::{UdpConfig, UdpTransport, DEFAULT_DEVICE_PORT, DEFAULT_MAX_DATAGRAM_SIZE};
