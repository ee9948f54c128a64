use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// One packet-oriented link to a board (host side) or to the host (device side).
///
/// Every adapter moves whole wire packets. Stream adapters frame and unframe
/// internally; datagram adapters map one datagram to one packet. Receive order
/// always equals arrival order.
pub trait PacketTransport: Send {
    /// Open the link. Calling it on an open transport is a no-op.
    fn connect(&mut self) -> Result<()>;

    /// Close the link and stop its reader. Queued packets are discarded.
    fn disconnect(&mut self);

    fn is_open(&self) -> bool;

    /// Send one packet, returning the number of packet bytes sent.
    fn send(&mut self, packet: &[u8]) -> Result<usize>;

    /// `true` when [`receive`](Self::receive) would return a packet right now.
    fn has_packet_waiting(&mut self) -> bool;

    /// Size of the next queued packet, if any.
    fn pending_packet_size(&mut self) -> Option<usize>;

    /// Copy the next queued packet into `buf`.
    ///
    /// Returns `Ok(0)` when nothing is queued. If `buf` is too small the packet
    /// stays queued and `BufferTooSmall` reports the size needed.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Wait up to `timeout` for the next packet.
    ///
    /// `Ok(None)` means the wait timed out. Once the link has closed and the
    /// queue is drained this returns an error.
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Bytes>>;

    /// Human-readable endpoint, e.g. `/dev/ttyACM0` or `192.168.0.200:10000`.
    fn location(&self) -> String;
}

impl<T: PacketTransport + ?Sized> PacketTransport for Box<T> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn send(&mut self, packet: &[u8]) -> Result<usize> {
        (**self).send(packet)
    }

    fn has_packet_waiting(&mut self) -> bool {
        (**self).has_packet_waiting()
    }

    fn pending_packet_size(&mut self) -> Option<usize> {
        (**self).pending_packet_size()
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).receive(buf)
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        (**self).recv_timeout(timeout)
    }

    fn location(&self) -> String {
        (**self).location()
    }
}
