use std::collections::VecDeque;
use std::io::Write;
use std::time::{Duration, Instant};

use bytes::Bytes;
use oscwire_slip::{SlipConfig, SlipDecoder, SlipWriter};
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::ring::{byte_ring, RingConsumer, RingProducer, RingWait};
use crate::traits::PacketTransport;

/// Producer handle for an [`IntakeTransport`]: call [`on_byte`](Self::on_byte)
/// from the byte-arrival path.
pub struct ByteIntake {
    producer: RingProducer,
}

impl ByteIntake {
    /// Queue one received byte, waking the consumer. Returns `false` if the
    /// ring was full and the byte was dropped.
    pub fn on_byte(&mut self, byte: u8) -> bool {
        self.producer.push(byte)
    }

    /// Queue a run of bytes. Returns how many were queued.
    pub fn on_bytes(&mut self, bytes: &[u8]) -> usize {
        bytes.iter().filter(|&&b| self.producer.push(b)).count()
    }

    pub fn dropped(&self) -> u64 {
        self.producer.dropped()
    }
}

/// Device-side stream transport fed by a byte ring.
///
/// Incoming bytes arrive through a [`ByteIntake`] and are unframed on the
/// consumer thread. Replies are SLIP-framed onto `W`.
pub struct IntakeTransport<W> {
    consumer: RingConsumer,
    decoder: SlipDecoder,
    ready: VecDeque<Bytes>,
    writer: SlipWriter<W>,
    open: bool,
    label: String,
}

impl<W: Write + Send> IntakeTransport<W> {
    /// Create the transport and its producer handle. `capacity` bounds the ring.
    pub fn new(capacity: usize, writer: W, config: SlipConfig) -> (Self, ByteIntake) {
        let (producer, consumer) = byte_ring(capacity);
        let intake = ByteIntake { producer };
        let transport = Self {
            consumer,
            decoder: SlipDecoder::with_max_frame_size(config.max_frame_size),
            ready: VecDeque::new(),
            writer: SlipWriter::with_config(writer, config),
            open: false,
            label: "intake".to_string(),
        };
        (transport, intake)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn decoder(&self) -> &SlipDecoder {
        &self.decoder
    }

    pub fn writer(&self) -> &W {
        self.writer.get_ref()
    }

    fn drain(&mut self) {
        while let Some(byte) = self.consumer.pop() {
            self.feed(byte);
        }
    }

    fn feed(&mut self, byte: u8) {
        if let Some(packet) = self.decoder.feed(byte) {
            self.ready.push_back(packet);
        }
    }
}

impl<W: Write + Send> PacketTransport for IntakeTransport<W> {
    fn connect(&mut self) -> Result<()> {
        if !self.open {
            self.decoder.reset();
            self.open = true;
            debug!(label = %self.label, "intake transport open");
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.open {
            self.open = false;
            self.ready.clear();
            self.decoder.reset();
            while self.consumer.pop().is_some() {}
            debug!(label = %self.label, "intake transport closed");
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn send(&mut self, packet: &[u8]) -> Result<usize> {
        if !self.open {
            return Err(TransportError::NotConnected);
        }
        match self.writer.send(packet) {
            Ok(n) => Ok(n),
            Err(oscwire_slip::SlipError::PacketTooLarge { size, max }) => {
                Err(TransportError::PacketTooLarge { size, max })
            }
            Err(err) => {
                warn!(label = %self.label, error = %err, "intake reply write failed, closing");
                self.disconnect();
                Err(err.into())
            }
        }
    }

    fn has_packet_waiting(&mut self) -> bool {
        self.drain();
        !self.ready.is_empty()
    }

    fn pending_packet_size(&mut self) -> Option<usize> {
        self.drain();
        self.ready.front().map(Bytes::len)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.open {
            return Err(TransportError::NotConnected);
        }
        self.drain();
        let Some(front) = self.ready.front() else {
            return Ok(0);
        };
        let needed = front.len();
        if needed > buf.len() {
            return Err(TransportError::BufferTooSmall {
                needed,
                available: buf.len(),
            });
        }
        if let Some(packet) = self.ready.pop_front() {
            buf[..needed].copy_from_slice(&packet);
        }
        Ok(needed)
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        if !self.open {
            return Err(TransportError::NotConnected);
        }
        let deadline = Instant::now() + timeout;
        loop {
            self.drain();
            if let Some(packet) = self.ready.pop_front() {
                return Ok(Some(packet));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match self.consumer.pop_timeout(remaining) {
                RingWait::Byte(byte) => self.feed(byte),
                RingWait::TimedOut => return Ok(None),
                RingWait::Closed => {
                    debug!(label = %self.label, "byte intake dropped");
                    return Err(TransportError::Closed);
                }
            }
        }
    }

    fn location(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use oscwire_slip::wrap;

    use super::*;

    fn open(capacity: usize) -> (IntakeTransport<Vec<u8>>, ByteIntake) {
        let (mut t, intake) = IntakeTransport::new(capacity, Vec::new(), SlipConfig::default());
        t.connect().unwrap();
        (t, intake)
    }

    #[test]
    fn bytes_become_packets() {
        let (mut t, mut intake) = open(64);
        assert!(!t.has_packet_waiting());
        for &b in wrap(b"/led\0\0\0\0").iter() {
            assert!(intake.on_byte(b));
        }
        assert!(t.has_packet_waiting());
        assert_eq!(t.pending_packet_size(), Some(8));
        let mut buf = [0u8; 32];
        assert_eq!(t.receive(&mut buf).unwrap(), 8);
        assert_eq!(&buf[..8], b"/led\0\0\0\0");
    }

    #[test]
    fn replies_are_slip_framed() {
        let (mut t, _intake) = open(8);
        t.send(&[0xC0]).unwrap();
        assert_eq!(t.writer().as_slice(), &[0xC0, 0xDB, 0xDC, 0xC0]);
    }

    #[test]
    fn recv_timeout_wakes_on_bytes_from_producer_thread() {
        let (mut t, mut intake) = open(256);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            intake.on_bytes(&wrap(b"/x\0\0"));
        });
        let packet = t.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(packet.as_ref(), b"/x\0\0");
        handle.join().unwrap();
    }

    #[test]
    fn recv_timeout_expires() {
        let (mut t, _intake) = open(8);
        assert!(t.recv_timeout(Duration::from_millis(5)).unwrap().is_none());
    }

    #[test]
    fn overflowing_ring_counts_drops() {
        let (_t, mut intake) = open(4);
        assert_eq!(intake.on_bytes(&[1, 2, 3, 4, 5, 6]), 4);
        assert_eq!(intake.dropped(), 2);
    }

    #[test]
    fn dropped_intake_closes_after_queued_packets() {
        let (mut t, mut intake) = open(64);
        intake.on_bytes(&wrap(b"/z\0\0"));
        drop(intake);
        let packet = t.recv_timeout(Duration::from_millis(50)).unwrap().unwrap();
        assert_eq!(packet.as_ref(), b"/z\0\0");
        assert!(matches!(
            t.recv_timeout(Duration::from_millis(50)),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn closed_transport_rejects_io() {
        let (mut t, _intake) = IntakeTransport::new(8, Vec::new(), SlipConfig::default());
        assert!(!t.is_open());
        assert!(matches!(t.send(b"x"), Err(TransportError::NotConnected)));
        let mut buf = [0u8; 4];
        assert!(matches!(t.receive(&mut buf), Err(TransportError::NotConnected)));
    }
}
