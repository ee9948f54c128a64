//! Bounded byte queue between the byte-arrival path and the packet consumer.
//!
//! Backed by a preallocated `thingbuf` blocking channel: `push` never
//! allocates, never blocks, does constant work and wakes a consumer parked in
//! [`RingConsumer::pop_timeout`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thingbuf::mpsc::blocking::{self, Receiver, Sender};
use thingbuf::mpsc::errors::RecvTimeoutError;

/// Write half of a [`byte_ring`].
pub struct RingProducer {
    tx: Sender<u8>,
    dropped: Arc<AtomicU64>,
}

/// Read half of a [`byte_ring`].
pub struct RingConsumer {
    rx: Receiver<u8>,
    capacity: usize,
    dropped: Arc<AtomicU64>,
}

/// What a timed wait on the ring produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingWait {
    Byte(u8),
    TimedOut,
    /// The producer is gone and every queued byte has been read.
    Closed,
}

/// Create a ring holding up to `capacity` bytes.
pub fn byte_ring(capacity: usize) -> (RingProducer, RingConsumer) {
    let capacity = capacity.max(1);
    let (tx, rx) = blocking::channel::<u8>(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        RingProducer {
            tx,
            dropped: Arc::clone(&dropped),
        },
        RingConsumer {
            rx,
            capacity,
            dropped,
        },
    )
}

impl RingProducer {
    /// Append one byte. Returns `false` and counts a drop when the ring is full
    /// or the consumer is gone.
    pub fn push(&mut self, byte: u8) -> bool {
        match self.tx.try_send(byte) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Bytes dropped because the consumer fell behind.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl RingConsumer {
    /// Take the next byte without waiting.
    pub fn pop(&mut self) -> Option<u8> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next byte.
    pub fn pop_timeout(&mut self, timeout: Duration) -> RingWait {
        match self.rx.recv_timeout(timeout) {
            Ok(byte) => RingWait::Byte(byte),
            Err(RecvTimeoutError::Timeout) => RingWait::TimedOut,
            Err(_) => RingWait::Closed,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
