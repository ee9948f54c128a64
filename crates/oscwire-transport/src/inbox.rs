use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::error::{Result, TransportError};

/// Default number of received packets held for the owner before the oldest
/// are dropped.
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// A received packet and, for datagram links, who sent it.
#[derive(Debug, Clone)]
pub(crate) struct Inbound {
    pub data: Bytes,
    pub from: Option<SocketAddr>,
}

/// Hand-off queue between an adapter's reader thread and its owner.
///
/// Starts closed; `reopen` on connect, `close` when the reader exits or the
/// owner disconnects. Waiters wake on every push and on close.
///
/// Holds at most `capacity` packets. When an owner stops reading, the oldest
/// packet is dropped to make room for the newest.
#[derive(Debug)]
pub(crate) struct PacketInbox {
    state: Mutex<InboxState>,
    ready: Condvar,
    capacity: usize,
    dropped: AtomicU64,
}

#[derive(Debug)]
struct InboxState {
    packets: VecDeque<Inbound>,
    closed: bool,
}

impl PacketInbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(InboxState {
                packets: VecDeque::new(),
                closed: true,
            }),
            ready: Condvar::new(),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reopen(&self) {
        let mut state = self.lock();
        state.packets.clear();
        state.closed = false;
    }

    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    /// Close and drop anything queued.
    pub fn clear_and_close(&self) {
        let mut state = self.lock();
        state.packets.clear();
        state.closed = true;
        drop(state);
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Queue a packet. Returns `true` when the oldest packet was dropped to fit it.
    pub fn push(&self, data: Bytes, from: Option<SocketAddr>) -> bool {
        let mut state = self.lock();
        let evicted = state.packets.len() >= self.capacity;
        if evicted {
            state.packets.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        state.packets.push_back(Inbound { data, from });
        drop(state);
        self.ready.notify_one();
        evicted
    }

    /// Packets dropped because the owner fell behind.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.lock().packets.len()
    }

    pub fn peek_len(&self) -> Option<usize> {
        self.lock().packets.front().map(|p| p.data.len())
    }

    /// Copy the next packet into `buf`. Leaves it queued if it does not fit.
    pub fn take_into(&self, buf: &mut [u8]) -> Result<Option<(usize, Option<SocketAddr>)>> {
        let mut state = self.lock();
        let Some(front) = state.packets.front() else {
            return if state.closed {
                Err(TransportError::Closed)
            } else {
                Ok(None)
            };
        };
        let needed = front.data.len();
        if needed > buf.len() {
            return Err(TransportError::BufferTooSmall {
                needed,
                available: buf.len(),
            });
        }
        let Some(packet) = state.packets.pop_front() else {
            return Ok(None);
        };
        buf[..needed].copy_from_slice(&packet.data);
        Ok(Some((needed, packet.from)))
    }

    /// Wait up to `timeout` for a packet. Queued packets drain before a close is reported.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<Inbound>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(packet) = state.packets.pop_front() {
                return Ok(Some(packet));
            }
            if state.closed {
                return Err(TransportError::Closed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (next, _) = self
                .ready
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
        }
    }
}
