//! Shared peripheral channels with owner counting.
//!
//! Several subsystems can sit on the same physical pins (a motor drives two
//! digital outputs, for example). The arena hands out leases per channel:
//! shared leases stack, an exclusive lease needs the channel to be free. The
//! peripheral is started on its first lease and stopped when the last one ends.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// Errors from acquiring a channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PinError {
    #[error("channel {channel} out of range (0..{count})")]
    OutOfRange { channel: usize, count: usize },

    #[error("channel {channel} is held exclusively")]
    Locked { channel: usize },

    #[error("channel {channel} is in use by {owners} owner(s)")]
    Busy { channel: usize, owners: usize },
}

/// Start/stop hooks run on the first acquire and the last release.
pub trait Peripheral: Send {
    fn start(&mut self) {}

    fn stop(&mut self) {}
}

/// How a lease shares its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Shared,
    Exclusive,
}

struct Slot<P> {
    peripheral: P,
    owners: usize,
    exclusive: bool,
}

/// Fixed set of peripherals indexed by channel number.
pub struct PinArena<P> {
    slots: Mutex<Vec<Slot<P>>>,
}

impl<P: Peripheral> PinArena<P> {
    pub fn new(peripherals: impl IntoIterator<Item = P>) -> Arc<Self> {
        let slots = peripherals
            .into_iter()
            .map(|peripheral| Slot {
                peripheral,
                owners: 0,
                exclusive: false,
            })
            .collect();
        Arc::new(Self {
            slots: Mutex::new(slots),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Slot<P>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take a lease on `channel`. The lease releases on drop.
    pub fn acquire(self: &Arc<Self>, channel: usize, mode: PinMode) -> Result<PinLease<P>, PinError> {
        let mut slots = self.lock();
        let count = slots.len();
        let slot = slots
            .get_mut(channel)
            .ok_or(PinError::OutOfRange { channel, count })?;

        if slot.exclusive {
            return Err(PinError::Locked { channel });
        }
        if mode == PinMode::Exclusive && slot.owners > 0 {
            return Err(PinError::Busy {
                channel,
                owners: slot.owners,
            });
        }

        if slot.owners == 0 {
            slot.peripheral.start();
            debug!(channel, "peripheral started");
        }
        slot.owners += 1;
        slot.exclusive = mode == PinMode::Exclusive;

        Ok(PinLease {
            arena: Arc::clone(self),
            channel,
        })
    }

    /// End a lease now instead of at drop.
    pub fn release(&self, lease: PinLease<P>) {
        drop(lease);
    }

    /// Current owner count of `channel` (0 when out of range).
    pub fn owners(&self, channel: usize) -> usize {
        self.lock().get(channel).map_or(0, |s| s.owners)
    }

    /// Run `f` on a channel's peripheral regardless of ownership.
    pub fn inspect<R>(&self, channel: usize, f: impl FnOnce(&P) -> R) -> Option<R> {
        self.lock().get(channel).map(|s| f(&s.peripheral))
    }

    fn end_lease(&self, channel: usize) {
        let mut slots = self.lock();
        if let Some(slot) = slots.get_mut(channel) {
            slot.owners = slot.owners.saturating_sub(1);
            if slot.owners == 0 {
                slot.exclusive = false;
                slot.peripheral.stop();
                debug!(channel, "peripheral stopped");
            }
        }
    }
}

/// Proof of ownership of one channel.
pub struct PinLease<P: Peripheral> {
    arena: Arc<PinArena<P>>,
    channel: usize,
}

impl<P: Peripheral> PinLease<P> {
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Operate on the leased peripheral.
    pub fn with<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        let mut slots = self.arena.lock();
        // A live lease always points at an existing slot.
        let slot = &mut slots[self.channel];
        f(&mut slot.peripheral)
    }
}

impl<P: Peripheral> Drop for PinLease<P> {
    fn drop(&mut self) {
        self.arena.end_lease(self.channel);
    }
}

impl<P: Peripheral> std::fmt::Debug for PinLease<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinLease").field("channel", &self.channel).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        starts: usize,
        stops: usize,
        level: bool,
    }

    impl Peripheral for Counter {
        fn start(&mut self) {
            self.starts += 1;
        }

        fn stop(&mut self) {
            self.stops += 1;
        }
    }

    fn arena(n: usize) -> Arc<PinArena<Counter>> {
        PinArena::new((0..n).map(|_| Counter::default()))
    }

    #[test]
    fn shared_leases_count_owners_and_start_once() {
        let pins = arena(2);
        let a = pins.acquire(1, PinMode::Shared).unwrap();
        let b = pins.acquire(1, PinMode::Shared).unwrap();
        assert_eq!(pins.owners(1), 2);
        assert_eq!(pins.inspect(1, |p| p.starts), Some(1));

        drop(a);
        assert_eq!(pins.owners(1), 1);
        assert_eq!(pins.inspect(1, |p| p.stops), Some(0));
        pins.release(b);
        assert_eq!(pins.owners(1), 0);
        assert_eq!(pins.inspect(1, |p| p.stops), Some(1));
    }

    #[test]
    fn exclusive_needs_free_channel_and_blocks_others() {
        let pins = arena(1);
        let shared = pins.acquire(0, PinMode::Shared).unwrap();
        assert_eq!(
            pins.acquire(0, PinMode::Exclusive).unwrap_err(),
            PinError::Busy {
                channel: 0,
                owners: 1
            }
        );
        drop(shared);

        let exclusive = pins.acquire(0, PinMode::Exclusive).unwrap();
        assert_eq!(
            pins.acquire(0, PinMode::Shared).unwrap_err(),
            PinError::Locked { channel: 0 }
        );
        drop(exclusive);
        assert!(pins.acquire(0, PinMode::Shared).is_ok());
    }

    #[test]
    fn out_of_range() {
        let pins = arena(2);
        assert_eq!(
            pins.acquire(5, PinMode::Shared).unwrap_err(),
            PinError::OutOfRange {
                channel: 5,
                count: 2
            }
        );
        assert_eq!(pins.owners(5), 0);
    }

    #[test]
    fn lease_operates_on_peripheral() {
        let pins = arena(1);
        let lease = pins.acquire(0, PinMode::Exclusive).unwrap();
        lease.with(|p| p.level = true);
        assert_eq!(pins.inspect(0, |p| p.level), Some(true));
        assert_eq!(lease.channel(), 0);
    }
}
