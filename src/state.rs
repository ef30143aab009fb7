//! Shared sensor state.
//!
//! Every task gets an `Arc<SharedState>`. Each data group (particulate,
//! environmental, event counters) is a separate [`Domain`] with its own
//! lock, so producers of different groups never serialize on each other.
//! Critical sections only copy; nothing else runs while a lock is held and
//! no code path takes the same domain lock twice.
//!
//! Writers wait as long as it takes. Opportunistic readers (UI refresh, LED
//! animation) use a bounded wait and skip the update if the lock is busy.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::LOCK_RETRY_MS;
use crate::events::{EnvironmentalReading, EventCounters};
use crate::pms7003::ParticulateReading;

/// A value guarded by its own lock.
#[derive(Debug)]
pub struct Domain<T> {
    name: &'static str,
    value: Mutex<T>,
}

impl<T> Domain<T> {
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            value: Mutex::new(value),
        }
    }

    /// Wait forever. A task that panicked while holding the lock cannot have
    /// left a torn value behind (critical sections are plain copies), so
    /// poisoning is ignored.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait at most `timeout`; `None` means the caller should skip.
    pub fn lock_timeout(&self, timeout: Duration) -> Option<MutexGuard<'_, T>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.value.try_lock() {
                Ok(guard) => return Some(guard),
                Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => {}
            }

            let now = Instant::now();
            if now >= deadline {
                log::debug!("{} lock busy for {:?}, skipping", self.name, timeout);
                return None;
            }
            thread::sleep((deadline - now).min(Duration::from_millis(LOCK_RETRY_MS)));
        }
    }
}

impl<T: Copy> Domain<T> {
    /// Replace the whole value.
    pub fn publish(&self, value: T) {
        *self.lock() = value;
    }

    pub fn snapshot(&self) -> T {
        *self.lock()
    }

    pub fn try_snapshot(&self, timeout: Duration) -> Option<T> {
        self.lock_timeout(timeout).map(|guard| *guard)
    }
}

/// Process-wide sensor state, created zeroed at boot.
#[derive(Debug)]
pub struct SharedState {
    particulate: Domain<ParticulateReading>,
    environmental: Domain<EnvironmentalReading>,
    events: Domain<EventCounters>,
    /// Cloud-settable health index status; a single word, so no lock.
    hqi_status: AtomicU16,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            particulate: Domain::new("particulate", ParticulateReading::default()),
            environmental: Domain::new("environmental", EnvironmentalReading::default()),
            events: Domain::new("events", EventCounters::default()),
            hqi_status: AtomicU16::new(0),
        }
    }

    // ---- particulate ------------------------------------------------------

    pub fn publish_particulate(&self, reading: ParticulateReading) {
        self.particulate.publish(reading);
    }

    pub fn snapshot_particulate(&self) -> ParticulateReading {
        self.particulate.snapshot()
    }

    pub fn try_snapshot_particulate(&self, timeout: Duration) -> Option<ParticulateReading> {
        self.particulate.try_snapshot(timeout)
    }

    // ---- environmental ----------------------------------------------------

    pub fn publish_environmental(&self, reading: EnvironmentalReading) {
        self.environmental.publish(reading);
    }

    pub fn snapshot_environmental(&self) -> EnvironmentalReading {
        self.environmental.snapshot()
    }

    pub fn try_snapshot_environmental(&self, timeout: Duration) -> Option<EnvironmentalReading> {
        self.environmental.try_snapshot(timeout)
    }

    // ---- event counters ---------------------------------------------------

    pub fn increment_events(&self, coughs: u32, sneezes: u32) {
        self.events.lock().add(EventCounters::new(coughs, sneezes));
    }

    /// Read both counters and reset them to zero under one lock.
    pub fn drain_events(&self) -> EventCounters {
        std::mem::take(&mut *self.events.lock())
    }

    /// Current counts without draining (diagnostics only).
    pub fn peek_events(&self) -> EventCounters {
        self.events.snapshot()
    }

    // ---- health index status ----------------------------------------------

    pub fn hqi_status(&self) -> u16 {
        self.hqi_status.load(Ordering::Relaxed)
    }

    pub fn set_hqi_status(&self, status: u16) {
        self.hqi_status.store(status, Ordering::Relaxed);
    }

    /// Direct access to one domain, for tests that need to hold a lock.
    pub fn particulate_domain(&self) -> &Domain<ParticulateReading> {
        &self.particulate
    }
}
