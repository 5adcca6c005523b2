//! Bounded scheduler
//!
//! Caps how many fetch pairs are in flight at once. Built on a tokio
//! Semaphore, whose waiters are served in FIFO order, so the longest-waiting
//! caller gets the next free slot.
//!
//! A slot is released by dropping it, which makes a double release
//! unrepresentable.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of concurrent fetch pairs
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Counting limiter with occupancy tracking
#[derive(Debug, Clone)]
pub struct BoundedScheduler {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// A held slot; dropping it returns the slot and wakes the next waiter
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
}

impl Slot {
    /// Return the slot explicitly (same as dropping it)
    pub fn release(self) {}
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

impl BoundedScheduler {
    /// Create a scheduler with `capacity` slots
    ///
    /// A capacity of 0 would deadlock every caller; it is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a free slot
    ///
    /// Suspends until fewer than `capacity` slots are held. Waiters are
    /// granted slots in arrival order.
    pub async fn acquire(&self) -> Result<Slot> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::Internal("scheduler closed".to_string()))?;
        Ok(self.track(permit))
    }

    /// Take a slot only if one is free right now
    pub fn try_acquire(&self) -> Option<Slot> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| self.track(permit))
    }

    fn track(&self, permit: OwnedSemaphorePermit) -> Slot {
        let now = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        Slot {
            _permit: permit,
            active: Arc::clone(&self.active),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held
    pub fn in_flight(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Highest number of slots ever held at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}

impl Default for BoundedScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}
