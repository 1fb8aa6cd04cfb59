//! ConcurrencyGate - bounds simultaneous in-flight uploads

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::DispatcherError;

/// Counting semaphore with FIFO waiters
#[derive(Debug)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGate {
    /// Gate with `capacity` slots (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Wait for a free slot
    pub async fn acquire(&self) -> Result<GatePermit, DispatcherError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| DispatcherError::GateClosed)?;

        let now = self.counters.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.counters.peak.fetch_max(now, Ordering::AcqRel);

        Ok(GatePermit {
            _permit: permit,
            counters: Arc::clone(&self.counters),
        })
    }

    /// Total slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::Acquire)
    }

    /// Most slots held at once
    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak.load(Ordering::Acquire)
    }
}

/// One held slot; released on drop
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<Counters>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
