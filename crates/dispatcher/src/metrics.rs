//! Dispatch metrics for observability

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for one coordinator, cumulative across runs
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Batches formed
    batches: AtomicU64,
    /// Upload calls made
    attempts: AtomicU64,
    /// Attempts that were retries
    retries: AtomicU64,
    /// Records accepted
    records_succeeded: AtomicU64,
    /// Records with a terminal failure
    records_failed: AtomicU64,
    /// Upload calls currently running
    in_flight: AtomicUsize,
    /// Highest `in_flight` observed
    peak_in_flight: AtomicUsize,
}

impl DispatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get batch count
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Increment batch count
    pub fn inc_batches(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Get attempt count
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Get retry count
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Increment retry count
    pub fn inc_retries(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Add final record counts of a run
    pub fn add_records(&self, succeeded: usize, failed: usize) {
        self.records_succeeded
            .fetch_add(succeeded as u64, Ordering::Relaxed);
        self.records_failed.fetch_add(failed as u64, Ordering::Relaxed);
    }

    /// Current in-flight uploads
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Peak in-flight uploads
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    /// Mark an upload call as started; the guard ends it on drop
    pub fn enter_upload(&self) -> InFlightGuard<'_> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
        InFlightGuard { metrics: self }
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches: self.batches(),
            attempts: self.attempts(),
            retries: self.retries(),
            records_succeeded: self.records_succeeded.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
            peak_in_flight: self.peak_in_flight(),
        }
    }
}

/// Decrements `in_flight` when the upload call ends, including by panic
pub struct InFlightGuard<'a> {
    metrics: &'a DispatchMetrics,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.metrics.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Snapshot of dispatch metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub batches: u64,
    pub attempts: u64,
    pub retries: u64,
    pub records_succeeded: u64,
    pub records_failed: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard() {
        let metrics = DispatchMetrics::new();
        {
            let _a = metrics.enter_upload();
            let _b = metrics.enter_upload();
            assert_eq!(metrics.in_flight(), 2);
        }
        let _c = metrics.enter_upload();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.in_flight, 1);
        assert_eq!(snapshot.peak_in_flight, 2);
        assert_eq!(snapshot.attempts, 3);
    }
}
