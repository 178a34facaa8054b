//! Producer-side counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Acquisition metrics
///
/// Shared between the producer thread and the owning session.
#[derive(Debug, Default)]
pub struct AcquisitionMetrics {
    /// Completed producer cycles (published or not)
    pub cycles: AtomicU64,

    /// Frames handed to the store
    pub frames_published: AtomicU64,

    /// Capture waits that timed out
    pub capture_timeouts: AtomicU64,

    /// Cycles that carried a tracker result
    pub tracker_results: AtomicU64,

    /// Captures skipped because the tracker queue was full
    pub tracker_queue_full: AtomicU64,

    /// Cycles without an inertial sample
    pub imu_missing: AtomicU64,

    /// Failures that ended the loop
    pub producer_failures: AtomicU64,
}

impl AcquisitionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capture_timeout(&self) {
        self.capture_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tracker_result(&self) {
        self.tracker_results.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tracker_queue_full(&self) {
        self.tracker_queue_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_imu_missing(&self) {
        self.imu_missing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.producer_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> AcquisitionSnapshot {
        AcquisitionSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            capture_timeouts: self.capture_timeouts.load(Ordering::Relaxed),
            tracker_results: self.tracker_results.load(Ordering::Relaxed),
            tracker_queue_full: self.tracker_queue_full.load(Ordering::Relaxed),
            imu_missing: self.imu_missing.load(Ordering::Relaxed),
            producer_failures: self.producer_failures.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionSnapshot {
    pub cycles: u64,
    pub frames_published: u64,
    pub capture_timeouts: u64,
    pub tracker_results: u64,
    pub tracker_queue_full: u64,
    pub imu_missing: u64,
    pub producer_failures: u64,
}
