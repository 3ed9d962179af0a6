//! Delivery queue metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters of a single delivery queue
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Current number of items waiting for a worker
    queue_len: AtomicUsize,
    /// Batches exported successfully
    delivered_count: AtomicU64,
    /// Records exported successfully
    delivered_records: AtomicU64,
    /// Batches finalized as failed after being accepted
    failure_count: AtomicU64,
    /// Batches rejected at enqueue time
    dropped_count: AtomicU64,
    /// Records rejected at enqueue time
    dropped_records: AtomicU64,
    /// Retries scheduled
    retry_count: AtomicU64,
}

impl QueueMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current queue length
    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    /// Set current queue length
    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get delivered batch count
    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    /// Get delivered record count
    pub fn delivered_records(&self) -> u64 {
        self.delivered_records.load(Ordering::Relaxed)
    }

    /// Record a successful export
    pub fn inc_delivered(&self, records: usize) {
        self.delivered_count.fetch_add(1, Ordering::Relaxed);
        self.delivered_records
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get dropped count
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    /// Get dropped record count
    pub fn dropped_records(&self) -> u64 {
        self.dropped_records.load(Ordering::Relaxed)
    }

    /// Record a rejected enqueue
    pub fn inc_dropped(&self, records: usize) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
        self.dropped_records
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    /// Get retry count
    pub fn retry_count(&self) -> u64 {
        self.retry_count.load(Ordering::Relaxed)
    }

    /// Increment retry count
    pub fn inc_retry_count(&self) {
        self.retry_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            delivered_count: self.delivered_count(),
            delivered_records: self.delivered_records(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
            dropped_records: self.dropped_records(),
            retry_count: self.retry_count(),
        }
    }
}

/// Snapshot of queue metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub delivered_count: u64,
    pub delivered_records: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
    pub dropped_records: u64,
    pub retry_count: u64,
}
