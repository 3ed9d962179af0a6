//! DeliveryObserver - terminal outcome hooks of the delivery queue
//!
//! The queue reports every terminal outcome here; the concrete metrics or
//! tracing backend lives outside this crate.

use std::sync::Arc;
use std::time::Duration;

use crate::ContractError;

/// Receives delivery outcomes.
///
/// `records` is the record count of the affected batch.
pub trait DeliveryObserver: Send + Sync {
    /// Batch exported successfully
    fn on_delivered(&self, queue: &str, records: usize);

    /// Batch rejected at enqueue time (queue full or closed)
    fn on_dropped(&self, queue: &str, records: usize, error: &ContractError);

    /// Batch finalized as failed after it was accepted
    fn on_failed(&self, queue: &str, records: usize, error: &ContractError);

    /// A retry was scheduled after `delay`
    fn on_retry(&self, _queue: &str, _records: usize, _attempt: u32, _delay: Duration) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DeliveryObserver for NoopObserver {
    fn on_delivered(&self, _queue: &str, _records: usize) {}

    fn on_dropped(&self, _queue: &str, _records: usize, _error: &ContractError) {}

    fn on_failed(&self, _queue: &str, _records: usize, _error: &ContractError) {}
}

/// Forwards every event to each inner observer in order.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn DeliveryObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl DeliveryObserver for ObserverSet {
    fn on_delivered(&self, queue: &str, records: usize) {
        for observer in &self.observers {
            observer.on_delivered(queue, records);
        }
    }

    fn on_dropped(&self, queue: &str, records: usize, error: &ContractError) {
        for observer in &self.observers {
            observer.on_dropped(queue, records, error);
        }
    }

    fn on_failed(&self, queue: &str, records: usize, error: &ContractError) {
        for observer in &self.observers {
            observer.on_failed(queue, records, error);
        }
    }

    fn on_retry(&self, queue: &str, records: usize, attempt: u32, delay: Duration) {
        for observer in &self.observers {
            observer.on_retry(queue, records, attempt, delay);
        }
    }
}
