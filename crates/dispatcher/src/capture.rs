//! BatchSink - stores every batch it receives
//!
//! Usable both as a routing destination and as a queue exporter. Mostly for
//! tests and diagnostics.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use contracts::{Batch, Capabilities, Consumer, Context, ContractError, Exporter};

type ErrorFactory = Box<dyn Fn() -> ContractError + Send + Sync>;

/// Consumer/exporter that keeps the handles of all received batches
pub struct BatchSink {
    name: String,
    capabilities: Capabilities,
    batches: Mutex<Vec<Batch>>,
    records: AtomicUsize,
    fail_with: Option<ErrorFactory>,
}

impl BatchSink {
    /// Non-mutating sink
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::READ_ONLY)
    }

    /// Sink declaring that it mutates data
    pub fn mutating() -> Self {
        Self::with_capabilities(Capabilities::MUTATING)
    }

    /// Non-mutating sink that records every batch and then fails with `f()`
    pub fn failing(f: impl Fn() -> ContractError + Send + Sync + 'static) -> Self {
        Self {
            fail_with: Some(Box::new(f)),
            ..Self::new()
        }
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            name: "batch_sink".to_string(),
            capabilities,
            batches: Mutex::new(Vec::new()),
            records: AtomicUsize::new(0),
            fail_with: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Handles of every batch received so far, in arrival order
    pub fn all_batches(&self) -> Vec<Batch> {
        self.batches.lock().clone()
    }

    /// Number of batches received
    pub fn len(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.lock().is_empty()
    }

    /// Records received, counted at arrival
    pub fn record_count(&self) -> usize {
        self.records.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.batches.lock().clear();
        self.records.store(0, Ordering::Relaxed);
    }

    fn receive(&self, batch: Batch) -> Result<(), ContractError> {
        self.records
            .fetch_add(batch.record_count(), Ordering::Relaxed);
        self.batches.lock().push(batch);
        match &self.fail_with {
            Some(f) => Err(f()),
            None => Ok(()),
        }
    }
}

impl Default for BatchSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Consumer for BatchSink {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn consume(&self, _ctx: &Context, batch: Batch) -> Result<(), ContractError> {
        self.receive(batch)
    }
}

#[async_trait]
impl Exporter for BatchSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn export(&self, _ctx: &Context, batch: Batch) -> Result<(), ContractError> {
        self.receive(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::testdata::generate_batch;
    use contracts::SignalType;

    #[tokio::test]
    async fn test_sink_records_batches() {
        let sink = BatchSink::new();
        let ctx = Context::background();

        sink.consume(&ctx, generate_batch(SignalType::Logs, 2))
            .await
            .unwrap();
        sink.export(&ctx, generate_batch(SignalType::Logs, 3))
            .await
            .unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.record_count(), 5);

        sink.reset();
        assert!(sink.is_empty());
        assert_eq!(sink.record_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_sink_still_records() {
        let sink = BatchSink::failing(|| ContractError::transient("busy"));
        let result = sink
            .consume(&Context::background(), generate_batch(SignalType::Logs, 1))
            .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(sink.len(), 1);
    }
}
