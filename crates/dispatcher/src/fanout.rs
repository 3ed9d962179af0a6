//! Fan-out consumer - one batch to many destinations
//!
//! Copy policy:
//! - every mutating destination but the last gets its own deep copy
//! - the last mutating destination gets the original only when no reader
//!   shares it and it is not read-only
//! - readers share one instance, marked read-only when there is more than one

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use contracts::{Batch, Capabilities, Consumer, Context, ContractError, DeliveryErrors};

/// Wrap `consumers` into a single consumer.
///
/// A lone non-mutating consumer is returned as-is.
pub fn build(consumers: Vec<Arc<dyn Consumer>>) -> Arc<dyn Consumer> {
    if consumers.len() == 1 && !consumers[0].capabilities().mutates_data {
        return Arc::clone(&consumers[0]);
    }
    Arc::new(FanOut::new(consumers))
}

/// Consumer that multiplexes every batch to a fixed set of destinations
pub struct FanOut {
    mutating: Vec<Arc<dyn Consumer>>,
    readonly: Vec<Arc<dyn Consumer>>,
}

impl FanOut {
    /// Partition destinations by capability, keeping their relative order
    pub fn new(consumers: Vec<Arc<dyn Consumer>>) -> Self {
        let (mutating, readonly) = consumers
            .into_iter()
            .partition(|c| c.capabilities().mutates_data);
        Self { mutating, readonly }
    }

    pub fn mutating_count(&self) -> usize {
        self.mutating.len()
    }

    pub fn readonly_count(&self) -> usize {
        self.readonly.len()
    }
}

#[async_trait]
impl Consumer for FanOut {
    fn capabilities(&self) -> Capabilities {
        // The original is handed to a mutator only when no reader is involved
        Capabilities {
            mutates_data: !self.mutating.is_empty() && self.readonly.is_empty(),
        }
    }

    async fn consume(&self, ctx: &Context, batch: Batch) -> Result<(), ContractError> {
        trace!(
            mutating = self.mutating.len(),
            readonly = self.readonly.len(),
            read_only = batch.is_read_only(),
            "Fan-out consume"
        );
        let mut errors = DeliveryErrors::new();

        if let Some((last, rest)) = self.mutating.split_last() {
            for consumer in rest {
                if let Err(e) = consumer.consume(ctx, batch.deep_copy()).await {
                    errors.push(e);
                }
            }

            // Never share one instance between a mutator and a reader: the
            // reader may still be reading when the mutator changes it.
            if self.readonly.is_empty() && !batch.is_read_only() {
                if let Err(e) = last.consume(ctx, batch).await {
                    errors.push(e);
                }
                return errors.into_result();
            }
            if let Err(e) = last.consume(ctx, batch.deep_copy()).await {
                errors.push(e);
            }
        }

        if self.readonly.len() > 1 && !batch.is_read_only() {
            batch.mark_read_only();
        }
        for consumer in &self.readonly {
            if let Err(e) = consumer.consume(ctx, batch.clone()).await {
                errors.push(e);
            }
        }

        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::BatchSink;
    use contracts::testdata::generate_batch;
    use contracts::SignalType;

    fn as_consumers(sinks: &[Arc<BatchSink>]) -> Vec<Arc<dyn Consumer>> {
        sinks
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn Consumer>)
            .collect()
    }

    #[tokio::test]
    async fn test_single_readonly_is_not_wrapped() {
        let sink = Arc::new(BatchSink::new());
        let single: Arc<dyn Consumer> = sink.clone();
        let consumer = build(vec![single.clone()]);

        assert!(Arc::ptr_eq(&consumer, &single));

        let batch = generate_batch(SignalType::Logs, 2);
        consumer
            .consume(&Context::background(), batch.clone())
            .await
            .unwrap();

        let received = sink.all_batches();
        assert!(received[0].same_instance(&batch));
        assert!(!batch.is_read_only());
    }

    #[tokio::test]
    async fn test_single_mutating_gets_original() {
        let sink = Arc::new(BatchSink::mutating());
        let consumer = build(as_consumers(&[sink.clone()]));
        assert!(consumer.capabilities().mutates_data);

        let batch = generate_batch(SignalType::Traces, 2);
        consumer
            .consume(&Context::background(), batch.clone())
            .await
            .unwrap();

        assert!(sink.all_batches()[0].same_instance(&batch));
    }

    #[tokio::test]
    async fn test_single_mutating_copies_read_only_input() {
        let sink = Arc::new(BatchSink::mutating());
        let consumer = build(as_consumers(&[sink.clone()]));

        let batch = generate_batch(SignalType::Traces, 2);
        batch.mark_read_only();
        consumer
            .consume(&Context::background(), batch.clone())
            .await
            .unwrap();

        let received = sink.all_batches()[0].clone();
        assert!(!received.same_instance(&batch));
        assert!(!received.is_read_only());
        assert_eq!(received, batch);
    }

    #[tokio::test]
    async fn test_readers_share_one_read_only_instance() {
        let sinks = [Arc::new(BatchSink::new()), Arc::new(BatchSink::new())];
        let consumer = build(as_consumers(&sinks));
        assert!(!consumer.capabilities().mutates_data);

        let batch = generate_batch(SignalType::Metrics, 3);
        consumer
            .consume(&Context::background(), batch.clone())
            .await
            .unwrap();

        assert!(batch.is_read_only());
        for sink in &sinks {
            let received = sink.all_batches();
            assert_eq!(received.len(), 1);
            assert!(received[0].same_instance(&batch));
        }
    }

    #[tokio::test]
    async fn test_mixed_destinations_isolate_mutator() {
        let mutator = Arc::new(BatchSink::mutating());
        let readers = [Arc::new(BatchSink::new()), Arc::new(BatchSink::new())];
        let consumer = build(vec![
            readers[0].clone() as Arc<dyn Consumer>,
            mutator.clone() as Arc<dyn Consumer>,
            readers[1].clone() as Arc<dyn Consumer>,
        ]);
        assert!(!consumer.capabilities().mutates_data);

        let batch = generate_batch(SignalType::Logs, 5);
        consumer
            .consume(&Context::background(), batch.clone())
            .await
            .unwrap();

        let private = mutator.all_batches()[0].clone();
        assert!(!private.same_instance(&batch));
        private.mutate(|groups| groups.clear()).unwrap();

        for reader in &readers {
            let received = reader.all_batches()[0].clone();
            assert!(received.is_read_only());
            assert!(received.same_instance(&batch));
            assert_eq!(received.record_count(), 5);
        }
    }

    #[tokio::test]
    async fn test_all_mutators_get_independent_instances() {
        let sinks = [
            Arc::new(BatchSink::mutating()),
            Arc::new(BatchSink::mutating()),
            Arc::new(BatchSink::mutating()),
        ];
        let consumer = build(as_consumers(&sinks));
        assert!(consumer.capabilities().mutates_data);

        let batch = generate_batch(SignalType::Profiles, 4);
        let expected = batch.deep_copy();
        consumer
            .consume(&Context::background(), batch.clone())
            .await
            .unwrap();

        let received: Vec<Batch> = sinks.iter().map(|s| s.all_batches()[0].clone()).collect();
        assert!(received[2].same_instance(&batch));
        assert!(!received[0].same_instance(&received[1]));
        assert!(!received[0].same_instance(&batch));

        received[0].mutate(|groups| groups.clear()).unwrap();
        assert_eq!(received[1], expected);
        assert_eq!(received[2], expected);
    }

    #[tokio::test]
    async fn test_all_destinations_attempted_and_errors_collected() {
        let failing_a = Arc::new(BatchSink::failing(|| ContractError::transient("a down")));
        let ok = Arc::new(BatchSink::new());
        let failing_b = Arc::new(BatchSink::failing(|| ContractError::permanent("b rejects")));
        let consumer = build(as_consumers(&[failing_a.clone(), ok.clone(), failing_b.clone()]));

        let err = consumer
            .consume(
                &Context::background(),
                generate_batch(SignalType::Logs, 1),
            )
            .await
            .unwrap_err();

        assert_eq!(failing_a.len(), 1);
        assert_eq!(ok.len(), 1);
        assert_eq!(failing_b.len(), 1);
        match err {
            ContractError::Delivery(errors) => {
                assert_eq!(errors.len(), 2);
                let causes: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                assert!(causes[0].contains("a down"));
                assert!(causes[1].contains("b rejects"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_partition_counts() {
        let fanout = FanOut::new(as_consumers(&[
            Arc::new(BatchSink::new()),
            Arc::new(BatchSink::mutating()),
            Arc::new(BatchSink::new()),
        ]));
        assert_eq!(fanout.mutating_count(), 1);
        assert_eq!(fanout.readonly_count(), 2);
    }
}
