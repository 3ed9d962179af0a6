//! Processors - consumers that change a batch and forward it

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use contracts::{Batch, Capabilities, Consumer, Context, ContractError};

/// Upserts resource attributes into every resource group, then forwards
///
/// Declares itself mutating, so a fan-out never shares its batch with a reader.
pub struct ResourceAttributes {
    attributes: BTreeMap<String, String>,
    next: Arc<dyn Consumer>,
}

impl ResourceAttributes {
    pub fn new(attributes: BTreeMap<String, String>, next: Arc<dyn Consumer>) -> Self {
        Self { attributes, next }
    }
}

#[async_trait]
impl Consumer for ResourceAttributes {
    fn capabilities(&self) -> Capabilities {
        Capabilities::MUTATING
    }

    async fn consume(&self, ctx: &Context, batch: Batch) -> Result<(), ContractError> {
        batch.mutate(|groups| {
            for group in groups.iter_mut() {
                for (key, value) in &self.attributes {
                    group.attributes.insert(key.clone(), value.clone());
                }
            }
        })?;
        trace!(attributes = self.attributes.len(), "Resource attributes applied");
        self.next.consume(ctx, batch).await
    }
}
