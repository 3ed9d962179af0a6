//! Consumer trait - routing and fan-out input interface
//!
//! Everything a batch can be handed to (fan-outs, processors, delivery queues)
//! implements this trait.

use async_trait::async_trait;

use crate::{Batch, Context, ContractError};

/// Declared capability of a consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether the consumer may modify the batch instance it receives.
    pub mutates_data: bool,
}

impl Capabilities {
    pub const READ_ONLY: Capabilities = Capabilities {
        mutates_data: false,
    };

    pub const MUTATING: Capabilities = Capabilities { mutates_data: true };
}

/// Batch consumer
///
/// Callers branch only on [`Consumer::capabilities`], never on the concrete
/// type. A consumer that does not declare `mutates_data` must not modify the
/// batch; it may keep the handle and read it asynchronously.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Declared capability (must not change over the consumer's lifetime)
    fn capabilities(&self) -> Capabilities;

    /// Consume one batch
    ///
    /// # Errors
    /// Returns the delivery error; whether it is retryable is up to the caller.
    async fn consume(&self, ctx: &Context, batch: Batch) -> Result<(), ContractError>;
}
