//! Exporter trait - egress interface driven by the delivery queue

use std::future::Future;

use async_trait::async_trait;

use crate::{Batch, Context, ContractError};

/// Egress component
///
/// `export` returns [`ContractError::Transient`] for failures worth retrying
/// and [`ContractError::Permanent`] (or any non-retryable error) otherwise.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Exporter name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one batch
    async fn export(&self, ctx: &Context, batch: Batch) -> Result<(), ContractError>;

    /// Release resources once no more batches will be exported
    async fn shutdown(&self) -> Result<(), ContractError> {
        Ok(())
    }
}

/// Exporter backed by a closure, see [`export_fn`].
pub struct FnExporter<F> {
    name: String,
    f: F,
}

/// Adapt an async closure `(Context, Batch) -> Result` into an [`Exporter`].
pub fn export_fn<F, Fut>(name: impl Into<String>, f: F) -> FnExporter<F>
where
    F: Fn(Context, Batch) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ContractError>> + Send,
{
    FnExporter {
        name: name.into(),
        f,
    }
}

#[async_trait]
impl<F, Fut> Exporter for FnExporter<F>
where
    F: Fn(Context, Batch) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ContractError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn export(&self, ctx: &Context, batch: Batch) -> Result<(), ContractError> {
        (self.f)(ctx.clone(), batch).await
    }
}
