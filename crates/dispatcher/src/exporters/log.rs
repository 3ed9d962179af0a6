//! LogExporter - logs batch summaries via tracing

use async_trait::async_trait;
use contracts::{Batch, Context, ContractError, Exporter, Verbosity};
use tracing::{info, instrument};

/// Exporter that logs batch summaries for debugging
pub struct LogExporter {
    name: String,
    verbosity: Verbosity,
}

impl LogExporter {
    /// Create a new LogExporter with the given name
    pub fn new(name: impl Into<String>, verbosity: Verbosity) -> Self {
        Self {
            name: name.into(),
            verbosity,
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    fn log_batch_summary(&self, batch: &Batch) -> Result<(), ContractError> {
        match self.verbosity {
            Verbosity::Basic => {
                info!(
                    exporter = %self.name,
                    signal = %batch.signal(),
                    records = batch.record_count(),
                    "Batch received"
                );
            }
            Verbosity::Normal => {
                info!(
                    exporter = %self.name,
                    signal = %batch.signal(),
                    resource_groups = batch.resource_group_count(),
                    records = batch.record_count(),
                    "Batch received"
                );
            }
            Verbosity::Detailed => {
                let body = serde_json::to_string(batch)
                    .map_err(|e| ContractError::Other(format!("failed to render batch: {e}")))?;
                info!(
                    exporter = %self.name,
                    signal = %batch.signal(),
                    resource_groups = batch.resource_group_count(),
                    records = batch.record_count(),
                    body = %body,
                    "Batch received"
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Exporter for LogExporter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_exporter_export",
        skip(self, _ctx, batch),
        fields(exporter = %self.name, records = batch.record_count())
    )]
    async fn export(&self, _ctx: &Context, batch: Batch) -> Result<(), ContractError> {
        self.log_batch_summary(&batch)
    }

    #[instrument(name = "log_exporter_shutdown", skip(self))]
    async fn shutdown(&self) -> Result<(), ContractError> {
        info!(exporter = %self.name, "LogExporter closed");
        Ok(())
    }
}
