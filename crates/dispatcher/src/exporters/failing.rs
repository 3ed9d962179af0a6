//! FailingExporter - fails every export with a configured error class

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use contracts::{Batch, Context, ContractError, Exporter};
use tracing::debug;

/// Error class returned by a [`FailingExporter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    Permanent,
}

/// Exporter that fails, optionally only for its first `succeed_after` calls.
///
/// Params:
/// - `failure`: `transient` (default) or `permanent`
/// - `succeed_after`: number of failing calls before it starts accepting
pub struct FailingExporter {
    name: String,
    kind: FailureKind,
    succeed_after: Option<u64>,
    calls: AtomicU64,
}

impl FailingExporter {
    pub fn new(name: impl Into<String>, kind: FailureKind) -> Self {
        Self {
            name: name.into(),
            kind,
            succeed_after: None,
            calls: AtomicU64::new(0),
        }
    }

    pub fn succeed_after(mut self, failures: u64) -> Self {
        self.succeed_after = Some(failures);
        self
    }

    /// Build from destination params
    pub fn from_params(
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let kind = match params.get("failure").map(String::as_str) {
            None | Some("transient") => FailureKind::Transient,
            Some("permanent") => FailureKind::Permanent,
            Some(other) => {
                return Err(ContractError::config_validation(
                    "params.failure",
                    format!("unknown failure kind '{other}' (expected transient or permanent)"),
                ));
            }
        };

        let mut exporter = Self::new(name, kind);
        if let Some(raw) = params.get("succeed_after") {
            let failures = raw.parse::<u64>().map_err(|e| {
                ContractError::config_validation("params.succeed_after", e.to_string())
            })?;
            exporter = exporter.succeed_after(failures);
        }
        Ok(exporter)
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Export calls seen so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Exporter for FailingExporter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn export(&self, _ctx: &Context, batch: Batch) -> Result<(), ContractError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if self.succeed_after.is_some_and(|n| call > n) {
            return Ok(());
        }

        debug!(exporter = %self.name, call, records = batch.record_count(), "Export rejected");
        let message = format!("{} rejected export #{call}", self.name);
        Err(match self.kind {
            FailureKind::Transient => ContractError::transient(message),
            FailureKind::Permanent => ContractError::permanent(message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::testdata::generate_batch;
    use contracts::SignalType;

    #[tokio::test]
    async fn test_failing_exporter_classes() {
        let ctx = Context::background();
        let transient = FailingExporter::new("t", FailureKind::Transient);
        let permanent = FailingExporter::new("p", FailureKind::Permanent);

        let err = transient
            .export(&ctx, generate_batch(SignalType::Logs, 1))
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        let err = permanent
            .export(&ctx, generate_batch(SignalType::Logs, 1))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_succeed_after() {
        let ctx = Context::background();
        let exporter = FailingExporter::new("flaky", FailureKind::Transient).succeed_after(2);

        assert!(exporter.export(&ctx, generate_batch(SignalType::Logs, 1)).await.is_err());
        assert!(exporter.export(&ctx, generate_batch(SignalType::Logs, 1)).await.is_err());
        assert!(exporter.export(&ctx, generate_batch(SignalType::Logs, 1)).await.is_ok());
        assert_eq!(exporter.calls(), 3);
    }

    #[test]
    fn test_from_params() {
        let params = HashMap::from([
            ("failure".to_string(), "permanent".to_string()),
            ("succeed_after".to_string(), "4".to_string()),
        ]);
        let exporter = FailingExporter::from_params("f", &params).unwrap();
        assert_eq!(exporter.kind(), FailureKind::Permanent);
        assert_eq!(exporter.succeed_after, Some(4));

        let defaults = FailingExporter::from_params("f", &HashMap::new()).unwrap();
        assert_eq!(defaults.kind(), FailureKind::Transient);

        let bad = HashMap::from([("failure".to_string(), "sometimes".to_string())]);
        assert!(FailingExporter::from_params("f", &bad).is_err());
    }
}
