//! Layered error definitions
//!
//! Categorized by source: routing / delivery / queue / egress / batch / config

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Routing Errors =====
    /// Route resolution called with an empty destination list
    #[error("no destinations given")]
    NoDestinations,

    /// Route references a destination that is not configured
    #[error("unknown destination: {id}")]
    UnknownDestination { id: String },

    // ===== Delivery Errors =====
    /// One or more destinations of a fan-out failed
    #[error("{0}")]
    Delivery(DeliveryErrors),

    // ===== Queue Errors =====
    /// Delivery queue is at capacity, item rejected
    #[error("queue '{queue}' is full (capacity {capacity}), batch rejected")]
    QueueOverflow { queue: String, capacity: usize },

    /// Delivery queue no longer accepts items
    #[error("queue '{queue}' is shut down")]
    QueueClosed { queue: String },

    // ===== Egress Errors =====
    /// Egress failure that may succeed if attempted again
    #[error("transient egress error: {message}")]
    Transient { message: String },

    /// Egress failure that will never succeed
    #[error("permanent egress error: {message}")]
    Permanent { message: String },

    /// Delivery context was cancelled or its deadline passed
    #[error("delivery cancelled")]
    Cancelled,

    /// A single egress attempt exceeded its time budget
    #[error("egress attempt timed out after {after:?}")]
    Timeout { after: Duration },

    // ===== Batch Errors =====
    /// Attempted to mutate a read-only batch
    #[error("batch is read-only")]
    ReadOnlyBatch,

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create unknown destination error
    pub fn unknown_destination(id: impl Into<String>) -> Self {
        Self::UnknownDestination { id: id.into() }
    }

    /// Create transient egress error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create permanent egress error
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Create queue overflow error
    pub fn queue_overflow(queue: impl Into<String>, capacity: usize) -> Self {
        Self::QueueOverflow {
            queue: queue.into(),
            capacity,
        }
    }

    /// Create queue closed error
    pub fn queue_closed(queue: impl Into<String>) -> Self {
        Self::QueueClosed {
            queue: queue.into(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether a delivery failing with this error may be attempted again.
    ///
    /// An aggregate is retryable only if every cause is.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transient { .. } | Self::Timeout { .. } => true,
            Self::Delivery(errors) => errors.iter().all(ContractError::is_retryable),
            _ => false,
        }
    }
}

/// Ordered collection of per-destination failures from one fan-out call.
#[derive(Debug, Default)]
pub struct DeliveryErrors {
    causes: Vec<ContractError>,
}

impl DeliveryErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ContractError) {
        self.causes.push(error);
    }

    pub fn len(&self) -> usize {
        self.causes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContractError> {
        self.causes.iter()
    }

    pub fn into_inner(self) -> Vec<ContractError> {
        self.causes
    }

    /// `Ok(())` when nothing failed, otherwise the aggregate as an error.
    pub fn into_result(self) -> Result<(), ContractError> {
        if self.causes.is_empty() {
            Ok(())
        } else {
            Err(ContractError::Delivery(self))
        }
    }
}

impl fmt::Display for DeliveryErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delivery failed for {} destination(s)", self.causes.len())?;
        for (idx, cause) in self.causes.iter().enumerate() {
            let sep = if idx == 0 { ": " } else { "; " };
            write!(f, "{sep}{cause}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a DeliveryErrors {
    type Item = &'a ContractError;
    type IntoIter = std::slice::Iter<'a, ContractError>;

    fn into_iter(self) -> Self::IntoIter {
        self.causes.iter()
    }
}
