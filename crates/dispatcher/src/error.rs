//! Dispatcher error types

use contracts::SignalType;
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Exporter creation error
    #[error("failed to create exporter for destination '{name}': {message}")]
    ExporterCreation { name: String, message: String },

    /// Route not present in the blueprint
    #[error("unknown route '{route}'")]
    UnknownRoute { route: String },

    /// Batch signal does not match the route
    #[error("route '{route}' carries {expected}, got a {actual} batch")]
    SignalMismatch {
        route: String,
        expected: SignalType,
        actual: SignalType,
    },

    /// Routing or delivery error (from contract)
    #[error("delivery error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    /// Create an exporter creation error
    pub fn exporter_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExporterCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an unknown route error
    pub fn unknown_route(route: impl Into<String>) -> Self {
        Self::UnknownRoute {
            route: route.into(),
        }
    }
}
