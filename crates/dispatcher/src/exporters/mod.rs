//! Exporter implementations
//!
//! Contains LogExporter, NopExporter, and FailingExporter.

mod failing;
mod log;
mod nop;

pub use self::failing::{FailingExporter, FailureKind};
pub use self::log::LogExporter;
pub use self::nop::NopExporter;
