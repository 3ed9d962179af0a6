//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Ownership Model
//! - A [`Batch`] is a handle; cloning shares the instance
//! - Only [`Batch::deep_copy`] produces an independent instance
//! - Read-only batches may be shared by any number of non-mutating consumers

mod batch;
mod blueprint;
mod consumer;
mod context;
mod delivery_config;
mod destination_id;
mod error;
mod exporter;
mod observer;
pub mod testdata;

pub use batch::*;
pub use blueprint::*;
pub use consumer::{Capabilities, Consumer};
pub use context::Context;
pub use delivery_config::{QueueConfig, RetryConfig};
pub use destination_id::DestinationId;
pub use error::*;
pub use exporter::{export_fn, Exporter, FnExporter};
pub use observer::{DeliveryObserver, NoopObserver, ObserverSet};
