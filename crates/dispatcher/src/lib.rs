//! # Dispatcher
//!
//! 数据分发模块。
//!
//! 负责：
//! - 按目的地集合解析并缓存路由（`Router`）
//! - Fan-out 到多个目的地，最少拷贝且互不干扰
//! - 有界投递队列 + 退避重试，隔离慢导出器

pub mod capture;
pub mod dispatcher;
pub mod error;
pub mod exporters;
pub mod fanout;
pub mod metrics;
pub mod processors;
pub mod queue;
pub mod retry;
pub mod router;

pub use capture::BatchSink;
pub use contracts::{Batch, Consumer, Exporter};
pub use dispatcher::{Dispatcher, DispatcherBuilder, create_dispatcher};
pub use error::DispatcherError;
pub use exporters::{FailingExporter, FailureKind, LogExporter, NopExporter};
pub use fanout::FanOut;
pub use metrics::{MetricsSnapshot, QueueMetrics};
pub use processors::ResourceAttributes;
pub use queue::DeliveryQueue;
pub use retry::ExponentialBackoff;
pub use router::Router;
