//! 投递结果的结构化日志

use std::time::Duration;

use contracts::{ContractError, DeliveryObserver};
use tracing::{debug, trace, warn};

use crate::metrics::error_kind;

/// 把每个投递结果写成一条 tracing 事件
///
/// 丢弃用 `warn!`，其余用 `debug!`/`trace!`；最终失败已由队列以 `error!` 记录。
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl DeliveryObserver for LoggingObserver {
    fn on_delivered(&self, queue: &str, records: usize) {
        trace!(queue, records, "Batch delivered");
    }

    fn on_dropped(&self, queue: &str, records: usize, error: &ContractError) {
        warn!(queue, records, kind = error_kind(error), error = %error, "Batch dropped at enqueue");
    }

    fn on_failed(&self, queue: &str, records: usize, error: &ContractError) {
        debug!(queue, records, kind = error_kind(error), "Batch failed");
    }

    fn on_retry(&self, queue: &str, records: usize, attempt: u32, delay: Duration) {
        debug!(
            queue,
            records,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Retry scheduled"
        );
    }
}
