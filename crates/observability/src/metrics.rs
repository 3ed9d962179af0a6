//! 投递指标收集模块
//!
//! 基于队列投递结果收集和统计运行指标。

use std::collections::BTreeMap;
use std::time::Duration;

use contracts::{ContractError, DeliveryObserver};
use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use parking_lot::Mutex;

/// 注册指标描述（Prometheus `# HELP` 行）
pub fn describe_metrics() {
    describe_counter!(
        "signal_router_batches_sent_total",
        Unit::Count,
        "Batches exported successfully"
    );
    describe_counter!(
        "signal_router_records_sent_total",
        Unit::Count,
        "Records exported successfully"
    );
    describe_counter!(
        "signal_router_records_send_failed_total",
        Unit::Count,
        "Records accepted by a queue but never delivered"
    );
    describe_counter!(
        "signal_router_records_enqueue_failed_total",
        Unit::Count,
        "Records rejected at enqueue time"
    );
    describe_counter!(
        "signal_router_retries_total",
        Unit::Count,
        "Retries scheduled"
    );
    describe_histogram!(
        "signal_router_retry_delay_ms",
        Unit::Milliseconds,
        "Backoff delay of scheduled retries"
    );
    describe_gauge!(
        "signal_router_queue_size",
        Unit::Count,
        "Items waiting in a delivery queue"
    );
}

/// 记录一次成功导出
pub fn record_batch_sent(queue: &str, records: usize) {
    counter!("signal_router_batches_sent_total", "queue" => queue.to_string()).increment(1);
    counter!("signal_router_records_sent_total", "queue" => queue.to_string())
        .increment(records as u64);
}

/// 记录最终失败的记录数（已入队但未送达）
pub fn record_send_failed(queue: &str, records: usize, error: &ContractError) {
    counter!(
        "signal_router_records_send_failed_total",
        "queue" => queue.to_string(),
        "reason" => error_kind(error)
    )
    .increment(records as u64);
}

/// 记录入队被拒绝的记录数（队列满或已关闭）
pub fn record_enqueue_failed(queue: &str, records: usize, error: &ContractError) {
    counter!(
        "signal_router_records_enqueue_failed_total",
        "queue" => queue.to_string(),
        "reason" => error_kind(error)
    )
    .increment(records as u64);
}

/// 记录一次重试调度
pub fn record_retry(queue: &str, delay: Duration) {
    counter!("signal_router_retries_total", "queue" => queue.to_string()).increment(1);
    histogram!("signal_router_retry_delay_ms", "queue" => queue.to_string())
        .record(delay.as_secs_f64() * 1000.0);
}

/// 记录队列深度
pub fn record_queue_size(queue: &str, size: usize) {
    gauge!("signal_router_queue_size", "queue" => queue.to_string()).set(size as f64);
}

/// 错误分类标签
pub fn error_kind(error: &ContractError) -> &'static str {
    match error {
        ContractError::QueueOverflow { .. } => "queue_overflow",
        ContractError::QueueClosed { .. } => "queue_closed",
        ContractError::Transient { .. } => "transient",
        ContractError::Permanent { .. } => "permanent",
        ContractError::Timeout { .. } => "timeout",
        ContractError::Cancelled => "cancelled",
        ContractError::Delivery(_) => "delivery",
        _ => "other",
    }
}

/// 将投递事件写入 `metrics` 门面，并在内存中聚合
#[derive(Debug, Default)]
pub struct MetricsObserver {
    aggregator: Mutex<DeliveryAggregator>,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前聚合摘要
    pub fn summary(&self) -> DeliverySummary {
        self.aggregator.lock().summary()
    }
}

impl DeliveryObserver for MetricsObserver {
    fn on_delivered(&self, queue: &str, records: usize) {
        record_batch_sent(queue, records);
        self.aggregator.lock().delivered(queue, records);
    }

    fn on_dropped(&self, queue: &str, records: usize, error: &ContractError) {
        record_enqueue_failed(queue, records, error);
        self.aggregator.lock().dropped(queue, records);
    }

    fn on_failed(&self, queue: &str, records: usize, error: &ContractError) {
        record_send_failed(queue, records, error);
        self.aggregator.lock().failed(queue, records);
    }

    fn on_retry(&self, queue: &str, _records: usize, _attempt: u32, delay: Duration) {
        record_retry(queue, delay);
        self.aggregator.lock().retried(queue, delay);
    }
}

/// 单个队列的累计计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueTotals {
    pub delivered_batches: u64,
    pub delivered_records: u64,
    pub failed_batches: u64,
    pub failed_records: u64,
    pub dropped_batches: u64,
    pub dropped_records: u64,
    pub retries: u64,
}

/// 投递指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DeliveryAggregator {
    queues: BTreeMap<String, QueueTotals>,
    retry_delay_stats: RunningStats,
}

impl DeliveryAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    fn totals(&mut self, queue: &str) -> &mut QueueTotals {
        self.queues.entry(queue.to_string()).or_default()
    }

    pub fn delivered(&mut self, queue: &str, records: usize) {
        let totals = self.totals(queue);
        totals.delivered_batches += 1;
        totals.delivered_records += records as u64;
    }

    pub fn failed(&mut self, queue: &str, records: usize) {
        let totals = self.totals(queue);
        totals.failed_batches += 1;
        totals.failed_records += records as u64;
    }

    pub fn dropped(&mut self, queue: &str, records: usize) {
        let totals = self.totals(queue);
        totals.dropped_batches += 1;
        totals.dropped_records += records as u64;
    }

    pub fn retried(&mut self, queue: &str, delay: Duration) {
        self.totals(queue).retries += 1;
        self.retry_delay_stats.push(delay.as_secs_f64() * 1000.0);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> DeliverySummary {
        let mut total = QueueTotals::default();
        for totals in self.queues.values() {
            total.delivered_batches += totals.delivered_batches;
            total.delivered_records += totals.delivered_records;
            total.failed_batches += totals.failed_batches;
            total.failed_records += totals.failed_records;
            total.dropped_batches += totals.dropped_batches;
            total.dropped_records += totals.dropped_records;
            total.retries += totals.retries;
        }

        let attempted = total.delivered_records + total.failed_records + total.dropped_records;
        DeliverySummary {
            total,
            loss_rate: if attempted > 0 {
                (total.failed_records + total.dropped_records) as f64 / attempted as f64 * 100.0
            } else {
                0.0
            },
            retry_delay_ms: StatsSummary::from(&self.retry_delay_stats),
            queues: self.queues.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 投递摘要
#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub total: QueueTotals,
    /// 未送达记录占比（百分比）
    pub loss_rate: f64,
    pub retry_delay_ms: StatsSummary,
    pub queues: BTreeMap<String, QueueTotals>,
}

impl std::fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(
            f,
            "Delivered: {} batches, {} records",
            self.total.delivered_batches, self.total.delivered_records
        )?;
        writeln!(
            f,
            "Failed: {} batches, {} records",
            self.total.failed_batches, self.total.failed_records
        )?;
        writeln!(
            f,
            "Dropped: {} batches, {} records",
            self.total.dropped_batches, self.total.dropped_records
        )?;
        writeln!(f, "Loss rate: {:.2}%", self.loss_rate)?;
        writeln!(f, "Retries: {}", self.total.retries)?;
        writeln!(f, "Retry delay (ms): {}", self.retry_delay_ms)?;

        if !self.queues.is_empty() {
            writeln!(f, "Per queue:")?;
            for (queue, totals) in &self.queues {
                writeln!(
                    f,
                    "  {}: delivered={} failed={} dropped={} retries={}",
                    queue,
                    totals.delivered_records,
                    totals.failed_records,
                    totals.dropped_records,
                    totals.retries
                )?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
