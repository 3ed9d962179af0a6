//! # Observability
//!
//! 可观测性模块：日志、Prometheus 指标与投递结果统计。
//!
//! - [`init_with_config`]：安装 tracing subscriber，可选启动指标端点
//! - [`install_metrics_endpoint`]：单独启动 Prometheus 端点
//! - [`DeliveryTelemetry`]：交给调度器的观察者（指标 + 日志），并提供运行摘要

pub mod logging;
pub mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{DeliveryObserver, ObserverSet};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

pub use crate::logging::LoggingObserver;
pub use crate::metrics::{
    describe_metrics, error_kind, record_batch_sent, record_enqueue_failed, record_queue_size,
    record_retry, record_send_failed, DeliveryAggregator, DeliverySummary, MetricsObserver,
    QueueTotals, RunningStats, StatsSummary,
};

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志
    Json,
    /// 人类可读格式
    #[default]
    Pretty,
    /// 紧凑单行格式
    Compact,
}

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// `RUST_LOG` 未设置时使用的过滤规则
    pub default_log_level: String,
    /// Prometheus 端口 (None = 禁用)
    pub metrics_port: Option<u16>,
}

impl ObservabilityConfig {
    /// 按 `-q` / `-v` 次数选择默认级别
    pub fn from_verbosity(log_format: LogFormat, quiet: bool, verbose: u8) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        Self {
            log_format,
            default_log_level: level.to_string(),
            metrics_port: None,
        }
    }
}

/// 安装全局 subscriber，并在配置了端口时启动指标端点
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    tracing_subscriber::registry()
        .with(format_layer(config.log_format))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        install_metrics_endpoint(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );
    Ok(())
}

fn format_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    }
}

/// 在 0.0.0.0:`port` 启动 Prometheus 端点并登记指标描述
pub fn install_metrics_endpoint(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on port {port}"))?;
    describe_metrics();

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}

/// 一次运行的投递观察者
///
/// 事件同时写入 `metrics` 门面、内存聚合器和日志。
pub struct DeliveryTelemetry {
    metrics: Arc<MetricsObserver>,
    observers: Arc<ObserverSet>,
}

impl DeliveryTelemetry {
    pub fn new() -> Self {
        let metrics = Arc::new(MetricsObserver::new());
        let observers = ObserverSet::new()
            .with(metrics.clone())
            .with(Arc::new(LoggingObserver));
        Self {
            metrics,
            observers: Arc::new(observers),
        }
    }

    /// 交给 `DispatcherBuilder::with_observer` 的观察者
    pub fn observer(&self) -> Arc<dyn DeliveryObserver> {
        self.observers.clone()
    }

    /// 更新各队列的积压量 gauge
    pub fn record_queue_sizes<'a>(&self, queues: impl IntoIterator<Item = (&'a str, usize)>) {
        for (queue, size) in queues {
            record_queue_size(queue, size);
        }
    }

    pub fn summary(&self) -> DeliverySummary {
        self.metrics.summary()
    }
}

impl Default for DeliveryTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ContractError;
    use std::time::Duration;

    #[test]
    fn test_verbosity_levels() {
        let level = |quiet, verbose| {
            ObservabilityConfig::from_verbosity(LogFormat::Compact, quiet, verbose)
                .default_log_level
        };
        assert_eq!(level(true, 0), "warn");
        assert_eq!(level(false, 0), "info");
        assert_eq!(level(false, 1), "debug");
        assert_eq!(level(false, 3), "trace");
        assert!(ObservabilityConfig::from_verbosity(LogFormat::Json, false, 0)
            .metrics_port
            .is_none());
    }

    #[test]
    fn test_telemetry_observer_feeds_summary() {
        let telemetry = DeliveryTelemetry::new();
        let observer = telemetry.observer();

        observer.on_delivered("archive", 4);
        observer.on_retry("flaky", 2, 1, Duration::from_millis(100));
        observer.on_failed("flaky", 2, &ContractError::transient("down"));
        observer.on_dropped("flaky", 3, &ContractError::queue_overflow("flaky", 1));
        telemetry.record_queue_sizes([("archive", 0), ("flaky", 1)]);

        let summary = telemetry.summary();
        assert_eq!(summary.queues["archive"].delivered_records, 4);
        assert_eq!(summary.queues["flaky"].failed_records, 2);
        assert_eq!(summary.queues["flaky"].dropped_records, 3);
        assert_eq!(summary.queues["flaky"].retries, 1);
        assert_eq!(summary.retry_delay_ms.count, 1);
    }
}
