//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 配置 → 调度器 → 投递队列的端到端场景
//! - 投递结果统计校验

#[cfg(test)]
mod contract_tests {
    use contracts::testdata::generate_batch;
    use contracts::SignalType;

    /// 路由配置的 JSON 形态：版本、默认值与信号名保持稳定
    #[test]
    fn test_blueprint_defaults_snapshot() {
        let blueprint: contracts::RouterBlueprint = serde_json::from_str(
            r#"{
                "destinations": [{ "name": "archive", "exporter": "nop" }],
                "routes": [{ "name": "logs/in", "signal": "logs", "destinations": ["archive"] }]
            }"#,
        )
        .unwrap();

        assert_eq!(blueprint.version, contracts::ConfigVersion::V1);
        let dest = &blueprint.destinations[0];
        assert_eq!(dest.verbosity, contracts::Verbosity::Normal);
        assert!(!dest.mutates_data);
        assert_eq!(dest.queue, contracts::QueueConfig::default());
        assert_eq!(dest.retry, contracts::RetryConfig::default());
        assert_eq!(blueprint.routes[0].signal, SignalType::Logs);

        let json = serde_json::to_value(&blueprint).unwrap();
        assert_eq!(json["version"], "V1");
        assert_eq!(json["destinations"][0]["exporter"], "nop");
        assert_eq!(json["routes"][0]["signal"], "logs");
    }

    #[test]
    fn test_batch_handle_semantics() {
        let batch = generate_batch(SignalType::Logs, 2);
        let shared = batch.clone();
        let copy = batch.deep_copy();

        assert!(shared.same_instance(&batch));
        assert!(!copy.same_instance(&batch));

        batch.mark_read_only();
        assert!(shared.is_read_only());
        assert!(!copy.is_read_only());
        assert!(shared.mutate(|groups| groups.clear()).is_err());
        assert!(copy.mutate(|groups| groups.clear()).is_ok());
        assert_eq!(batch.record_count(), 2);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::testdata::{generate_batch, generate_batch_with_groups};
    use contracts::{Context, ContractError, SignalType};
    use dispatcher::{BatchSink, DispatcherBuilder, DispatcherError};
    use observability::MetricsObserver;

    const MIXED_CONFIG: &str = r#"
[[destinations]]
name = "debug"
exporter = "log"
verbosity = "detailed"

[destinations.queue]
enabled = false

[[destinations]]
name = "archive"
exporter = "nop"

[[destinations]]
name = "audit"
exporter = "nop"

[[destinations]]
name = "tagged"
exporter = "nop"
resource_attributes = { "deployment.environment" = "staging" }

[[routes]]
name = "traces/in"
signal = "traces"
destinations = ["archive", "tagged", "audit"]

[[routes]]
name = "logs/in"
signal = "logs"
destinations = ["debug", "archive"]
"#;

    const OVERFLOW_CONFIG: &str = r#"
[[destinations]]
name = "flaky"
exporter = "failing"
params = { failure = "transient" }

[destinations.queue]
queue_capacity = 2
num_workers = 1
timeout_ms = 0

[destinations.retry]
initial_interval_ms = 60000
randomization_factor = 0.0

[[routes]]
name = "profiles/in"
signal = "profiles"
destinations = ["flaky"]
"#;

    /// End-to-end test: TOML -> ConfigLoader -> Dispatcher -> queues -> exporters
    ///
    /// 验证完整的数据流：
    /// 1. 读者共享同一只读实例
    /// 2. 可变目的地拿到独立副本并写入资源属性
    /// 3. 关闭时排空所有队列
    #[tokio::test]
    async fn test_e2e_mixed_fanout() {
        let blueprint = ConfigLoader::load_from_str(MIXED_CONFIG, ConfigFormat::Toml).unwrap();

        let archive = Arc::new(BatchSink::new().named("archive"));
        let audit = Arc::new(BatchSink::new().named("audit"));
        let tagged = Arc::new(BatchSink::new().named("tagged"));
        let observer = Arc::new(MetricsObserver::new());

        let dispatcher = DispatcherBuilder::new(blueprint)
            .with_observer(observer.clone())
            .with_exporter("archive", archive.clone())
            .with_exporter("audit", audit.clone())
            .with_exporter("tagged", tagged.clone())
            .build()
            .unwrap();
        assert_eq!(dispatcher.route_names(), vec!["logs/in", "traces/in"]);

        let ctx = Context::background();
        let traces = generate_batch_with_groups(SignalType::Traces, 2, 3);
        dispatcher
            .dispatch(&ctx, "traces/in", traces.clone())
            .await
            .unwrap();
        dispatcher
            .dispatch(&ctx, "logs/in", generate_batch(SignalType::Logs, 4))
            .await
            .unwrap();

        dispatcher.shutdown().await;

        // Readers share the original, now read-only
        assert!(traces.is_read_only());
        let archived = archive.all_batches();
        assert_eq!(archived.len(), 2);
        assert!(archived.iter().any(|b| b.same_instance(&traces)));
        assert!(audit.all_batches()[0].same_instance(&traces));

        // The mutating destination worked on its own copy
        let tagged_batch = tagged.all_batches()[0].clone();
        assert!(!tagged_batch.same_instance(&traces));
        for group in tagged_batch.resource_groups().iter() {
            assert_eq!(group.attributes["deployment.environment"], "staging");
        }
        for group in traces.resource_groups().iter() {
            assert!(!group.attributes.contains_key("deployment.environment"));
        }

        let summary = observer.summary();
        assert_eq!(summary.queues["archive"].delivered_records, 10);
        assert_eq!(summary.queues["audit"].delivered_batches, 1);
        assert_eq!(summary.queues["tagged"].delivered_records, 6);
        assert_eq!(summary.queues["debug"].delivered_records, 4);
        assert_eq!(summary.total.failed_batches, 0);
        assert_eq!(summary.loss_rate, 0.0);
    }

    /// Capacity 2, one worker, exporter always failing transiently:
    /// 2 batches are accepted and 5 overflow.
    #[tokio::test]
    async fn test_e2e_queue_overflow() {
        let blueprint = ConfigLoader::load_from_str(OVERFLOW_CONFIG, ConfigFormat::Toml).unwrap();
        let observer = Arc::new(MetricsObserver::new());
        let dispatcher = DispatcherBuilder::new(blueprint)
            .with_observer(observer.clone())
            .build()
            .unwrap();

        let ctx = Context::background();
        let mut overflowed = 0;
        for _ in 0..7 {
            let batch = generate_batch(SignalType::Profiles, 3);
            match dispatcher.dispatch(&ctx, "profiles/in", batch).await {
                Ok(()) => {}
                Err(DispatcherError::Contract(ContractError::QueueOverflow { queue, .. })) => {
                    assert_eq!(queue, "flaky");
                    overflowed += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(overflowed, 5);

        dispatcher.shutdown().await;

        let (name, snapshot) = &dispatcher.metrics()[0];
        assert_eq!(name, "flaky");
        assert_eq!(snapshot.dropped_count, 5);
        assert_eq!(snapshot.dropped_records, 15);
        assert_eq!(snapshot.failure_count, 2);
        assert_eq!(snapshot.delivered_count, 0);
        assert_eq!(snapshot.queue_len, 0);

        let summary = observer.summary();
        assert_eq!(summary.total.dropped_records, 15);
        assert_eq!(summary.total.failed_records, 6);
        assert_eq!(summary.loss_rate, 100.0);
    }

    #[tokio::test]
    async fn test_e2e_dispatch_errors() {
        let blueprint = ConfigLoader::load_from_str(MIXED_CONFIG, ConfigFormat::Toml).unwrap();
        let dispatcher = DispatcherBuilder::new(blueprint).build().unwrap();
        let ctx = Context::background();

        let result = dispatcher
            .dispatch(&ctx, "metrics/none", generate_batch(SignalType::Metrics, 1))
            .await;
        assert!(matches!(result, Err(DispatcherError::UnknownRoute { .. })));

        let result = dispatcher
            .dispatch(&ctx, "logs/in", generate_batch(SignalType::Traces, 1))
            .await;
        assert!(matches!(result, Err(DispatcherError::SignalMismatch { .. })));

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_e2e_failing_destination_does_not_block_others() {
        let config = MIXED_CONFIG.replace(
            "name = \"audit\"\nexporter = \"nop\"",
            "name = \"audit\"\nexporter = \"failing\"\nparams = { failure = \"permanent\" }",
        );
        let blueprint = ConfigLoader::load_from_str(&config, ConfigFormat::Toml).unwrap();
        let archive = Arc::new(BatchSink::new());
        let observer = Arc::new(MetricsObserver::new());
        let dispatcher = DispatcherBuilder::new(blueprint)
            .with_observer(observer.clone())
            .with_exporter("archive", archive.clone())
            .build()
            .unwrap();

        let ctx = Context::background();
        for _ in 0..3 {
            dispatcher
                .dispatch(&ctx, "traces/in", generate_batch(SignalType::Traces, 2))
                .await
                .unwrap();
        }
        dispatcher.shutdown().await;

        assert_eq!(archive.len(), 3);
        let summary = observer.summary();
        assert_eq!(summary.queues["audit"].failed_batches, 3);
        assert_eq!(summary.queues["audit"].retries, 0);
        assert_eq!(summary.queues["tagged"].delivered_batches, 3);
    }
}
