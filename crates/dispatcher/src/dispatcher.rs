//! Dispatcher - wires a blueprint into queues, processors and a router

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use contracts::{
    Batch, Capabilities, Consumer, Context, DeliveryObserver, DestinationConfig, DestinationId,
    Exporter, ExporterKind, NoopObserver, RouterBlueprint, SignalType,
};

use crate::error::DispatcherError;
use crate::exporters::{FailingExporter, LogExporter, NopExporter};
use crate::metrics::MetricsSnapshot;
use crate::processors::ResourceAttributes;
use crate::queue::DeliveryQueue;
use crate::router::Router;

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    blueprint: RouterBlueprint,
    observer: Arc<dyn DeliveryObserver>,
    exporters: HashMap<String, Arc<dyn Exporter>>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(blueprint: RouterBlueprint) -> Self {
        Self {
            blueprint,
            observer: Arc::new(NoopObserver),
            exporters: HashMap::new(),
        }
    }

    /// Observer handed to every delivery queue
    pub fn with_observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Use `exporter` for destination `name` instead of the configured kind
    pub fn with_exporter(mut self, name: impl Into<String>, exporter: Arc<dyn Exporter>) -> Self {
        self.exporters.insert(name.into(), exporter);
        self
    }

    /// Build and start the dispatcher. Must run inside a Tokio runtime.
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(destinations = self.blueprint.destinations.len(), routes = self.blueprint.routes.len())
    )]
    pub fn build(mut self) -> Result<Dispatcher, DispatcherError> {
        let mut queues = Vec::with_capacity(self.blueprint.destinations.len());
        let mut consumers: HashMap<DestinationId, Arc<dyn Consumer>> = HashMap::new();

        for config in &self.blueprint.destinations {
            let exporter = match self.exporters.remove(&config.name) {
                Some(exporter) => exporter,
                None => create_exporter(config)?,
            };
            let queue = Arc::new(create_queue(config, exporter, Arc::clone(&self.observer)));
            let head = destination_head(config, Arc::clone(&queue));
            consumers.insert(DestinationId::new(&config.name), head);
            queues.push(queue);
        }

        let routes = self
            .blueprint
            .routes
            .iter()
            .map(|route| {
                let entry = RouteEntry {
                    signal: route.signal,
                    destinations: route
                        .destinations
                        .iter()
                        .map(|d| DestinationId::new(d))
                        .collect(),
                };
                (route.name.clone(), entry)
            })
            .collect();

        info!(destinations = queues.len(), "Dispatcher built");
        Ok(Dispatcher {
            router: Router::new(consumers),
            queues,
            routes,
        })
    }
}

/// Create the exporter configured for a destination
#[instrument(
    name = "dispatcher_create_exporter",
    skip(config),
    fields(destination = %config.name, exporter = ?config.exporter)
)]
fn create_exporter(config: &DestinationConfig) -> Result<Arc<dyn Exporter>, DispatcherError> {
    match config.exporter {
        ExporterKind::Log => Ok(Arc::new(LogExporter::new(&config.name, config.verbosity))),
        ExporterKind::Nop => Ok(Arc::new(NopExporter::new(&config.name))),
        ExporterKind::Failing => {
            let exporter = FailingExporter::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::exporter_creation(&config.name, e.to_string()))?;
            Ok(Arc::new(exporter))
        }
    }
}

fn create_queue(
    config: &DestinationConfig,
    exporter: Arc<dyn Exporter>,
    observer: Arc<dyn DeliveryObserver>,
) -> DeliveryQueue {
    let capabilities = if config.mutates_data {
        Capabilities::MUTATING
    } else {
        Capabilities::READ_ONLY
    };
    DeliveryQueue::spawn(
        &config.name,
        config.queue.clone(),
        config.retry.clone(),
        exporter,
        observer,
    )
    .with_capabilities(capabilities)
}

/// First consumer of a destination: its processor chain, or the queue itself
fn destination_head(config: &DestinationConfig, queue: Arc<DeliveryQueue>) -> Arc<dyn Consumer> {
    if config.resource_attributes.is_empty() {
        return queue;
    }
    debug!(
        destination = %config.name,
        attributes = config.resource_attributes.len(),
        "Resource attributes processor attached"
    );
    Arc::new(ResourceAttributes::new(
        config.resource_attributes.clone(),
        queue,
    ))
}

struct RouteEntry {
    signal: SignalType,
    destinations: Vec<DestinationId>,
}

/// Routes batches by route name through the router into delivery queues
pub struct Dispatcher {
    router: Router,
    queues: Vec<Arc<DeliveryQueue>>,
    routes: HashMap<String, RouteEntry>,
}

impl Dispatcher {
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Route names, sorted
    pub fn route_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Signal carried by a route
    pub fn route_signal(&self, route: &str) -> Option<SignalType> {
        self.routes.get(route).map(|entry| entry.signal)
    }

    /// Consumer serving a route (cached by the router)
    pub fn route(&self, route: &str) -> Result<Arc<dyn Consumer>, DispatcherError> {
        let entry = self
            .routes
            .get(route)
            .ok_or_else(|| DispatcherError::unknown_route(route))?;
        Ok(self.router.resolve(entry.destinations.iter().cloned())?)
    }

    /// Hand one batch to every destination of a route
    #[instrument(
        name = "dispatcher_dispatch",
        skip(self, ctx, batch),
        fields(records = batch.record_count())
    )]
    pub async fn dispatch(
        &self,
        ctx: &Context,
        route: &str,
        batch: Batch,
    ) -> Result<(), DispatcherError> {
        let expected = self
            .route_signal(route)
            .ok_or_else(|| DispatcherError::unknown_route(route))?;
        if batch.signal() != expected {
            return Err(DispatcherError::SignalMismatch {
                route: route.to_string(),
                expected,
                actual: batch.signal(),
            });
        }

        let consumer = self.route(route)?;
        consumer.consume(ctx, batch).await?;
        Ok(())
    }

    /// Get metrics for all destination queues
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.queues
            .iter()
            .map(|q| (q.name().to_string(), q.metrics().snapshot()))
            .collect()
    }

    /// Drain and stop every queue
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        for queue in &self.queues {
            queue.shutdown().await;
        }
        info!("Dispatcher shutdown complete");
    }
}

/// Convenience function to create a dispatcher from a blueprint
#[instrument(name = "dispatcher_create", skip(blueprint, observer))]
pub fn create_dispatcher(
    blueprint: RouterBlueprint,
    observer: Arc<dyn DeliveryObserver>,
) -> Result<Dispatcher, DispatcherError> {
    DispatcherBuilder::new(blueprint).with_observer(observer).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::BatchSink;
    use contracts::testdata::generate_batch;
    use contracts::{QueueConfig, RetryConfig, RouteConfig, Verbosity};
    use std::collections::BTreeMap;

    fn destination(name: &str, exporter: ExporterKind) -> DestinationConfig {
        DestinationConfig {
            name: name.to_string(),
            exporter,
            verbosity: Verbosity::Basic,
            mutates_data: false,
            resource_attributes: BTreeMap::new(),
            queue: QueueConfig {
                num_workers: 1,
                ..QueueConfig::default()
            },
            retry: RetryConfig::disabled(),
            params: HashMap::new(),
        }
    }

    fn blueprint() -> RouterBlueprint {
        let mut tagged = destination("tagged", ExporterKind::Nop);
        tagged
            .resource_attributes
            .insert("env".to_string(), "test".to_string());

        RouterBlueprint {
            version: Default::default(),
            destinations: vec![
                destination("debug", ExporterKind::Log),
                destination("archive", ExporterKind::Nop),
                tagged,
            ],
            routes: vec![
                RouteConfig {
                    name: "logs/main".to_string(),
                    signal: SignalType::Logs,
                    destinations: vec!["debug".to_string(), "archive".to_string()],
                },
                RouteConfig {
                    name: "traces/tagged".to_string(),
                    signal: SignalType::Traces,
                    destinations: vec!["tagged".to_string(), "archive".to_string()],
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_create_dispatcher_from_blueprint() {
        let dispatcher = create_dispatcher(blueprint(), Arc::new(NoopObserver)).unwrap();
        assert_eq!(dispatcher.route_names(), vec!["logs/main", "traces/tagged"]);
        assert_eq!(
            dispatcher.router().list_destinations(),
            vec!["archive", "debug", "tagged"]
        );

        let ctx = Context::background();
        for _ in 0..3 {
            dispatcher
                .dispatch(&ctx, "logs/main", generate_batch(SignalType::Logs, 2))
                .await
                .unwrap();
        }
        dispatcher.shutdown().await;

        let metrics: HashMap<String, MetricsSnapshot> = dispatcher.metrics().into_iter().collect();
        assert_eq!(metrics["debug"].delivered_count, 3);
        assert_eq!(metrics["archive"].delivered_records, 6);
        assert_eq!(metrics["tagged"].delivered_count, 0);
    }

    #[tokio::test]
    async fn test_exporter_override_and_processor() {
        let tagged = Arc::new(BatchSink::new());
        let archive = Arc::new(BatchSink::new());
        let dispatcher = DispatcherBuilder::new(blueprint())
            .with_exporter("tagged", tagged.clone())
            .with_exporter("archive", archive.clone())
            .build()
            .unwrap();

        let batch = generate_batch(SignalType::Traces, 4);
        dispatcher
            .dispatch(&Context::background(), "traces/tagged", batch.clone())
            .await
            .unwrap();
        dispatcher.shutdown().await;

        let tagged_batch = tagged.all_batches()[0].clone();
        assert_eq!(tagged_batch.resource_groups()[0].attributes["env"], "test");
        assert!(!tagged_batch.same_instance(&batch));

        let archived = archive.all_batches()[0].clone();
        assert!(archived.same_instance(&batch));
        assert!(!archived.resource_groups()[0].attributes.contains_key("env"));
    }

    #[tokio::test]
    async fn test_route_is_cached() {
        let dispatcher = create_dispatcher(blueprint(), Arc::new(NoopObserver)).unwrap();
        let first = dispatcher.route("logs/main").unwrap();
        let second = dispatcher.route("logs/main").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(dispatcher.router().cached_routes(), 1);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_route_and_signal_mismatch() {
        let dispatcher = create_dispatcher(blueprint(), Arc::new(NoopObserver)).unwrap();
        let ctx = Context::background();

        let err = dispatcher
            .dispatch(&ctx, "metrics/none", generate_batch(SignalType::Metrics, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatcherError::UnknownRoute { .. }));

        let err = dispatcher
            .dispatch(&ctx, "logs/main", generate_batch(SignalType::Traces, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatcherError::SignalMismatch {
                expected: SignalType::Logs,
                actual: SignalType::Traces,
                ..
            }
        ));
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_failing_params() {
        let mut failing = destination("broken", ExporterKind::Failing);
        failing
            .params
            .insert("failure".to_string(), "sometimes".to_string());
        let blueprint = RouterBlueprint {
            version: Default::default(),
            destinations: vec![failing],
            routes: vec![],
        };

        let result = DispatcherBuilder::new(blueprint).build();
        assert!(matches!(
            result,
            Err(DispatcherError::ExporterCreation { ref name, .. }) if name == "broken"
        ));
    }
}
