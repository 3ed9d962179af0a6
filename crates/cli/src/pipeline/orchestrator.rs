//! Pipeline orchestrator - coordinates all components.
//!
//! Builds the dispatcher from the blueprint, feeds synthetic batches to every
//! selected route, then drains the delivery queues.

use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use contracts::testdata::generate_batch;
use contracts::{Context, RouterBlueprint, SignalType};
use dispatcher::{Dispatcher, DispatcherBuilder};
use observability::DeliveryTelemetry;
use tracing::{debug, info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The router blueprint configuration
    pub blueprint: RouterBlueprint,

    /// Batches generated per route
    pub batches_per_route: u64,

    /// Records per generated batch
    pub records_per_batch: usize,

    /// Routes to drive (empty = all)
    pub routes: Vec<String>,

    /// Pause between rounds (None = no pause)
    pub interval: Option<Duration>,

    /// Stop generating after this long (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline to completion
    ///
    /// Cancelling `ctx` stops generation; queued batches are still drained and
    /// pending retries are abandoned.
    pub async fn run(self, ctx: &Context) -> Result<PipelineStats> {
        let start_time = Instant::now();

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::install_metrics_endpoint(port)?;
        }

        let routes = self.select_routes()?;

        info!("Setting up dispatcher...");
        let telemetry = DeliveryTelemetry::new();
        let dispatcher = DispatcherBuilder::new(self.config.blueprint.clone())
            .with_observer(telemetry.observer())
            .build()
            .context("Failed to create dispatcher")?;

        info!(
            destinations = self.config.blueprint.destinations.len(),
            routes = routes.len(),
            "Dispatcher started"
        );

        let mut stats = PipelineStats {
            active_routes: routes.len(),
            ..Default::default()
        };
        self.generate(ctx, &dispatcher, &telemetry, &routes, &mut stats)
            .await;

        // Shutdown
        info!("Draining delivery queues...");
        dispatcher.shutdown().await;

        stats.duration = start_time.elapsed();
        stats.queues = dispatcher.metrics();
        stats.delivery = telemetry.summary();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            batches = stats.batches_generated,
            dispatch_errors = stats.dispatch_errors,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }

    /// Routes to drive with their signal types, in blueprint order
    fn select_routes(&self) -> Result<Vec<(String, SignalType)>> {
        let blueprint = &self.config.blueprint;
        for name in &self.config.routes {
            if !blueprint.routes.iter().any(|r| &r.name == name) {
                return Err(CliError::unknown_route(name).into());
            }
        }

        let routes: Vec<_> = blueprint
            .routes
            .iter()
            .filter(|r| self.config.routes.is_empty() || self.config.routes.contains(&r.name))
            .map(|r| (r.name.clone(), r.signal))
            .collect();

        if routes.is_empty() {
            warn!("No routes configured - nothing will be generated");
        }
        Ok(routes)
    }

    async fn generate(
        &self,
        ctx: &Context,
        dispatcher: &Dispatcher,
        telemetry: &DeliveryTelemetry,
        routes: &[(String, SignalType)],
        stats: &mut PipelineStats,
    ) {
        // Stops generation only; dispatched batches keep `ctx`
        let generation = match self.config.timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.child(),
        };
        let records = self.config.records_per_batch;

        for round in 0..self.config.batches_per_route {
            for (route, signal) in routes {
                if generation.is_done() {
                    warn!(round, "Generation stopped early");
                    return;
                }

                stats.batches_generated += 1;
                stats.records_generated += records as u64;
                let batch = generate_batch(*signal, records);
                if let Err(e) = dispatcher.dispatch(ctx, route, batch).await {
                    stats.dispatch_errors += 1;
                    warn!(route = %route, error = %e, "Dispatch reported errors");
                }
            }

            let queues = dispatcher.metrics();
            telemetry.record_queue_sizes(
                queues
                    .iter()
                    .map(|(queue, snapshot)| (queue.as_str(), snapshot.queue_len)),
            );
            debug!(round, batches = stats.batches_generated, "Round dispatched");

            if let Some(interval) = self.config.interval {
                tokio::select! {
                    _ = generation.done() => {}
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }
    }
}
