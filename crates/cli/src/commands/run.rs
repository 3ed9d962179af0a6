//! `run` command implementation.

use anyhow::{Context as _, Result};
use contracts::{Context, RouterBlueprint};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        destinations = blueprint.destinations.len(),
        routes = blueprint.routes.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        batches_per_route: args.batches,
        records_per_batch: args.records,
        routes: args.routes.clone(),
        interval: (args.interval_ms > 0).then(|| Duration::from_millis(args.interval_ms)),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    };

    // Ctrl+C / SIGTERM cancel the root context; queued batches still drain
    let ctx = Context::background();
    let signal_ctx = ctx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping pipeline...");
        signal_ctx.cancel();
    });

    info!("Starting pipeline...");
    let stats = Pipeline::new(pipeline_config)
        .run(&ctx)
        .await
        .map_err(|e| CliError::pipeline_execution(format!("{e:#}")))?;

    info!(
        batches = stats.batches_generated,
        records = stats.records_generated,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("Signal Router finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &RouterBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Destinations ({}):", blueprint.destinations.len());
    for dest in &blueprint.destinations {
        let queue = if dest.queue.enabled {
            format!(
                "queue {} x {} workers",
                dest.queue.queue_capacity, dest.queue.num_workers
            )
        } else {
            "inline".to_string()
        };
        println!("  - {} ({:?}, {})", dest.name, dest.exporter, queue);
    }

    println!("\nRoutes ({}):", blueprint.routes.len());
    for route in &blueprint.routes {
        println!(
            "  - {} [{}] -> {}",
            route.name,
            route.signal,
            route.destinations.join(", ")
        );
    }

    println!();
}
