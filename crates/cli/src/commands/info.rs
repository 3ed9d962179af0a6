//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::RouterBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    destinations: Vec<DestinationInfo>,
    routes: Vec<RouteInfo>,
}

#[derive(Serialize)]
struct DestinationInfo {
    name: String,
    exporter: String,
    mutates_data: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    resource_attributes: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delivery: Option<DeliveryInfo>,
}

#[derive(Serialize)]
struct DeliveryInfo {
    queue_enabled: bool,
    queue_capacity: usize,
    num_workers: usize,
    timeout_ms: u64,
    retry_enabled: bool,
    initial_interval_ms: u64,
    max_interval_ms: u64,
    multiplier: f64,
    randomization_factor: f64,
    max_elapsed_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_attempts: Option<u32>,
}

#[derive(Serialize)]
struct RouteInfo {
    name: String,
    signal: String,
    destinations: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args.delivery);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args.delivery);
    }

    Ok(())
}

fn build_config_info(blueprint: &RouterBlueprint, delivery: bool) -> ConfigInfo {
    let destinations = blueprint
        .destinations
        .iter()
        .map(|d| DestinationInfo {
            name: d.name.clone(),
            exporter: format!("{:?}", d.exporter).to_lowercase(),
            mutates_data: d.mutates_data || !d.resource_attributes.is_empty(),
            resource_attributes: d.resource_attributes.clone(),
            delivery: delivery.then(|| DeliveryInfo {
                queue_enabled: d.queue.enabled,
                queue_capacity: d.queue.queue_capacity,
                num_workers: d.queue.num_workers,
                timeout_ms: d.queue.timeout_ms,
                retry_enabled: d.retry.enabled,
                initial_interval_ms: d.retry.initial_interval_ms,
                max_interval_ms: d.retry.max_interval_ms,
                multiplier: d.retry.multiplier,
                randomization_factor: d.retry.randomization_factor,
                max_elapsed_time_ms: d.retry.max_elapsed_time_ms,
                max_attempts: d.retry.max_attempts,
            }),
        })
        .collect();

    let routes = blueprint
        .routes
        .iter()
        .map(|r| RouteInfo {
            name: r.name.clone(),
            signal: r.signal.to_string(),
            destinations: r.destinations.clone(),
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        destinations,
        routes,
    }
}

fn print_config_info(blueprint: &RouterBlueprint, delivery: bool) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Signal Router Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Version: {:?}", blueprint.version);

    println!("\n📤 Destinations ({})", blueprint.destinations.len());
    for (i, dest) in blueprint.destinations.iter().enumerate() {
        let is_last = i == blueprint.destinations.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        let mutating = dest.mutates_data || !dest.resource_attributes.is_empty();
        println!(
            "   {} {} ({:?}{})",
            prefix,
            dest.name,
            dest.exporter,
            if mutating { ", mutating" } else { "" }
        );

        for (key, value) in &dest.resource_attributes {
            println!("   {}  ├─ attribute {} = {}", child_prefix, key, value);
        }

        if delivery {
            if dest.queue.enabled {
                println!(
                    "   {}  ├─ Queue: capacity {}, {} workers, timeout {} ms",
                    child_prefix,
                    dest.queue.queue_capacity,
                    dest.queue.num_workers,
                    dest.queue.timeout_ms
                );
            } else {
                println!("   {}  ├─ Queue: disabled (inline export)", child_prefix);
            }

            let retry = &dest.retry;
            if retry.enabled {
                let attempts = retry
                    .max_attempts
                    .map_or_else(|| "unlimited".to_string(), |n| n.to_string());
                println!(
                    "   {}  └─ Retry: {} ms → {} ms (x{}, ±{}), budget {} ms, attempts {}",
                    child_prefix,
                    retry.initial_interval_ms,
                    retry.max_interval_ms,
                    retry.multiplier,
                    retry.randomization_factor,
                    retry.max_elapsed_time_ms,
                    attempts
                );
            } else {
                println!("   {}  └─ Retry: disabled", child_prefix);
            }
        }
    }

    println!("\n🔀 Routes ({})", blueprint.routes.len());
    for (i, route) in blueprint.routes.iter().enumerate() {
        let is_last = i == blueprint.routes.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        println!(
            "   {} {} [{}] → {}",
            prefix,
            route.name,
            route.signal,
            route.destinations.join(", ")
        );
    }

    println!();
}
