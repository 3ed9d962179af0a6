//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Signal Router - telemetry routing and delivery pipeline
#[derive(Parser, Debug)]
#[command(
    name = "signal-router",
    author,
    version,
    about = "Telemetry signal routing and delivery pipeline",
    long_about = "Routes telemetry batches (traces, metrics, logs, profiles) to configured \n\
                  destinations through bounded delivery queues with retry.\n\n\
                  Loads destinations and routes from configuration, generates synthetic \n\
                  batches per route and reports delivery outcomes."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SIGNAL_ROUTER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SIGNAL_ROUTER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Route synthetic batches through the configured destinations
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "router.toml",
        env = "SIGNAL_ROUTER_CONFIG"
    )]
    pub config: PathBuf,

    /// Batches generated per route
    #[arg(long, default_value = "10", env = "SIGNAL_ROUTER_BATCHES")]
    pub batches: u64,

    /// Records per generated batch
    #[arg(long, default_value = "5", env = "SIGNAL_ROUTER_RECORDS")]
    pub records: usize,

    /// Only drive these routes (repeatable; default = all routes)
    #[arg(long = "route")]
    pub routes: Vec<String>,

    /// Pause between rounds of batches in milliseconds
    #[arg(long, default_value = "0", env = "SIGNAL_ROUTER_INTERVAL_MS")]
    pub interval_ms: u64,

    /// Stop generating after this many seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "SIGNAL_ROUTER_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SIGNAL_ROUTER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "router.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "router.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show queue and retry settings of every destination
    #[arg(long)]
    pub delivery: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
