//! Delivery queue and retry configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delivery queue configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Run deliveries through a queue and worker pool
    /// (false = export inline in the caller)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Max items held at once (queued or waiting for a retry)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Number of concurrent egress workers
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    /// Per-attempt egress timeout in milliseconds (0 = none)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl QueueConfig {
    /// Largest accepted `queue_capacity` (one semaphore permit per slot)
    pub const MAX_CAPACITY: usize = tokio::sync::Semaphore::MAX_PERMITS;

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: default_queue_capacity(),
            num_workers: default_num_workers(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_num_workers() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    5_000
}

/// Retry schedule (exponential backoff)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retry transient failures at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Delay before the first retry, milliseconds
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    /// Jitter applied to every delay: delay * (1 ± factor)
    #[serde(default = "default_randomization_factor")]
    pub randomization_factor: f64,

    /// Growth factor between consecutive delays
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound of a single delay, milliseconds
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Give up once this much time passed since the first attempt,
    /// milliseconds (0 = no time limit)
    #[serde(default = "default_max_elapsed_time_ms")]
    pub max_elapsed_time_ms: u64,

    /// Give up after this many attempts in total (None = no attempt limit)
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl RetryConfig {
    /// Retries turned off: every failure is final after one attempt.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn max_elapsed_time(&self) -> Option<Duration> {
        (self.max_elapsed_time_ms > 0).then(|| Duration::from_millis(self.max_elapsed_time_ms))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_interval_ms: default_initial_interval_ms(),
            randomization_factor: default_randomization_factor(),
            multiplier: default_multiplier(),
            max_interval_ms: default_max_interval_ms(),
            max_elapsed_time_ms: default_max_elapsed_time_ms(),
            max_attempts: None,
        }
    }
}

fn default_initial_interval_ms() -> u64 {
    5_000
}

fn default_randomization_factor() -> f64 {
    0.5
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_max_interval_ms() -> u64 {
    30_000
}

fn default_max_elapsed_time_ms() -> u64 {
    300_000
}
