//! Exponential backoff schedule for delivery retries

use std::time::Duration;

use contracts::RetryConfig;
use rand::Rng;
use tokio::time::Instant;

/// Per-item backoff state.
///
/// Started when the item is first enqueued; `next_delay` is consulted after
/// every failed attempt.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    enabled: bool,
    current: Duration,
    multiplier: f64,
    max_interval: Duration,
    randomization_factor: f64,
    max_elapsed_time: Option<Duration>,
    max_attempts: Option<u32>,
    started: Instant,
}

impl ExponentialBackoff {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            enabled: config.enabled,
            current: config.initial_interval(),
            multiplier: config.multiplier.max(1.0),
            max_interval: config.max_interval(),
            randomization_factor: config.randomization_factor.clamp(0.0, 1.0),
            max_elapsed_time: config.max_elapsed_time(),
            max_attempts: config.max_attempts,
            started: Instant::now(),
        }
    }

    /// Time since the schedule started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Delay before the next attempt, given how many attempts were made so far.
    ///
    /// Returns `None` once retries are disabled or the attempt/time budget is
    /// exhausted. A delay that would end past `max_elapsed_time` counts as
    /// exhausted.
    pub fn next_delay(&mut self, attempts_made: u32) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        if self.max_attempts.is_some_and(|max| attempts_made >= max) {
            return None;
        }

        let delay = self.randomized(self.current);
        self.current = self.grown(self.current);

        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.elapsed().saturating_add(delay) > max_elapsed {
                return None;
            }
        }
        Some(delay)
    }

    /// `interval * multiplier`, capped at `max_interval` (also on overflow)
    fn grown(&self, interval: Duration) -> Duration {
        Duration::try_from_secs_f64(interval.as_secs_f64() * self.multiplier)
            .map_or(self.max_interval, |next| next.min(self.max_interval))
    }

    fn randomized(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 || interval.is_zero() {
            return interval;
        }
        let delta = self.randomization_factor;
        let factor = rand::rng().random_range((1.0 - delta)..=(1.0 + delta));
        Duration::try_from_secs_f64(interval.as_secs_f64() * factor).unwrap_or(interval)
    }
}
