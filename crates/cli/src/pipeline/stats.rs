//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::DeliverySummary;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Batches handed to the dispatcher
    pub batches_generated: u64,

    /// Records contained in those batches
    pub records_generated: u64,

    /// Batches for which at least one destination reported an error
    pub dispatch_errors: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Number of routes driven
    pub active_routes: usize,

    /// Final queue counters, per destination
    pub queues: Vec<(String, MetricsSnapshot)>,

    /// Delivery outcomes seen by the observer
    pub delivery: DeliverySummary,
}

impl PipelineStats {
    /// Batches generated per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.batches_generated as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Share of generated batches with a dispatch error, as percentage
    pub fn error_rate(&self) -> f64 {
        if self.batches_generated > 0 {
            (self.dispatch_errors as f64 / self.batches_generated as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Routes: {}", self.active_routes);
        println!("   ├─ Batches generated: {}", self.batches_generated);
        println!("   ├─ Records generated: {}", self.records_generated);
        println!("   ├─ Throughput: {:.2} batches/s", self.throughput());
        println!(
            "   └─ Dispatch errors: {} ({:.2}%)",
            self.dispatch_errors,
            self.error_rate()
        );

        if !self.queues.is_empty() {
            println!("\n📤 Destinations ({})", self.queues.len());
            for (i, (name, snapshot)) in self.queues.iter().enumerate() {
                let prefix = if i == self.queues.len() - 1 {
                    "└─"
                } else {
                    "├─"
                };
                println!(
                    "   {} {}: delivered={} failed={} dropped={} retries={}",
                    prefix,
                    name,
                    snapshot.delivered_count,
                    snapshot.failure_count,
                    snapshot.dropped_count,
                    snapshot.retry_count
                );
            }
        }

        println!("\n{}", self.delivery);
    }
}
