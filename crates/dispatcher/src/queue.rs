//! DeliveryQueue - bounded queue with a worker pool and scheduled retries
//!
//! Item lifecycle: `Queued -> InFlight -> Delivered | RetryScheduled -> Queued | Failed`.
//!
//! `queue_capacity` bounds items that are queued or waiting for a retry; each
//! holds one slot until a worker picks it up. Retries are re-submitted at the
//! back of the queue by a timer task, so a backoff never occupies a worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    Batch, Capabilities, Consumer, Context, ContractError, DeliveryObserver, Exporter,
    QueueConfig, RetryConfig,
};

use crate::metrics::QueueMetrics;
use crate::retry::ExponentialBackoff;

/// One accepted batch plus what is needed to retry it
struct DeliveryItem {
    batch: Batch,
    ctx: Context,
    records: usize,
    attempts: u32,
    enqueued_at: Instant,
    backoff: ExponentialBackoff,
    /// Held while queued or waiting for a retry
    slot: Option<OwnedSemaphorePermit>,
}

/// Why a retry timer woke up
enum RetryWake {
    Due,
    Cancelled,
    Shutdown,
}

/// State shared between the queue handle, its workers and retry timers
struct QueueShared {
    name: String,
    capacity: usize,
    timeout: Option<Duration>,
    retry: RetryConfig,
    exporter: Arc<dyn Exporter>,
    observer: Arc<dyn DeliveryObserver>,
    metrics: Arc<QueueMetrics>,
    slots: Arc<Semaphore>,
    tx: async_channel::Sender<DeliveryItem>,
    rx: async_channel::Receiver<DeliveryItem>,
    closed: AtomicBool,
    shutdown: CancellationToken,
    retries: TaskTracker,
}

/// Bounded delivery queue in front of an [`Exporter`]
pub struct DeliveryQueue {
    shared: Arc<QueueShared>,
    enabled: bool,
    num_workers: usize,
    capabilities: Capabilities,
    workers: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl DeliveryQueue {
    /// Create a queue without starting its workers.
    ///
    /// The queue accepts items right away; they wait until [`DeliveryQueue::start`].
    pub fn new(
        name: impl Into<String>,
        queue: QueueConfig,
        retry: RetryConfig,
        exporter: Arc<dyn Exporter>,
        observer: Arc<dyn DeliveryObserver>,
    ) -> Self {
        let (tx, rx) = async_channel::unbounded();
        let name = name.into();
        let capacity = queue.queue_capacity.min(Semaphore::MAX_PERMITS);
        if capacity < queue.queue_capacity {
            warn!(
                queue = %name,
                requested = queue.queue_capacity,
                capacity,
                "Queue capacity clamped to the semaphore limit"
            );
        }

        Self {
            shared: Arc::new(QueueShared {
                name,
                capacity,
                timeout: queue.timeout(),
                retry,
                exporter,
                observer,
                metrics: Arc::new(QueueMetrics::new()),
                slots: Arc::new(Semaphore::new(capacity)),
                tx,
                rx,
                closed: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                retries: TaskTracker::new(),
            }),
            enabled: queue.enabled,
            num_workers: queue.num_workers.max(1),
            capabilities: Capabilities::READ_ONLY,
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Create a queue and start its workers
    pub fn spawn(
        name: impl Into<String>,
        queue: QueueConfig,
        retry: RetryConfig,
        exporter: Arc<dyn Exporter>,
        observer: Arc<dyn DeliveryObserver>,
    ) -> Self {
        let queue = Self::new(name, queue, retry, exporter, observer);
        queue.start();
        queue
    }

    /// Declare the capability reported when used as a [`Consumer`]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Get queue name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<QueueMetrics> {
        &self.shared.metrics
    }

    /// Whether batches pass through the queue (false = exported inline)
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Spawn the worker pool. Calling it again, or after shutdown, does nothing.
    #[instrument(name = "delivery_queue_start", skip(self), fields(queue = %self.shared.name))]
    pub fn start(&self) {
        if !self.enabled || self.shared.closed.load(Ordering::Acquire) {
            return;
        }
        if self.started.swap(true, Ordering::AcqRel) {
            debug!(queue = %self.shared.name, "Queue already started");
            return;
        }

        let mut workers = self.workers.lock();
        for id in 0..self.num_workers {
            let shared = Arc::clone(&self.shared);
            workers.push(tokio::spawn(async move {
                delivery_worker(shared, id).await;
            }));
        }
        info!(
            queue = %self.shared.name,
            workers = self.num_workers,
            capacity = self.shared.capacity,
            "Delivery queue started"
        );
    }

    /// Hand a batch to the queue (never waits)
    ///
    /// # Errors
    /// - `QueueOverflow` when every slot is taken
    /// - `QueueClosed` after shutdown
    pub fn enqueue(&self, ctx: &Context, batch: Batch) -> Result<(), ContractError> {
        let shared = &self.shared;
        let records = batch.record_count();

        if shared.closed.load(Ordering::Acquire) {
            return Err(shared.reject(records, ContractError::queue_closed(&shared.name)));
        }

        let slot = match Arc::clone(&shared.slots).try_acquire_owned() {
            Ok(slot) => slot,
            Err(_) => {
                let err = ContractError::queue_overflow(&shared.name, shared.capacity);
                warn!(queue = %shared.name, records, "Queue full, batch dropped");
                return Err(shared.reject(records, err));
            }
        };

        let item = DeliveryItem {
            batch,
            ctx: ctx.clone(),
            records,
            attempts: 0,
            enqueued_at: Instant::now(),
            backoff: ExponentialBackoff::new(&shared.retry),
            slot: Some(slot),
        };

        match shared.tx.try_send(item) {
            Ok(()) => {
                shared.metrics.set_queue_len(shared.tx.len());
                Ok(())
            }
            Err(_) => Err(shared.reject(records, ContractError::queue_closed(&shared.name))),
        }
    }

    /// Export inline, retrying in the caller until success or a final failure
    async fn export_inline(&self, ctx: &Context, batch: Batch) -> Result<(), ContractError> {
        let shared = &self.shared;
        let records = batch.record_count();
        let mut backoff = ExponentialBackoff::new(&shared.retry);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let err = match shared.attempt(ctx, &batch).await {
                Ok(()) => {
                    shared.metrics.inc_delivered(records);
                    shared.observer.on_delivered(&shared.name, records);
                    return Ok(());
                }
                Err(err) => err,
            };

            let delay = if err.is_retryable() {
                backoff.next_delay(attempts)
            } else {
                None
            };
            let Some(delay) = delay else {
                shared.fail(records, attempts, &err);
                return Err(err);
            };

            shared.metrics.inc_retry_count();
            shared.observer.on_retry(&shared.name, records, attempts, delay);
            tokio::select! {
                _ = ctx.done() => {
                    let err = ContractError::Cancelled;
                    shared.fail(records, attempts, &err);
                    return Err(err);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Stop accepting batches and finalize everything outstanding
    ///
    /// Pending retries are cancelled and reported as failed, queued batches get
    /// one last attempt each, then the exporter is shut down.
    #[instrument(name = "delivery_queue_shutdown", skip(self), fields(queue = %self.shared.name))]
    pub async fn shutdown(&self) {
        let shared = &self.shared;
        if shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        shared.shutdown.cancel();
        shared.retries.close();
        shared.retries.wait().await;

        shared.tx.close();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                error!(queue = %shared.name, error = ?e, "Worker task panicked");
            }
        }
        // Retries requested by the last attempts finalize immediately
        shared.retries.wait().await;

        // Never started: nobody drained the queue
        while let Ok(item) = shared.rx.try_recv() {
            shared.fail(
                item.records,
                item.attempts,
                &ContractError::queue_closed(&shared.name),
            );
        }
        shared.metrics.set_queue_len(0);

        if let Err(e) = shared.exporter.shutdown().await {
            error!(queue = %shared.name, error = %e, "Exporter shutdown failed");
        }
        debug!(queue = %shared.name, "DeliveryQueue shutdown complete");
    }
}

#[async_trait]
impl Consumer for DeliveryQueue {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn consume(&self, ctx: &Context, batch: Batch) -> Result<(), ContractError> {
        if self.enabled {
            self.enqueue(ctx, batch)
        } else {
            self.export_inline(ctx, batch).await
        }
    }
}

impl QueueShared {
    /// Count and report a rejected enqueue, handing the error back
    fn reject(&self, records: usize, err: ContractError) -> ContractError {
        self.metrics.inc_dropped(records);
        self.observer.on_dropped(&self.name, records, &err);
        err
    }

    /// Count and report a batch that will not be delivered
    fn fail(&self, records: usize, attempts: u32, err: &ContractError) {
        self.metrics.inc_failure_count();
        self.observer.on_failed(&self.name, records, err);
        error!(
            queue = %self.name,
            records,
            attempts,
            error = %err,
            "Delivery failed permanently"
        );
    }

    /// One egress attempt bounded by the context and the per-attempt timeout
    async fn attempt(&self, ctx: &Context, batch: &Batch) -> Result<(), ContractError> {
        if ctx.is_done() {
            return Err(ContractError::Cancelled);
        }

        let export = async {
            match self.timeout {
                Some(timeout) => {
                    let attempt_ctx = ctx.with_timeout(timeout);
                    tokio::time::timeout(timeout, self.exporter.export(&attempt_ctx, batch.clone()))
                        .await
                        .unwrap_or_else(|_| Err(ContractError::Timeout { after: timeout }))
                }
                None => self.exporter.export(&ctx.child(), batch.clone()).await,
            }
        };

        tokio::select! {
            biased;
            _ = ctx.done() => Err(ContractError::Cancelled),
            result = export => result,
        }
    }

    /// Run one in-flight item to its next state
    async fn process(self: &Arc<Self>, mut item: DeliveryItem) {
        item.attempts += 1;

        let err = match self.attempt(&item.ctx, &item.batch).await {
            Ok(()) => {
                self.metrics.inc_delivered(item.records);
                self.observer.on_delivered(&self.name, item.records);
                debug!(
                    queue = %self.name,
                    records = item.records,
                    attempts = item.attempts,
                    queued_ms = item.enqueued_at.elapsed().as_millis() as u64,
                    "Batch delivered"
                );
                return;
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            self.fail(item.records, item.attempts, &err);
            return;
        }
        if self.shutdown.is_cancelled() {
            debug!(queue = %self.name, "Queue shutting down, retry skipped");
            self.fail(item.records, item.attempts, &err);
            return;
        }
        match item.backoff.next_delay(item.attempts) {
            Some(delay) => self.schedule_retry(item, delay, err),
            None => {
                debug!(
                    queue = %self.name,
                    attempts = item.attempts,
                    elapsed_ms = item.backoff.elapsed().as_millis() as u64,
                    "Retry budget exhausted"
                );
                self.fail(item.records, item.attempts, &err);
            }
        }
    }

    /// Park the item in a timer task and re-submit it at the back of the queue
    fn schedule_retry(self: &Arc<Self>, mut item: DeliveryItem, delay: Duration, cause: ContractError) {
        match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(slot) => item.slot = Some(slot),
            Err(_) => {
                warn!(queue = %self.name, error = %cause, "No free slot to hold retry");
                let err = ContractError::queue_overflow(&self.name, self.capacity);
                self.fail(item.records, item.attempts, &err);
                return;
            }
        }

        self.metrics.inc_retry_count();
        self.observer
            .on_retry(&self.name, item.records, item.attempts, delay);
        debug!(
            queue = %self.name,
            attempt = item.attempts,
            delay_ms = delay.as_millis() as u64,
            error = %cause,
            "Retry scheduled"
        );

        let shared = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        let ctx = item.ctx.clone();
        self.retries.spawn(async move {
            let wake = tokio::select! {
                biased;
                _ = shutdown.cancelled() => RetryWake::Shutdown,
                _ = ctx.done() => RetryWake::Cancelled,
                _ = tokio::time::sleep(delay) => RetryWake::Due,
            };

            match wake {
                RetryWake::Due => shared.resubmit(item),
                RetryWake::Cancelled => {
                    shared.fail(item.records, item.attempts, &ContractError::Cancelled);
                }
                RetryWake::Shutdown => {
                    let err = ContractError::queue_closed(&shared.name);
                    shared.fail(item.records, item.attempts, &err);
                }
            }
        });
    }

    fn resubmit(&self, item: DeliveryItem) {
        match self.tx.try_send(item) {
            Ok(()) => self.metrics.set_queue_len(self.tx.len()),
            Err(e) => {
                let item = e.into_inner();
                let err = ContractError::queue_closed(&self.name);
                self.fail(item.records, item.attempts, &err);
            }
        }
    }
}

/// Worker task that pulls items and exports them
#[instrument(
    name = "delivery_worker_loop",
    skip(shared),
    fields(queue = %shared.name)
)]
async fn delivery_worker(shared: Arc<QueueShared>, id: usize) {
    debug!(queue = %shared.name, worker = id, "Delivery worker started");

    while let Ok(mut item) = shared.rx.recv().await {
        // In flight: the slot goes back to producers
        item.slot.take();
        shared.metrics.set_queue_len(shared.rx.len());

        shared.process(item).await;
    }

    debug!(queue = %shared.name, worker = id, "Delivery worker stopped");
}
