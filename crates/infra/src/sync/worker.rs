//! Trigger-driven sync worker
//!
//! Consumes [`SyncCompleteEvent`]s from a bounded queue and runs each one
//! through the [`SyncService`]. Runs for the same sync key are serialised on
//! a per-key lane; runs for different keys proceed concurrently up to
//! `max_concurrent_runs`. Every run is bounded by `run_timeout`, and a failed
//! or timed-out run is logged and counted without stopping the loop.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use crmsync_domain::SyncCompleteEvent;
//! use crmsync_infra::sync::{SyncWorker, SyncWorkerConfig};
//!
//! # async fn example(service: Arc<crmsync_core::SyncService>) -> Result<(), Box<dyn std::error::Error>> {
//! let mut worker = SyncWorker::new(service, SyncWorkerConfig::default());
//! let handle = worker.start()?;
//!
//! handle.submit(SyncCompleteEvent::standard_success("hubspot", "user1", "deal")).await?;
//!
//! worker.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crmsync_core::SyncService;
use crmsync_domain::{SyncCompleteEvent, SyncConfig, SyncKey, SyncOutcome};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::errors::{WorkerError, WorkerResult};

/// Configuration for the sync worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWorkerConfig {
    /// Runs allowed in flight across all keys
    pub max_concurrent_runs: usize,
    /// Upper bound on a single run, including relationship resolution
    pub run_timeout: Duration,
    /// Queued events before `submit` waits
    pub queue_capacity: usize,
    /// How long `stop` waits for in-flight runs
    pub join_timeout: Duration,
}

impl Default for SyncWorkerConfig {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncWorkerConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_concurrent_runs: config.max_concurrent_runs.max(1),
            run_timeout: Duration::from_secs(config.run_timeout_secs),
            queue_capacity: config.queue_capacity.max(1),
            join_timeout: Duration::from_secs(config.join_timeout_secs),
        }
    }
}

/// Point-in-time worker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub received: u64,
    /// Runs that applied a batch (possibly empty)
    pub applied: u64,
    pub skipped: u64,
    pub failed: u64,
    pub timed_out: u64,
}

impl WorkerStats {
    /// Events whose run has ended, whatever the result
    pub const fn finished(&self) -> u64 {
        self.applied + self.skipped + self.failed + self.timed_out
    }
}

#[derive(Default)]
struct WorkerCounters {
    received: AtomicU64,
    applied: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

impl WorkerCounters {
    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            received: self.received.load(Ordering::Acquire),
            applied: self.applied.load(Ordering::Acquire),
            skipped: self.skipped.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            timed_out: self.timed_out.load(Ordering::Acquire),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::AcqRel);
    }
}

/// Cloneable submission side of a running [`SyncWorker`]
#[derive(Clone)]
pub struct SyncWorkerHandle {
    sender: mpsc::Sender<SyncCompleteEvent>,
}

impl SyncWorkerHandle {
    /// Queue an event, waiting while the queue is full
    pub async fn submit(&self, event: SyncCompleteEvent) -> WorkerResult<()> {
        self.sender.send(event).await.map_err(|_| WorkerError::QueueClosed)
    }
}

/// Sync worker with explicit lifecycle management.
pub struct SyncWorker {
    service: Arc<SyncService>,
    config: SyncWorkerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
    sender: Option<mpsc::Sender<SyncCompleteEvent>>,
    counters: Arc<WorkerCounters>,
}

impl SyncWorker {
    pub fn new(service: Arc<SyncService>, config: SyncWorkerConfig) -> Self {
        Self {
            service,
            config,
            cancellation: CancellationToken::new(),
            task_handle: None,
            sender: None,
            counters: Arc::new(WorkerCounters::default()),
        }
    }

    /// Start the worker, spawning the event loop.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> WorkerResult<SyncWorkerHandle> {
        if self.is_running() {
            return Err(WorkerError::AlreadyRunning);
        }

        info!(
            max_concurrent_runs = self.config.max_concurrent_runs,
            queue_capacity = self.config.queue_capacity,
            "Starting sync worker"
        );

        self.cancellation = CancellationToken::new();
        let (sender, receiver) = mpsc::channel(self.config.queue_capacity);

        let handle = tokio::spawn(Self::event_loop(
            Arc::clone(&self.service),
            receiver,
            self.config.clone(),
            self.cancellation.clone(),
            Arc::clone(&self.counters),
        ));

        self.task_handle = Some(handle);
        self.sender = Some(sender.clone());
        Ok(SyncWorkerHandle { sender })
    }

    /// Stop accepting events and wait for in-flight runs to finish.
    ///
    /// Events still queued are dropped; their keys catch up on the next
    /// trigger because watermarks only move after a successful run.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> WorkerResult<()> {
        let Some(mut handle) = self.task_handle.take() else {
            return Err(WorkerError::NotRunning);
        };

        info!("Stopping sync worker");
        self.sender = None;
        self.cancellation.cancel();

        let join_timeout = self.config.join_timeout;
        let result = match tokio::time::timeout(join_timeout, &mut handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("Sync worker task failed: {}", e);
                Err(WorkerError::TaskFailed(e.to_string()))
            }
            Err(_) => {
                warn!(timeout_secs = join_timeout.as_secs(), "Sync worker did not stop in time, aborting");
                handle.abort();
                Err(WorkerError::Timeout { seconds: join_timeout.as_secs() })
            }
        };

        self.cancellation = CancellationToken::new();
        info!("Sync worker stopped");
        result
    }

    /// Returns true when the event loop is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    /// Submission handle for the running worker
    pub fn handle(&self) -> Option<SyncWorkerHandle> {
        self.sender.clone().map(|sender| SyncWorkerHandle { sender })
    }

    pub fn stats(&self) -> WorkerStats {
        self.counters.snapshot()
    }

    async fn event_loop(
        service: Arc<SyncService>,
        mut receiver: mpsc::Receiver<SyncCompleteEvent>,
        config: SyncWorkerConfig,
        cancel: CancellationToken,
        counters: Arc<WorkerCounters>,
    ) {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_runs));
        let mut lanes: HashMap<String, Arc<Mutex<()>>> = HashMap::new();
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Sync worker event loop cancelled");
                    break;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Sync run task panicked");
                        WorkerCounters::bump(&counters.failed);
                    }
                }
                received = receiver.recv() => {
                    let Some(event) = received else {
                        debug!("Sync worker queue closed");
                        break;
                    };
                    WorkerCounters::bump(&counters.received);

                    lanes.retain(|_, lane| Arc::strong_count(lane) > 1);
                    let lane = Arc::clone(lanes.entry(lane_key(&service, &event)).or_default());

                    in_flight.spawn(run_event(
                        Arc::clone(&service),
                        event,
                        lane,
                        Arc::clone(&permits),
                        config.run_timeout,
                        Arc::clone(&counters),
                    ));
                }
            }
        }

        receiver.close();
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Sync run task panicked during shutdown");
                WorkerCounters::bump(&counters.failed);
            }
        }
    }
}

/// Serialisation key for an event
///
/// Object events whose mapping is configured share a lane per [`SyncKey`];
/// anything else is keyed by its raw provider/customer/object so it still
/// queues behind identical events.
fn lane_key(service: &SyncService, event: &SyncCompleteEvent) -> String {
    let provider = event.provider_name();
    let customer = event.customer_id();
    match event.object_name() {
        Some(object) => match service.engine().registry().resolve(provider, customer, object) {
            Some(mapper) => SyncKey::new(provider, customer, mapper.entity_kind).to_string(),
            None => format!("{provider}/{customer}/{object}"),
        },
        None => format!("{provider}/{customer}"),
    }
}

async fn run_event(
    service: Arc<SyncService>,
    event: SyncCompleteEvent,
    lane: Arc<Mutex<()>>,
    permits: Arc<Semaphore>,
    run_timeout: Duration,
    counters: Arc<WorkerCounters>,
) {
    let _lane = lane.lock_owned().await;
    let Ok(_permit) = permits.acquire_owned().await else {
        return;
    };

    let provider = event.provider_name();
    let customer_id = event.customer_id();
    let object = event.object_name().unwrap_or_default();
    let started = Instant::now();

    match tokio::time::timeout(run_timeout, service.handle_event(&event)).await {
        Ok(Ok(outcome)) => match &outcome.sync {
            SyncOutcome::Applied(report) => {
                WorkerCounters::bump(&counters.applied);
                info!(
                    provider,
                    customer_id,
                    object,
                    updated = report.updated_count,
                    resolved = outcome.resolve.map_or(0, |r| r.resolved_count),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Sync run finished"
                );
            }
            SyncOutcome::Skipped(reason) => {
                WorkerCounters::bump(&counters.skipped);
                debug!(provider, customer_id, object, %reason, "Sync run skipped");
            }
        },
        Ok(Err(e)) => {
            WorkerCounters::bump(&counters.failed);
            error!(provider, customer_id, object, error = %e, retryable = e.is_retryable(), "Sync run failed");
        }
        Err(_) => {
            WorkerCounters::bump(&counters.timed_out);
            warn!(provider, customer_id, object, timeout_secs = run_timeout.as_secs(), "Sync run timed out");
        }
    }
}
