//! Queue worker for cluster mode.
//!
//! Each instance runs one worker against the shared queue. The worker has two
//! loops:
//!
//! - a promoter that turns due repeat entries into waiting firings
//! - a consumer that takes firings and runs them, bounded by a semaphore

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::clock::Clock;
use super::executor::JobRunner;
use super::queue::{FiringOutcome, QueuedFiring, RepeatQueue};
use super::timer::panic_message;
use crate::config::ClusterConfig;

/// Configuration for the queue worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum concurrent firings
    pub concurrency: usize,
    /// Interval between promotion passes, also the longest idle wait (milliseconds)
    pub poll_interval_ms: u64,
    /// Shutdown timeout (seconds)
    pub shutdown_timeout_secs: u64,
    /// Worker name/identifier
    pub name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval_ms: 1000,
            shutdown_timeout_secs: 30,
            name: "hookcron-worker".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn from_cluster(cluster: &ClusterConfig) -> Self {
        Self {
            concurrency: cluster.worker_concurrency.max(1),
            poll_interval_ms: cluster.poll_interval_ms.max(1),
            name: format!("{}-worker", cluster.queue_name),
            ..Self::default()
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Statistics for the queue worker.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Firings taken from the queue
    pub processed: Arc<AtomicU64>,
    /// Firings whose run returned normally
    pub succeeded: Arc<AtomicU64>,
    /// Firings whose run panicked
    pub failed: Arc<AtomicU64>,
    /// Firings running now
    pub active: Arc<AtomicU64>,
    /// Due entries this worker promoted
    pub promoted: Arc<AtomicU64>,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }

    pub fn promoted(&self) -> u64 {
        self.promoted.load(Ordering::Relaxed)
    }
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    name: String,
    shutdown: watch::Sender<bool>,
    stats: WorkerStats,
    tasks: Vec<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl WorkerHandle {
    /// Signal the worker to stop taking firings.
    pub fn signal(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Signal shutdown and wait for in-flight firings, up to the timeout.
    pub async fn shutdown(self) {
        self.signal();
        let drain = futures::future::join_all(self.tasks);
        if tokio::time::timeout(self.shutdown_timeout, drain).await.is_err() {
            warn!(
                worker = %self.name,
                timeout_secs = self.shutdown_timeout.as_secs(),
                "Timed out waiting for worker to drain"
            );
        }
    }

    /// Get worker statistics.
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }
}

/// Worker that promotes and consumes firings of a [`RepeatQueue`].
pub struct QueueWorker {
    config: WorkerConfig,
    stats: WorkerStats,
    queue: Arc<dyn RepeatQueue>,
    runner: Arc<dyn JobRunner>,
    clock: Arc<dyn Clock>,
}

impl QueueWorker {
    pub fn new(
        config: WorkerConfig,
        queue: Arc<dyn RepeatQueue>,
        runner: Arc<dyn JobRunner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            stats: WorkerStats::new(),
            queue,
            runner,
            clock,
        }
    }

    /// Start both loops, returning a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            worker = %self.config.name,
            queue = %self.queue.name(),
            concurrency = self.config.concurrency,
            "Queue worker started"
        );

        let promoter = tokio::spawn(promote_loop(
            self.config.clone(),
            self.queue.clone(),
            self.clock.clone(),
            self.stats.clone(),
            shutdown_rx.clone(),
        ));
        let consumer = tokio::spawn(consume_loop(
            self.config.clone(),
            self.queue.clone(),
            self.runner.clone(),
            self.stats.clone(),
            shutdown_rx,
        ));

        WorkerHandle {
            name: self.config.name.clone(),
            shutdown: shutdown_tx,
            stats: self.stats,
            tasks: vec![promoter, consumer],
            shutdown_timeout: Duration::from_secs(self.config.shutdown_timeout_secs),
        }
    }
}

fn stopping(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}

async fn promote_loop(
    config: WorkerConfig,
    queue: Arc<dyn RepeatQueue>,
    clock: Arc<dyn Clock>,
    stats: WorkerStats,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        if queue.is_closed() {
            break;
        }
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || stopping(&shutdown_rx) {
                    break;
                }
            }
            _ = ticker.tick() => {
                match queue.promote_due(clock.now()).await {
                    Ok(promoted) => {
                        stats.promoted.fetch_add(promoted as u64, Ordering::Relaxed);
                    }
                    Err(e) => warn!(worker = %config.name, error = %e, "Promotion pass failed"),
                }
            }
        }
    }

    debug!(worker = %config.name, "Promoter stopped");
}

async fn consume_loop(
    config: WorkerConfig,
    queue: Arc<dyn RepeatQueue>,
    runner: Arc<dyn JobRunner>,
    stats: WorkerStats,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let poll_interval = config.poll_interval();

    loop {
        if stopping(&shutdown_rx) || queue.is_closed() {
            break;
        }

        let permit = tokio::select! {
            changed = shutdown_rx.changed() => match changed {
                Ok(()) => continue,
                Err(_) => break,
            },
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        // Not raced against shutdown: a firing moved to active must be run
        let firing = match queue.next_firing(poll_interval).await {
            Ok(Some(firing)) => firing,
            Ok(None) => continue,
            Err(e) => {
                warn!(worker = %config.name, error = %e, "Failed to take next firing");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        stats.processed.fetch_add(1, Ordering::Relaxed);
        let queue = queue.clone();
        let runner = runner.clone();
        let stats = stats.clone();
        let worker = config.name.clone();

        tokio::spawn(async move {
            let _permit = permit;
            run_firing(&worker, queue.as_ref(), runner.as_ref(), &stats, firing).await;
        });
    }

    // Wait for in-flight firings to release their permits
    let _ = semaphore.acquire_many(config.concurrency as u32).await;
    info!(worker = %config.name, "Worker stopped");
}

async fn run_firing(
    worker: &str,
    queue: &dyn RepeatQueue,
    runner: &dyn JobRunner,
    stats: &WorkerStats,
    firing: QueuedFiring,
) {
    let job_id = firing.job_id();
    stats.active.fetch_add(1, Ordering::Relaxed);
    debug!(worker, job_id = %job_id, fire_at = %firing.fire_at, "Running firing");

    let outcome = match AssertUnwindSafe(runner.run(job_id)).catch_unwind().await {
        Ok(()) => {
            stats.succeeded.fetch_add(1, Ordering::Relaxed);
            FiringOutcome::Completed
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(worker, job_id = %job_id, panic = %message, "Firing panicked");
            stats.failed.fetch_add(1, Ordering::Relaxed);
            FiringOutcome::Failed(message)
        }
    };

    if let Err(e) = queue.complete(&firing, outcome).await {
        warn!(worker, job_id = %job_id, error = %e, "Failed to record firing outcome");
    }
    stats.active.fetch_sub(1, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::clock::MonotonicClock;
    use crate::jobs::job::JobId;
    use crate::jobs::queue::{FiringPayload, InMemoryRepeatQueue, QueueJobState, RepeatOptions};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        runs: Mutex<Vec<JobId>>,
        panic: bool,
    }

    #[async_trait]
    impl JobRunner for RecordingRunner {
        async fn run(&self, id: JobId) {
            self.runs.lock().push(id);
            if self.panic {
                panic!("runner exploded");
            }
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(MonotonicClock::starting_at(
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 30).unwrap(),
        ))
    }

    fn config(name: &str) -> WorkerConfig {
        WorkerConfig {
            poll_interval_ms: 250,
            shutdown_timeout_secs: 5,
            name: name.to_string(),
            ..WorkerConfig::default()
        }
    }

    async fn every_minute(queue: &InMemoryRepeatQueue) -> JobId {
        let id = JobId::new();
        queue
            .add_repeatable(
                &id.repeat_name(),
                FiringPayload { job_id: id },
                RepeatOptions::new("* * * * *", "UTC", id),
            )
            .await
            .unwrap();
        id
    }

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn test_worker_config_from_cluster() {
        let cluster = ClusterConfig {
            worker_concurrency: 0,
            poll_interval_ms: 200,
            ..ClusterConfig::default()
        };
        let config = WorkerConfig::from_cluster(&cluster);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.poll_interval_ms, 200);
        assert_eq!(config.name, "cron-jobs-worker");
    }

    #[test]
    fn test_worker_stats() {
        let stats = WorkerStats::new();
        assert_eq!(stats.processed(), 0);
        assert_eq!(stats.succeeded(), 0);
        assert_eq!(stats.failed(), 0);
        assert_eq!(stats.active(), 0);

        stats.processed.fetch_add(1, Ordering::Relaxed);
        assert_eq!(stats.processed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_runs_due_firing() {
        let clock = clock();
        let queue = Arc::new(InMemoryRepeatQueue::with_clock("q", clock.clone()));
        let id = every_minute(&queue).await;
        let runner = Arc::new(RecordingRunner::default());

        let handle = QueueWorker::new(config("w"), queue.clone(), runner.clone(), clock).start();

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(runner.runs.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*runner.runs.lock(), vec![id]);
        assert_eq!(handle.stats().succeeded(), 1);

        let completed = queue.jobs(QueueJobState::Completed, 0, 10).await.unwrap();
        assert_eq!(completed.len(), 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_queue_fires_once_across_workers() {
        let clock = clock();
        let queue = Arc::new(InMemoryRepeatQueue::with_clock("q", clock.clone()));
        let id = every_minute(&queue).await;
        let runner = Arc::new(RecordingRunner::default());

        let a = QueueWorker::new(config("a"), queue.clone(), runner.clone(), clock.clone()).start();
        let b = QueueWorker::new(config("b"), queue.clone(), runner.clone(), clock).start();

        // Fires at 10:01 and 10:02
        tokio::time::sleep(Duration::from_secs(91)).await;
        assert_eq!(*runner.runs.lock(), vec![id, id]);
        assert_eq!(a.stats().promoted() + b.stats().promoted(), 2);

        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_run_marks_firing_failed() {
        let clock = clock();
        let queue = Arc::new(InMemoryRepeatQueue::with_clock("q", clock.clone()));
        every_minute(&queue).await;
        let runner = Arc::new(RecordingRunner {
            panic: true,
            ..RecordingRunner::default()
        });

        let handle = QueueWorker::new(config("w"), queue.clone(), runner, clock).start();
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(handle.stats().failed(), 1);
        let failed = queue.jobs(QueueJobState::Failed, 0, 10).await.unwrap();
        assert_eq!(failed[0].failed_reason.as_deref(), Some("runner exploded"));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_consuming() {
        let clock = clock();
        let queue = Arc::new(InMemoryRepeatQueue::with_clock("q", clock.clone()));
        every_minute(&queue).await;
        let runner = Arc::new(RecordingRunner::default());

        let handle = QueueWorker::new(config("w"), queue, runner.clone(), clock).start();
        handle.shutdown().await;

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(runner.runs.lock().is_empty());
    }
}
