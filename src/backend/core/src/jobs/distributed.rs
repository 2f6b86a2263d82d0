//! Distributed Scheduler: one repeat entry per job in a shared queue.
//!
//! Every instance sharing the queue runs a [`QueueWorker`]; each due instant
//! is executed by exactly one of them.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::job::{Job, JobId};
use super::queue::{FiringPayload, QueueJobState, RepeatOptions, RepeatQueue, DEFAULT_RETENTION};
use super::scheduler::{JobScheduler, SchedulerMode};
use super::worker::WorkerHandle;
use crate::error::{HookcronError, Result};

/// Firings examined per status bucket when sweeping a removed job.
const SWEEP_WINDOW: usize = 100;

pub struct DistributedScheduler {
    queue: Arc<dyn RepeatQueue>,
    worker: Mutex<Option<WorkerHandle>>,
    retention: usize,
    stopped: AtomicBool,
}

impl DistributedScheduler {
    pub fn new(queue: Arc<dyn RepeatQueue>) -> Self {
        Self {
            queue,
            worker: Mutex::new(None),
            retention: DEFAULT_RETENTION,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn with_retention(mut self, keep: usize) -> Self {
        self.retention = keep;
        self
    }

    /// Attach the worker started for this instance; stopped on shutdown.
    pub fn with_worker(self, worker: WorkerHandle) -> Self {
        *self.worker.lock() = Some(worker);
        self
    }

    pub fn queue(&self) -> &Arc<dyn RepeatQueue> {
        &self.queue
    }

    async fn remove_entry(&self, id: JobId) -> Result<()> {
        let name = id.repeat_name();
        let entries = self.queue.repeatable_entries().await?;

        let mut removed = false;
        for entry in entries
            .iter()
            .filter(|entry| entry.job_id() == id || entry.name == name)
        {
            removed |= self
                .queue
                .remove_repeatable(&entry.name, Some(entry.job_id()))
                .await?;
        }

        if !removed {
            warn!(job_id = %id, "No repeat entry matched, removing by name");
            self.queue.remove_repeatable(&name, None).await?;
        }
        Ok(())
    }

    /// Remove firings of `id` already produced in any status bucket.
    async fn sweep_firings(&self, id: JobId) {
        for state in QueueJobState::ALL {
            let firings = match self.queue.jobs(state, 0, SWEEP_WINDOW - 1).await {
                Ok(firings) => firings,
                Err(e) => {
                    debug!(job_id = %id, state = %state, error = %e, "Could not list firings");
                    continue;
                }
            };

            for firing in firings.iter().filter(|f| f.job_id() == id) {
                if let Err(e) = self.queue.remove_job(firing).await {
                    debug!(job_id = %id, state = %state, error = %e, "Could not remove firing");
                }
            }
        }
    }
}

#[async_trait]
impl JobScheduler for DistributedScheduler {
    fn mode(&self) -> SchedulerMode {
        SchedulerMode::Distributed
    }

    async fn schedule(&self, job: &Job) -> Result<()> {
        let options = RepeatOptions::new(&job.schedule, &job.time_zone, job.id)
            .with_retention(self.retention);

        let entry = self
            .queue
            .add_repeatable(&job.id.repeat_name(), FiringPayload { job_id: job.id }, options)
            .await
            .map_err(|e| HookcronError::registration_failed(job.id, e.to_string()))?;

        info!(
            job_id = %job.id,
            queue = %self.queue.name(),
            schedule = %job.schedule,
            next = ?entry.next,
            "Job scheduled on queue"
        );
        Ok(())
    }

    async fn unschedule(&self, id: JobId) -> Result<()> {
        if let Err(e) = self.remove_entry(id).await {
            warn!(job_id = %id, error = %e, "Failed to remove repeat entry");
        }
        self.sweep_firings(id).await;

        info!(job_id = %id, queue = %self.queue.name(), "Job unscheduled from queue");
        Ok(())
    }

    fn active_task_count(&self) -> usize {
        0
    }

    async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.shutdown().await;
        }
        self.queue.close().await;
        info!(queue = %self.queue.name(), "Distributed scheduler stopped");
    }
}
