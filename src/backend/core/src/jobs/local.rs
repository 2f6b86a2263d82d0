//! Local Scheduler: one repeating timer per job in this process.

use async_trait::async_trait;
use chrono_tz::Tz;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::clock::Clock;
use super::executor::JobRunner;
use super::job::{Job, JobId};
use super::schedule::{resolve_time_zone, CronCadence};
use super::scheduler::{JobScheduler, SchedulerMode};
use super::timer::RepeatingTask;
use crate::error::{HookcronError, Result};
use crate::telemetry::JobMetrics;

/// How long `shutdown` waits for in-flight executions.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

/// In-memory index from job id to live timer.
pub struct LocalScheduler {
    runner: Arc<dyn JobRunner>,
    clock: Arc<dyn Clock>,
    tasks: Mutex<HashMap<JobId, RepeatingTask>>,
    drain_timeout: Duration,
}

impl LocalScheduler {
    pub fn new(runner: Arc<dyn JobRunner>, clock: Arc<dyn Clock>) -> Self {
        Self {
            runner,
            clock,
            tasks: Mutex::new(HashMap::new()),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn is_scheduled(&self, id: JobId) -> bool {
        self.tasks.lock().contains_key(&id)
    }
}

#[async_trait]
impl JobScheduler for LocalScheduler {
    fn mode(&self) -> SchedulerMode {
        SchedulerMode::Local
    }

    async fn schedule(&self, job: &Job) -> Result<()> {
        let cadence = CronCadence::parse(&job.schedule)
            .map_err(|e| HookcronError::registration_failed(job.id, e.to_string()))?;
        let tz = resolve_time_zone(&job.time_zone).unwrap_or_else(|_| {
            warn!(job_id = %job.id, time_zone = %job.time_zone, "Time zone did not resolve, timer uses UTC");
            Tz::UTC
        });

        let id = job.id;
        let runner = self.runner.clone();
        let task = RepeatingTask::start(
            id.repeat_name(),
            self.clock.clone(),
            move |after| cadence.next_after(after, tz),
            move || {
                let runner = runner.clone();
                async move { runner.run(id).await }
            },
        );

        let count = {
            let mut tasks = self.tasks.lock();
            if let Some(previous) = tasks.insert(id, task) {
                previous.stop();
            }
            tasks.len()
        };
        JobMetrics::set_scheduled_jobs(count);

        info!(job_id = %id, schedule = %job.schedule, time_zone = %tz, "Job scheduled locally");
        Ok(())
    }

    async fn unschedule(&self, id: JobId) -> Result<()> {
        let (removed, count) = {
            let mut tasks = self.tasks.lock();
            let removed = tasks.remove(&id);
            (removed, tasks.len())
        };

        if let Some(task) = removed {
            task.stop();
            JobMetrics::set_scheduled_jobs(count);
            info!(job_id = %id, "Job unscheduled locally");
        }
        Ok(())
    }

    fn active_task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    async fn shutdown(&self) {
        let tasks: Vec<RepeatingTask> = self.tasks.lock().drain().map(|(_, task)| task).collect();
        if tasks.is_empty() {
            return;
        }

        let count = tasks.len();
        for task in &tasks {
            task.stop();
        }

        let drain = futures::future::join_all(tasks.into_iter().map(RepeatingTask::join));
        if tokio::time::timeout(self.drain_timeout, drain).await.is_err() {
            warn!(
                timeout_secs = self.drain_timeout.as_secs(),
                "Timed out waiting for in-flight executions"
            );
        }

        JobMetrics::set_scheduled_jobs(0);
        info!(stopped = count, "Local scheduler stopped");
    }
}
