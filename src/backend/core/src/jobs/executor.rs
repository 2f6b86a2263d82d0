//! The execute-by-id path shared by both scheduler back ends.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::clock::Clock;
use super::job::JobId;
use super::store::JobStore;
use super::trigger::{NotifyOutcome, TriggerAction};
use crate::telemetry::JobMetrics;

/// Something a scheduler calls when a job is due.
///
/// Implementations must not fail: every error is handled inside `run`.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, id: JobId);
}

/// Why a firing did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Absent,
    Inactive,
    AlreadyRunning,
}

impl SkipReason {
    fn label(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Inactive => "inactive",
            Self::AlreadyRunning => "already_running",
        }
    }
}

/// What one call to [`JobExecutor::execute`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    Skipped(SkipReason),
    Completed { outcome: NotifyOutcome },
}

/// Reads the job, fires the Trigger Action and records `lastRun`/`nextRun`.
///
/// Executions of the same id never overlap; a firing that arrives while the
/// previous one is still running is skipped.
pub struct JobExecutor {
    store: Arc<dyn JobStore>,
    trigger: Arc<dyn TriggerAction>,
    clock: Arc<dyn Clock>,
    in_flight: DashMap<JobId, ()>,
}

/// Releases the per-id guard on drop, including on panic.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<JobId, ()>,
    id: JobId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.id);
    }
}

impl JobExecutor {
    pub fn new(
        store: Arc<dyn JobStore>,
        trigger: Arc<dyn TriggerAction>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            trigger,
            clock,
            in_flight: DashMap::new(),
        }
    }

    fn acquire(&self, id: JobId) -> Option<InFlightGuard<'_>> {
        match self.in_flight.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Some(InFlightGuard {
                    in_flight: &self.in_flight,
                    id,
                })
            }
        }
    }

    fn skip(&self, id: JobId, reason: SkipReason) -> Execution {
        debug!(job_id = %id, reason = reason.label(), "Skipping job execution");
        JobMetrics::record_skipped(reason.label());
        Execution::Skipped(reason)
    }

    /// Execute job `id` once.
    pub async fn execute(&self, id: JobId) -> Execution {
        let Some(_guard) = self.acquire(id) else {
            return self.skip(id, SkipReason::AlreadyRunning);
        };

        let job = match self.store.find_by_id(id) {
            Some(job) => job,
            None => return self.skip(id, SkipReason::Absent),
        };
        if !job.is_active {
            return self.skip(id, SkipReason::Inactive);
        }

        info!(job_id = %id, uri = %job.uri, method = %job.http_method, "Executing job");

        let started = Instant::now();
        let outcome = self
            .trigger
            .notify(&job.uri, job.http_method, job.body.as_deref())
            .await;
        JobMetrics::record_execution(outcome.label(), started.elapsed().as_secs_f64());

        // Recomputed from the stored job: an update during the call wins
        match self.store.record_run(id, self.clock.now()) {
            Some(job) => info!(
                job_id = %id,
                outcome = outcome.label(),
                next_run = ?job.next_run,
                "Job executed"
            ),
            None => debug!(job_id = %id, "Job deleted during execution, run not recorded"),
        }

        Execution::Completed { outcome }
    }
}

#[async_trait]
impl JobRunner for JobExecutor {
    async fn run(&self, id: JobId) {
        self.execute(id).await;
    }
}
