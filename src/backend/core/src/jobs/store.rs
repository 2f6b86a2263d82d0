//! Job Store: the in-memory keyed collection of jobs.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use super::clock::{Clock, SystemClock};
use super::job::{Job, JobId, JobPatch};
use super::schedule::compute_next_run;

/// Keyed job storage.
///
/// Every operation is a short critical section; none is held across an await.
pub trait JobStore: Send + Sync {
    fn create(&self, job: Job) -> Job;

    fn find_by_id(&self, id: JobId) -> Option<Job>;

    fn find_all(&self) -> Vec<Job>;

    /// Merge `patch` into the stored job and stamp `updated_at`.
    fn update(&self, id: JobId, patch: JobPatch) -> Option<Job>;

    /// Record an execution at `at`: set `last_run` and recompute `next_run`
    /// from the schedule and zone stored at the moment of the write.
    fn record_run(&self, id: JobId, at: DateTime<Utc>) -> Option<Job>;

    fn delete(&self, id: JobId) -> bool;

    fn clear(&self);

    fn count(&self) -> usize;
}

/// `JobStore` over a `RwLock<HashMap>`.
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self, job: Job) -> Job {
        self.jobs.write().insert(job.id, job.clone());
        job
    }

    fn find_by_id(&self, id: JobId) -> Option<Job> {
        self.jobs.read().get(&id).cloned()
    }

    fn find_all(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        jobs
    }

    fn update(&self, id: JobId, patch: JobPatch) -> Option<Job> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(&id)?;
        patch.apply(job);
        job.updated_at = self.clock.now();
        Some(job.clone())
    }

    fn record_run(&self, id: JobId, at: DateTime<Utc>) -> Option<Job> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(&id)?;
        job.last_run = Some(at);
        match compute_next_run(&job.schedule, &job.time_zone, at) {
            Ok(next) => job.next_run = Some(next.at),
            Err(e) => {
                error!(job_id = %id, schedule = %job.schedule, error = %e, "Could not compute next run")
            }
        }
        job.updated_at = self.clock.now();
        Some(job.clone())
    }

    fn delete(&self, id: JobId) -> bool {
        self.jobs.write().remove(&id).is_some()
    }

    fn clear(&self) {
        self.jobs.write().clear();
    }

    fn count(&self) -> usize {
        self.jobs.read().len()
    }
}
