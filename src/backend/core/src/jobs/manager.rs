//! Job Manager: validation, store writes and scheduler registration.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use super::clock::{Clock, SystemClock};
use super::distributed::DistributedScheduler;
use super::executor::{Execution, JobExecutor};
use super::job::{CreateJobRequest, Job, JobId, JobPatch, ServiceStatus, UpdateJobRequest};
use super::local::LocalScheduler;
use super::queue::{RedisQueueConfig, RedisRepeatQueue, RepeatQueue, DEFAULT_RETENTION};
use super::schedule::{compute_next_run, resolve_time_zone, validate_schedule};
use super::scheduler::{JobScheduler, SchedulerMode};
use super::store::{InMemoryJobStore, JobStore};
use super::trigger::{HttpNotifier, TriggerAction};
use super::worker::{QueueWorker, WorkerConfig};
use crate::config::{Config, NotifierConfig};
use crate::error::{HookcronError, Result};
use crate::telemetry::JobMetrics;

const FALLBACK_TIME_ZONE: &str = "UTC";

enum Backend {
    Local,
    Distributed {
        queue: Arc<dyn RepeatQueue>,
        worker: WorkerConfig,
        retention: usize,
    },
}

/// Wiring for a [`JobManager`].
///
/// Defaults: in-memory store, system clock, HTTP notifier with default
/// settings, local scheduler.
pub struct JobManagerBuilder {
    store: Option<Arc<dyn JobStore>>,
    trigger: Option<Arc<dyn TriggerAction>>,
    clock: Arc<dyn Clock>,
    default_time_zone: String,
    backend: Backend,
}

impl JobManagerBuilder {
    fn new() -> Self {
        Self {
            store: None,
            trigger: None,
            clock: Arc::new(SystemClock),
            default_time_zone: FALLBACK_TIME_ZONE.to_string(),
            backend: Backend::Local,
        }
    }

    pub fn store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn trigger(mut self, trigger: Arc<dyn TriggerAction>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn default_time_zone(mut self, tz: impl Into<String>) -> Self {
        self.default_time_zone = tz.into();
        self
    }

    /// Use the shared queue and start a worker on it.
    pub fn distributed(mut self, queue: Arc<dyn RepeatQueue>, worker: WorkerConfig) -> Self {
        self.backend = Backend::Distributed {
            queue,
            worker,
            retention: DEFAULT_RETENTION,
        };
        self
    }

    /// Completed/failed records kept per repeat entry (distributed only).
    pub fn retention(mut self, keep: usize) -> Self {
        if let Backend::Distributed { retention, .. } = &mut self.backend {
            *retention = keep;
        }
        self
    }

    /// Build the manager. The distributed back end spawns its worker, so this
    /// must run inside a tokio runtime.
    pub fn build(self) -> Result<JobManager> {
        let clock = self.clock;
        let store = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryJobStore::with_clock(clock.clone())),
        };
        let trigger = match self.trigger {
            Some(trigger) => trigger,
            None => Arc::new(HttpNotifier::new(&NotifierConfig::default())?),
        };

        let default_time_zone = match resolve_time_zone(&self.default_time_zone) {
            Ok(tz) => tz.name().to_string(),
            Err(e) => {
                warn!(time_zone = %self.default_time_zone, error = %e, "Default time zone did not resolve, using UTC");
                FALLBACK_TIME_ZONE.to_string()
            }
        };

        let executor = Arc::new(JobExecutor::new(store.clone(), trigger, clock.clone()));

        let scheduler: Arc<dyn JobScheduler> = match self.backend {
            Backend::Local => Arc::new(LocalScheduler::new(executor.clone(), clock.clone())),
            Backend::Distributed {
                queue,
                worker,
                retention,
            } => {
                let handle =
                    QueueWorker::new(worker, queue.clone(), executor.clone(), clock.clone()).start();
                Arc::new(
                    DistributedScheduler::new(queue)
                        .with_retention(retention)
                        .with_worker(handle),
                )
            }
        };

        Ok(JobManager {
            store,
            scheduler,
            executor,
            clock,
            default_time_zone,
            initialized: AtomicBool::new(true),
            job_locks: DashMap::new(),
        })
    }
}

/// Owns the store, the active scheduler and the execution path.
pub struct JobManager {
    store: Arc<dyn JobStore>,
    scheduler: Arc<dyn JobScheduler>,
    executor: Arc<JobExecutor>,
    clock: Arc<dyn Clock>,
    default_time_zone: String,
    initialized: AtomicBool,
    /// Serializes create/update/delete of one id across their awaits
    job_locks: DashMap<JobId, Arc<Mutex<()>>>,
}

impl JobManager {
    pub fn builder() -> JobManagerBuilder {
        JobManagerBuilder::new()
    }

    /// Wire the manager from configuration.
    ///
    /// In cluster mode the broker must answer within the connect timeout;
    /// otherwise startup fails rather than falling back to local timers.
    pub async fn start(config: &Config) -> Result<Self> {
        let trigger = Arc::new(HttpNotifier::new(&config.notifier)?);
        let mut builder = Self::builder()
            .trigger(trigger)
            .default_time_zone(&config.scheduler.default_time_zone);

        if config.cluster.enabled {
            let queue = RedisRepeatQueue::connect(RedisQueueConfig::from_cluster(&config.cluster))
                .await
                .map_err(|e| {
                    error!(
                        address = %config.cluster.redis_address(),
                        error = %e,
                        "Broker unreachable, cluster mode not started"
                    );
                    e
                })?;
            builder = builder
                .distributed(Arc::new(queue), WorkerConfig::from_cluster(&config.cluster))
                .retention(config.cluster.retention);
        }

        let manager = builder.build()?;
        info!(mode = %manager.mode(), "Job manager started");
        Ok(manager)
    }

    pub fn mode(&self) -> SchedulerMode {
        self.scheduler.mode()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(HookcronError::not_initialized())
        }
    }

    async fn lock_job(&self, id: JobId) -> OwnedMutexGuard<()> {
        let lock = self.job_locks.entry(id).or_default().clone();
        lock.lock_owned().await
    }

    /// Resolve a requested zone, substituting the default when it is absent
    /// or unknown.
    fn normalize_time_zone(&self, requested: Option<&str>) -> String {
        match requested {
            None => self.default_time_zone.clone(),
            Some(name) => match resolve_time_zone(name) {
                Ok(tz) => tz.name().to_string(),
                Err(e) => {
                    warn!(
                        time_zone = %name,
                        default = %self.default_time_zone,
                        error = %e,
                        "Invalid time zone, using default"
                    );
                    self.default_time_zone.clone()
                }
            },
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate, store and schedule a new job.
    ///
    /// A scheduling failure is returned to the caller; the job stays stored.
    pub async fn create_job(&self, request: CreateJobRequest) -> Result<Job> {
        self.ensure_initialized()?;
        request.validate()?;
        validate_schedule(&request.schedule)?;

        let time_zone = self.normalize_time_zone(request.time_zone.as_deref());
        let now = self.clock.now();
        let next_run = compute_next_run(&request.schedule, &time_zone, now)?;

        let id = JobId::new();
        let _guard = self.lock_job(id).await;
        let job = self.store.create(Job {
            id,
            uri: request.uri,
            http_method: request.http_method,
            body: request.body,
            schedule: request.schedule,
            time_zone,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_run: None,
            next_run: Some(next_run.at),
        });

        info!(
            job_id = %job.id,
            uri = %job.uri,
            schedule = %job.schedule,
            time_zone = %job.time_zone,
            next_run = %next_run.at,
            "Job created"
        );
        JobMetrics::record_created();

        self.scheduler.schedule(&job).await.map_err(|e| {
            error!(job_id = %job.id, error = %e, "Job stored but not scheduled");
            e
        })?;

        Ok(job)
    }

    /// Apply a partial update.
    ///
    /// Returns `Ok(None)` when the job vanished between the lookup and the
    /// write.
    pub async fn update_job(&self, id: JobId, request: UpdateJobRequest) -> Result<Option<Job>> {
        self.ensure_initialized()?;
        let _guard = self.lock_job(id).await;
        let Some(existing) = self.store.find_by_id(id) else {
            self.job_locks.remove(&id);
            return Err(HookcronError::job_not_found(id));
        };

        request.validate()?;
        if let Some(schedule) = &request.schedule {
            validate_schedule(schedule)?;
        }

        self.scheduler.unschedule(id).await?;

        let recompute = request.touches_cadence();
        let mut patch = JobPatch::from(request);
        if recompute {
            let time_zone = match patch.time_zone.as_deref() {
                Some(requested) => self.normalize_time_zone(Some(requested)),
                None => existing.time_zone.clone(),
            };
            let schedule = patch.schedule.as_deref().unwrap_or(&existing.schedule);
            let next_run = compute_next_run(schedule, &time_zone, self.clock.now())?;
            patch.time_zone = Some(time_zone);
            patch.next_run = Some(next_run.at);
        }

        let Some(job) = self.store.update(id, patch) else {
            warn!(job_id = %id, "Job deleted during update");
            return Ok(None);
        };

        if job.is_active {
            self.scheduler.schedule(&job).await?;
        }

        info!(
            job_id = %id,
            is_active = job.is_active,
            next_run = ?job.next_run,
            "Job updated"
        );
        Ok(Some(job))
    }

    /// Unschedule and remove a job. Unknown ids return `false`.
    pub async fn delete_job(&self, id: JobId) -> Result<bool> {
        self.ensure_initialized()?;
        let _guard = self.lock_job(id).await;
        if self.store.find_by_id(id).is_none() {
            self.job_locks.remove(&id);
            return Ok(false);
        }

        self.scheduler.unschedule(id).await?;
        let deleted = self.store.delete(id);
        self.job_locks.remove(&id);
        if deleted {
            JobMetrics::record_deleted();
            info!(job_id = %id, "Job deleted");
        }
        Ok(deleted)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get_job(&self, id: JobId) -> Option<Job> {
        self.store.find_by_id(id)
    }

    pub fn list_jobs(&self) -> Vec<Job> {
        self.store.find_all()
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            initialized: self.is_initialized(),
            cluster_mode: self.mode() == SchedulerMode::Distributed,
            active_local_task_count: self.scheduler.active_task_count(),
            total_job_count: self.store.count(),
        }
    }

    /// Run a job once through the same path the schedulers use.
    pub async fn execute_job(&self, id: JobId) -> Execution {
        self.executor.execute(id).await
    }

    /// Stop timers or the queue worker. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        if !self.initialized.swap(false, Ordering::SeqCst) {
            return;
        }
        self.scheduler.shutdown().await;
        info!(mode = %self.mode(), "Job manager shut down");
    }
}
