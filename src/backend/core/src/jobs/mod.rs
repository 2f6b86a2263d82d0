//! Scheduled webhook jobs.
//!
//! This module provides the whole scheduling engine:
//!
//! - **Job Manager**: validation, store writes and scheduler registration
//! - **Schedule Calculator**: the displayed `nextRun` with an explicit fallback chain
//! - **Schedulers**: local timers or a shared broker queue behind one capability
//! - **Executor**: the execute-by-id path both schedulers call
//! - **Trigger Action**: the HTTP notifier that never fails its caller
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                                JobManager                                   │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐    ┌──────────────────────────────┐    ┌────────────────┐  │
//! │  │  JobStore   │◀──▶│        JobScheduler          │───▶│  JobExecutor   │  │
//! │  │ (in memory) │    │  LocalScheduler (timers)     │    │  (per-id guard)│  │
//! │  └─────────────┘    │  DistributedScheduler        │    └───────┬────────┘  │
//! │         ▲           │    └─ RepeatQueue + Worker   │            │           │
//! │         │           └──────────────────────────────┘            ▼           │
//! │         │                                               ┌────────────────┐  │
//! │         └──────────── lastRun / nextRun ────────────────│ TriggerAction  │  │
//! │                                                         │ (HttpNotifier) │  │
//! │                                                         └────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use hookcron_core::jobs::{CreateJobRequest, HttpMethod, JobManager};
//!
//! let manager = JobManager::start(&config).await?;
//! let job = manager
//!     .create_job(CreateJobRequest::new("http://x/hook", HttpMethod::Post, "*/5 * * * *"))
//!     .await?;
//! println!("next run at {:?}", job.next_run);
//!
//! manager.shutdown().await;
//! ```

pub mod clock;
pub mod distributed;
pub mod executor;
pub mod job;
pub mod local;
pub mod manager;
pub mod queue;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod timer;
pub mod trigger;
pub mod worker;

pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use distributed::DistributedScheduler;
pub use executor::{Execution, JobExecutor, JobRunner, SkipReason};
pub use job::{
    CreateJobRequest, HttpMethod, Job, JobId, JobPatch, ServiceStatus, UpdateJobRequest,
};
pub use local::LocalScheduler;
pub use manager::{JobManager, JobManagerBuilder};
pub use queue::{
    FiringOutcome, FiringPayload, InMemoryRepeatQueue, QueueJobState, QueuedFiring,
    RedisQueueConfig, RedisRepeatQueue, RepeatOptions, RepeatQueue, RepeatableEntry,
};
pub use schedule::{compute_next_run, validate_schedule, CronCadence, NextRun, Recovery, ScheduleError};
pub use scheduler::{JobScheduler, SchedulerMode};
pub use store::{InMemoryJobStore, JobStore};
pub use timer::RepeatingTask;
pub use trigger::{HttpNotifier, NotifyFailure, NotifyOutcome, TriggerAction, WebhookPayload};
pub use worker::{QueueWorker, WorkerConfig, WorkerHandle, WorkerStats};
