//! Scheduler capability.
//!
//! The manager registers and removes jobs through [`JobScheduler`] and never
//! depends on which back end is behind it:
//!
//! - [`LocalScheduler`](super::local::LocalScheduler): one timer per job in this process
//! - [`DistributedScheduler`](super::distributed::DistributedScheduler): one repeat
//!   entry per job in a shared broker queue

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::job::{Job, JobId};
use crate::error::Result;

/// Which back end is active. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerMode {
    Local,
    Distributed,
}

impl fmt::Display for SchedulerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Distributed => write!(f, "distributed"),
        }
    }
}

/// Register and remove job cadences.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    fn mode(&self) -> SchedulerMode;

    /// Start firing `job` on its cron cadence.
    ///
    /// Registering an id that is already registered replaces the previous
    /// registration; the job never ends up with two live cadences.
    async fn schedule(&self, job: &Job) -> Result<()>;

    /// Stop firing `id`. Unknown ids are a no-op.
    async fn unschedule(&self, id: JobId) -> Result<()>;

    /// Live local timers (always zero for the distributed back end).
    fn active_task_count(&self) -> usize;

    /// Stop all timers or workers and release broker connections.
    ///
    /// Safe to call more than once.
    async fn shutdown(&self);
}
