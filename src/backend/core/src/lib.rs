#![allow(clippy::result_large_err)]
//! # Hookcron Core
//!
//! Scheduled webhook dispatcher.
//!
//! ## Architecture
//!
//! - **Jobs**: job model, schedule calculation, store, executor and the two scheduler back ends
//! - **Queue**: shared repeat queue for cluster mode (Redis or in-process)
//! - **API**: thin axum REST surface over the job manager
//! - **Telemetry**: structured logging and Prometheus metrics
//! - **Config**: layered file and environment configuration

pub mod api;
pub mod config;
pub mod error;
pub mod jobs;
pub mod telemetry;

pub use error::{ErrorCode, ErrorDetails, ErrorSeverity, HookcronError, Result};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{ErrorCode, HookcronError, Result};
    pub use crate::jobs::{
        CreateJobRequest, HttpMethod, Job, JobId, JobManager, SchedulerMode, ServiceStatus,
        UpdateJobRequest,
    };
}
