//! Broker/Queue contract for cluster mode.
//!
//! A named queue holds one repeat entry per job. Each entry knows its cron
//! pattern and zone; when it comes due, exactly one promoter turns it into a
//! [`QueuedFiring`] on the waiting list, and exactly one consumer takes it.
//!
//! ```text
//! repeat entries ──promote_due──▶ waiting ──next_firing──▶ active ──complete──▶ completed
//!   (delayed)                                                         └──────▶ failed
//! ```
//!
//! Two back ends implement [`RepeatQueue`]:
//!
//! - [`InMemoryRepeatQueue`]: in-process; a shared instance simulates a fleet
//! - [`RedisRepeatQueue`]: Redis hashes, sorted sets and lists

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use super::job::JobId;
use super::schedule::{resolve_time_zone, CronCadence};
use crate::error::Result;

mod memory;
mod redis_backend;

pub use memory::InMemoryRepeatQueue;
pub use redis_backend::{RedisQueueConfig, RedisRepeatQueue};

/// Completed/failed records kept per entry unless configured otherwise.
pub const DEFAULT_RETENTION: usize = 10;

// ═══════════════════════════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════════════════════════

/// Status bucket of a firing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueJobState {
    #[default]
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

impl QueueJobState {
    pub const ALL: [QueueJobState; 5] = [
        Self::Waiting,
        Self::Delayed,
        Self::Active,
        Self::Completed,
        Self::Failed,
    ];
}

impl fmt::Display for QueueJobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Delayed => "delayed",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Payload carried by every firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiringPayload {
    pub job_id: JobId,
}

/// Cadence and retention of a repeat entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatOptions {
    /// 5-field cron pattern
    pub pattern: String,
    /// IANA zone the pattern is evaluated in
    pub tz: String,
    /// Key of the entry; one entry per key
    pub job_id: JobId,
    /// Completed records to keep
    pub remove_on_complete: usize,
    /// Failed records to keep
    pub remove_on_fail: usize,
}

impl RepeatOptions {
    pub fn new(pattern: impl Into<String>, tz: impl Into<String>, job_id: JobId) -> Self {
        Self {
            pattern: pattern.into(),
            tz: tz.into(),
            job_id,
            remove_on_complete: DEFAULT_RETENTION,
            remove_on_fail: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, keep: usize) -> Self {
        self.remove_on_complete = keep;
        self.remove_on_fail = keep;
        self
    }
}

/// A repeat definition stored in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatableEntry {
    pub key: String,
    pub name: String,
    pub payload: FiringPayload,
    pub options: RepeatOptions,
    /// Next fire instant; absent once the cadence is exhausted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<DateTime<Utc>>,
}

impl RepeatableEntry {
    pub fn job_id(&self) -> JobId {
        self.options.job_id
    }

    /// Next fire instant strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let cadence = CronCadence::parse(&self.options.pattern)?;
        let tz = resolve_time_zone(&self.options.tz).unwrap_or(chrono_tz::Tz::UTC);
        Ok(cadence.next_after(after, tz))
    }

    /// The firing produced when this entry comes due at `at`.
    pub fn firing_at(&self, at: DateTime<Utc>) -> QueuedFiring {
        QueuedFiring {
            id: Uuid::new_v4().to_string(),
            name: self.name.clone(),
            payload: self.payload,
            fire_at: at,
            remove_on_complete: self.options.remove_on_complete,
            remove_on_fail: self.options.remove_on_fail,
            finished_at: None,
            failed_reason: None,
            state: QueueJobState::Waiting,
            raw: None,
        }
    }

    /// The pending instance shown in the delayed bucket.
    pub fn delayed_firing(&self) -> Option<QueuedFiring> {
        let at = self.next?;
        let mut firing = self.firing_at(at);
        firing.id = format!("repeat:{}:{}", self.key, at.timestamp_millis());
        firing.state = QueueJobState::Delayed;
        Some(firing)
    }
}

/// One delivery of a repeat entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedFiring {
    pub id: String,
    pub name: String,
    pub payload: FiringPayload,
    pub fire_at: DateTime<Utc>,
    pub remove_on_complete: usize,
    pub remove_on_fail: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_reason: Option<String>,
    /// Bucket the firing was read from
    #[serde(skip)]
    pub state: QueueJobState,
    /// Exact stored form, when read from a broker list
    #[serde(skip)]
    pub raw: Option<String>,
}

impl PartialEq for QueuedFiring {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.state == other.state
    }
}

impl QueuedFiring {
    pub fn job_id(&self) -> JobId {
        self.payload.job_id
    }

    /// Copy moved to a finished bucket.
    pub fn finish(&self, outcome: &FiringOutcome, at: DateTime<Utc>) -> Self {
        let mut done = self.clone();
        done.finished_at = Some(at);
        done.raw = None;
        match outcome {
            FiringOutcome::Completed => done.state = QueueJobState::Completed,
            FiringOutcome::Failed(reason) => {
                done.state = QueueJobState::Failed;
                done.failed_reason = Some(reason.clone());
            }
        }
        done
    }
}

/// How a consumer finished a firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FiringOutcome {
    Completed,
    Failed(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// A shared queue of repeat entries and their firings.
#[async_trait]
pub trait RepeatQueue: Send + Sync {
    /// Queue name.
    fn name(&self) -> &str;

    /// Insert or replace the repeat entry keyed by `options.job_id`.
    async fn add_repeatable(
        &self,
        name: &str,
        payload: FiringPayload,
        options: RepeatOptions,
    ) -> Result<RepeatableEntry>;

    async fn repeatable_entries(&self) -> Result<Vec<RepeatableEntry>>;

    /// Remove the entry keyed by `job_id`, or every entry called `name`
    /// when no id is given. Returns whether anything was removed.
    async fn remove_repeatable(&self, name: &str, job_id: Option<JobId>) -> Result<bool>;

    /// Firings in `state`, positions `start..=end`.
    async fn jobs(&self, state: QueueJobState, start: usize, end: usize) -> Result<Vec<QueuedFiring>>;

    /// Remove one firing from the bucket it was read from.
    async fn remove_job(&self, firing: &QueuedFiring) -> Result<bool>;

    /// Turn every entry due at `now` into a waiting firing. Across all
    /// instances sharing the queue, each due instant is promoted once.
    async fn promote_due(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Take the next waiting firing, waiting up to `wait` for one.
    async fn next_firing(&self, wait: Duration) -> Result<Option<QueuedFiring>>;

    /// Move an active firing to completed or failed, trimmed to its retention.
    async fn complete(&self, firing: &QueuedFiring, outcome: FiringOutcome) -> Result<()>;

    /// Stop serving; blocked consumers return.
    async fn close(&self);

    fn is_closed(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry() -> RepeatableEntry {
        let id = JobId::new();
        RepeatableEntry {
            key: id.to_string(),
            name: id.repeat_name(),
            payload: FiringPayload { job_id: id },
            options: RepeatOptions::new("*/5 * * * *", "UTC", id),
            next: Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 5, 0).unwrap()),
        }
    }

    #[test]
    fn test_repeat_options_defaults() {
        let options = RepeatOptions::new("* * * * *", "UTC", JobId::new());
        assert_eq!(options.remove_on_complete, 10);
        assert_eq!(options.remove_on_fail, 10);
        assert_eq!(options.with_retention(3).remove_on_fail, 3);
    }

    #[test]
    fn test_entry_next_after() {
        let entry = entry();
        let next = entry
            .next_after(Utc.with_ymd_and_hms(2024, 1, 1, 10, 5, 0).unwrap())
            .unwrap();
        assert_eq!(next, Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 10, 0).unwrap()));
    }

    #[test]
    fn test_delayed_firing() {
        let entry = entry();
        let delayed = entry.delayed_firing().unwrap();
        assert_eq!(delayed.state, QueueJobState::Delayed);
        assert_eq!(delayed.job_id(), entry.job_id());
        assert!(delayed.id.starts_with("repeat:"));
    }

    #[test]
    fn test_firing_serialization_skips_local_fields() {
        let firing = entry().firing_at(Utc::now());
        let json = serde_json::to_value(&firing).unwrap();
        assert!(json.get("state").is_none());
        assert!(json.get("raw").is_none());
        assert_eq!(json["payload"]["jobId"], firing.job_id().to_string());
    }

    #[test]
    fn test_finish() {
        let firing = entry().firing_at(Utc::now());
        let failed = firing.finish(&FiringOutcome::Failed("boom".into()), Utc::now());
        assert_eq!(failed.state, QueueJobState::Failed);
        assert_eq!(failed.failed_reason.as_deref(), Some("boom"));
        assert!(failed.finished_at.is_some());
    }
}
