//! Redis-backed repeat queue.
//!
//! Key layout under `<prefix>:<queue>`:
//!
//! | key            | type | contents                                   |
//! |----------------|------|--------------------------------------------|
//! | `:repeat`      | hash | entry key → entry JSON                     |
//! | `:repeat:next` | zset | entry key, scored by next fire (epoch ms)  |
//! | `:wait`        | list | waiting firings, oldest first              |
//! | `:active`      | list | firings taken by a consumer                |
//! | `:completed`   | list | finished firings, newest first             |
//! | `:failed`      | list | failed firings, newest first               |
//!
//! A due entry is claimed by a script that advances its score only while it
//! still equals the score the promoter read; only the winner pushes the
//! firing. Requires Redis 6.2 or newer (`BLMOVE`).

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use redis::aio::MultiplexedConnection;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    FiringOutcome, FiringPayload, QueueJobState, QueuedFiring, RepeatOptions, RepeatQueue,
    RepeatableEntry,
};
use crate::config::ClusterConfig;
use crate::error::{HookcronError, Result};
use crate::jobs::clock::{Clock, SystemClock};
use crate::jobs::job::JobId;

/// Due entries examined per promotion pass.
const PROMOTE_BATCH: usize = 100;

/// Shortest blocking read; `BLMOVE` treats zero as "forever".
const MIN_BLOCK: Duration = Duration::from_millis(10);

/// Connection settings for [`RedisRepeatQueue`].
#[derive(Debug, Clone)]
pub struct RedisQueueConfig {
    pub url: String,
    pub queue_name: String,
    pub key_prefix: String,
    pub connect_timeout: Duration,
}

impl RedisQueueConfig {
    pub fn from_cluster(cluster: &ClusterConfig) -> Self {
        Self {
            url: cluster.redis_url(),
            queue_name: cluster.queue_name.clone(),
            key_prefix: cluster.key_prefix.clone(),
            connect_timeout: Duration::from_secs(cluster.connect_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueKeys {
    repeat: String,
    next: String,
    wait: String,
    active: String,
    completed: String,
    failed: String,
}

impl QueueKeys {
    fn new(prefix: &str, queue: &str) -> Self {
        let base = format!("{}:{}", prefix, queue);
        Self {
            repeat: format!("{}:repeat", base),
            next: format!("{}:repeat:next", base),
            wait: format!("{}:wait", base),
            active: format!("{}:active", base),
            completed: format!("{}:completed", base),
            failed: format!("{}:failed", base),
        }
    }

    fn list(&self, state: QueueJobState) -> Option<&str> {
        match state {
            QueueJobState::Waiting => Some(&self.wait),
            QueueJobState::Active => Some(&self.active),
            QueueJobState::Completed => Some(&self.completed),
            QueueJobState::Failed => Some(&self.failed),
            QueueJobState::Delayed => None,
        }
    }
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: f64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms as i64).single()
}

/// Parse a firing read from one of the lists, keeping its stored form.
fn parse_listed(raw: String, state: QueueJobState) -> Option<QueuedFiring> {
    match serde_json::from_str::<QueuedFiring>(&raw) {
        Ok(mut firing) => {
            firing.state = state;
            firing.raw = Some(raw);
            Some(firing)
        }
        Err(e) => {
            warn!(state = %state, error = %e, "Ignoring malformed firing");
            None
        }
    }
}

/// [`RepeatQueue`] stored in Redis.
pub struct RedisRepeatQueue {
    name: String,
    keys: QueueKeys,
    conn: MultiplexedConnection,
    /// Dedicated connection for blocking reads
    blocking: tokio::sync::Mutex<MultiplexedConnection>,
    clock: Arc<dyn Clock>,
    closed: AtomicBool,
}

impl RedisRepeatQueue {
    /// Connect and verify the broker answers `PING`.
    pub async fn connect(config: RedisQueueConfig) -> Result<Self> {
        let address = redacted(&config.url);
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| HookcronError::broker_unavailable(&address, e.to_string()))?;

        let conn = Self::open(&client, &address, config.connect_timeout).await?;
        let blocking = Self::open(&client, &address, config.connect_timeout).await?;

        info!(address = %address, queue = %config.queue_name, "Connected to broker");

        Ok(Self {
            keys: QueueKeys::new(&config.key_prefix, &config.queue_name),
            name: config.queue_name,
            conn,
            blocking: tokio::sync::Mutex::new(blocking),
            clock: Arc::new(SystemClock),
            closed: AtomicBool::new(false),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn open(
        client: &redis::Client,
        address: &str,
        timeout: Duration,
    ) -> Result<MultiplexedConnection> {
        let mut conn = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| HookcronError::broker_unavailable(address, "connection timed out"))?
            .map_err(|e| HookcronError::broker_unavailable(address, e.to_string()))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| HookcronError::broker_unavailable(address, e.to_string()))?;

        Ok(conn)
    }

    async fn entry(&self, key: &str) -> Result<Option<RepeatableEntry>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("HGET")
            .arg(&self.keys.repeat)
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(match raw {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        })
    }

    async fn delete_entry(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let (removed, _): (i64, i64) = redis::pipe()
            .atomic()
            .cmd("HDEL")
            .arg(&self.keys.repeat)
            .arg(key)
            .cmd("ZREM")
            .arg(&self.keys.next)
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    /// Advance a due entry's score from `observed` to `next`. True when this
    /// caller won the claim; a promoter that read an older score loses.
    async fn claim(&self, key: &str, observed: f64, next: Option<DateTime<Utc>>) -> Result<bool> {
        let mut conn = self.conn.clone();
        let (observed, next) = claim_args(observed, next);
        let won: i64 = redis::Script::new(CLAIM_SCRIPT)
            .key(&self.keys.next)
            .key(&self.keys.repeat)
            .arg(key)
            .arg(observed)
            .arg(next)
            .invoke_async(&mut conn)
            .await?;
        Ok(won == 1)
    }
}

/// Compare-and-set on a repeat entry's score. An empty next score removes
/// the entry and its definition.
const CLAIM_SCRIPT: &str = r#"
local current = redis.call('ZSCORE', KEYS[1], ARGV[1])
if not current or tonumber(current) ~= tonumber(ARGV[2]) then
    return 0
end
if ARGV[3] == '' then
    redis.call('ZREM', KEYS[1], ARGV[1])
    redis.call('HDEL', KEYS[2], ARGV[1])
else
    redis.call('ZADD', KEYS[1], ARGV[3], ARGV[1])
end
return 1
"#;

/// Script arguments for a claim: the observed score and the next score,
/// empty when the entry has no further firing.
fn claim_args(observed: f64, next: Option<DateTime<Utc>>) -> (i64, String) {
    let next = next.map(|at| to_millis(at).to_string()).unwrap_or_default();
    (observed as i64, next)
}

/// Strip credentials from a redis URL for logs.
fn redacted(url: &str) -> String {
    match url.split_once('@') {
        Some((_, host)) => format!("redis://{}", host),
        None => url.to_string(),
    }
}

#[async_trait]
impl RepeatQueue for RedisRepeatQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add_repeatable(
        &self,
        name: &str,
        payload: FiringPayload,
        options: RepeatOptions,
    ) -> Result<RepeatableEntry> {
        let mut entry = RepeatableEntry {
            key: options.job_id.to_string(),
            name: name.to_string(),
            payload,
            options,
            next: None,
        };
        let next = entry.next_after(self.clock.now())?;
        let stored = serde_json::to_string(&entry)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("HSET")
            .arg(&self.keys.repeat)
            .arg(&entry.key)
            .arg(stored)
            .ignore();
        match next {
            Some(at) => pipe
                .cmd("ZADD")
                .arg(&self.keys.next)
                .arg(to_millis(at))
                .arg(&entry.key)
                .ignore(),
            None => pipe.cmd("ZREM").arg(&self.keys.next).arg(&entry.key).ignore(),
        };

        let mut conn = self.conn.clone();
        pipe.query_async::<_, ()>(&mut conn).await?;

        entry.next = next;
        debug!(queue = %self.name, key = %entry.key, next = ?entry.next, "Repeat entry stored");
        Ok(entry)
    }

    async fn repeatable_entries(&self) -> Result<Vec<RepeatableEntry>> {
        let mut conn = self.conn.clone();
        let stored: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(&self.keys.repeat)
            .query_async(&mut conn)
            .await?;
        let scores: Vec<(String, f64)> = redis::cmd("ZRANGE")
            .arg(&self.keys.next)
            .arg(0)
            .arg(-1)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await?;
        let scores: HashMap<String, f64> = scores.into_iter().collect();

        let mut entries = Vec::with_capacity(stored.len());
        for (key, raw) in stored {
            match serde_json::from_str::<RepeatableEntry>(&raw) {
                Ok(mut entry) => {
                    entry.next = scores.get(&key).copied().and_then(from_millis);
                    entries.push(entry);
                }
                Err(e) => warn!(key = %key, error = %e, "Ignoring malformed repeat entry"),
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn remove_repeatable(&self, name: &str, job_id: Option<JobId>) -> Result<bool> {
        if let Some(id) = job_id {
            return self.delete_entry(&id.to_string()).await;
        }

        let mut removed = false;
        for entry in self.repeatable_entries().await? {
            if entry.name == name {
                removed |= self.delete_entry(&entry.key).await?;
            }
        }
        Ok(removed)
    }

    async fn jobs(&self, state: QueueJobState, start: usize, end: usize) -> Result<Vec<QueuedFiring>> {
        let mut conn = self.conn.clone();

        if let Some(list) = self.keys.list(state) {
            let raw: Vec<String> = redis::cmd("LRANGE")
                .arg(list)
                .arg(start)
                .arg(end)
                .query_async(&mut conn)
                .await?;
            return Ok(raw
                .into_iter()
                .filter_map(|raw| parse_listed(raw, state))
                .collect());
        }

        let scored: Vec<(String, f64)> = redis::cmd("ZRANGE")
            .arg(&self.keys.next)
            .arg(start)
            .arg(end)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await?;

        let mut delayed = Vec::with_capacity(scored.len());
        for (key, score) in scored {
            if let Some(mut entry) = self.entry(&key).await? {
                entry.next = from_millis(score);
                delayed.extend(entry.delayed_firing());
            }
        }
        Ok(delayed)
    }

    async fn remove_job(&self, firing: &QueuedFiring) -> Result<bool> {
        let Some(list) = self.keys.list(firing.state) else {
            return self.delete_entry(&firing.job_id().to_string()).await;
        };

        let raw = match &firing.raw {
            Some(raw) => raw.clone(),
            None => serde_json::to_string(firing)?,
        };
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("LREM")
            .arg(list)
            .arg(1)
            .arg(raw)
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn promote_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.clone();
        let due: Vec<(String, f64)> = redis::cmd("ZRANGEBYSCORE")
            .arg(&self.keys.next)
            .arg("-inf")
            .arg(to_millis(now))
            .arg("WITHSCORES")
            .arg("LIMIT")
            .arg(0)
            .arg(PROMOTE_BATCH)
            .query_async(&mut conn)
            .await?;

        let mut promoted = 0;
        for (key, score) in due {
            let Some(entry) = self.entry(&key).await? else {
                // Orphaned score left by a concurrent removal
                let _: i64 = redis::cmd("ZREM")
                    .arg(&self.keys.next)
                    .arg(&key)
                    .query_async(&mut conn)
                    .await?;
                continue;
            };
            let Some(due_at) = from_millis(score) else {
                continue;
            };

            let next = entry.next_after(now).unwrap_or(None);
            if !self.claim(&key, score, next).await? {
                continue;
            }

            let firing = serde_json::to_string(&entry.firing_at(due_at))?;
            let _: i64 = redis::cmd("RPUSH")
                .arg(&self.keys.wait)
                .arg(firing)
                .query_async(&mut conn)
                .await?;
            promoted += 1;
        }

        if promoted > 0 {
            debug!(queue = %self.name, promoted, "Promoted due repeat entries");
        }
        Ok(promoted)
    }

    async fn next_firing(&self, wait: Duration) -> Result<Option<QueuedFiring>> {
        if self.is_closed() {
            return Ok(None);
        }

        let block = wait.max(MIN_BLOCK);
        let mut conn = self.blocking.lock().await;
        let raw: Option<String> = redis::cmd("BLMOVE")
            .arg(&self.keys.wait)
            .arg(&self.keys.active)
            .arg("LEFT")
            .arg("RIGHT")
            .arg(block.as_secs_f64())
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        let Some(raw) = raw else {
            return Ok(None);
        };
        match parse_listed(raw.clone(), QueueJobState::Active) {
            Some(firing) => Ok(Some(firing)),
            None => {
                let mut conn = self.conn.clone();
                let _: i64 = redis::cmd("LREM")
                    .arg(&self.keys.active)
                    .arg(1)
                    .arg(raw)
                    .query_async(&mut conn)
                    .await?;
                Ok(None)
            }
        }
    }

    async fn complete(&self, firing: &QueuedFiring, outcome: FiringOutcome) -> Result<()> {
        let raw = match &firing.raw {
            Some(raw) => raw.clone(),
            None => serde_json::to_string(firing)?,
        };
        let finished = firing.finish(&outcome, self.clock.now());
        let (list, keep) = match outcome {
            FiringOutcome::Completed => (&self.keys.completed, firing.remove_on_complete),
            FiringOutcome::Failed(_) => (&self.keys.failed, firing.remove_on_fail),
        };

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("LREM")
            .arg(&self.keys.active)
            .arg(1)
            .arg(raw)
            .ignore();
        if keep > 0 {
            pipe.cmd("LPUSH")
                .arg(list)
                .arg(serde_json::to_string(&finished)?)
                .ignore()
                .cmd("LTRIM")
                .arg(list)
                .arg(0)
                .arg(keep - 1)
                .ignore();
        }

        let mut conn = self.conn.clone();
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        info!(queue = %self.name, "Broker queue closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let keys = QueueKeys::new("hookcron", "cron-jobs");
        assert_eq!(keys.repeat, "hookcron:cron-jobs:repeat");
        assert_eq!(keys.next, "hookcron:cron-jobs:repeat:next");
        assert_eq!(keys.list(QueueJobState::Waiting), Some("hookcron:cron-jobs:wait"));
        assert_eq!(keys.list(QueueJobState::Failed), Some("hookcron:cron-jobs:failed"));
        assert_eq!(keys.list(QueueJobState::Delayed), None);
    }

    #[test]
    fn test_config_from_cluster() {
        let cluster = ClusterConfig {
            redis_host: "broker".to_string(),
            redis_port: 6380,
            ..ClusterConfig::default()
        };
        let config = RedisQueueConfig::from_cluster(&cluster);
        assert_eq!(config.url, "redis://broker:6380");
        assert_eq!(config.queue_name, "cron-jobs");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_redacted_url() {
        assert_eq!(redacted("redis://:secret@broker:6379"), "redis://broker:6379");
        assert_eq!(redacted("redis://broker:6379"), "redis://broker:6379");
    }

    #[test]
    fn test_parse_listed_keeps_raw() {
        let id = JobId::new();
        let entry = RepeatableEntry {
            key: id.to_string(),
            name: id.repeat_name(),
            payload: FiringPayload { job_id: id },
            options: RepeatOptions::new("* * * * *", "UTC", id),
            next: None,
        };
        let raw = serde_json::to_string(&entry.firing_at(Utc::now())).unwrap();
        let firing = parse_listed(raw.clone(), QueueJobState::Waiting).unwrap();
        assert_eq!(firing.state, QueueJobState::Waiting);
        assert_eq!(firing.raw.as_deref(), Some(raw.as_str()));
        assert_eq!(firing.job_id(), id);

        assert!(parse_listed("not json".to_string(), QueueJobState::Waiting).is_none());
    }

    #[test]
    fn test_claim_args_carry_observed_score() {
        let due = Utc.with_ymd_and_hms(2024, 1, 1, 10, 5, 0).unwrap();
        let next = Utc.with_ymd_and_hms(2024, 1, 1, 10, 10, 0).unwrap();

        let (observed, next_score) = claim_args(to_millis(due) as f64, Some(next));
        assert_eq!(observed, to_millis(due));
        assert_eq!(next_score, to_millis(next).to_string());

        // Exhausted schedules remove the entry
        let (_, next_score) = claim_args(to_millis(due) as f64, None);
        assert!(next_score.is_empty());
    }

    #[test]
    fn test_claim_script_compares_before_writing() {
        let compare = CLAIM_SCRIPT.find("ZSCORE").unwrap();
        let write = CLAIM_SCRIPT.find("ZADD").unwrap();
        assert!(compare < write);
        assert!(CLAIM_SCRIPT.contains("~= tonumber(ARGV[2])"));
    }

    #[test]
    fn test_millis_conversion() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 10, 5, 0).unwrap();
        assert_eq!(from_millis(to_millis(at) as f64), Some(at));
    }
}
