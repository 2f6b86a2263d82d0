//! In-process repeat queue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

use super::{
    FiringOutcome, FiringPayload, QueueJobState, QueuedFiring, RepeatOptions, RepeatQueue,
    RepeatableEntry,
};
use crate::error::Result;
use crate::jobs::clock::{Clock, SystemClock};
use crate::jobs::job::JobId;

#[derive(Default)]
struct QueueState {
    entries: BTreeMap<String, RepeatableEntry>,
    waiting: VecDeque<QueuedFiring>,
    active: Vec<QueuedFiring>,
    completed: VecDeque<QueuedFiring>,
    failed: VecDeque<QueuedFiring>,
}

/// [`RepeatQueue`] held in memory. Share one instance between several
/// workers to model a fleet on one broker.
pub struct InMemoryRepeatQueue {
    name: String,
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
    notify: Notify,
    closed: AtomicBool,
}

impl InMemoryRepeatQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_clock(name, Arc::new(SystemClock))
    }

    pub fn with_clock(name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            clock,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn take_waiting(&self) -> Option<QueuedFiring> {
        let mut state = self.state.lock();
        let mut firing = state.waiting.pop_front()?;
        firing.state = QueueJobState::Active;
        state.active.push(firing.clone());
        Some(firing)
    }
}

fn page(
    items: impl Iterator<Item = QueuedFiring>,
    state: QueueJobState,
    start: usize,
    end: usize,
) -> Vec<QueuedFiring> {
    if end < start {
        return Vec::new();
    }
    items
        .skip(start)
        .take(end - start + 1)
        .map(|mut firing| {
            firing.state = state;
            firing
        })
        .collect()
}

fn push_trimmed(bucket: &mut VecDeque<QueuedFiring>, firing: QueuedFiring, keep: usize) {
    bucket.push_front(firing);
    bucket.truncate(keep);
}

#[async_trait]
impl RepeatQueue for InMemoryRepeatQueue {
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
        entry.next = entry.next_after(self.clock.now())?;

        self.state
            .lock()
            .entries
            .insert(entry.key.clone(), entry.clone());

        debug!(queue = %self.name, key = %entry.key, next = ?entry.next, "Repeat entry stored");
        Ok(entry)
    }

    async fn repeatable_entries(&self) -> Result<Vec<RepeatableEntry>> {
        Ok(self.state.lock().entries.values().cloned().collect())
    }

    async fn remove_repeatable(&self, name: &str, job_id: Option<JobId>) -> Result<bool> {
        let mut state = self.state.lock();
        match job_id {
            Some(id) => Ok(state.entries.remove(&id.to_string()).is_some()),
            None => {
                let before = state.entries.len();
                state.entries.retain(|_, entry| entry.name != name);
                Ok(state.entries.len() != before)
            }
        }
    }

    async fn jobs(&self, state: QueueJobState, start: usize, end: usize) -> Result<Vec<QueuedFiring>> {
        let guard = self.state.lock();
        let firings = match state {
            QueueJobState::Waiting => page(guard.waiting.iter().cloned(), state, start, end),
            QueueJobState::Active => page(guard.active.iter().cloned(), state, start, end),
            QueueJobState::Completed => page(guard.completed.iter().cloned(), state, start, end),
            QueueJobState::Failed => page(guard.failed.iter().cloned(), state, start, end),
            QueueJobState::Delayed => {
                let mut delayed: Vec<QueuedFiring> = guard
                    .entries
                    .values()
                    .filter_map(RepeatableEntry::delayed_firing)
                    .collect();
                delayed.sort_by_key(|firing| firing.fire_at);
                page(delayed.into_iter(), state, start, end)
            }
        };
        Ok(firings)
    }

    async fn remove_job(&self, firing: &QueuedFiring) -> Result<bool> {
        let mut guard = self.state.lock();
        let removed = match firing.state {
            QueueJobState::Waiting => {
                let before = guard.waiting.len();
                guard.waiting.retain(|f| f.id != firing.id);
                guard.waiting.len() != before
            }
            QueueJobState::Active => {
                let before = guard.active.len();
                guard.active.retain(|f| f.id != firing.id);
                guard.active.len() != before
            }
            QueueJobState::Completed => {
                let before = guard.completed.len();
                guard.completed.retain(|f| f.id != firing.id);
                guard.completed.len() != before
            }
            QueueJobState::Failed => {
                let before = guard.failed.len();
                guard.failed.retain(|f| f.id != firing.id);
                guard.failed.len() != before
            }
            // The delayed firing is the entry's pending instance
            QueueJobState::Delayed => guard.entries.remove(&firing.job_id().to_string()).is_some(),
        };
        Ok(removed)
    }

    async fn promote_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let promoted = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let mut promoted = 0;

            for entry in state.entries.values_mut() {
                let Some(due) = entry.next.filter(|next| *next <= now) else {
                    continue;
                };
                state.waiting.push_back(entry.firing_at(due));
                entry.next = entry.next_after(now).unwrap_or(None);
                promoted += 1;
            }
            promoted
        };

        for _ in 0..promoted {
            self.notify.notify_one();
        }
        if promoted > 0 {
            debug!(queue = %self.name, promoted, "Promoted due repeat entries");
        }
        Ok(promoted)
    }

    async fn next_firing(&self, wait: Duration) -> Result<Option<QueuedFiring>> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            // Register before checking so a push or close in between is not missed
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_closed() {
                return Ok(None);
            }
            if let Some(firing) = self.take_waiting() {
                return Ok(Some(firing));
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn complete(&self, firing: &QueuedFiring, outcome: FiringOutcome) -> Result<()> {
        let finished = firing.finish(&outcome, self.clock.now());
        let mut state = self.state.lock();
        state.active.retain(|f| f.id != firing.id);
        match outcome {
            FiringOutcome::Completed => {
                push_trimmed(&mut state.completed, finished, firing.remove_on_complete)
            }
            FiringOutcome::Failed(_) => push_trimmed(&mut state.failed, finished, firing.remove_on_fail),
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
