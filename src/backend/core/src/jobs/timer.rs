//! Cancellable repeating task.
//!
//! A [`RepeatingTask`] asks its cadence for the next instant, sleeps until
//! then and awaits the handler. The handler is awaited inline, so runs of the
//! same task never overlap. A panicking handler is logged and the loop goes on.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::clock::Clock;

/// Handle to a running repeating task. Dropping it stops the task.
#[derive(Debug)]
pub struct RepeatingTask {
    name: String,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RepeatingTask {
    /// Spawn the task.
    ///
    /// `next_fire` receives the instant to search after and returns the next
    /// fire instant, or `None` when the cadence is exhausted.
    pub fn start<N, H, Fut>(name: impl Into<String>, clock: Arc<dyn Clock>, mut next_fire: N, handler: H) -> Self
    where
        N: FnMut(DateTime<Utc>) -> Option<DateTime<Utc>> + Send + 'static,
        H: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            let mut last_fire: Option<DateTime<Utc>> = None;

            loop {
                let now = clock.now();
                // Never fire the same instant twice if the wall clock lags
                let from = match last_fire {
                    Some(last) if last > now => last,
                    _ => now,
                };

                let Some(at) = next_fire(from) else {
                    warn!(task = %task_name, "Cadence has no further fire time, stopping");
                    break;
                };
                let delay = (at - now).to_std().unwrap_or(Duration::ZERO);

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                last_fire = Some(at);
                debug!(task = %task_name, fire_at = %at, "Timer fired");

                if let Err(panic) = AssertUnwindSafe(handler()).catch_unwind().await {
                    error!(
                        task = %task_name,
                        panic = %panic_message(panic.as_ref()),
                        "Timer handler panicked"
                    );
                }

                if token.is_cancelled() {
                    break;
                }
            }

            debug!(task = %task_name, "Timer stopped");
        });

        Self {
            name,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop firing. A handler already running is allowed to finish.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop and wait for the loop (and any in-flight handler) to exit.
    pub async fn join(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                error!(task = %self.name, error = %err, "Timer task ended abnormally");
            }
        }
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
