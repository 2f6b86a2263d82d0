//! Trigger Action: the HTTP call made when a job fires.
//!
//! [`TriggerAction::notify`] never returns an error. Every failure is
//! classified, logged and handed back as a [`NotifyOutcome`] so the
//! execution path can record it without branching on `Result`.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::job::HttpMethod;
use crate::config::NotifierConfig;
use crate::error::Result;

/// Maximum number of response body bytes kept on an HTTP failure.
const MAX_ERROR_BODY: usize = 1024;

// ═══════════════════════════════════════════════════════════════════════════════
// Outcome
// ═══════════════════════════════════════════════════════════════════════════════

/// Why a webhook was not delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyFailure {
    /// The target refused the connection.
    ConnectionRefused,
    /// No complete response within the configured timeout.
    Timeout,
    /// The target answered with a non-success status.
    HttpStatus {
        status: u16,
        reason: Option<String>,
        body: Option<String>,
    },
    /// The request was sent but no response arrived.
    NoResponse(String),
    /// The request could not be built (bad URI, bad header).
    RequestSetup(String),
}

impl NotifyFailure {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionRefused => "connection_refused",
            Self::Timeout => "timeout",
            Self::HttpStatus { .. } => "http_status",
            Self::NoResponse(_) => "no_response",
            Self::RequestSetup(_) => "request_setup",
        }
    }
}

impl fmt::Display for NotifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionRefused => write!(f, "connection refused"),
            Self::Timeout => write!(f, "timed out"),
            Self::HttpStatus { status, reason, .. } => {
                write!(f, "HTTP {}", status)?;
                if let Some(reason) = reason {
                    write!(f, " {}", reason)?;
                }
                Ok(())
            }
            Self::NoResponse(msg) => write!(f, "no response: {}", msg),
            Self::RequestSetup(msg) => write!(f, "request setup error: {}", msg),
        }
    }
}

/// Result of one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered { status: u16 },
    Failed(NotifyFailure),
}

impl NotifyOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    /// Label for `hookcron_executions_total{outcome}`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::Failed(failure) => failure.kind(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Side effect performed when a job fires.
#[async_trait]
pub trait TriggerAction: Send + Sync {
    async fn notify(&self, uri: &str, method: HttpMethod, body: Option<&str>) -> NotifyOutcome;
}

// ═══════════════════════════════════════════════════════════════════════════════
// HTTP Notifier
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON payload sent with non-GET webhooks.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub message: String,
    pub timestamp: String,
    pub cron_job: bool,
}

impl WebhookPayload {
    pub fn new(body: Option<&str>) -> Self {
        let now = Utc::now();
        let stamp = now.format("%Y-%m-%d %H:%M:%S");
        let message = match body {
            Some(body) if !body.is_empty() => format!("{} - {}", stamp, body),
            _ => format!("{} - cron triggered", stamp),
        };

        Self {
            message,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            cron_job: true,
        }
    }
}

/// [`TriggerAction`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        Self::with_timeout(Duration::from_secs(config.timeout_secs), &config.user_agent)
    }

    /// Notifier with a custom timeout (tests use sub-second values).
    pub fn with_timeout(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .build()?;

        Ok(Self { client, timeout })
    }

    async fn send(&self, uri: &str, method: HttpMethod, body: Option<&str>) -> NotifyOutcome {
        let mut request = self
            .client
            .request(method.into(), uri)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if method.carries_body() {
            request = request.json(&WebhookPayload::new(body));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return NotifyOutcome::Failed(classify(&err)),
        };

        let status = response.status();
        if status.is_success() {
            return NotifyOutcome::Delivered {
                status: status.as_u16(),
            };
        }

        let body = response
            .text()
            .await
            .ok()
            .filter(|text| !text.is_empty())
            .map(|mut text| {
                if text.len() > MAX_ERROR_BODY {
                    let mut cut = MAX_ERROR_BODY;
                    while !text.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    text.truncate(cut);
                }
                text
            });

        NotifyOutcome::Failed(NotifyFailure::HttpStatus {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            body,
        })
    }
}

#[async_trait]
impl TriggerAction for HttpNotifier {
    async fn notify(&self, uri: &str, method: HttpMethod, body: Option<&str>) -> NotifyOutcome {
        debug!(uri = %uri, method = %method, "Sending webhook");
        let started = Instant::now();

        let outcome = self.send(uri, method, body).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            NotifyOutcome::Delivered { status } => {
                info!(uri = %uri, method = %method, status = status, elapsed_ms, "Webhook delivered");
            }
            NotifyOutcome::Failed(NotifyFailure::ConnectionRefused) => {
                error!(uri = %uri, method = %method, "Connection refused, target may not be running");
            }
            NotifyOutcome::Failed(NotifyFailure::Timeout) => {
                error!(
                    uri = %uri,
                    method = %method,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Webhook timed out"
                );
            }
            NotifyOutcome::Failed(NotifyFailure::HttpStatus { status, reason, body }) => {
                error!(
                    uri = %uri,
                    method = %method,
                    status = status,
                    reason = reason.as_deref().unwrap_or(""),
                    response_body = body.as_deref().unwrap_or(""),
                    "Webhook target returned an error status"
                );
            }
            NotifyOutcome::Failed(NotifyFailure::NoResponse(msg)) => {
                error!(
                    uri = %uri,
                    method = %method,
                    timeout_ms = self.timeout.as_millis() as u64,
                    error = %msg,
                    "No response from webhook target"
                );
            }
            NotifyOutcome::Failed(NotifyFailure::RequestSetup(msg)) => {
                error!(uri = %uri, method = %method, error = %msg, "Webhook request setup error");
            }
        }

        outcome
    }
}

fn classify(err: &reqwest::Error) -> NotifyFailure {
    if err.is_timeout() {
        return NotifyFailure::Timeout;
    }
    if err.is_builder() {
        return NotifyFailure::RequestSetup(err.to_string());
    }
    if err.is_connect() {
        if is_connection_refused(err) {
            return NotifyFailure::ConnectionRefused;
        }
        return NotifyFailure::NoResponse(err.to_string());
    }
    if err.is_request() && err.url().is_none() {
        return NotifyFailure::RequestSetup(err.to_string());
    }
    NotifyFailure::NoResponse(err.to_string())
}

fn is_connection_refused(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = cause.source();
    }
    false
}
