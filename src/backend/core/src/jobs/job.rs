//! Job definitions.
//!
//! - **Job**: the scheduled unit (target, method, body, cron schedule, zone)
//! - **CreateJobRequest / UpdateJobRequest**: client input
//! - **JobPatch**: the partial write applied by the Job Store
//! - **ServiceStatus**: manager snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{HookcronError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Job Identification
// ═══════════════════════════════════════════════════════════════════════════════

/// Unique identifier for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Create a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Name of the repeat entry registered for this job in cluster mode.
    pub fn repeat_name(&self) -> String {
        format!("cron-{}", self.0)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HTTP Method
// ═══════════════════════════════════════════════════════════════════════════════

/// Method used when a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether a JSON payload is sent with this method.
    pub fn carries_body(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = HookcronError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(HookcronError::validation(format!(
                "httpMethod must be one of: GET, POST, PUT, DELETE (got {})",
                other
            ))),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job
// ═══════════════════════════════════════════════════════════════════════════════

/// A stored job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub uri: String,
    pub http_method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub schedule: String,
    pub time_zone: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Requests
// ═══════════════════════════════════════════════════════════════════════════════

/// Input for creating a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub uri: String,
    pub http_method: HttpMethod,
    #[serde(default)]
    pub body: Option<String>,
    pub schedule: String,
    /// IANA zone; the configured default is used when absent
    #[serde(default)]
    pub time_zone: Option<String>,
}

impl CreateJobRequest {
    pub fn new(uri: impl Into<String>, http_method: HttpMethod, schedule: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            http_method,
            body: None,
            schedule: schedule.into(),
            time_zone: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_time_zone(mut self, tz: impl Into<String>) -> Self {
        self.time_zone = Some(tz.into());
        self
    }

    /// Field checks other than the schedule.
    pub fn validate(&self) -> Result<()> {
        validate_uri(&self.uri)
    }
}

/// Partial update from a client. `id` is never updatable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobRequest {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub http_method: Option<HttpMethod>,
    /// Absent leaves the body alone; `null` clears it.
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub body: Option<Option<String>>,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Maps a present key to `Some`, so an explicit `null` survives as `Some(None)`.
fn explicit_null<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl UpdateJobRequest {
    pub fn validate(&self) -> Result<()> {
        match &self.uri {
            Some(uri) => validate_uri(uri),
            None => Ok(()),
        }
    }

    /// Whether the cadence inputs changed.
    pub fn touches_cadence(&self) -> bool {
        self.schedule.is_some() || self.time_zone.is_some()
    }
}

fn validate_uri(uri: &str) -> Result<()> {
    if uri.trim().is_empty() {
        return Err(HookcronError::validation("uri must not be empty"));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Store Patch
// ═══════════════════════════════════════════════════════════════════════════════

/// Fields written by [`JobStore::update`](super::store::JobStore::update).
///
/// `updated_at` is stamped by the store, so it is not part of the patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub uri: Option<String>,
    pub http_method: Option<HttpMethod>,
    /// `Some(None)` clears the body.
    pub body: Option<Option<String>>,
    pub schedule: Option<String>,
    pub time_zone: Option<String>,
    pub is_active: Option<bool>,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
}

impl JobPatch {
    /// Merge into `job`, leaving absent fields untouched.
    pub fn apply(self, job: &mut Job) {
        if let Some(uri) = self.uri {
            job.uri = uri;
        }
        if let Some(method) = self.http_method {
            job.http_method = method;
        }
        if let Some(body) = self.body {
            job.body = body;
        }
        if let Some(schedule) = self.schedule {
            job.schedule = schedule;
        }
        if let Some(tz) = self.time_zone {
            job.time_zone = tz;
        }
        if let Some(active) = self.is_active {
            job.is_active = active;
        }
        if let Some(last_run) = self.last_run {
            job.last_run = Some(last_run);
        }
        if let Some(next_run) = self.next_run {
            job.next_run = Some(next_run);
        }
    }
}

impl From<UpdateJobRequest> for JobPatch {
    fn from(req: UpdateJobRequest) -> Self {
        Self {
            uri: req.uri,
            http_method: req.http_method,
            body: req.body,
            schedule: req.schedule,
            time_zone: req.time_zone,
            is_active: req.is_active,
            last_run: None,
            next_run: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Service Status
// ═══════════════════════════════════════════════════════════════════════════════

/// Cheap snapshot of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub initialized: bool,
    pub cluster_mode: bool,
    pub active_local_task_count: usize,
    pub total_job_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_job() -> Job {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        Job {
            id: JobId::new(),
            uri: "http://x/hook".to_string(),
            http_method: HttpMethod::Post,
            body: None,
            schedule: "*/5 * * * *".to_string(),
            time_zone: "UTC".to_string(),
            is_active: true,
            created_at: at,
            updated_at: at,
            last_run: None,
            next_run: None,
        }
    }

    #[test]
    fn test_job_id_parse_and_display() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!(id.repeat_name().starts_with("cron-"));
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }

    #[test]
    fn test_http_method_from_str() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("DELETE".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert!("PATCH".parse::<HttpMethod>().is_err());
        assert!(!HttpMethod::Get.carries_body());
        assert!(HttpMethod::Put.carries_body());
    }

    #[test]
    fn test_job_serializes_camel_case() {
        let job = sample_job();
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["httpMethod"], "POST");
        assert_eq!(json["timeZone"], "UTC");
        assert_eq!(json["isActive"], true);
        assert!(json.get("lastRun").is_none());
    }

    #[test]
    fn test_create_request_deserialize() {
        let req: CreateJobRequest = serde_json::from_str(
            r#"{"uri":"http://x/hook","httpMethod":"GET","schedule":"0 9 * * *"}"#,
        )
        .unwrap();
        assert_eq!(req.http_method, HttpMethod::Get);
        assert!(req.time_zone.is_none());
        assert!(req.validate().is_ok());

        let bad = CreateJobRequest::new("  ", HttpMethod::Get, "* * * * *");
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_patch_leaves_untouched_fields() {
        let mut job = sample_job();
        let before = job.clone();

        JobPatch {
            body: Some(Some("x".to_string())),
            ..Default::default()
        }
        .apply(&mut job);

        assert_eq!(job.body.as_deref(), Some("x"));
        assert_eq!(job.schedule, before.schedule);
        assert_eq!(job.uri, before.uri);
        assert_eq!(job.http_method, before.http_method);
        assert_eq!(job.next_run, before.next_run);
    }

    #[test]
    fn test_patch_clears_body() {
        let mut job = sample_job();
        job.body = Some("payload".to_string());

        JobPatch::default().apply(&mut job);
        assert_eq!(job.body.as_deref(), Some("payload"));

        JobPatch {
            body: Some(None),
            ..Default::default()
        }
        .apply(&mut job);
        assert!(job.body.is_none());
    }

    #[test]
    fn test_update_request_body_null_and_absent() {
        let cleared: UpdateJobRequest = serde_json::from_str(r#"{"body":null}"#).unwrap();
        assert_eq!(cleared.body, Some(None));

        let absent: UpdateJobRequest = serde_json::from_str(r#"{"isActive":false}"#).unwrap();
        assert_eq!(absent.body, None);

        let set: UpdateJobRequest = serde_json::from_str(r#"{"body":"ping"}"#).unwrap();
        assert_eq!(set.body, Some(Some("ping".to_string())));

        // Unset fields stay off the wire so a resend does not clear the body
        let json = serde_json::to_value(&absent).unwrap();
        assert!(json.get("body").is_none());
    }

    #[test]
    fn test_update_request_touches_cadence() {
        assert!(!UpdateJobRequest::default().touches_cadence());
        let req = UpdateJobRequest {
            time_zone: Some("Europe/Berlin".to_string()),
            ..Default::default()
        };
        assert!(req.touches_cadence());
    }

    #[test]
    fn test_service_status_serialization() {
        let status = ServiceStatus {
            initialized: true,
            cluster_mode: false,
            active_local_task_count: 2,
            total_job_count: 2,
        };
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["totalJobCount"], 2);
        assert_eq!(json["clusterMode"], false);
    }
}
