//! Error handling for Hookcron Core.
//!
//! This module provides:
//! - A single error type with machine-readable codes and chained sources
//! - HTTP status code mapping for API responses
//! - User-friendly messages vs detailed internal messages
//! - Severity-aware logging and error metrics
//!
//! # Usage
//!
//! ```rust,ignore
//! use hookcron_core::error::{HookcronError, Result};
//!
//! fn check(expr: &str) -> Result<()> {
//!     if expr.split_whitespace().count() != 5 {
//!         return Err(HookcronError::invalid_schedule(expr, "expected 5 fields"));
//!     }
//!     Ok(())
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for Hookcron operations.
pub type Result<T> = std::result::Result<T, HookcronError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes for API responses.
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Job Errors (1000-1099)
    InvalidSchedule,
    JobNotFound,
    TimezoneResolutionFailed,
    SchedulerRegistrationFailed,
    NotifyFailed,
    NotInitialized,

    // Broker Errors (2100-2199)
    BrokerError,
    BrokerConnectionFailed,

    // Serialization Errors (2200-2299)
    SerializationError,
    DeserializationError,

    // External Service Errors (3000-3099)
    NetworkError,
    ExternalServiceError,
    Timeout,

    // Validation Errors (4100-4199)
    ValidationError,
    InvalidInput,

    // Configuration Errors (5000-5099)
    ConfigurationError,
    MissingConfiguration,
    InvalidConfiguration,

    // Internal Errors (9000-9099)
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::InvalidSchedule => 1000,
            Self::JobNotFound => 1001,
            Self::TimezoneResolutionFailed => 1002,
            Self::SchedulerRegistrationFailed => 1003,
            Self::NotifyFailed => 1004,
            Self::NotInitialized => 1005,

            Self::BrokerError => 2100,
            Self::BrokerConnectionFailed => 2101,

            Self::SerializationError => 2200,
            Self::DeserializationError => 2201,

            Self::NetworkError => 3000,
            Self::ExternalServiceError => 3001,
            Self::Timeout => 3002,

            Self::ValidationError => 4100,
            Self::InvalidInput => 4101,

            Self::ConfigurationError => 5000,
            Self::MissingConfiguration => 5001,
            Self::InvalidConfiguration => 5002,

            Self::InternalError => 9000,
        }
    }

    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::JobNotFound => StatusCode::NOT_FOUND,

            Self::InvalidSchedule
            | Self::TimezoneResolutionFailed
            | Self::ValidationError
            | Self::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,

            Self::DeserializationError => StatusCode::BAD_REQUEST,

            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,

            Self::BrokerConnectionFailed
            | Self::NotInitialized
            | Self::ExternalServiceError => StatusCode::SERVICE_UNAVAILABLE,

            Self::NetworkError | Self::NotifyFailed => StatusCode::BAD_GATEWAY,

            Self::SchedulerRegistrationFailed
            | Self::BrokerError
            | Self::SerializationError
            | Self::ConfigurationError
            | Self::MissingConfiguration
            | Self::InvalidConfiguration
            | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error is retryable.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BrokerConnectionFailed
                | Self::BrokerError
                | Self::SchedulerRegistrationFailed
                | Self::NetworkError
                | Self::ExternalServiceError
                | Self::Timeout
        )
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "job",
            2100..=2199 => "broker",
            2200..=2299 => "serialization",
            3000..=3099 => "external_service",
            4100..=4199 => "validation",
            5000..=5099 => "configuration",
            9000..=9099 => "internal",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// User errors (bad input, validation failures)
    Low,
    /// Operational issues (timeouts, downstream failures)
    Medium,
    /// System errors (broker failures, registration failures)
    High,
    /// Critical errors requiring immediate attention
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::InvalidSchedule
            | ErrorCode::JobNotFound
            | ErrorCode::TimezoneResolutionFailed
            | ErrorCode::ValidationError
            | ErrorCode::InvalidInput
            | ErrorCode::DeserializationError => Self::Low,

            ErrorCode::NotifyFailed
            | ErrorCode::Timeout
            | ErrorCode::NetworkError
            | ErrorCode::ExternalServiceError => Self::Medium,

            ErrorCode::SchedulerRegistrationFailed
            | ErrorCode::BrokerError
            | ErrorCode::SerializationError
            | ErrorCode::ConfigurationError
            | ErrorCode::MissingConfiguration
            | ErrorCode::InvalidConfiguration
            | ErrorCode::NotInitialized => Self::High,

            ErrorCode::BrokerConnectionFailed | ErrorCode::InternalError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Additional context key-value pairs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Related entity ID (job, firing, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Related entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Retry information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,

    /// Suggested action for resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_secs = Some(seconds);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_action = Some(suggestion.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for Hookcron Core.
///
/// Carries a stable [`ErrorCode`], a message that is safe to return to API
/// callers, an optional internal message for logs, and the source error.
#[derive(Error, Debug)]
pub struct HookcronError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe to expose to clients)
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for HookcronError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl HookcronError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::InternalError,
            "An internal error occurred",
            message,
        )
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    /// Add context to details.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the user-friendly message.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Get the internal message (if any).
    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    /// Get the error details.
    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    details = ?self.details,
                    source = ?self.source,
                    "CRITICAL ERROR"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Medium severity error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Low severity error"
                );
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Metrics
    // ─────────────────────────────────────────────────────────────────────────

    fn record_metrics(&self) {
        counter!(
            "hookcron_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "severity" => format!("{:?}", self.severity()),
            "retryable" => self.is_retryable().to_string(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error response for API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Whether the request was successful (always false for errors)
    pub success: bool,

    /// Error information
    pub error: ErrorInfo,
}

/// Detailed error information for API responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code
    pub numeric_code: u32,

    /// User-friendly error message
    pub message: String,

    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,

    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&HookcronError> for ErrorResponse {
    fn from(error: &HookcronError) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: error.code,
                numeric_code: error.code.numeric_code(),
                message: error.user_message.to_string(),
                details: if error.details.context.is_empty()
                    && error.details.entity_id.is_none()
                    && error.details.retry_after_secs.is_none()
                {
                    None
                } else {
                    Some(error.details.clone())
                },
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Integration
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResponse for HookcronError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let response = ErrorResponse::from(&self);

        (status, Json(response)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations for Common Error Types
// ═══════════════════════════════════════════════════════════════════════════════

impl From<redis::RedisError> for HookcronError {
    fn from(error: redis::RedisError) -> Self {
        let (code, user_msg) = if error.is_connection_refusal() || error.is_connection_dropped() {
            (
                ErrorCode::BrokerConnectionFailed,
                "Unable to connect to the broker",
            )
        } else if error.is_timeout() {
            (ErrorCode::BrokerError, "Broker operation timed out")
        } else {
            (ErrorCode::BrokerError, "A broker error occurred")
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<serde_json::Error> for HookcronError {
    fn from(error: serde_json::Error) -> Self {
        let code = if error.is_syntax() || error.is_data() || error.is_eof() {
            ErrorCode::DeserializationError
        } else {
            ErrorCode::SerializationError
        };

        Self::with_internal(code, "Failed to process JSON data", error.to_string())
            .with_source(error)
    }
}

impl From<reqwest::Error> for HookcronError {
    fn from(error: reqwest::Error) -> Self {
        let (code, user_msg) = if error.is_timeout() {
            (ErrorCode::Timeout, "Webhook request timed out")
        } else if error.is_connect() {
            (ErrorCode::NetworkError, "Failed to connect to webhook target")
        } else if error.is_status() {
            (ErrorCode::ExternalServiceError, "Webhook target returned an error")
        } else {
            (ErrorCode::NetworkError, "Network error occurred")
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<tokio::time::error::Elapsed> for HookcronError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::with_internal(ErrorCode::Timeout, "Operation timed out", error.to_string())
            .with_source(error)
    }
}

impl From<std::io::Error> for HookcronError {
    fn from(error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let (code, user_msg) = match error.kind() {
            ErrorKind::TimedOut => (ErrorCode::Timeout, "Operation timed out"),
            ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => {
                (ErrorCode::NetworkError, "Connection failed")
            }
            _ => (ErrorCode::InternalError, "An I/O error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<anyhow::Error> for HookcronError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<HookcronError>() {
            Ok(hookcron_error) => hookcron_error,
            Err(error) => Self::with_internal(
                ErrorCode::InternalError,
                "An internal error occurred",
                error.to_string(),
            ),
        }
    }
}

impl From<config::ConfigError> for HookcronError {
    fn from(error: config::ConfigError) -> Self {
        let (code, user_msg) = match &error {
            config::ConfigError::NotFound(_) => (
                ErrorCode::MissingConfiguration,
                "Required configuration not found",
            ),
            config::ConfigError::PathParse(_) | config::ConfigError::FileParse { .. } => (
                ErrorCode::InvalidConfiguration,
                "Configuration file is invalid",
            ),
            _ => (ErrorCode::ConfigurationError, "Configuration error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Convenience Constructors for Domain Errors
// ═══════════════════════════════════════════════════════════════════════════════

impl HookcronError {
    /// The cron expression failed 5-field validation.
    pub fn invalid_schedule(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        let expression = expression.into();
        Self::with_internal(
            ErrorCode::InvalidSchedule,
            format!("Invalid CRON expression: {}", expression),
            reason.into(),
        )
        .with_context("schedule", &expression)
        .with_details(
            ErrorDetails::new()
                .with_context("schedule", &expression)
                .with_suggestion("Use five whitespace-separated fields: minute hour day-of-month month weekday"),
        )
    }

    /// A job id is not present in the store.
    pub fn job_not_found(job_id: impl fmt::Display) -> Self {
        let id = job_id.to_string();
        Self::new(
            ErrorCode::JobNotFound,
            format!("CRON job with id {} not found", id),
        )
        .with_details(ErrorDetails::new().with_entity("job", id))
    }

    /// A time zone name did not resolve.
    pub fn timezone_resolution(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(
            ErrorCode::TimezoneResolutionFailed,
            format!("Unknown time zone: {}", name),
        )
        .with_context("time_zone", name)
    }

    /// Registering a job with the active scheduler failed.
    pub fn registration_failed(job_id: impl fmt::Display, reason: impl Into<String>) -> Self {
        let id = job_id.to_string();
        Self::with_internal(
            ErrorCode::SchedulerRegistrationFailed,
            format!("Failed to schedule job {}", id),
            reason.into(),
        )
        .with_details(ErrorDetails::new().with_entity("job", id).with_retry_after(5))
    }

    /// The broker could not be reached at startup.
    pub fn broker_unavailable(address: impl Into<String>, reason: impl Into<String>) -> Self {
        let address = address.into();
        Self::with_internal(
            ErrorCode::BrokerConnectionFailed,
            format!("Broker at {} is unreachable", address),
            reason.into(),
        )
        .with_context("address", address)
    }

    /// The manager has been shut down.
    pub fn not_initialized() -> Self {
        Self::new(
            ErrorCode::NotInitialized,
            "The job manager is not initialized",
        )
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigurationError, message.into())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::JobNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::InvalidSchedule.http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ErrorCode::BrokerConnectionFailed.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::InternalError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_code_is_retryable() {
        assert!(ErrorCode::BrokerConnectionFailed.is_retryable());
        assert!(ErrorCode::SchedulerRegistrationFailed.is_retryable());
        assert!(!ErrorCode::InvalidSchedule.is_retryable());
        assert!(!ErrorCode::JobNotFound.is_retryable());
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::InvalidSchedule.category(), "job");
        assert_eq!(ErrorCode::BrokerError.category(), "broker");
        assert_eq!(ErrorCode::InvalidConfiguration.category(), "configuration");
    }

    #[test]
    fn test_invalid_schedule_error() {
        let error = HookcronError::invalid_schedule("bad cron", "expected 5 fields, found 2");
        assert_eq!(error.code(), ErrorCode::InvalidSchedule);
        assert_eq!(error.http_status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(error.user_message().contains("bad cron"));
        assert_eq!(error.internal_message(), Some("expected 5 fields, found 2"));
    }

    #[test]
    fn test_job_not_found_error() {
        let error = HookcronError::job_not_found("abc-123");
        assert_eq!(error.code(), ErrorCode::JobNotFound);
        assert_eq!(error.details().entity_type.as_deref(), Some("job"));
        assert_eq!(error.details().entity_id.as_deref(), Some("abc-123"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_error_response_serialization() {
        let error = HookcronError::validation("uri must not be empty");
        let response = ErrorResponse::from(&error);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("VALIDATION_ERROR"));
        assert!(json.contains("uri must not be empty"));
        assert!(json.contains("4100"));
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::InvalidSchedule),
            ErrorSeverity::Low
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::NotifyFailed),
            ErrorSeverity::Medium
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::SchedulerRegistrationFailed),
            ErrorSeverity::High
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::BrokerConnectionFailed),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_anyhow_roundtrip_keeps_code() {
        let original = HookcronError::job_not_found("x");
        let wrapped: anyhow::Error = original.into();
        let back = HookcronError::from(wrapped);
        assert_eq!(back.code(), ErrorCode::JobNotFound);
    }

    #[test]
    fn test_error_display() {
        let error = HookcronError::with_internal(
            ErrorCode::BrokerError,
            "A broker error occurred",
            "READONLY You can't write against a read only replica.",
        );

        let display = format!("{}", error);
        assert!(display.contains("BrokerError"));
        assert!(display.contains("A broker error occurred"));
        assert!(display.contains("READONLY"));
    }

    #[test]
    fn test_truncated_json_is_deserialization_error() {
        let error: HookcronError = serde_json::from_str::<serde_json::Value>("{\"uri\":")
            .unwrap_err()
            .into();
        assert_eq!(error.code(), ErrorCode::DeserializationError);
        assert_eq!(error.code().http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.code().numeric_code(), 2201);
    }
}
