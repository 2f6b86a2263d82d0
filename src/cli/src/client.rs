//! HTTP client for communicating with the hookcron API server.

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API response wrapper matching the server's ApiResponse format.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[allow(dead_code)]
    pub error_code: Option<String>,
}

/// Structured error body rendered by the server for failed requests.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Debug, Deserialize)]
struct ErrorInfo {
    code: String,
    message: String,
}

/// A non-success answer from the server.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{code}: {message} (HTTP {status})")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    #[error("HTTP {status}: {body}")]
    Unexpected { status: u16, body: String },

    #[error("API error: {0}")]
    Unsuccessful(String),
}

impl ApiError {
    fn from_body(status: u16, body: String) -> Self {
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => Self::Rejected {
                status,
                code: parsed.error.code,
                message: parsed.error.message,
            },
            Err(_) => Self::Unexpected { status, body },
        }
    }
}

/// HTTP client for the hookcron API.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client pointing at the given base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, method: Method, path: &str, request: RequestBuilder) -> Result<Response> {
        let url = self.url(path);
        let resp = request
            .send()
            .await
            .with_context(|| format!("{} {} failed", method, url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_body(status.as_u16(), body).into());
        }
        Ok(resp)
    }

    async fn unwrap_data<T: DeserializeOwned>(&self, path: &str, resp: Response) -> Result<T> {
        let api_resp: ApiResponse<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", self.url(path)))?;

        if api_resp.success {
            api_resp
                .data
                .ok_or_else(|| anyhow::anyhow!("API returned success but no data"))
        } else {
            Err(ApiError::Unsuccessful(
                api_resp.error.unwrap_or_else(|| "Unknown error".into()),
            )
            .into())
        }
    }

    /// Perform a GET request and deserialize the response data.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.client.get(self.url(path));
        let resp = self.send(Method::GET, path, request).await?;
        self.unwrap_data(path, resp).await
    }

    /// Perform a POST request with a JSON body and deserialize the response.
    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let request = self.client.post(self.url(path)).json(body);
        let resp = self.send(Method::POST, path, request).await?;
        self.unwrap_data(path, resp).await
    }

    /// Perform a PATCH request with a JSON body and deserialize the response.
    pub async fn patch<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let request = self.client.patch(self.url(path)).json(body);
        let resp = self.send(Method::PATCH, path, request).await?;
        self.unwrap_data(path, resp).await
    }

    /// Perform a DELETE request and deserialize the response.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.client.delete(self.url(path));
        let resp = self.send(Method::DELETE, path, request).await?;
        self.unwrap_data(path, resp).await
    }

    /// Perform a raw GET request and return the full JSON value (for health endpoint).
    pub async fn get_raw(&self, path: &str) -> Result<serde_json::Value> {
        let request = self.client.get(self.url(path));
        let resp = self.send(Method::GET, path, request).await?;
        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", self.url(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let client = ApiClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.url("/health"), "http://localhost:8080/health");
    }

    #[test]
    fn test_structured_error_body() {
        let body = r#"{"success":false,"error":{"code":"INVALID_SCHEDULE","numeric_code":4001,"message":"Invalid cron expression","timestamp":"2024-01-01T00:00:00Z"}}"#;
        let err = ApiError::from_body(422, body.to_string());

        assert!(matches!(err, ApiError::Rejected { status: 422, .. }));
        assert_eq!(
            err.to_string(),
            "INVALID_SCHEDULE: Invalid cron expression (HTTP 422)"
        );
    }

    #[test]
    fn test_unstructured_error_body() {
        let err = ApiError::from_body(502, "Bad Gateway".to_string());
        assert_eq!(err.to_string(), "HTTP 502: Bad Gateway");
    }
}
