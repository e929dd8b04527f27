//! Resilient API client
//!
//! Retries server errors (5xx) with exponential backoff and turns every other
//! failure into a classified [`ApiError`].

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use crate::config::RetryConfig;
use crate::error::{ApiError, ApiErrorKind};
use super::transport::{HttpRequest, HttpTransport};

/// Backoff parameters: `max_retries` extra attempts, delay doubling from `initial_delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
        }
    }
}

/// JSON API client with retry on server errors
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Send `request`, retrying 5xx responses, and return the parsed JSON body
    pub async fn request(&self, request: &HttpRequest) -> Result<Value, ApiError> {
        let mut retries = self.policy.max_retries;
        let mut delay = self.policy.initial_delay;

        loop {
            let response = self.transport.send(request).await?;
            let body: Option<Value> = response.json().ok();

            if !response.is_success() {
                let message = body
                    .as_ref()
                    .and_then(error_message)
                    .unwrap_or_else(|| format!("HTTP error! status: {}", response.status));
                let error = ApiError::from_status(response.status, message);

                if error.is_retryable() && retries > 0 {
                    tracing::warn!(
                        "API call to {} failed with status {}. Retrying in {:?}...",
                        request.url,
                        response.status,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    retries -= 1;
                    continue;
                }

                tracing::debug!("API call to {} failed: {}", request.url, error);
                return Err(error);
            }

            return body.ok_or_else(|| ApiError {
                kind: ApiErrorKind::Service,
                status: Some(response.status),
                message: "Response body was not valid JSON".to_string(),
            });
        }
    }

    /// [`ApiClient::request`] followed by deserialization into `T`
    pub async fn request_json<T: DeserializeOwned>(&self, request: &HttpRequest) -> Result<T, ApiError> {
        let value = self.request(request).await?;
        serde_json::from_value(value).map_err(|e| ApiError {
            kind: ApiErrorKind::Service,
            status: None,
            message: format!("Unexpected response shape: {}", e),
        })
    }
}

/// Extract the server's message from a Graph `{error: {message}}` or an
/// OAuth `{error, error_description}` envelope
pub fn error_message(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    if let Some(message) = error.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    if let Some(description) = body.get("error_description").and_then(Value::as_str) {
        return Some(description.to_string());
    }
    error.as_str().map(str::to_string)
}
