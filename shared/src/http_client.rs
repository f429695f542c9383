//! Resilient HTTP client for the worker's data-plane API
//!
//! Every call resolves to an [`ApiResponse`]: transport errors, timeouts and
//! non-JSON bodies are retried with a linearly growing delay and, once the
//! attempt budget is spent, reported as `success: false` instead of an error.

use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{Instant, sleep};

use crate::errors::{SharedError, SharedResult};
use crate::types::Component;
use crate::{component_debug, component_warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
pub const HEALTH_PATH: &str = "/health";

/// `{success, data?, error?}` envelope used by every worker endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base for relative paths, e.g. `http://127.0.0.1:8000`
    pub base_url: String,
    pub timeout: Duration,
    /// Total attempts per call
    pub retries: u32,
    /// Delay unit; attempt `n` waits `n * retry_delay` before the next one
    pub retry_delay: Duration,
    pub health_path: String,
}

impl HttpClientConfig {
    pub fn for_port(port: u16) -> Self {
        Self::new(format!("http://127.0.0.1:{port}"))
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            health_path: HEALTH_PATH.to_string(),
        }
    }

    /// Configure retry policy (fluent API)
    pub fn with_retries(mut self, retries: u32, retry_delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Configure per-attempt timeout (fluent API)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Per-call overrides of the client defaults
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub retry_delay: Option<Duration>,
}

impl RequestOptions {
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            retries: Some(1),
            retry_delay: None,
        }
    }
}

#[derive(Clone)]
pub struct HttpClient {
    config: HttpClientConfig,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> SharedResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SharedError::HttpClientError { message: format!("Failed to create HTTP client: {e}") })?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Resolve a path against the base URL; absolute URLs pass through
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.config.base_url, path)
        } else {
            format!("{}/{}", self.config.base_url, path)
        }
    }

    pub async fn get(&self, path: &str, options: Option<RequestOptions>) -> ApiResponse {
        self.request(Method::GET, path, None, options).await
    }

    pub async fn post(&self, path: &str, body: Option<Value>, options: Option<RequestOptions>) -> ApiResponse {
        self.request(Method::POST, path, body, options).await
    }

    pub async fn put(&self, path: &str, body: Option<Value>, options: Option<RequestOptions>) -> ApiResponse {
        self.request(Method::PUT, path, body, options).await
    }

    pub async fn delete(&self, path: &str, options: Option<RequestOptions>) -> ApiResponse {
        self.request(Method::DELETE, path, None, options).await
    }

    /// Issue a request with timeout and bounded, linearly backed-off retries
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: Option<RequestOptions>,
    ) -> ApiResponse {
        let options = options.unwrap_or_default();
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let attempts = options.retries.unwrap_or(self.config.retries).max(1);
        let retry_delay = options.retry_delay.unwrap_or(self.config.retry_delay);
        let url = self.resolve_url(path);

        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.attempt(method.clone(), &url, body.as_ref(), timeout).await {
                Ok(response) => return response,
                Err(e) => {
                    component_warn!(
                        Component::Http,
                        "⚠️ {} {} failed (attempt {}/{}): {}",
                        method,
                        url,
                        attempt,
                        attempts,
                        e
                    );
                    last_error = e;
                }
            }

            if attempt < attempts {
                sleep(retry_delay * attempt).await;
            }
        }

        ApiResponse::failure(format!("{method} {url} failed after {attempts} attempts: {last_error}"))
    }

    /// Single attempt; `Err` means the attempt is retryable
    async fn attempt(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<ApiResponse, String> {
        let mut builder = self.client.request(method, url).timeout(timeout);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                format!("timed out after {}ms", timeout.as_millis())
            } else {
                format!("transport error: {e}")
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| format!("failed to read body: {e}"))?;

        let value: Value = serde_json::from_str(&text)
            .map_err(|_| format!("non-JSON response (HTTP {status})"))?;

        component_debug!(Component::Http, "{} -> HTTP {}", url, status);

        // Bodies following the envelope convention are returned untouched
        match serde_json::from_value::<ApiResponse>(value.clone()) {
            Ok(envelope) => Ok(envelope),
            Err(_) => Ok(ApiResponse {
                success: status.is_success(),
                data: Some(value),
                error: (!status.is_success()).then(|| format!("HTTP {status}")),
            }),
        }
    }

    /// One short, no-retry probe of the health endpoint
    pub async fn check_health(&self) -> bool {
        let path = self.config.health_path.clone();
        self.get(&path, Some(RequestOptions::no_retry(HEALTH_TIMEOUT)))
            .await
            .success
    }

    /// Poll `check_health` every `interval` until it succeeds or `max_wait` elapses
    pub async fn wait_for_ready(&self, max_wait: Duration, interval: Duration) -> bool {
        let deadline = Instant::now() + max_wait;

        loop {
            if self.check_health().await {
                return true;
            }
            if Instant::now() + interval > deadline {
                return false;
            }
            sleep(interval).await;
        }
    }
}
