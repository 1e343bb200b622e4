//! HTTP client for the call backend API
//!
//! Endpoints used:
//! - `GET /api/calls` -> `{calls: [...], count}`
//! - `GET /api/calls/{id}` -> `{call, webhooks, tool_invocations}`
//! - `GET /api/calls/{id}/messages` -> `{messages: [...]}`
//! - `GET /api/calls/{id}/recording` -> WAV audio
//! - `GET /health`

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::types::{CallDetails, CallRecord, TranscriptMessage};

/// Response from GET /api/calls
#[derive(Debug, Deserialize)]
pub struct CallList {
    pub calls: Vec<CallRecord>,
    #[serde(default)]
    pub count: usize,
}

/// Response from GET /api/calls/{id}/messages
#[derive(Debug, Default, Deserialize)]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<TranscriptMessage>,
}

/// Async HTTP client for the call API
pub struct ApiClient {
    config: ApiConfig,
    http_client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client from configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: ApiConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config.base_url.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            base_url,
        })
    }

    /// Base URL with any trailing slash removed
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch all calls
    pub async fn list_calls(&self) -> Result<Vec<CallRecord>> {
        let url = format!("{}/api/calls", self.base_url);
        let list: CallList = self.get_json(&url).await?;
        tracing::debug!(count = list.calls.len(), reported = list.count, "Fetched call list");
        Ok(list.calls)
    }

    /// Fetch a call with its webhooks and tool invocations
    ///
    /// Returns [`Error::CallNotFound`] when the backend answers 404.
    pub async fn call_details(&self, call_id: &str) -> Result<CallDetails> {
        let url = format!(
            "{}/api/calls/{}",
            self.base_url,
            urlencoding::encode(call_id)
        );
        self.get_json(&url)
            .await
            .map_err(|e| not_found_as_call(e, call_id))
    }

    /// Fetch a call's transcript
    ///
    /// Transcripts are optional: any failure yields an empty list.
    pub async fn call_messages(&self, call_id: &str) -> Vec<TranscriptMessage> {
        let url = format!(
            "{}/api/calls/{}/messages",
            self.base_url,
            urlencoding::encode(call_id)
        );
        match self.get_json::<MessageList>(&url).await {
            Ok(list) => list.messages,
            Err(e) => {
                tracing::warn!(call_id, error = %e, "No messages available");
                Vec::new()
            }
        }
    }

    /// Download a call's audio recording (WAV bytes)
    ///
    /// The backend answers 404 both for unknown calls and for calls without
    /// a recording; both surface as [`Error::CallNotFound`].
    pub async fn call_recording(&self, call_id: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/api/calls/{}/recording",
            self.base_url,
            urlencoding::encode(call_id)
        );
        let response = self
            .get_with_retry(&url)
            .await
            .map_err(|e| not_found_as_call(e, call_id))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Api(format!("failed to read recording: {}", e)))?;
        tracing::debug!(call_id, bytes = bytes.len(), "Fetched recording");
        Ok(bytes.to_vec())
    }

    /// Check if the backend is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);

        match self.http_client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.get_with_retry(url)
            .await?
            .json()
            .await
            .map_err(|e| Error::Api(format!("failed to parse response: {}", e)))
    }

    /// Single GET; non-success statuses become [`Error::HttpStatus`].
    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Api(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        Err(Error::HttpStatus {
            status: status.as_u16(),
            body,
        })
    }

    /// GET with retry logic
    ///
    /// Retries transient failures (5xx, network errors) with exponential backoff.
    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(250);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying GET {} (attempt {}/{}), waiting {:?}",
                    url,
                    attempt + 1,
                    self.config.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(10));
            }

            match self.get(url).await {
                Ok(response) => return Ok(response),
                Err(e) if is_retryable_error(&e) => {
                    tracing::warn!("Transient error fetching {}: {}", url, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Api("max retries exceeded".to_string())))
    }
}

/// Map a 404 answer for a call resource to [`Error::CallNotFound`]
fn not_found_as_call(error: Error, call_id: &str) -> Error {
    match error {
        Error::HttpStatus { status: 404, .. } => Error::CallNotFound(call_id.to_string()),
        other => other,
    }
}

/// Check if an error is retryable (transient)
fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::HttpStatus { status, .. } => *status >= 500,
        Error::Api(msg) => msg.starts_with("HTTP request failed"),
        _ => false,
    }
}
