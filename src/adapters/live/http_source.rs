//! Snapshot source backed by the remote snapshot API.
//!
//! Endpoints, relative to the base URL:
//! - `GET snapshots` → `["id", ...]`
//! - `GET snapshots/{id}/files` → `[{"name": .., "size": ..}]`
//! - `GET snapshots/{id}/files/{name}` → raw bytes

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::ports::{FetchError, FetchErrorKind, FileEntry, SnapshotSource, SourceFuture};

/// Longest error body kept in a [`FetchError`] message.
const MAX_ERROR_BODY: usize = 200;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Connection settings for [`HttpSnapshotSource`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// API root, e.g. `https://snapshots.example.net/api/`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Retry behaviour for transient failures.
    pub retry: RetryPolicy,
}

/// HTTP client for the snapshot API.
pub struct HttpSnapshotSource {
    base: Url,
    client: Client,
    token: Option<String>,
    retry: RetryPolicy,
}

impl HttpSnapshotSource {
    /// Builds a client for the given API.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSetting`] when the base URL does not parse or
    /// the HTTP client cannot be constructed.
    pub fn new(config: HttpConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| Error::setting("base_url", format!("{}: {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(Error::setting("base_url", format!("{} cannot be a base URL", config.base_url)));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::setting("base_url", e.to_string()))?;
        Ok(Self { base, client, token: config.token, retry: config.retry })
    }

    fn url(&self, segments: &[&str]) -> std::result::Result<Url, FetchError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| FetchError::new(FetchErrorKind::Transport, "base URL has no path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_once(&self, url: &Url) -> std::result::Result<Vec<u8>, FetchError> {
        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| transport_error(&e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| transport_error(&e))?;
        if status.is_success() {
            return Ok(body.to_vec());
        }
        Err(FetchError::status(status.as_u16(), status_message(status, &body)))
    }

    async fn get(&self, url: Url) -> std::result::Result<Vec<u8>, FetchError> {
        let mut retry = 0;
        loop {
            match self.get_once(&url).await {
                Ok(body) => return Ok(body),
                Err(error) if error.is_retryable() && retry < self.retry.max_retries => {
                    let delay = self.retry.delay(retry);
                    tracing::warn!(
                        url = %url,
                        attempt = retry + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> std::result::Result<T, FetchError> {
        let body = self.get(url.clone()).await?;
        serde_json::from_slice(&body)
            .map_err(|e| FetchError::new(FetchErrorKind::Decode, format!("{url}: {e}")))
    }
}

fn transport_error(error: &reqwest::Error) -> FetchError {
    let kind = if error.is_timeout() { FetchErrorKind::Timeout } else { FetchErrorKind::Transport };
    FetchError::new(kind, error.to_string())
}

fn status_message(status: StatusCode, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return status.to_string();
    }
    let clipped: String = text.chars().take(MAX_ERROR_BODY).collect();
    format!("{status}: {clipped}")
}

impl SnapshotSource for HttpSnapshotSource {
    fn describe(&self) -> String {
        self.base.to_string()
    }

    fn list_snapshot_ids(&self) -> SourceFuture<'_, Vec<String>> {
        Box::pin(async move {
            let url = self.url(&["snapshots"])?;
            self.get_json(url).await
        })
    }

    fn list_files(&self, snapshot_id: &str) -> SourceFuture<'_, Vec<FileEntry>> {
        let snapshot_id = snapshot_id.to_string();
        Box::pin(async move {
            let url = self.url(&["snapshots", &snapshot_id, "files"])?;
            self.get_json(url).await
        })
    }

    fn get_file_content(&self, snapshot_id: &str, file_name: &str) -> SourceFuture<'_, Vec<u8>> {
        let snapshot_id = snapshot_id.to_string();
        let file_name = file_name.to_string();
        Box::pin(async move {
            let url = self.url(&["snapshots", &snapshot_id, "files", &file_name])?;
            self.get(url).await
        })
    }
}
