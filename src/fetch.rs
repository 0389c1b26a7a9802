// Fetch & classify: one poll of a stream against the telemetry backend.
// Returns a batch or a classified failure; never touches the aggregator.

use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::models::{ScanRequest, ScanResult};
use crate::stream::{StreamBatch, StreamDescriptor};

/// Why a poll failed. Each kind stays distinguishable even though health treats them alike.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "lowercase")]
pub enum FetchError {
    /// Backend unreachable, timed out, or the body could not be read.
    #[error("transport error: {0}")]
    Transport(String),
    /// Non-2xx response.
    #[error("http error: status {status}")]
    Http { status: u16 },
    /// Body did not have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return FetchError::Http {
                status: status.as_u16(),
            };
        }
        if e.is_decode() {
            return FetchError::Parse(e.to_string());
        }
        FetchError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Parse(e.to_string())
    }
}

/// Maps a response status to `Ok` (2xx) or `FetchError::Http`.
pub fn classify_status(status: StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(FetchError::Http {
            status: status.as_u16(),
        })
    }
}

/// Outcome of a one-shot scan request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Backend answered with an `{"error": ...}` body.
    #[error("scan rejected: {0}")]
    Rejected(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScanResponse {
    Rejected { error: String },
    Completed(ScanResult),
}

/// HTTP client for the telemetry backend. Every request carries `request_timeout`.
#[derive(Debug, Clone)]
pub struct TelemetryClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelemetryClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GETs one path and returns the raw body of a 2xx response.
    pub async fn get(&self, path: &str) -> Result<Bytes, FetchError> {
        let response = self.http.get(self.url(path)).send().await?;
        classify_status(response.status())?;
        Ok(response.bytes().await?)
    }

    /// Fetches every endpoint of the descriptor in order and maps the bodies into a batch.
    #[instrument(skip(self, descriptor), fields(stream = %descriptor.id))]
    pub async fn fetch(&self, descriptor: &StreamDescriptor) -> Result<StreamBatch, FetchError> {
        let mut bodies = Vec::with_capacity(descriptor.endpoints.len());
        for endpoint in &descriptor.endpoints {
            bodies.push(self.get(endpoint).await?);
        }
        let batch = (descriptor.map)(&bodies)?;
        if batch.stream_id() != descriptor.id {
            return Err(FetchError::Parse(format!(
                "mapping for {} produced a {} batch",
                descriptor.id,
                batch.stream_id()
            )));
        }
        Ok(batch)
    }

    /// POST security/scan. Any answer carrying an `error` body is reported as rejected.
    #[instrument(skip(self), fields(operation = "post_scan"))]
    pub async fn post_scan(&self, request: &ScanRequest) -> Result<ScanResult, ScanError> {
        let response = self
            .http
            .post(self.url("security/scan"))
            .json(request)
            .send()
            .await
            .map_err(FetchError::from)?;
        let status = response.status();
        let body = response.bytes().await.map_err(FetchError::from)?;
        match serde_json::from_slice::<ScanResponse>(&body) {
            Ok(ScanResponse::Rejected { error }) => Err(ScanError::Rejected(error)),
            Ok(ScanResponse::Completed(result)) if status.is_success() => Ok(result),
            Ok(ScanResponse::Completed(_)) => Err(FetchError::Http {
                status: status.as_u16(),
            }
            .into()),
            Err(e) => {
                classify_status(status)?;
                Err(FetchError::from(e).into())
            }
        }
    }
}
