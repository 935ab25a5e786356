//! Telemetry sources
//!
//! A [`TelemetrySource`] produces one batch per call. [`HttpSource`] is the
//! production implementation: one plain GET against the batch endpoint, no
//! parameters, headers or authentication.

use crate::config::TrackerConfig;
use crate::stream::SampleStream;
use crate::types::{parse_batch, Result, TelemetryBatch, TrackerError};
use std::future::Future;
use std::time::Duration;

/// Common trait for anything that can hand the tracker a batch of samples
pub trait TelemetrySource: Send + Sync {
    /// Fetch one batch; network, status and parse failures all surface as `Err`
    fn fetch_batch(&self) -> impl Future<Output = Result<TelemetryBatch>> + Send;
}

/// Batch source backed by an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    /// Create a source for `url` using the HTTP client defaults
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, None)
    }

    /// Create a source with an optional whole-request timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            url: url.into(),
        })
    }

    /// Create a source for the batch endpoint of `config`
    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        Self::with_timeout(config.endpoint.clone(), config.request_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open a server-sent events stream
    ///
    /// The stream gets its own client without the request timeout; an event
    /// stream stays open for as long as the server keeps sending.
    pub async fn open_stream(&self, url: &str) -> Result<SampleStream> {
        log::info!("Opening telemetry stream: {}", url);

        let client = reqwest::Client::builder().build()?;
        let response = client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Status(status.as_u16()));
        }

        Ok(SampleStream::new(response))
    }
}

impl TelemetrySource for HttpSource {
    async fn fetch_batch(&self) -> Result<TelemetryBatch> {
        log::debug!("GET {}", self.url);

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        parse_batch(&body)
    }
}
