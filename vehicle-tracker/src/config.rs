//! Tracker configuration types
//!
//! Every field has a default matching the stock deployment: a backend on
//! `127.0.0.1:5000`, an OpenStreetMap base layer, a 25 s refresh tick and a
//! 2 s replay delay. Applications override individual fields through the
//! builder methods or by deserializing a partial config.

use crate::tile::TileLayer;
use crate::types::{LatLng, TrackerError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/api/vehicle";
pub const DEFAULT_STREAM_ENDPOINT: &str = "http://127.0.0.1:5000/api/vehicle-stream";
pub const DEFAULT_CENTER: LatLng = LatLng::new(39.977183, 116.329867);
pub const DEFAULT_ZOOM: u8 = 14;
pub const DEFAULT_POPUP: &str = "Vehicle Tracking Started";

/// How a refresh that arrives while another replay is running is handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPolicy {
    /// Ignore the new refresh until the running one finishes
    #[default]
    Skip,
    /// Start the new refresh and stop the running replay before its next sample
    Restart,
    /// Let replays interleave freely
    Overlap,
}

impl fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshPolicy::Skip => write!(f, "skip"),
            RefreshPolicy::Restart => write!(f, "restart"),
            RefreshPolicy::Overlap => write!(f, "overlap"),
        }
    }
}

impl FromStr for RefreshPolicy {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(RefreshPolicy::Skip),
            "restart" => Ok(RefreshPolicy::Restart),
            "overlap" => Ok(RefreshPolicy::Overlap),
            other => Err(TrackerError::InvalidPolicy(other.to_string())),
        }
    }
}

/// Configuration for a tracker instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Batch endpoint returning a JSON array of samples
    pub endpoint: String,

    /// Server-sent events endpoint used by follow mode
    pub stream_endpoint: String,

    /// Initial map center and marker position
    pub default_center: LatLng,

    /// Initial zoom level
    pub zoom: u8,

    /// Base imagery layer
    pub tile_layer: TileLayer,

    /// Popup shown on the marker at startup
    pub startup_popup: String,

    /// Auto-refresh period in milliseconds
    pub refresh_interval_ms: u64,

    /// Delay after each replayed sample in milliseconds
    pub replay_delay_ms: u64,

    /// Handling of overlapping refreshes
    pub refresh_policy: RefreshPolicy,

    /// Optional request timeout; none means the HTTP client default
    pub request_timeout_ms: Option<u64>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            stream_endpoint: DEFAULT_STREAM_ENDPOINT.to_string(),
            default_center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            tile_layer: TileLayer::default(),
            startup_popup: DEFAULT_POPUP.to_string(),
            refresh_interval_ms: 25_000,
            replay_delay_ms: 2_000,
            refresh_policy: RefreshPolicy::default(),
            request_timeout_ms: None,
        }
    }
}

impl TrackerConfig {
    /// Create a new tracker configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the batch endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Builder method: set the event-stream endpoint
    pub fn with_stream_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.stream_endpoint = endpoint.into();
        self
    }

    /// Builder method: set the initial center and zoom
    pub fn with_view(mut self, center: LatLng, zoom: u8) -> Self {
        self.default_center = center;
        self.zoom = zoom;
        self
    }

    /// Builder method: set the auto-refresh period
    pub fn with_refresh_interval_ms(mut self, interval_ms: u64) -> Self {
        self.refresh_interval_ms = interval_ms;
        self
    }

    /// Builder method: set the per-sample replay delay
    pub fn with_replay_delay_ms(mut self, delay_ms: u64) -> Self {
        self.replay_delay_ms = delay_ms;
        self
    }

    /// Builder method: set the overlapping refresh policy
    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    /// Builder method: set a request timeout
    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn replay_delay(&self) -> Duration {
        Duration::from_millis(self.replay_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Check values a tracker cannot run with
    pub fn validate(&self) -> crate::types::Result<()> {
        if self.refresh_interval_ms == 0 {
            return Err(TrackerError::Config("refresh_interval_ms must be greater than zero".into()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(TrackerError::Config("endpoint must not be empty".into()));
        }
        if !(-90.0..=90.0).contains(&self.default_center.latitude)
            || !(-180.0..=180.0).contains(&self.default_center.longitude)
        {
            return Err(TrackerError::Config(format!(
                "default_center {} is not a valid coordinate",
                self.default_center
            )));
        }
        Ok(())
    }
}
