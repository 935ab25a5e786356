//! Vehicle Tracker Library
//!
//! Keeps a live view of one vehicle's position on a map surface by polling a
//! telemetry endpoint and replaying each returned batch onto a marker and an
//! info panel.
//!
//! # Architecture
//!
//! - [`TelemetrySource`] fetches a batch of samples ([`HttpSource`] for the
//!   real backend)
//! - [`MapSurface`] is where samples end up ([`Scene`] keeps them in memory)
//! - [`Tracker`] owns both for the session and schedules refreshes
//!
//! Drawing, argument parsing and configuration files live in the
//! application layer (vehicle-tracker-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use vehicle_tracker::{refresh_button, HttpSource, Scene, Tracker, TrackerConfig};
//!
//! # async fn demo() -> vehicle_tracker::Result<()> {
//! let config = TrackerConfig::new().with_replay_delay_ms(1_000);
//! let source = HttpSource::from_config(&config)?;
//! let tracker = Arc::new(Tracker::initialize(config, source, Scene::new())?);
//!
//! let (button, requests) = refresh_button();
//! button.press();
//!
//! let shutdown = tokio::time::sleep(std::time::Duration::from_secs(300));
//! let stats = tracker.run(requests, shutdown).await;
//! println!("{} samples applied", stats.samples_applied);
//! # Ok(())
//! # }
//! ```

// Public modules
pub mod config;
pub mod source;
pub mod stream;
pub mod surface;
pub mod tile;
pub mod tracker;
pub mod types;

// Re-export main types for convenience
pub use config::{RefreshPolicy, TrackerConfig};
pub use source::{HttpSource, TelemetrySource};
pub use stream::{EventStreamDecoder, SampleStream, TelemetryStream, MAX_LINE_BYTES};
pub use surface::{InfoField, InfoPanel, MapSurface, MapView, Marker, Scene};
pub use tile::{TileCoord, TileLayer};
pub use tracker::{
    refresh_button, RefreshButton, RefreshOutcome, RefreshRequests, RefreshStats,
    RefreshTrigger, Tracker,
};
pub use types::{
    parse_batch, LatLng, Result, SampleTime, TelemetryBatch, TelemetrySample, TrackerError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
