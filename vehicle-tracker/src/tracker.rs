//! The tracker client
//!
//! [`Tracker`] owns the display surface for the whole session. It is built
//! once by [`Tracker::initialize`], then driven by [`Tracker::run`], which
//! performs the startup refresh, fires a refresh on every timer tick and on
//! every press of the [`RefreshButton`], until shutdown.

use crate::config::{RefreshPolicy, TrackerConfig};
use crate::source::TelemetrySource;
use crate::stream::TelemetryStream;
use crate::surface::{InfoField, MapSurface};
use crate::types::{Result, TelemetrySample, TrackerError};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};

/// What started a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Startup,
    Timer,
    Manual,
}

impl fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshTrigger::Startup => write!(f, "startup"),
            RefreshTrigger::Timer => write!(f, "timer"),
            RefreshTrigger::Manual => write!(f, "refresh button"),
        }
    }
}

/// How a single fetch-and-replay invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Every sample of the batch was applied
    Replayed { samples: usize },
    /// A newer refresh took over after `applied` samples
    Superseded { applied: usize },
    /// Another replay was in flight
    Skipped,
    /// Fetch or parse failure; nothing was applied
    Failed,
}

/// Counters over the lifetime of a tracker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub invoked: u64,
    pub completed: u64,
    pub skipped: u64,
    pub superseded: u64,
    pub failed: u64,
    pub samples_applied: u64,
}

#[derive(Debug, Default)]
struct Counters {
    invoked: AtomicU64,
    completed: AtomicU64,
    skipped: AtomicU64,
    superseded: AtomicU64,
    failed: AtomicU64,
    samples_applied: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RefreshStats {
        RefreshStats {
            invoked: self.invoked.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            samples_applied: self.samples_applied.load(Ordering::Relaxed),
        }
    }
}

/// Single-flight marker, released on drop
struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Sending half of the manual refresh input
#[derive(Debug, Clone)]
pub struct RefreshButton {
    tx: mpsc::UnboundedSender<()>,
}

impl RefreshButton {
    /// Request a refresh; returns false once the tracker has stopped
    pub fn press(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

/// Receiving half of the manual refresh input, consumed by [`Tracker::run`]
#[derive(Debug)]
pub struct RefreshRequests {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Create a connected refresh button and request queue
pub fn refresh_button() -> (RefreshButton, RefreshRequests) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RefreshButton { tx }, RefreshRequests { rx })
}

/// Live view of one vehicle, sourced by polling
pub struct Tracker<S, D> {
    config: TrackerConfig,
    source: S,
    surface: Mutex<D>,
    in_flight: AtomicBool,
    generation: AtomicU64,
    counters: Counters,
}

impl<S, D> Tracker<S, D>
where
    S: TelemetrySource,
    D: MapSurface,
{
    /// Build the map view, tile layer and marker on `surface`
    ///
    /// The configuration is validated first; an invalid one leaves the
    /// surface untouched.
    pub fn initialize(config: TrackerConfig, source: S, mut surface: D) -> Result<Self> {
        config.validate()?;
        let center = config.default_center;

        surface.set_view(center, config.zoom);
        surface.add_tile_layer(&config.tile_layer);
        surface.place_marker(center, &config.startup_popup);

        log::info!(
            "Map initialized at {} zoom {} (tiles: {}, {})",
            center,
            config.zoom,
            config.tile_layer.url_template,
            config.tile_layer.attribution
        );

        Ok(Self {
            config,
            source,
            surface: Mutex::new(surface),
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            counters: Counters::default(),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn stats(&self) -> RefreshStats {
        self.counters.snapshot()
    }

    /// Inspect the surface
    pub fn with_surface<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        f(&self.lock_surface())
    }

    fn lock_surface(&self) -> MutexGuard<'_, D> {
        // A panic inside a surface call leaves nothing half-written that a
        // later sample would not overwrite.
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch one batch and replay it onto the surface
    ///
    /// Samples are applied strictly in order, each followed by the replay
    /// delay. Failures are logged and leave the display untouched.
    pub async fn fetch_and_replay(&self) -> RefreshOutcome {
        Counters::bump(&self.counters.invoked);
        let policy = self.config.refresh_policy;

        let _flight = match policy {
            RefreshPolicy::Skip => match FlightGuard::acquire(&self.in_flight) {
                Some(guard) => Some(guard),
                None => {
                    log::debug!("Replay already in flight, skipping refresh");
                    Counters::bump(&self.counters.skipped);
                    return RefreshOutcome::Skipped;
                }
            },
            RefreshPolicy::Restart | RefreshPolicy::Overlap => None,
        };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let batch = match self.source.fetch_batch().await {
            Ok(batch) => batch,
            Err(e) => {
                log::error!("Error fetching vehicle data: {}", e);
                Counters::bump(&self.counters.failed);
                return RefreshOutcome::Failed;
            }
        };
        log::info!("Received {} telemetry samples", batch.len());

        let delay = self.config.replay_delay();
        for (applied, sample) in batch.iter().enumerate() {
            if policy == RefreshPolicy::Restart && self.generation.load(Ordering::SeqCst) != generation {
                log::debug!("Replay superseded after {} of {} samples", applied, batch.len());
                Counters::bump(&self.counters.superseded);
                return RefreshOutcome::Superseded { applied };
            }

            self.apply_sample(sample);
            time::sleep(delay).await;
        }

        Counters::bump(&self.counters.completed);
        RefreshOutcome::Replayed {
            samples: batch.len(),
        }
    }

    /// User-requested refresh
    pub async fn manual_refresh(&self) -> RefreshOutcome {
        log::info!("Manual refresh requested");
        self.fetch_and_replay().await
    }

    /// Apply samples from an event stream as they arrive
    ///
    /// Returns the number of samples applied. A malformed event is skipped;
    /// a transport failure ends the follow.
    pub async fn follow_stream<T: TelemetryStream>(&self, mut stream: T) -> u64 {
        let mut applied = 0;

        while let Some(next) = stream.next_sample().await {
            match next {
                Ok(sample) => {
                    self.apply_sample(&sample);
                    applied += 1;
                }
                Err(TrackerError::Parse(e)) => {
                    log::error!("Skipping malformed stream event: {}", e);
                }
                Err(e) => {
                    log::error!("Error reading vehicle stream: {}", e);
                    Counters::bump(&self.counters.failed);
                    break;
                }
            }
        }

        log::info!("Telemetry stream ended after {} samples", applied);
        applied
    }

    /// Marker, pan and all five fields, under one lock
    fn apply_sample(&self, sample: &TelemetrySample) {
        let position = sample.position();
        {
            let mut surface = self.lock_surface();
            surface.move_marker(position);
            surface.pan_to(position);
            for field in InfoField::ALL {
                surface.set_field(field, &field.format(sample));
            }
            surface.sample_applied();
        }

        Counters::bump(&self.counters.samples_applied);
        log::debug!("Applied sample at {} speed {:.2}", position, sample.speed);
    }
}

impl<S, D> Tracker<S, D>
where
    S: TelemetrySource + 'static,
    D: MapSurface + Send + 'static,
{
    /// Drive the tracker until `shutdown` resolves
    ///
    /// Refreshes run as separate tasks, so a tick fires on schedule no matter
    /// how long earlier replays take. Refreshes still in flight at shutdown
    /// are aborted.
    pub async fn run(
        self: Arc<Self>,
        mut requests: RefreshRequests,
        shutdown: impl Future<Output = ()>,
    ) -> RefreshStats {
        let mut replays = JoinSet::new();
        self.spawn_refresh(&mut replays, RefreshTrigger::Startup);

        let period = self.config.refresh_interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);
        let mut button_connected = true;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => self.spawn_refresh(&mut replays, RefreshTrigger::Timer),
                request = requests.rx.recv(), if button_connected => match request {
                    Some(()) => self.spawn_refresh(&mut replays, RefreshTrigger::Manual),
                    None => {
                        log::debug!("Refresh button disconnected");
                        button_connected = false;
                    }
                },
                Some(result) = replays.join_next(), if !replays.is_empty() => {
                    match result {
                        Ok(outcome) => log::debug!("Refresh finished: {:?}", outcome),
                        Err(e) if e.is_panic() => log::error!("Refresh task panicked: {}", e),
                        Err(_) => {}
                    }
                }
            }
        }

        log::info!("Stopping tracker, aborting {} running refreshes", replays.len());
        replays.shutdown().await;
        self.stats()
    }

    fn spawn_refresh(self: &Arc<Self>, replays: &mut JoinSet<RefreshOutcome>, trigger: RefreshTrigger) {
        log::debug!("Refresh triggered by {}", trigger);
        let tracker = Arc::clone(self);
        replays.spawn(async move {
            match trigger {
                RefreshTrigger::Manual => tracker.manual_refresh().await,
                RefreshTrigger::Startup | RefreshTrigger::Timer => tracker.fetch_and_replay().await,
            }
        });
    }
}
