//! Vehicle Tracker CLI Application
//!
//! This is the command-line front end for the vehicle tracker.
//! It uses the vehicle-tracker library and adds:
//! - TOML configuration files with command-line overrides
//! - A terminal rendering surface for the map and info panel
//! - A refresh button on stdin (Enter refreshes, q quits)
//! - Event-stream follow mode

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;
use vehicle_tracker::{
    refresh_button, HttpSource, RefreshButton, RefreshPolicy, Tracker, TrackerConfig,
};

mod config;
mod terminal;

use config::AppConfig;
use terminal::TerminalSurface;

type TerminalTracker = Tracker<HttpSource, TerminalSurface<Stdout>>;

/// Vehicle Tracker - Follow a vehicle's live position from a telemetry endpoint
#[derive(Parser, Debug)]
#[command(name = "vehicle-tracker")]
#[command(about = "Poll a telemetry endpoint and replay vehicle positions", long_about = None)]
#[command(version)]
struct Args {
    /// Batch telemetry endpoint returning a JSON array of samples
    #[arg(short, long, value_name = "URL")]
    endpoint: Option<String>,

    /// Server-sent events endpoint used with --stream
    #[arg(long, value_name = "URL")]
    stream_endpoint: Option<String>,

    /// Follow the event stream instead of polling
    #[arg(long)]
    stream: bool,

    /// Handling of refreshes that overlap a running replay (skip, restart, overlap)
    #[arg(short, long, value_name = "POLICY")]
    policy: Option<RefreshPolicy>,

    /// Auto-refresh period in milliseconds
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Delay between replayed samples in milliseconds
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Request timeout in milliseconds (default: none)
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Vehicle Tracker CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using tracker library v{}", vehicle_tracker::VERSION);

    let app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    let tracker_config = apply_overrides(app_config.tracker, &args);
    tracker_config
        .validate()
        .context("Invalid tracker settings")?;
    log::debug!("Tracker configuration: {:?}", tracker_config);

    let source = HttpSource::from_config(&tracker_config)
        .context("Failed to create HTTP client")?;
    let surface = TerminalSurface::new(app_config.display, io::stdout());

    if args.stream {
        let tracker = Tracker::initialize(tracker_config, source.clone(), surface)
            .context("Failed to initialize tracker")?;
        follow_mode(&tracker, &source).await;
    } else {
        let tracker = Tracker::initialize(tracker_config, source, surface)
            .context("Failed to initialize tracker")?;
        let tracker = Arc::new(tracker);
        polling_mode(tracker).await?;
    }

    Ok(())
}

/// Polling mode - startup fetch, timer refreshes and the refresh button
async fn polling_mode(tracker: Arc<TerminalTracker>) -> Result<()> {
    let (button, requests) = refresh_button();
    let (quit_tx, quit_rx) = oneshot::channel();
    spawn_refresh_input(button, quit_tx).context("Failed to start input thread")?;

    println!(
        "Polling {} every {} ms (policy: {}). Press Enter to refresh, q to quit.\n",
        tracker.config().endpoint,
        tracker.config().refresh_interval_ms,
        tracker.config().refresh_policy
    );

    let stats = tracker.run(requests, shutdown_signal(quit_rx)).await;

    println!("\n📊 Session summary:");
    println!("  Refreshes:  {}", stats.invoked);
    println!("  Completed:  {}", stats.completed);
    println!("  Skipped:    {}", stats.skipped);
    println!("  Superseded: {}", stats.superseded);
    println!("  Failed:     {}", stats.failed);
    println!("  Samples:    {}", stats.samples_applied);

    Ok(())
}

/// Follow mode - apply samples from the event stream until it ends
async fn follow_mode(tracker: &TerminalTracker, source: &HttpSource) {
    let url = tracker.config().stream_endpoint.clone();

    let follow = async {
        match source.open_stream(&url).await {
            Ok(stream) => tracker.follow_stream(stream).await,
            Err(e) => {
                log::error!("Error opening vehicle stream: {}", e);
                0
            }
        }
    };

    tokio::select! {
        applied = follow => println!("\n✓ Stream ended after {} samples", applied),
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                log::error!("Failed to listen for Ctrl-C: {}", e);
            }
            log::info!("Interrupted");
        }
    }
}

/// Resolves on `q` from stdin or Ctrl-C
async fn shutdown_signal(quit: oneshot::Receiver<()>) {
    tokio::select! {
        Ok(()) = quit => log::info!("Quit requested"),
        _ = tokio::signal::ctrl_c() => log::info!("Interrupted"),
    }
}

/// Read commands from stdin on a plain thread
///
/// Blocking stdin reads cannot be cancelled, so they stay off the runtime
/// and the thread is left detached at exit.
fn spawn_refresh_input(button: RefreshButton, quit: oneshot::Sender<()>) -> io::Result<()> {
    thread::Builder::new()
        .name("refresh-input".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::warn!("Failed to read stdin: {}", e);
                        break;
                    }
                };

                match line.trim() {
                    "" | "r" | "refresh" => {
                        if !button.press() {
                            break;
                        }
                    }
                    "q" | "quit" => {
                        let _ = quit.send(());
                        return;
                    }
                    other => println!("Unknown command {:?}: Enter refreshes, q quits", other),
                }
            }
            log::debug!("Refresh input closed");
        })?;
    Ok(())
}

/// Command-line values take precedence over the config file
fn apply_overrides(mut config: TrackerConfig, args: &Args) -> TrackerConfig {
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(endpoint) = &args.stream_endpoint {
        config.stream_endpoint = endpoint.clone();
    }
    if let Some(policy) = args.policy {
        config.refresh_policy = policy;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.refresh_interval_ms = interval_ms;
    }
    if let Some(delay_ms) = args.delay_ms {
        config.replay_delay_ms = delay_ms;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.request_timeout_ms = Some(timeout_ms);
    }
    config
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
