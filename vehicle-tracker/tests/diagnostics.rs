// Log output of failed refreshes
//
// Captures records with an in-process logger, so this binary holds a single
// test and never installs env_logger.
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::sync::Mutex;
use vehicle_tracker::{
    InfoField, RefreshOutcome, Result, SampleTime, Scene, TelemetryBatch, TelemetrySample,
    TelemetrySource, Tracker, TrackerConfig, TrackerError,
};

struct CaptureLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with("vehicle_tracker")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let mut records = self.records.lock().unwrap();
            records.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    records: Mutex::new(Vec::new()),
};

fn install_logger() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);
}

/// Error records logged since the last call
fn take_errors() -> Vec<String> {
    let mut records = LOGGER.records.lock().unwrap();
    records
        .drain(..)
        .filter(|(level, _)| *level == Level::Error)
        .map(|(_, message)| message)
        .collect()
}

struct ScriptedSource {
    responses: Mutex<VecDeque<Result<TelemetryBatch>>>,
}

impl TelemetrySource for ScriptedSource {
    async fn fetch_batch(&self) -> Result<TelemetryBatch> {
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_each_failed_fetch_logs_one_error() {
    install_logger();

    let malformed = serde_json::from_str::<TelemetryBatch>("[{\"latitude\": }]").unwrap_err();
    let sample = TelemetrySample {
        latitude: 39.9772,
        longitude: 116.3301,
        speed: 45.0,
        eta: 11.25,
        timestamp: SampleTime::Text("2008-10-23 02:53:10".into()),
    };
    let source = ScriptedSource {
        responses: Mutex::new(VecDeque::from(vec![
            Ok(vec![sample]),
            Err(TrackerError::Status(500)),
            Err(TrackerError::Parse(malformed)),
        ])),
    };
    let tracker = Tracker::initialize(TrackerConfig::new(), source, Scene::new()).unwrap();

    assert_eq!(tracker.fetch_and_replay().await, RefreshOutcome::Replayed { samples: 1 });
    assert!(take_errors().is_empty());
    let before = tracker.with_surface(Scene::clone);

    assert_eq!(tracker.fetch_and_replay().await, RefreshOutcome::Failed);
    let errors = take_errors();
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0].starts_with("Error fetching vehicle data"));
    assert!(errors[0].contains("500"));

    assert_eq!(tracker.fetch_and_replay().await, RefreshOutcome::Failed);
    let errors = take_errors();
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0].starts_with("Error fetching vehicle data"));

    // Nothing on screen changed
    let after = tracker.with_surface(Scene::clone);
    assert_eq!(before, after);
    assert_eq!(after.panel.get(InfoField::Speed), "45.00");
    assert_eq!(tracker.stats().failed, 2);
}
