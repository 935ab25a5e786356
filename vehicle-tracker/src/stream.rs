//! Server-sent events follow mode
//!
//! The stream endpoint emits one `data:{json}` event per sample and paces the
//! events itself, so samples from a stream are applied as they arrive rather
//! than replayed with a delay.

use crate::types::{Result, TelemetrySample, TrackerError};
use std::collections::VecDeque;
use std::future::Future;

/// Longest line the decoder will buffer while waiting for its newline
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Incremental decoder for `text/event-stream` bodies
///
/// Bytes may be pushed in arbitrary chunks; an event is emitted once its
/// terminating blank line has been seen. Only the `data` field is kept.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to hold no newline
    scanned: usize,
    data_lines: Vec<String>,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the data of every event it completes
    ///
    /// Fails once an unterminated line grows past [`MAX_LINE_BYTES`].
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let newline = self.scanned + offset;
            self.scanned = 0;
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let text = String::from_utf8_lossy(&raw);
            let line = text.trim_end_matches(|c: char| c == '\n' || c == '\r');

            if line.is_empty() {
                if !self.data_lines.is_empty() {
                    events.push(self.data_lines.join("\n"));
                    self.data_lines.clear();
                }
                continue;
            }

            // Comment line
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            if field == "data" {
                self.data_lines.push(value.to_string());
            }
        }

        self.scanned = self.buffer.len();
        if self.buffer.len() > MAX_LINE_BYTES {
            let length = self.buffer.len();
            self.buffer.clear();
            self.scanned = 0;
            self.data_lines.clear();
            return Err(TrackerError::Stream(format!(
                "event stream line exceeds {} bytes ({} buffered)",
                MAX_LINE_BYTES, length
            )));
        }

        Ok(events)
    }
}

/// A stream of samples the tracker can follow
pub trait TelemetryStream: Send {
    /// Next sample, `None` once the stream has ended
    fn next_sample(&mut self) -> impl Future<Output = Option<Result<TelemetrySample>>> + Send;
}

/// Samples decoded from an open HTTP event stream
#[derive(Debug)]
pub struct SampleStream {
    response: reqwest::Response,
    decoder: EventStreamDecoder,
    pending: VecDeque<String>,
}

impl SampleStream {
    pub(crate) fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            decoder: EventStreamDecoder::new(),
            pending: VecDeque::new(),
        }
    }
}

impl TelemetryStream for SampleStream {
    async fn next_sample(&mut self) -> Option<Result<TelemetrySample>> {
        loop {
            if let Some(data) = self.pending.pop_front() {
                return Some(serde_json::from_str(&data).map_err(TrackerError::from));
            }

            match self.response.chunk().await {
                Ok(Some(bytes)) => match self.decoder.push(&bytes) {
                    Ok(events) => self.pending.extend(events),
                    Err(e) => return Some(Err(e)),
                },
                Ok(None) => return None,
                Err(e) => return Some(Err(TrackerError::Stream(e.to_string()))),
            }
        }
    }
}
