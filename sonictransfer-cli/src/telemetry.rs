//! Progress aggregation for a running send or receive, sampled periodically
//! rather than on every `SessionEvent` so a fast transfer doesn't flood the
//! log with one line per chunk.

use crate::logging::{ProgressEvent, SummaryEvent};
use chrono::Utc;
use std::time::Instant;

pub struct TelemetryAggregator {
    chunks_done: u32,
    chunks_total: u32,
    bytes_done: u64,
    start: Instant,
    last_sample: Instant,
    sample_interval_secs: f64,
}

impl TelemetryAggregator {
    pub fn new(sample_interval_secs: f64) -> Self {
        let now = Instant::now();
        Self {
            chunks_done: 0,
            chunks_total: 0,
            bytes_done: 0,
            start: now,
            last_sample: now,
            sample_interval_secs,
        }
    }

    pub fn record_chunk(&mut self, index: u32, total: u32, chunk_bytes: usize) {
        self.chunks_done = index + 1;
        self.chunks_total = total;
        self.bytes_done += chunk_bytes as u64;
    }

    pub fn bytes_done(&self) -> u64 {
        self.bytes_done
    }

    fn should_sample(&self) -> bool {
        self.last_sample.elapsed().as_secs_f64() >= self.sample_interval_secs
    }

    /// Returns a progress sample if the interval has elapsed since the last
    /// one, resetting the sample clock either way.
    pub fn sample(&mut self) -> Option<ProgressEvent> {
        if !self.should_sample() {
            return None;
        }
        self.last_sample = Instant::now();
        Some(ProgressEvent {
            timestamp: Utc::now(),
            chunks_done: self.chunks_done,
            chunks_total: self.chunks_total,
            bytes_done: self.bytes_done,
        })
    }

    pub fn summary(&self, status: &str) -> SummaryEvent {
        let duration_secs = self.start.elapsed().as_secs_f64();
        let throughput = if duration_secs > 0.0 {
            self.bytes_done as f64 / duration_secs
        } else {
            0.0
        };
        SummaryEvent {
            timestamp: Utc::now(),
            duration_secs,
            bytes_transferred: self.bytes_done,
            throughput_bytes_per_sec: throughput,
            status: status.to_string(),
        }
    }
}
