//! Conversion counters and duration percentiles.
//!
//! Counters are atomics; duration samples sit in a bounded ring behind a
//! mutex.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Number of duration samples kept for percentile estimates.
const DURATION_WINDOW: usize = 512;

/// Process-wide conversion metrics shared by every request.
#[derive(Debug, Default)]
pub struct ConversionMetrics {
    started: AtomicU64,
    succeeded: AtomicU64,
    fallbacks: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,
    input_bytes: AtomicU64,
    output_bytes: AtomicU64,
    durations: Mutex<VecDeque<Duration>>,
}

impl ConversionMetrics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// A conversion was admitted with `input_bytes` of source data.
    pub fn record_started(&self, input_bytes: u64) {
        self.started.fetch_add(1, Ordering::Relaxed);
        self.input_bytes.fetch_add(input_bytes, Ordering::Relaxed);
    }

    /// The requested artifact was produced.
    pub fn record_success(&self, duration: Duration, output_bytes: u64) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.output_bytes.fetch_add(output_bytes, Ordering::Relaxed);
        self.push_duration(duration);
    }

    /// Rendering failed and the intermediate DXF was returned instead.
    pub fn record_fallback(&self, duration: Duration, output_bytes: u64) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        self.output_bytes.fetch_add(output_bytes, Ordering::Relaxed);
        self.push_duration(duration);
    }

    /// No artifact could be produced.
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A stage exceeded its time bound. Also counted as a failure.
    pub fn record_timeout(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// The caller went away mid-conversion.
    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    fn push_duration(&self, duration: Duration) {
        if let Ok(mut samples) = self.durations.lock() {
            if samples.len() == DURATION_WINDOW {
                samples.pop_front();
            }
            samples.push_back(duration);
        }
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut sorted: Vec<Duration> = self
            .durations
            .lock()
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        sorted.sort_unstable();

        MetricsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            input_bytes: self.input_bytes.load(Ordering::Relaxed),
            output_bytes: self.output_bytes.load(Ordering::Relaxed),
            duration_p50_ms: percentile_ms(&sorted, 50),
            duration_p95_ms: percentile_ms(&sorted, 95),
            sample_count: sorted.len() as u64,
        }
    }
}

fn percentile_ms(sorted: &[Duration], pct: usize) -> Option<u64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() - 1) * pct) / 100;
    sorted.get(idx).map(|d| d.as_millis() as u64)
}

/// Serializable view of [`ConversionMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub started: u64,
    pub succeeded: u64,
    pub fallbacks: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub duration_p50_ms: Option<u64>,
    pub duration_p95_ms: Option<u64>,
    pub sample_count: u64,
}
