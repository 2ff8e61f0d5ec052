//! Rate shaping for sensor readings.
//!
//! Motion sources fire far more often than the emulator needs. Two gates sit
//! between the device and the wire:
//!
//! ```text
//!   reading ──▶ Throttle (10 ms) ──▶ SampleBatcher ──every 200 ms──▶ frame(s)
//! ```
//!
//! Both take the current [`Instant`] as an argument instead of reading the
//! clock, so callers decide what "now" means and tests stay deterministic.
//!
//! # Example
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use sensorlink_feed::SampleBatcher;
//! use sensorlink_types::Sample;
//!
//! let t0 = Instant::now();
//! let mut batcher = SampleBatcher::new(Duration::from_millis(200));
//!
//! batcher.push(Sample::new(0.0, 0.0, -9.81));
//! assert_eq!(batcher.take_due(t0).len(), 1); // first flush goes out at once
//!
//! batcher.push(Sample::new(0.0, 0.0, -9.81));
//! assert!(batcher.take_due(t0 + Duration::from_millis(50)).is_empty());
//! assert_eq!(batcher.take_due(t0 + Duration::from_millis(200)).len(), 1);
//! ```

use std::time::{Duration, Instant};

use sensorlink_types::Sample;
use sensorlink_wire::MAX_BATCH_SAMPLES;

// ────────────────────────────────────────────────────────────────────────────
// Throttle
// ────────────────────────────────────────────────────────────────────────────

/// Lets at most one event through per `period`; the rest are dropped.
#[derive(Debug, Clone)]
pub struct Throttle {
    period: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// `true` when an event at `now` should be processed.
    pub fn allow(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.period => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SampleBatcher
// ────────────────────────────────────────────────────────────────────────────

/// Queues accelerometer samples and hands them out in flushes spaced at
/// least `flush_interval` apart.
///
/// The first flush happens as soon as there is something to send. A flush
/// never yields a batch larger than the accel frame can carry; a backlog is
/// split into consecutive batches of at most 255 samples.
#[derive(Debug, Clone)]
pub struct SampleBatcher {
    flush_interval: Duration,
    pending: Vec<Sample>,
    last_flush: Option<Instant>,
}

impl SampleBatcher {
    pub fn new(flush_interval: Duration) -> Self {
        Self {
            flush_interval,
            pending: Vec::new(),
            last_flush: None,
        }
    }

    pub fn push(&mut self, sample: Sample) {
        self.pending.push(sample);
    }

    /// Number of samples waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// `true` if a flush at `now` would not violate the interval.
    pub fn is_due(&self, now: Instant) -> bool {
        !self.pending.is_empty()
            && self
                .last_flush
                .is_none_or(|last| now.saturating_duration_since(last) >= self.flush_interval)
    }

    /// Flush if due; otherwise return nothing and keep the queue.
    pub fn take_due(&mut self, now: Instant) -> Vec<Vec<Sample>> {
        if self.is_due(now) {
            self.take_all(now)
        } else {
            Vec::new()
        }
    }

    /// Flush unconditionally, e.g. when the source stops.
    pub fn take_all(&mut self, now: Instant) -> Vec<Vec<Sample>> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        self.last_flush = Some(now);
        let pending = std::mem::take(&mut self.pending);
        pending
            .chunks(MAX_BATCH_SAMPLES)
            .map(<[Sample]>::to_vec)
            .collect()
    }

    /// Drop queued samples and forget the last flush time.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.last_flush = None;
    }
}
