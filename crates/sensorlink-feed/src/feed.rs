//! [`SensorFeed`] – readings in, frames out.
//!
//! ```text
//!  on_motion ──▶ Throttle ──▶ SampleBatcher ──▶ accel_frame ──┐
//!  on_orientation ──▶ Throttle ──▶ heading ──▶ compass_frame ──┴──▶ FrameSink
//! ```
//!
//! The feed never talks to a socket. It hands finished frames to any
//! [`FrameSink`]: a live transport client or a recording sink in tests.

use std::time::{Duration, Instant};

use sensorlink_types::{CalibrationState, FrameSink, Heading, LinkError, Sample};
use sensorlink_wire::{accel_frame, compass_frame};
use tracing::{debug, trace};

use crate::batcher::{SampleBatcher, Throttle};
use crate::orientation::{heading_from_reading, OrientationReading, ScreenOrientation};

/// Tunables for a [`SensorFeed`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    /// Negate every accelerometer axis before encoding.
    pub reversed_axes: bool,
    pub accel_flush: Duration,
    pub motion_throttle: Duration,
    pub orientation_throttle: Duration,
    pub screen: ScreenOrientation,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            reversed_axes: false,
            accel_flush: Duration::from_millis(200),
            motion_throttle: Duration::from_millis(10),
            orientation_throttle: Duration::from_millis(500),
            screen: ScreenOrientation::Portrait,
        }
    }
}

/// Shapes device readings and forwards them to a sink.
pub struct SensorFeed<S: FrameSink> {
    sink: S,
    settings: FeedSettings,
    batcher: SampleBatcher,
    motion: Throttle,
    orientation: Throttle,
    last_sample: Option<Sample>,
    last_heading: Option<Heading>,
    frames_sent: u64,
}

impl<S: FrameSink> SensorFeed<S> {
    pub fn new(sink: S, settings: FeedSettings) -> Self {
        Self {
            batcher: SampleBatcher::new(settings.accel_flush),
            motion: Throttle::new(settings.motion_throttle),
            orientation: Throttle::new(settings.orientation_throttle),
            sink,
            settings,
            last_sample: None,
            last_heading: None,
            frames_sent: 0,
        }
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Most recent accepted accelerometer reading, as received.
    pub fn last_sample(&self) -> Option<Sample> {
        self.last_sample
    }

    /// Most recent heading sent to the sink.
    pub fn last_heading(&self) -> Option<Heading> {
        self.last_heading
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn pending_samples(&self) -> usize {
        self.batcher.pending()
    }

    /// Offer one accelerometer reading.
    ///
    /// Returns `Ok(false)` when the reading was throttled away. An accepted
    /// reading is queued and, if a flush is due, sent immediately.
    pub fn on_motion(&mut self, sample: Sample, now: Instant) -> Result<bool, LinkError> {
        if !self.motion.allow(now) {
            trace!("motion reading throttled");
            return Ok(false);
        }
        self.last_sample = Some(sample);
        self.batcher.push(sample);
        self.tick(now)?;
        Ok(true)
    }

    /// Offer one orientation reading.
    ///
    /// Returns the heading that was sent, or `None` when the reading was
    /// throttled or carried no usable angle. Headings from the feed are always
    /// reported as calibrated.
    pub fn on_orientation(
        &mut self,
        reading: OrientationReading,
        now: Instant,
    ) -> Result<Option<Heading>, LinkError> {
        let Some(heading) = heading_from_reading(reading, self.settings.screen) else {
            return Ok(None);
        };
        if !self.orientation.allow(now) {
            trace!("orientation reading throttled");
            return Ok(None);
        }
        let frame = compass_frame(heading, CalibrationState::Calibrated)?;
        self.sink.send_frame(&frame);
        self.frames_sent += 1;
        self.last_heading = Some(heading);
        Ok(Some(heading))
    }

    /// Send queued samples if the flush interval has elapsed. Returns the
    /// number of frames sent.
    pub fn tick(&mut self, now: Instant) -> Result<usize, LinkError> {
        let batches = self.batcher.take_due(now);
        self.send_batches(batches)
    }

    /// Send everything still queued, ignoring the flush interval.
    pub fn flush(&mut self, now: Instant) -> Result<usize, LinkError> {
        let batches = self.batcher.take_all(now);
        self.send_batches(batches)
    }

    /// Drop queued samples and reopen every gate, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.batcher.clear();
        self.motion.reset();
        self.orientation.reset();
        self.last_sample = None;
        self.last_heading = None;
    }

    fn send_batches(&mut self, batches: Vec<Vec<Sample>>) -> Result<usize, LinkError> {
        let mut sent = 0;
        for batch in batches {
            let frame = accel_frame(&batch, self.settings.reversed_axes)?;
            debug!(samples = batch.len(), bytes = frame.len(), "accel batch");
            self.sink.send_frame(&frame);
            sent += 1;
        }
        self.frames_sent += sent as u64;
        Ok(sent)
    }
}
