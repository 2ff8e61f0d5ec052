//! `sensorlink-feed` – The Sensor Pump
//!
//! Turns a stream of raw device readings into the frames the emulator
//! expects, at the cadence the emulator can digest.
//!
//! # Modules
//!
//! - [`batcher`] – [`SampleBatcher`] (accelerometer batching with a flush
//!   interval and the 255-sample frame limit) and [`Throttle`] (drop readings
//!   that arrive faster than a source's period).
//! - [`orientation`] – choosing a compass heading from an orientation reading.
//! - [`presets`] – canned motions (`tilt-left`, `gravity+z`, …) and parsers
//!   for accelerometer sample files.
//! - [`feed`] – [`SensorFeed`]: the pipeline from readings to a
//!   [`FrameSink`][sensorlink_types::FrameSink].

pub mod batcher;
pub mod feed;
pub mod orientation;
pub mod presets;

pub use batcher::{SampleBatcher, Throttle};
pub use feed::{FeedSettings, SensorFeed};
pub use orientation::{heading_from_reading, OrientationReading, ScreenOrientation};
pub use presets::{parse_accel_file, parse_replay_file, raw_frames, MotionPreset};
