use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// First byte of every frame written to the emulator's debug channel.
pub const FRAME_SENTINEL: u8 = 0x0B;

/// One accelerometer reading in m/s², as produced by the motion source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Sample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The same reading with every axis negated, for platforms that report
    /// acceleration with the opposite sign convention.
    pub fn inverted(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

/// Compass heading in degrees. Not normalised: producers may hand over
/// values outside `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heading(pub f64);

impl Heading {
    pub fn degrees(self) -> f64 {
        self.0
    }
}

/// Magnetometer calibration status reported alongside a heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum CalibrationState {
    Uncalibrated = 0,
    Calibrating = 1,
    #[default]
    Calibrated = 2,
}

impl CalibrationState {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl FromStr for CalibrationState {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invalid" | "uncalibrated" => Ok(Self::Uncalibrated),
            "calibrating" => Ok(Self::Calibrating),
            "calibrated" => Ok(Self::Calibrated),
            other => Err(LinkError::Parse(format!(
                "unknown calibration state '{other}' (expected invalid, calibrating or calibrated)"
            ))),
        }
    }
}

/// Emulator debug-channel protocol selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Channel {
    Compass = 4,
    Accel = 6,
}

impl Channel {
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// A complete, immutable protocol message: sentinel, channel id, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    channel: Channel,
    bytes: Vec<u8>,
}

impl Frame {
    /// Wrap an already-packed payload in the frame header.
    pub fn new(channel: Channel, payload: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(2 + payload.len());
        bytes.push(FRAME_SENTINEL);
        bytes.push(channel.id());
        bytes.extend_from_slice(payload);
        Self { channel, bytes }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// The full wire representation, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Everything after the two header bytes.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[2..]
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Lifecycle of a single emulator connection. Transitions are linear:
/// `Connecting → Open → Closed` or `Connecting → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Details attached to a [`LinkEventKind::Close`] notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseInfo {
    /// WebSocket close code when the peer sent one.
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// Notification emitted by a transport client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "sensorlink-transport::ws://127.0.0.1:12344/"
    pub source: String,
    pub kind: LinkEventKind,
}

impl LinkEvent {
    pub fn new(source: impl Into<String>, kind: LinkEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            kind,
        }
    }
}

/// The fixed event vocabulary of a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkEventKind {
    Open,
    /// Raw inbound payload; not decoded.
    Message(Vec<u8>),
    Error(String),
    Close(CloseInfo),
}

impl LinkEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            LinkEventKind::Open => "open",
            LinkEventKind::Message(_) => "message",
            LinkEventKind::Error(_) => "error",
            LinkEventKind::Close(_) => "close",
        }
    }
}

/// Anything that can put a frame on the wire.
///
/// Implementations must be fire-and-forget: a sink that cannot transmit
/// right now drops the frame rather than queueing or failing.
pub trait FrameSink {
    fn send_frame(&self, frame: &Frame);
}

impl<T: FrameSink + ?Sized> FrameSink for &T {
    fn send_frame(&self, frame: &Frame) {
        (**self).send_frame(frame);
    }
}

impl<T: FrameSink + ?Sized> FrameSink for std::sync::Arc<T> {
    fn send_frame(&self, frame: &Frame) {
        (**self).send_frame(frame);
    }
}

/// A malformed packing or framing request.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodingError {
    #[error("format needs {needed} values but only {available} were supplied")]
    Underflow { needed: usize, available: usize },

    #[error("unsupported field code '{0}'")]
    UnsupportedField(char),

    #[error("field code '{code}' at position {position} cannot encode a {found} value")]
    TypeMismatch {
        code: char,
        position: usize,
        found: String,
    },

    #[error("accel batch of {0} samples exceeds the 255-sample frame limit")]
    BatchTooLarge(usize),
}

/// Top-level error type spanning encoding, transport and configuration.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkError {
    #[error("Encoding Error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Liveness Probe Failed: {0}")]
    Probe(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Parse Error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_layout_is_sentinel_channel_payload() {
        let frame = Frame::new(Channel::Compass, &[1, 2, 3, 4, 5]);
        assert_eq!(frame.as_bytes(), &[0x0B, 4, 1, 2, 3, 4, 5]);
        assert_eq!(frame.payload(), &[1, 2, 3, 4, 5]);
        assert_eq!(frame.channel(), Channel::Compass);
        assert_eq!(frame.len(), 7);
    }

    #[test]
    fn empty_payload_frame_keeps_header() {
        let frame = Frame::new(Channel::Accel, &[]);
        assert_eq!(frame.as_bytes(), &[0x0B, 6]);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn sample_inversion_negates_every_axis() {
        let s = Sample::new(1.5, -2.0, 9.81).inverted();
        assert_eq!(s, Sample::new(-1.5, 2.0, -9.81));
    }

    #[test]
    fn calibration_state_bytes() {
        assert_eq!(CalibrationState::Uncalibrated.as_byte(), 0);
        assert_eq!(CalibrationState::Calibrating.as_byte(), 1);
        assert_eq!(CalibrationState::Calibrated.as_byte(), 2);
        assert_eq!(CalibrationState::default(), CalibrationState::Calibrated);
    }

    #[test]
    fn calibration_state_parses_cli_names() {
        assert_eq!("invalid".parse::<CalibrationState>(), Ok(CalibrationState::Uncalibrated));
        assert_eq!("Calibrating".parse::<CalibrationState>(), Ok(CalibrationState::Calibrating));
        assert_eq!(" calibrated ".parse::<CalibrationState>(), Ok(CalibrationState::Calibrated));
        assert!("bogus".parse::<CalibrationState>().is_err());
    }

    #[test]
    fn channel_ids_match_emulator_protocol() {
        assert_eq!(Channel::Compass.id(), 4);
        assert_eq!(Channel::Accel.id(), 6);
    }

    #[test]
    fn link_event_roundtrip() {
        let event = LinkEvent::new(
            "sensorlink-transport::test",
            LinkEventKind::Close(CloseInfo::new(Some(1000), "bye")),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: LinkEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert_eq!(back.kind, LinkEventKind::Close(CloseInfo::new(Some(1000), "bye")));
        assert_eq!(back.kind.name(), "close");
    }

    #[test]
    fn encoding_error_converts_into_link_error() {
        let err: LinkError = EncodingError::UnsupportedField('q').into();
        assert!(err.to_string().contains("unsupported field code 'q'"));
    }
}
