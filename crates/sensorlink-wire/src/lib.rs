//! `sensorlink-wire` – The Emulator Debug-Channel Protocol
//!
//! Turns sensor values into the byte frames the emulator's virtual
//! peripherals understand.
//!
//! # Modules
//!
//! - [`codec`] – [`pack`][codec::pack]: a format-string driven packer that
//!   serialises integer and string fields big-endian, with explicit
//!   two's-complement truncation.
//! - [`frame`] – [`compass_frame`][frame::compass_frame] and
//!   [`accel_frame`][frame::accel_frame]: apply the emulator's fixed-point
//!   and scale conversions, then wrap the packed payload in a
//!   [`Frame`][sensorlink_types::Frame].

pub mod codec;
pub mod frame;

pub use codec::{pack, FieldCode, PackValue};
pub use frame::{
    accel_frame, accel_frame_raw, accel_to_raw, compass_frame, heading_to_fixed, ACCEL_SCALE,
    MAX_BATCH_SAMPLES,
};
