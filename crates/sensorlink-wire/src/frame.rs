//! Frame construction for the compass and accelerometer channels.
//!
//! ```text
//! Compass payload := heading_fixed:4 BE | calibration:1
//! Accel payload   := count:1 | (x:2 BE | y:2 BE | z:2 BE){count}
//! ```
//!
//! # Example
//!
//! ```rust
//! use sensorlink_types::{CalibrationState, Heading, Sample};
//! use sensorlink_wire::{accel_frame, compass_frame};
//!
//! let compass = compass_frame(Heading(90.0), CalibrationState::Calibrated).unwrap();
//! assert_eq!(compass.payload(), &[0x00, 0x00, 0x40, 0x00, 0x02]);
//!
//! let accel = accel_frame(&[Sample::new(0.0, 0.0, -9.81)], false).unwrap();
//! assert_eq!(accel.payload(), &[0x01, 0x00, 0x00, 0x00, 0x00, 0xFC, 0x18]);
//! ```

use sensorlink_types::{CalibrationState, Channel, EncodingError, Frame, Heading, Sample};
use tracing::trace;

use crate::codec::{pack, PackValue};

/// m/s² per emulator accel unit. A protocol constant, not derived at runtime.
pub const ACCEL_SCALE: f64 = 0.00981;

/// The count field is a single byte.
pub const MAX_BATCH_SAMPLES: usize = 255;

/// Fixed-point representation of a heading: a full turn maps to 65536.
///
/// Values outside `[0, 360)` are not normalised; the codec's 32-bit
/// truncation takes care of negative results.
pub fn heading_to_fixed(heading: Heading) -> i64 {
    (heading.degrees() * 65536.0 / 360.0).round() as i64
}

/// Convert one acceleration component from m/s² to emulator units.
///
/// Saturates at the `i16` bounds; NaN maps to 0.
pub fn accel_to_raw(component: f64) -> i16 {
    (component / ACCEL_SCALE).round() as i16
}

/// Build a compass update frame.
pub fn compass_frame(heading: Heading, calibration: CalibrationState) -> Result<Frame, EncodingError> {
    let fixed = heading_to_fixed(heading);
    let payload = pack(
        "Ib",
        &[PackValue::Int(fixed), PackValue::from(calibration.as_byte())],
    )?;
    trace!(heading = heading.degrees(), fixed, ?calibration, "compass frame");
    Ok(Frame::new(Channel::Compass, &payload))
}

/// Build an accelerometer batch frame from physical samples.
///
/// When `reversed` is set every axis is negated before conversion.
pub fn accel_frame(samples: &[Sample], reversed: bool) -> Result<Frame, EncodingError> {
    if samples.len() > MAX_BATCH_SAMPLES {
        return Err(EncodingError::BatchTooLarge(samples.len()));
    }
    let raw: Vec<[i16; 3]> = samples
        .iter()
        .map(|s| if reversed { s.inverted() } else { *s })
        .map(|s| [accel_to_raw(s.x), accel_to_raw(s.y), accel_to_raw(s.z)])
        .collect();
    accel_frame_raw(&raw)
}

/// Build an accelerometer batch frame from values already in emulator units.
pub fn accel_frame_raw(samples: &[[i16; 3]]) -> Result<Frame, EncodingError> {
    if samples.len() > MAX_BATCH_SAMPLES {
        return Err(EncodingError::BatchTooLarge(samples.len()));
    }

    let format = format!("b{}", "hhh".repeat(samples.len()));
    let mut values = Vec::with_capacity(1 + 3 * samples.len());
    values.push(PackValue::from(samples.len() as u8));
    for [x, y, z] in samples {
        values.extend([PackValue::from(*x), PackValue::from(*y), PackValue::from(*z)]);
    }

    let payload = pack(&format, &values)?;
    trace!(count = samples.len(), bytes = payload.len(), "accel frame");
    Ok(Frame::new(Channel::Accel, &payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorlink_types::FRAME_SENTINEL;

    fn decode_i16(bytes: &[u8]) -> i16 {
        i16::from_be_bytes([bytes[0], bytes[1]])
    }

    #[test]
    fn heading_fixed_point_reference_values() {
        assert_eq!(heading_to_fixed(Heading(0.0)), 0);
        assert_eq!(heading_to_fixed(Heading(90.0)), 16384);
        assert_eq!(heading_to_fixed(Heading(180.0)), 32768);
        assert_eq!(heading_to_fixed(Heading(360.0)), 65536);
    }

    #[test]
    fn heading_fixed_point_rounds_to_nearest() {
        // 1° = 182.04…
        assert_eq!(heading_to_fixed(Heading(1.0)), 182);
        // 359.99° = 65534.18…
        assert_eq!(heading_to_fixed(Heading(359.99)), 65534);
    }

    #[test]
    fn compass_frame_layout() {
        let frame = compass_frame(Heading(90.0), CalibrationState::Calibrated).unwrap();
        assert_eq!(frame.as_bytes()[0], FRAME_SENTINEL);
        assert_eq!(frame.channel(), Channel::Compass);
        assert_eq!(frame.as_bytes()[1], 4);
        assert_eq!(frame.payload().len(), 5);
        assert_eq!(frame.payload(), &[0x00, 0x00, 0x40, 0x00, 0x02]);
    }

    #[test]
    fn compass_frame_full_turn_and_negative_heading() {
        let full = compass_frame(Heading(360.0), CalibrationState::Calibrating).unwrap();
        assert_eq!(full.payload(), &[0x00, 0x01, 0x00, 0x00, 0x01]);

        // -90° wraps modulo 2^32.
        let neg = compass_frame(Heading(-90.0), CalibrationState::Uncalibrated).unwrap();
        assert_eq!(neg.payload(), &[0xFF, 0xFF, 0xC0, 0x00, 0x00]);
    }

    #[test]
    fn accel_single_sample_payload() {
        let frame = accel_frame(&[Sample::new(0.0, 0.0, -9.81)], false).unwrap();
        assert_eq!(frame.as_bytes()[0], FRAME_SENTINEL);
        assert_eq!(frame.channel(), Channel::Accel);
        assert_eq!(frame.payload(), &[0x01, 0x00, 0x00, 0x00, 0x00, 0xFC, 0x18]);
    }

    #[test]
    fn accel_reversed_negates_axes() {
        let frame = accel_frame(&[Sample::new(0.0, 0.0, -9.81)], true).unwrap();
        assert_eq!(decode_i16(&frame.payload()[5..7]), 1000);
    }

    #[test]
    fn accel_payload_length_is_one_plus_six_per_sample() {
        for count in [0usize, 1, 2, 17, 255] {
            let samples = vec![Sample::new(1.0, 2.0, 3.0); count];
            let frame = accel_frame(&samples, false).unwrap();
            assert_eq!(frame.payload().len(), 1 + 6 * count);
            assert_eq!(frame.payload()[0] as usize, count);
        }
    }

    #[test]
    fn accel_empty_batch_is_count_zero() {
        let frame = accel_frame(&[], false).unwrap();
        assert_eq!(frame.as_bytes(), &[0x0B, 0x06, 0x00]);
    }

    #[test]
    fn accel_batch_over_limit_is_rejected() {
        let samples = vec![Sample::new(0.0, 0.0, 0.0); 256];
        assert_eq!(
            accel_frame(&samples, false).unwrap_err(),
            EncodingError::BatchTooLarge(256)
        );
    }

    #[test]
    fn accel_axes_keep_x_y_z_order() {
        let frame = accel_frame_raw(&[[1, -2, 3], [-4, 5, -6]]).unwrap();
        let p = frame.payload();
        assert_eq!(p[0], 2);
        let decoded: Vec<i16> = p[1..].chunks(2).map(decode_i16).collect();
        assert_eq!(decoded, vec![1, -2, 3, -4, 5, -6]);
    }

    #[test]
    fn accel_quantization_error_is_bounded() {
        let mut a = -300.0;
        while a <= 300.0 {
            let raw = accel_to_raw(a);
            let back = f64::from(raw) * ACCEL_SCALE;
            assert!(
                (back - a).abs() <= ACCEL_SCALE / 2.0 + 1e-12,
                "a={a} raw={raw} back={back}"
            );
            a += 0.1234;
        }
    }

    #[test]
    fn accel_out_of_range_saturates() {
        assert_eq!(accel_to_raw(1.0e6), i16::MAX);
        assert_eq!(accel_to_raw(-1.0e6), i16::MIN);
        assert_eq!(accel_to_raw(f64::NAN), 0);
    }
}
