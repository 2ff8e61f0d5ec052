//! Canned accelerometer motions and sample-file parsers.
//!
//! Preset and custom samples are in emulator units (1 unit = 0.00981 m/s²,
//! so 1000 is one g). Replay files are in m/s² and go through the normal
//! conversion.
//!
//! Both file formats are one sample per line, three comma-separated numbers:
//!
//! ```text
//! # x, y, z
//! -24, -88, -1032
//! 0, 0, -1000
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::fmt;
use std::str::FromStr;

use sensorlink_types::{EncodingError, Frame, LinkError, Sample};
use sensorlink_wire::{accel_frame_raw, MAX_BATCH_SAMPLES};

const ONE_G: i16 = 1000;
/// One g split evenly over two axes (1000 / √2).
const HALF_TILT: i16 = 707;

/// A fixed accelerometer reading the emulator can be put into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPreset {
    TiltLeft,
    TiltRight,
    TiltForward,
    TiltBack,
    GravityPosX,
    GravityNegX,
    GravityPosY,
    GravityNegY,
    GravityPosZ,
    GravityNegZ,
}

impl MotionPreset {
    pub const ALL: [MotionPreset; 10] = [
        MotionPreset::TiltLeft,
        MotionPreset::TiltRight,
        MotionPreset::TiltForward,
        MotionPreset::TiltBack,
        MotionPreset::GravityPosX,
        MotionPreset::GravityNegX,
        MotionPreset::GravityPosY,
        MotionPreset::GravityNegY,
        MotionPreset::GravityPosZ,
        MotionPreset::GravityNegZ,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MotionPreset::TiltLeft => "tilt-left",
            MotionPreset::TiltRight => "tilt-right",
            MotionPreset::TiltForward => "tilt-forward",
            MotionPreset::TiltBack => "tilt-back",
            MotionPreset::GravityPosX => "gravity+x",
            MotionPreset::GravityNegX => "gravity-x",
            MotionPreset::GravityPosY => "gravity+y",
            MotionPreset::GravityNegY => "gravity-y",
            MotionPreset::GravityPosZ => "gravity+z",
            MotionPreset::GravityNegZ => "gravity-z",
        }
    }

    /// The reading this preset puts the emulator into, `[x, y, z]`.
    pub fn sample(self) -> [i16; 3] {
        match self {
            MotionPreset::TiltLeft => [-HALF_TILT, 0, -HALF_TILT],
            MotionPreset::TiltRight => [HALF_TILT, 0, -HALF_TILT],
            MotionPreset::TiltForward => [0, -HALF_TILT, -HALF_TILT],
            MotionPreset::TiltBack => [0, HALF_TILT, -HALF_TILT],
            MotionPreset::GravityPosX => [ONE_G, 0, 0],
            MotionPreset::GravityNegX => [-ONE_G, 0, 0],
            MotionPreset::GravityPosY => [0, ONE_G, 0],
            MotionPreset::GravityNegY => [0, -ONE_G, 0],
            MotionPreset::GravityPosZ => [0, 0, ONE_G],
            MotionPreset::GravityNegZ => [0, 0, -ONE_G],
        }
    }
}

impl fmt::Display for MotionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MotionPreset {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        MotionPreset::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| LinkError::Parse(format!("unknown motion '{}'", s.trim())))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// File parsers
// ────────────────────────────────────────────────────────────────────────────

fn parse_lines<T, F>(text: &str, mut parse_value: F) -> Result<Vec<[T; 3]>, LinkError>
where
    T: Copy + Default,
    F: FnMut(&str) -> Option<T>,
{
    let mut out = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 3 {
            return Err(LinkError::Parse(format!(
                "line {}: expected 3 comma-separated values, found {}",
                index + 1,
                fields.len()
            )));
        }
        let mut sample = [T::default(); 3];
        for (slot, field) in sample.iter_mut().zip(&fields) {
            *slot = parse_value(field).ok_or_else(|| {
                LinkError::Parse(format!("line {}: invalid value '{field}'", index + 1))
            })?;
        }
        out.push(sample);
    }
    Ok(out)
}

/// Parse a custom motion file of integer samples in emulator units.
pub fn parse_accel_file(text: &str) -> Result<Vec<[i16; 3]>, LinkError> {
    parse_lines(text, |f| f.parse::<i16>().ok())
}

/// Parse a replay file of samples in m/s².
pub fn parse_replay_file(text: &str) -> Result<Vec<Sample>, LinkError> {
    let rows = parse_lines(text, |f| f.parse::<f64>().ok().filter(|v| v.is_finite()))?;
    Ok(rows.into_iter().map(|[x, y, z]| Sample::new(x, y, z)).collect())
}

/// Encode raw samples as as many accel frames as the batch limit requires.
pub fn raw_frames(samples: &[[i16; 3]]) -> Result<Vec<Frame>, EncodingError> {
    samples.chunks(MAX_BATCH_SAMPLES).map(accel_frame_raw).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_names_round_trip() {
        for preset in MotionPreset::ALL {
            assert_eq!(preset.name().parse::<MotionPreset>().unwrap(), preset);
        }
        assert_eq!("Gravity-Z".parse::<MotionPreset>().unwrap(), MotionPreset::GravityNegZ);
        assert!("spin".parse::<MotionPreset>().is_err());
        assert!("custom".parse::<MotionPreset>().is_err());
    }

    #[test]
    fn resting_face_up_is_minus_one_g_on_z() {
        assert_eq!(MotionPreset::GravityNegZ.sample(), [0, 0, -1000]);
        assert_eq!(MotionPreset::TiltLeft.sample(), [-707, 0, -707]);
    }

    #[test]
    fn accel_file_skips_blanks_and_comments() {
        let text = "# recorded\n-24, -88, -1032\n\n  0,0,-1000  \n";
        assert_eq!(
            parse_accel_file(text).unwrap(),
            vec![[-24, -88, -1032], [0, 0, -1000]]
        );
    }

    #[test]
    fn accel_file_reports_offending_line() {
        let err = parse_accel_file("1, 2, 3\n4, 5\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");

        let err = parse_accel_file("1, 2, 99999\n").unwrap_err();
        assert!(err.to_string().contains("99999"), "{err}");
    }

    #[test]
    fn replay_file_reads_physical_units() {
        let samples = parse_replay_file("0.0, 0.5, -9.81\n").unwrap();
        assert_eq!(samples, vec![Sample::new(0.0, 0.5, -9.81)]);
        assert!(parse_replay_file("1.0, nan, 2.0\n").is_err());
    }

    #[test]
    fn raw_frames_split_long_recordings() {
        let samples = vec![[0, 0, -1000]; 300];
        let frames = raw_frames(&samples).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload()[0], 255);
        assert_eq!(frames[1].payload()[0], 45);
        assert!(raw_frames(&[]).unwrap().is_empty());
    }
}
