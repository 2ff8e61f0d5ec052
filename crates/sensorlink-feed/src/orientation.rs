//! Compass heading from a device orientation reading.
//!
//! Some platforms report a true compass heading alongside the raw rotation
//! angle; when they do it takes priority. Otherwise the rotation about the
//! vertical axis (`alpha`) stands in for the heading. In landscape the
//! device's reference edge is rotated a quarter turn, which is folded back in
//! here.

use sensorlink_types::Heading;

/// One orientation event as delivered by the device.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientationReading {
    /// Platform-provided compass heading in degrees, when available.
    pub compass_heading: Option<f64>,
    /// Rotation about the vertical axis in degrees.
    pub alpha: Option<f64>,
}

impl OrientationReading {
    pub fn from_compass(heading: f64) -> Self {
        Self {
            compass_heading: Some(heading),
            alpha: None,
        }
    }

    pub fn from_alpha(alpha: f64) -> Self {
        Self {
            compass_heading: None,
            alpha: Some(alpha),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenOrientation {
    #[default]
    Portrait,
    Landscape,
}

/// Pick the heading to report for `reading`.
///
/// Returns `None` when the reading carries neither a compass heading nor an
/// alpha angle. The result is not normalised into `[0, 360)`.
pub fn heading_from_reading(reading: OrientationReading, screen: ScreenOrientation) -> Option<Heading> {
    let base = reading.compass_heading.or(reading.alpha)?;
    let degrees = match screen {
        ScreenOrientation::Portrait => base,
        ScreenOrientation::Landscape => base + 90.0,
    };
    Some(Heading(degrees))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compass_heading_wins_over_alpha() {
        let reading = OrientationReading {
            compass_heading: Some(42.0),
            alpha: Some(300.0),
        };
        assert_eq!(
            heading_from_reading(reading, ScreenOrientation::Portrait),
            Some(Heading(42.0))
        );
    }

    #[test]
    fn alpha_is_fallback() {
        let reading = OrientationReading::from_alpha(123.5);
        assert_eq!(
            heading_from_reading(reading, ScreenOrientation::Portrait),
            Some(Heading(123.5))
        );
    }

    #[test]
    fn landscape_adds_quarter_turn() {
        let reading = OrientationReading::from_compass(300.0);
        assert_eq!(
            heading_from_reading(reading, ScreenOrientation::Landscape),
            Some(Heading(390.0))
        );
    }

    #[test]
    fn empty_reading_has_no_heading() {
        assert_eq!(
            heading_from_reading(OrientationReading::default(), ScreenOrientation::Portrait),
            None
        );
    }
}
