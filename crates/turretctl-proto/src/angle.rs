use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const MILLI: f64 = 1000.0;

/// A signed axis angle in fixed-point millidegrees.
///
/// Fixed point keeps encoding exact: an angle survives the wire unchanged.
/// In configuration files it is written as plain degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Angle(i32);

impl Angle {
    pub const ZERO: Angle = Angle(0);

    /// Build from whole millidegrees.
    pub const fn from_millidegrees(millidegrees: i32) -> Self {
        Self(millidegrees)
    }

    /// Build from degrees, rounding to the nearest millidegree and
    /// saturating at the `i32` range. NaN maps to zero, so untrusted input
    /// goes through [`Angle::try_from_degrees`].
    pub fn from_degrees(degrees: f64) -> Self {
        let scaled = (degrees * MILLI).round();
        if scaled.is_nan() {
            return Self::ZERO;
        }
        Self(scaled.clamp(i32::MIN as f64, i32::MAX as f64) as i32)
    }

    /// Like [`Angle::from_degrees`], but `None` for NaN and infinities.
    pub fn try_from_degrees(degrees: f64) -> Option<Self> {
        degrees.is_finite().then(|| Self::from_degrees(degrees))
    }

    pub const fn millidegrees(self) -> i32 {
        self.0
    }

    pub fn degrees(self) -> f64 {
        f64::from(self.0) / MILLI
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}°", self.degrees())
    }
}

impl Serialize for Angle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.degrees())
    }
}

impl<'de> Deserialize<'de> for Angle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let degrees = f64::deserialize(deserializer)?;
        Angle::try_from_degrees(degrees)
            .ok_or_else(|| serde::de::Error::custom("angle must be a finite number of degrees"))
    }
}

/// Pan (azimuth) and tilt (elevation) of the turret head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub azimuth: Angle,
    pub elevation: Angle,
}

impl Orientation {
    pub const fn new(azimuth: Angle, elevation: Angle) -> Self {
        Self { azimuth, elevation }
    }

    /// Convenience constructor from degrees.
    pub fn degrees(azimuth: f64, elevation: f64) -> Self {
        Self::new(Angle::from_degrees(azimuth), Angle::from_degrees(elevation))
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "az {} el {}", self.azimuth, self.elevation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degrees_round_to_millidegrees() {
        assert_eq!(Angle::from_degrees(30.0).millidegrees(), 30_000);
        assert_eq!(Angle::from_degrees(-10.0004).millidegrees(), -10_000);
        assert_eq!(Angle::from_degrees(0.0006).millidegrees(), 1);
        assert_eq!(Angle::from_millidegrees(-45_500).degrees(), -45.5);
    }

    #[test]
    fn extreme_inputs_saturate() {
        assert_eq!(Angle::from_degrees(1e12).millidegrees(), i32::MAX);
        assert_eq!(Angle::from_degrees(-1e12).millidegrees(), i32::MIN);
        assert_eq!(Angle::from_degrees(f64::NAN), Angle::ZERO);
    }

    #[test]
    fn only_finite_degrees_convert() {
        assert_eq!(Angle::try_from_degrees(-12.25), Some(Angle::from_millidegrees(-12_250)));
        assert_eq!(Angle::try_from_degrees(1e12), Some(Angle::from_millidegrees(i32::MAX)));
        assert_eq!(Angle::try_from_degrees(f64::NAN), None);
        assert_eq!(Angle::try_from_degrees(f64::INFINITY), None);
        assert_eq!(Angle::try_from_degrees(f64::NEG_INFINITY), None);
    }

    #[test]
    fn serde_uses_degrees() {
        let orientation = Orientation::degrees(12.5, -3.0);
        let json = serde_json::to_string(&orientation).unwrap();
        assert_eq!(json, r#"{"azimuth":12.5,"elevation":-3.0}"#);

        let back: Orientation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, orientation);
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(Orientation::degrees(30.0, 10.0).to_string(), "az 30.000° el 10.000°");
    }
}
