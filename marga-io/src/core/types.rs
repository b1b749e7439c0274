//! Sensor reading types.

use serde::{Deserialize, Serialize};

/// Cumulative wheel rotation reported by the motor tachometers.
///
/// Counts are whole motor-degrees since the device was initialized and are
/// signed (reversing a wheel decrements its count).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TachoCounts {
    pub left: i64,
    pub right: i64,
}

impl TachoCounts {
    pub fn new(left: i64, right: i64) -> Self {
        Self { left, right }
    }
}

/// One reading from the range sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RangeReading {
    /// Distance to the first surface, in centimetres
    Echo(f32),
    /// Nothing within range (or the echo was lost)
    NoEcho,
}

impl RangeReading {
    /// Distance with "no echo" mapped to `max_range`.
    ///
    /// Range consumers treat a missing echo as "far away", which is what the
    /// ultrasonic hardware reports when nothing is in front of it.
    #[inline]
    pub fn or_max(self, max_range: f32) -> f32 {
        match self {
            RangeReading::Echo(d) => d.min(max_range),
            RangeReading::NoEcho => max_range,
        }
    }

    #[inline]
    pub fn is_echo(&self) -> bool {
        matches!(self, RangeReading::Echo(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_max() {
        assert_eq!(RangeReading::Echo(12.5).or_max(255.0), 12.5);
        assert_eq!(RangeReading::Echo(400.0).or_max(255.0), 255.0);
        assert_eq!(RangeReading::NoEcho.or_max(255.0), 255.0);
        assert!(!RangeReading::NoEcho.is_echo());
    }
}
