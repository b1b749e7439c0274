//! Shared utility functions

/// Normalize a heading to [0, 360) degrees
#[inline]
pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Signed shortest rotation from `from` to `to`, in (-180, 180] degrees.
///
/// Positive means counter-clockwise.
#[inline]
pub fn angle_diff(to: f64, from: f64) -> f64 {
    let d = normalize_degrees(to - from);
    if d > 180.0 { d - 360.0 } else { d }
}

/// Nearest canonical heading (0, 90, 180 or 270)
#[inline]
pub fn nearest_canonical(heading: f64) -> f64 {
    normalize_degrees((heading / 90.0).round() * 90.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_degrees() {
        assert_relative_eq!(normalize_degrees(370.0), 10.0);
        assert_relative_eq!(normalize_degrees(-10.0), 350.0);
        assert_relative_eq!(normalize_degrees(720.0), 0.0);
        assert_eq!(normalize_degrees(-1e-15), 0.0);
    }

    #[test]
    fn test_angle_diff_takes_short_way() {
        assert_relative_eq!(angle_diff(10.0, 350.0), 20.0);
        assert_relative_eq!(angle_diff(350.0, 10.0), -20.0);
        assert_relative_eq!(angle_diff(180.0, 0.0), 180.0);
        assert_relative_eq!(angle_diff(90.0, 270.0), 180.0);
    }

    #[test]
    fn test_nearest_canonical() {
        assert_eq!(nearest_canonical(44.0), 0.0);
        assert_eq!(nearest_canonical(46.0), 90.0);
        assert_eq!(nearest_canonical(350.0), 0.0);
        assert_eq!(nearest_canonical(268.0), 270.0);
    }
}
