//! # Range Mapping
//!
//! Pure interpolation and clamp/deadband helpers shared by the input pipeline.
//!
//! ## Usage
//!
//! ```
//! use rov_pilot::controller::range::{map_ranges, squeeze};
//!
//! // Observed stick travel of [-0.9, 1.1] mapped onto the canonical range
//! let v = map_ranges(1.1, (-0.9, 1.1), (-1.0, 1.0)).unwrap();
//! assert_eq!(v, 1.0);
//!
//! // Small deflections collapse to exactly zero
//! assert_eq!(squeeze(0.1, -1.0, 1.0, 0.15), 0.0);
//! ```

use crate::error::{Result, RovPilotError};

/// Canonical signed control range.
pub const CANONICAL: (f32, f32) = (-1.0, 1.0);

/// Deadband applied by [`squeeze`] callers that have no better value.
pub const DEFAULT_DEADBAND: f32 = 0.1;

/// Source ranges narrower than this are treated as zero-width.
pub const MIN_RANGE_WIDTH: f32 = 1e-6;

/// Returns true when `range` is too narrow to divide by.
#[inline]
#[must_use]
pub fn is_degenerate(range: (f32, f32)) -> bool {
    let width = range.1 - range.0;
    !width.is_finite() || width.abs() < MIN_RANGE_WIDTH
}

/// Affinely remaps `x` from `from_range` onto `to_range`.
///
/// Both endpoints are exact: `from_range.0` yields `to_range.0` and
/// `from_range.1` yields `to_range.1`. The result is not clamped.
///
/// # Errors
///
/// Returns [`RovPilotError::DegenerateRange`] when `from_range` has zero width.
///
/// # Examples
///
/// ```
/// use rov_pilot::controller::range::map_ranges;
///
/// assert_eq!(map_ranges(0.0, (0.0, 255.0), (-1.0, 1.0)).unwrap(), -1.0);
/// assert_eq!(map_ranges(255.0, (0.0, 255.0), (-1.0, 1.0)).unwrap(), 1.0);
/// assert!(map_ranges(0.3, (0.5, 0.5), (-1.0, 1.0)).is_err());
/// ```
pub fn map_ranges(x: f32, from_range: (f32, f32), to_range: (f32, f32)) -> Result<f32> {
    if is_degenerate(from_range) {
        return Err(RovPilotError::DegenerateRange {
            min: from_range.0,
            max: from_range.1,
        });
    }

    let t = (x - from_range.0) / (from_range.1 - from_range.0);
    Ok(to_range.0 * (1.0 - t) + to_range.1 * t)
}

/// Clamps `x` into `[min, max]`, then zeroes it if the clamped magnitude is
/// within `deadband`.
///
/// NaN input yields 0.
///
/// # Examples
///
/// ```
/// use rov_pilot::controller::range::squeeze;
///
/// assert_eq!(squeeze(0.2, -1.0, 1.0, 0.15), 0.2);
/// assert_eq!(squeeze(1.5, -1.0, 1.0, 0.15), 1.0);
/// ```
#[must_use]
pub fn squeeze(x: f32, min: f32, max: f32, deadband: f32) -> f32 {
    if x.is_nan() {
        return 0.0;
    }

    // f32::clamp panics when min > max
    let clamped = x.max(min).min(max);
    if clamped.abs() <= deadband {
        0.0
    } else {
        clamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== map_ranges Tests ====================

    #[test]
    fn test_map_ranges_boundaries_exact() {
        let from = (-1.024_749_8, 0.968_231_2);
        assert_eq!(map_ranges(from.0, from, CANONICAL).unwrap(), -1.0);
        assert_eq!(map_ranges(from.1, from, CANONICAL).unwrap(), 1.0);
    }

    #[test]
    fn test_map_ranges_midpoint() {
        let v = map_ranges(128.0, (0.0, 256.0), CANONICAL).unwrap();
        assert!(v.abs() < 1e-6);
    }

    #[test]
    fn test_map_ranges_reversed_target() {
        assert_eq!(map_ranges(0.0, (0.0, 10.0), (1.0, -1.0)).unwrap(), 1.0);
        assert_eq!(map_ranges(10.0, (0.0, 10.0), (1.0, -1.0)).unwrap(), -1.0);
    }

    #[test]
    fn test_map_ranges_extrapolates() {
        let v = map_ranges(2.0, (0.0, 1.0), (0.0, 10.0)).unwrap();
        assert!((v - 20.0).abs() < 1e-5);
    }

    #[test]
    fn test_map_ranges_zero_width_is_error() {
        match map_ranges(0.5, (0.25, 0.25), CANONICAL) {
            Err(RovPilotError::DegenerateRange { min, max }) => {
                assert_eq!(min, 0.25);
                assert_eq!(max, 0.25);
            }
            other => panic!("Expected DegenerateRange, got: {:?}", other),
        }
    }

    #[test]
    fn test_map_ranges_non_finite_is_error() {
        assert!(map_ranges(0.0, (0.0, f32::INFINITY), CANONICAL).is_err());
        assert!(map_ranges(0.0, (f32::NAN, 1.0), CANONICAL).is_err());
    }

    #[test]
    fn test_is_degenerate() {
        assert!(is_degenerate((0.0, 0.0)));
        assert!(is_degenerate((0.3, 0.3 + 1e-9)));
        assert!(!is_degenerate((-1.0, 1.0)));
    }

    // ==================== squeeze Tests ====================

    #[test]
    fn test_squeeze_within_deadband() {
        assert_eq!(squeeze(0.1, -1.0, 1.0, 0.15), 0.0);
        assert_eq!(squeeze(-0.15, -1.0, 1.0, 0.15), 0.0);
    }

    #[test]
    fn test_squeeze_outside_deadband_passes_through() {
        assert_eq!(squeeze(0.2, -1.0, 1.0, 0.15), 0.2);
        assert_eq!(squeeze(-0.7, -1.0, 1.0, 0.15), -0.7);
    }

    #[test]
    fn test_squeeze_clamps() {
        assert_eq!(squeeze(1.5, -1.0, 1.0, 0.15), 1.0);
        assert_eq!(squeeze(-3.0, -1.0, 1.0, 0.15), -1.0);
    }

    #[test]
    fn test_squeeze_deadband_checked_after_clamp() {
        // Clamped into [0.05, 1.0] the value sits inside the deadband
        assert_eq!(squeeze(-2.0, 0.05, 1.0, 0.1), 0.0);
    }

    #[test]
    fn test_squeeze_default_deadband() {
        assert_eq!(squeeze(0.09, -1.0, 1.0, DEFAULT_DEADBAND), 0.0);
        assert_eq!(squeeze(0.11, -1.0, 1.0, DEFAULT_DEADBAND), 0.11);
    }

    #[test]
    fn test_squeeze_nan_is_zero() {
        assert_eq!(squeeze(f32::NAN, -1.0, 1.0, 0.1), 0.0);
    }
}
