//! # Joystick Normalizer
//!
//! Turns a [`RawSample`] into [`NormalizedControls`] using a
//! [`CalibrationProfile`].
//!
//! Per stick axis:
//! 1. subtract the calibrated center
//! 2. remap the centered value from the observed range onto [-1, 1]
//! 3. clamp and apply the deadband
//!
//! Step 2 is one affine map of `[min, max]` onto `[-1, 1]`. An axis whose
//! observed range has zero width skips it and passes the centered value
//! through.
//!
//! Triggers are folded into one signed value, `right - left`, after mapping
//! each from [-1, 1] to [0, 1].

use tracing::warn;

use super::mapper::{Buttons, RawSample};
use super::profile::{CalibrationProfile, StickAxis};
use super::range::{map_ranges, squeeze, CANONICAL};

/// Stick deadband used when none is configured.
pub const DEFAULT_STICK_DEADBAND: f32 = 0.15;

/// D-Pad directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DPad {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// Calibrated controller state for one control cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NormalizedControls {
    pub left_x: f32,
    pub left_y: f32,
    pub right_x: f32,
    pub right_y: f32,
    /// Right trigger minus left trigger, in [-1, 1].
    pub triggers: f32,
    pub buttons: Buttons,
    pub dpad: DPad,
}

/// Applies a calibration profile and deadband to raw samples.
///
/// # Examples
///
/// ```
/// use rov_pilot::controller::mapper::RawSample;
/// use rov_pilot::controller::normalizer::JoystickNormalizer;
/// use rov_pilot::controller::profile::CalibrationProfile;
///
/// let normalizer = JoystickNormalizer::new(CalibrationProfile::default(), 0.15);
///
/// let mut raw = RawSample::default();
/// raw.left_x = 0.1;  // Inside the deadband
/// raw.left_y = -1.0;
///
/// let controls = normalizer.normalize(&raw);
/// assert_eq!(controls.left_x, 0.0);
/// assert_eq!(controls.left_y, -1.0);
/// ```
#[derive(Debug, Clone)]
pub struct JoystickNormalizer {
    profile: CalibrationProfile,
    deadband: f32,
    identity_axes: [bool; 4],
}

impl JoystickNormalizer {
    /// Creates a normalizer.
    ///
    /// Axes with a zero-width observed range are reported once here and
    /// mapped as identity from then on.
    #[must_use]
    pub fn new(profile: CalibrationProfile, deadband: f32) -> Self {
        let mut identity_axes = [false; 4];
        for axis in profile.degenerate_axes() {
            warn!(
                "Calibrated range for {} is degenerate ({:?}), using identity mapping",
                axis,
                profile.axis(axis).range()
            );
            identity_axes[axis.index()] = true;
        }

        Self {
            profile,
            deadband: deadband.max(0.0),
            identity_axes,
        }
    }

    /// The profile in use.
    #[must_use]
    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    /// The stick deadband in use.
    #[must_use]
    pub fn deadband(&self) -> f32 {
        self.deadband
    }

    /// Returns true if `axis` fell back to identity mapping.
    #[must_use]
    pub fn is_identity(&self, axis: StickAxis) -> bool {
        self.identity_axes[axis.index()]
    }

    /// Normalizes one raw sample.
    #[must_use]
    pub fn normalize(&self, raw: &RawSample) -> NormalizedControls {
        NormalizedControls {
            left_x: self.stick(StickAxis::LeftX, raw.left_x),
            left_y: self.stick(StickAxis::LeftY, raw.left_y),
            right_x: self.stick(StickAxis::RightX, raw.right_x),
            right_y: self.stick(StickAxis::RightY, raw.right_y),
            triggers: combine_triggers(raw.left_trigger, raw.right_trigger),
            buttons: raw.buttons,
            dpad: DPad {
                up: raw.hat_y > 0,
                down: raw.hat_y < 0,
                left: raw.hat_x < 0,
                right: raw.hat_x > 0,
            },
        }
    }

    fn stick(&self, axis: StickAxis, value: f32) -> f32 {
        let cal = self.profile.axis(axis);
        let centered = value - cal.center;

        let mapped = if self.identity_axes[axis.index()] {
            centered
        } else {
            map_ranges(centered, cal.range(), CANONICAL).unwrap_or(centered)
        };

        squeeze(mapped, CANONICAL.0, CANONICAL.1, self.deadband)
    }
}

/// Folds two triggers in native [-1, 1] into one signed value.
///
/// Each trigger becomes `(v + 1) / 2` in [0, 1]; the result is
/// `right - left`, so a fully pressed right trigger gives 1.
#[must_use]
pub fn combine_triggers(left: f32, right: f32) -> f32 {
    let left = ((left + 1.0) / 2.0).clamp(0.0, 1.0);
    let right = ((right + 1.0) / 2.0).clamp(0.0, 1.0);
    let combined = right - left;
    if combined.is_nan() {
        0.0
    } else {
        combined
    }
}
