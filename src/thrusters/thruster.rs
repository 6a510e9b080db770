//! # Thruster Module
//!
//! A single thruster: commanded power, polarity, multiplier and the pulse
//! range of its motor controller.
//!
//! ## Pulse Conversion
//!
//! ```text
//! effective = power × polarity × multiplier
//! pulse     = pulse_min + (pulse_max - pulse_min) × (effective + 1) / 2
//! ```
//!
//! truncated to whole microseconds. With the default 1100-1900 µs range,
//! full reverse is 1100, neutral 1500 and full forward 1900.
//!
//! Polarity and multiplier are kept as two separate fields: `reversed` flips
//! the direction, `multiplier` only ever scales magnitude.

use crate::error::{Result, RovPilotError};

/// Default minimum pulse width in microseconds.
pub const DEFAULT_PULSE_MIN: u16 = 1100;

/// Default maximum pulse width in microseconds.
pub const DEFAULT_PULSE_MAX: u16 = 1900;

/// Pulse width range of a motor controller, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseRange {
    min: u16,
    max: u16,
}

impl Default for PulseRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_PULSE_MIN,
            max: DEFAULT_PULSE_MAX,
        }
    }
}

impl PulseRange {
    /// Creates a pulse range.
    ///
    /// # Errors
    ///
    /// Returns `DegenerateRange` unless `min < max`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rov_pilot::thrusters::thruster::PulseRange;
    ///
    /// let range = PulseRange::new(1000, 2000).unwrap();
    /// assert_eq!(range.neutral(), 1500);
    /// assert!(PulseRange::new(1500, 1500).is_err());
    /// ```
    pub fn new(min: u16, max: u16) -> Result<Self> {
        if min >= max {
            return Err(RovPilotError::DegenerateRange {
                min: f32::from(min),
                max: f32::from(max),
            });
        }
        Ok(Self { min, max })
    }

    #[must_use]
    pub fn min(&self) -> u16 {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> u16 {
        self.max
    }

    /// Pulse width for zero effective power.
    #[must_use]
    pub fn neutral(&self) -> u16 {
        self.pulse_for(0.0)
    }

    /// Converts an effective power in [-1, 1] to a pulse width.
    ///
    /// Computed in f64 and truncated; the result never leaves the range.
    #[must_use]
    pub fn pulse_for(&self, effective: f32) -> u16 {
        let effective = if effective.is_finite() {
            f64::from(effective).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let min = f64::from(self.min);
        let span = f64::from(self.max) - min;
        let pulse = (min + 0.5 * span * (effective + 1.0)).trunc();
        pulse.clamp(min, f64::from(self.max)) as u16
    }
}

/// One thruster and its tuning.
///
/// # Examples
///
/// ```
/// use rov_pilot::thrusters::thruster::Thruster;
///
/// let mut thruster = Thruster::default();
/// thruster.set_power(1.0);
/// assert_eq!(thruster.get_pwm(), 1900);
///
/// thruster.reverse_polarity();
/// assert_eq!(thruster.get_pwm(), 1100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thruster {
    power: f32,
    reversed: bool,
    multiplier: f32,
    pulse: PulseRange,
}

impl Default for Thruster {
    fn default() -> Self {
        Self::new(PulseRange::default())
    }
}

impl Thruster {
    /// Creates a thruster at zero power, normal polarity and full multiplier.
    #[must_use]
    pub fn new(pulse: PulseRange) -> Self {
        Self {
            power: 0.0,
            reversed: false,
            multiplier: 1.0,
            pulse,
        }
    }

    /// Commanded power in [-1, 1].
    #[must_use]
    pub fn power(&self) -> f32 {
        self.power
    }

    /// Sets the commanded power, clamped to [-1, 1]. NaN is stored as 0.
    pub fn set_power(&mut self, power: f32) {
        self.power = if power.is_nan() {
            0.0
        } else {
            power.clamp(-1.0, 1.0)
        };
    }

    /// Returns true if the polarity is reversed.
    #[must_use]
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn set_reversed(&mut self, reversed: bool) {
        self.reversed = reversed;
    }

    /// Flips the polarity and returns the new reversed state.
    pub fn reverse_polarity(&mut self) -> bool {
        self.reversed = !self.reversed;
        self.reversed
    }

    /// -1.0 when reversed, 1.0 otherwise.
    #[must_use]
    pub fn polarity_mask(&self) -> f32 {
        if self.reversed {
            -1.0
        } else {
            1.0
        }
    }

    /// Unsigned multiplier in [0, 1].
    #[must_use]
    pub fn multiplier_magnitude(&self) -> f32 {
        self.multiplier
    }

    /// Sets the multiplier, clamped to [0, 1]. NaN is stored as 0.
    pub fn set_multiplier(&mut self, multiplier: f32) {
        self.multiplier = if multiplier.is_nan() {
            0.0
        } else {
            multiplier.clamp(0.0, 1.0)
        };
    }

    /// Multiplier signed by polarity. Diagnostic only.
    #[must_use]
    pub fn get_multiplier(&self) -> f32 {
        self.multiplier * self.polarity_mask()
    }

    #[must_use]
    pub fn pulse_range(&self) -> PulseRange {
        self.pulse
    }

    /// Power after polarity and multiplier.
    #[must_use]
    pub fn effective_power(&self) -> f32 {
        self.power * self.polarity_mask() * self.multiplier
    }

    /// Pulse width in microseconds, always within the pulse range.
    #[must_use]
    pub fn get_pwm(&self) -> u16 {
        self.pulse.pulse_for(self.effective_power())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thruster_at(power: f32) -> Thruster {
        let mut t = Thruster::default();
        t.set_power(power);
        t
    }

    // ==================== PulseRange Tests ====================

    #[test]
    fn test_pulse_range_defaults() {
        let range = PulseRange::default();
        assert_eq!(range.min(), 1100);
        assert_eq!(range.max(), 1900);
        assert_eq!(range.neutral(), 1500);
    }

    #[test]
    fn test_pulse_range_rejects_inverted() {
        assert!(PulseRange::new(1900, 1100).is_err());
        assert!(PulseRange::new(1100, 1100).is_err());
        assert!(PulseRange::new(1000, 2000).is_ok());
    }

    #[test]
    fn test_pulse_for_truncates() {
        let range = PulseRange::default();
        // 1100 + 400 * 1.001 = 1500.4
        assert_eq!(range.pulse_for(0.001), 1500);
        // 1100 + 400 * 0.999 = 1499.6
        assert_eq!(range.pulse_for(-0.001), 1499);
    }

    #[test]
    fn test_pulse_for_out_of_domain() {
        let range = PulseRange::default();
        assert_eq!(range.pulse_for(3.0), 1900);
        assert_eq!(range.pulse_for(-3.0), 1100);
        assert_eq!(range.pulse_for(f32::NAN), 1500);
    }

    // ==================== Power Tests ====================

    #[test]
    fn test_pwm_vectors() {
        assert_eq!(thruster_at(1.0).get_pwm(), 1900);
        assert_eq!(thruster_at(-1.0).get_pwm(), 1100);
        assert_eq!(thruster_at(0.0).get_pwm(), 1500);
        assert_eq!(thruster_at(0.5).get_pwm(), 1700);
    }

    #[test]
    fn test_set_power_clamps() {
        assert_eq!(thruster_at(2.0).power(), 1.0);
        assert_eq!(thruster_at(-7.5).power(), -1.0);
        assert_eq!(thruster_at(f32::NAN).power(), 0.0);
    }

    #[test]
    fn test_pwm_always_within_range() {
        let range = PulseRange::new(1200, 1800).unwrap();
        for i in -30..=30 {
            let mut t = Thruster::new(range);
            t.set_power(i as f32 / 10.0);
            for reversed in [false, true] {
                t.set_reversed(reversed);
                let pwm = t.get_pwm();
                assert!((1200..=1800).contains(&pwm), "pwm {} out of range", pwm);
            }
        }
    }

    // ==================== Polarity Tests ====================

    #[test]
    fn test_reverse_polarity_returns_new_state() {
        let mut t = Thruster::default();
        assert!(!t.is_reversed());
        assert!(t.reverse_polarity());
        assert!(t.is_reversed());
        assert!(!t.reverse_polarity());
    }

    #[test]
    fn test_reverse_polarity_flips_pwm() {
        let mut t = thruster_at(0.6);
        let forward = i32::from(t.get_pwm()) - 1500;
        t.reverse_polarity();
        let reversed = i32::from(t.get_pwm()) - 1500;
        assert!(forward > 0);
        assert!(reversed < 0);
        assert!((forward + reversed).abs() <= 1);
    }

    // ==================== Multiplier Tests ====================

    #[test]
    fn test_multiplier_scales_output() {
        let mut t = thruster_at(1.0);
        t.set_multiplier(0.5);
        assert_eq!(t.get_pwm(), 1700);
        t.set_multiplier(0.0);
        assert_eq!(t.get_pwm(), 1500);
    }

    #[test]
    fn test_set_multiplier_clamps() {
        let mut t = Thruster::default();
        t.set_multiplier(1.5);
        assert_eq!(t.multiplier_magnitude(), 1.0);
        t.set_multiplier(-0.3);
        assert_eq!(t.multiplier_magnitude(), 0.0);
        t.set_multiplier(f32::NAN);
        assert_eq!(t.multiplier_magnitude(), 0.0);
    }

    #[test]
    fn test_get_multiplier_is_signed() {
        let mut t = Thruster::default();
        t.set_multiplier(0.8);
        assert_eq!(t.get_multiplier(), 0.8);
        t.reverse_polarity();
        assert_eq!(t.get_multiplier(), -0.8);
        assert_eq!(t.multiplier_magnitude(), 0.8);
    }
}
