//! # Frame Thrusters
//!
//! Owns the six thrusters of the frame and their tuning, runs the allocator
//! each control cycle and assembles the PWM frame for the link.
//!
//! All tuning lives here and is mutated through `&mut self`, either by
//! [`FrameThrusters::thrust_calc`] or by explicit hot-tuning calls.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::allocator::{LateralRequest, Shaping, ThrustAllocator, VerticalRequest};
use super::profile::{validate_profile_name, FrameSettings, ThrusterProfileStore, ThrusterSettings};
use super::thruster::{PulseRange, Thruster};
use super::ThrusterId;
use crate::error::{Result, RovPilotError};

/// Pulse widths for all six thrusters, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PwmFrame {
    pub fr: u16,
    pub fl: u16,
    pub rr: u16,
    pub rl: u16,
    pub fv: u16,
    pub rv: u16,
}

impl PwmFrame {
    /// Every thruster at the same pulse width.
    #[must_use]
    pub fn uniform(pulse: u16) -> Self {
        Self {
            fr: pulse,
            fl: pulse,
            rr: pulse,
            rl: pulse,
            fv: pulse,
            rv: pulse,
        }
    }

    /// Pulse width of one thruster.
    #[must_use]
    pub fn get(&self, id: ThrusterId) -> u16 {
        match id {
            ThrusterId::Fr => self.fr,
            ThrusterId::Fl => self.fl,
            ThrusterId::Rr => self.rr,
            ThrusterId::Rl => self.rl,
            ThrusterId::Fv => self.fv,
            ThrusterId::Rv => self.rv,
        }
    }
}

/// The six thrusters of a frame plus the overall multiplier.
///
/// # Examples
///
/// ```
/// use rov_pilot::thrusters::frame::FrameThrusters;
///
/// let mut frame = FrameThrusters::default();
///
/// // Full surge drives all four lateral thrusters forward
/// frame.thrust_calc(0.0, 1.0, 0.0, 0.0, 0.0);
/// let pwm = frame.get_pwm();
/// assert_eq!((pwm.fr, pwm.fl, pwm.rr, pwm.rl), (1900, 1900, 1900, 1900));
/// assert_eq!((pwm.fv, pwm.rv), (1500, 1500));
/// ```
#[derive(Debug, Clone)]
pub struct FrameThrusters {
    thrusters: [Thruster; 6],
    overall_multiplier: f32,
    allocator: ThrustAllocator,
    profile_name: String,
    store: Option<ThrusterProfileStore>,
}

impl Default for FrameThrusters {
    fn default() -> Self {
        Self::new(PulseRange::default(), Shaping::default())
    }
}

impl FrameThrusters {
    /// Creates an untuned frame that is not backed by a profile store.
    #[must_use]
    pub fn new(pulse: PulseRange, shaping: Shaping) -> Self {
        Self {
            thrusters: [Thruster::new(pulse); 6],
            overall_multiplier: 1.0,
            allocator: ThrustAllocator::new(shaping),
            profile_name: "default".to_string(),
            store: None,
        }
    }

    /// Opens a frame with the tuning of profile `name`.
    ///
    /// A missing or damaged profile is healed with defaults, see
    /// [`ThrusterProfileStore::load`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidProfileName` if `name` is not a plain file stem.
    pub fn open(
        store: ThrusterProfileStore,
        name: &str,
        pulse: PulseRange,
        shaping: Shaping,
    ) -> Result<Self> {
        let settings = store.load(name)?;

        let mut frame = Self::new(pulse, shaping);
        frame.apply_settings(&settings);
        frame.profile_name = name.to_string();
        frame.store = Some(store);
        Ok(frame)
    }

    /// Runs both mixes, scales by the overall multiplier and sets every
    /// thruster's power.
    ///
    /// # Arguments
    ///
    /// * `x` - sway, positive to the right
    /// * `y` - surge, positive forward
    /// * `z` - heave
    /// * `pitch` - pitch
    /// * `yaw` - yaw
    pub fn thrust_calc(&mut self, x: f32, y: f32, z: f32, pitch: f32, yaw: f32) {
        let (lateral, vertical) = self.allocator.allocate(
            LateralRequest {
                sway: x,
                surge: y,
                yaw,
            },
            VerticalRequest { heave: z, pitch },
        );

        let scale = self.overall_multiplier;
        let powers = [
            (ThrusterId::Fr, lateral.fr),
            (ThrusterId::Fl, lateral.fl),
            (ThrusterId::Rr, lateral.rr),
            (ThrusterId::Rl, lateral.rl),
            (ThrusterId::Fv, vertical.fv),
            (ThrusterId::Rv, vertical.rv),
        ];
        for (id, power) in powers {
            self.thrusters[id.index()].set_power(power * scale);
        }
    }

    /// Current pulse widths of all six thrusters.
    #[must_use]
    pub fn get_pwm(&self) -> PwmFrame {
        let pwm = |id: ThrusterId| self.thrusters[id.index()].get_pwm();
        PwmFrame {
            fr: pwm(ThrusterId::Fr),
            fl: pwm(ThrusterId::Fl),
            rr: pwm(ThrusterId::Rr),
            rl: pwm(ThrusterId::Rl),
            fv: pwm(ThrusterId::Fv),
            rv: pwm(ThrusterId::Rv),
        }
    }

    /// Sets every thruster to zero power.
    pub fn neutral(&mut self) {
        for thruster in &mut self.thrusters {
            thruster.set_power(0.0);
        }
    }

    #[must_use]
    pub fn thruster(&self, id: ThrusterId) -> &Thruster {
        &self.thrusters[id.index()]
    }

    pub fn thruster_mut(&mut self, id: ThrusterId) -> &mut Thruster {
        &mut self.thrusters[id.index()]
    }

    #[must_use]
    pub fn overall_multiplier(&self) -> f32 {
        self.overall_multiplier
    }

    /// Sets the overall multiplier, clamped to [0, 1]. NaN is stored as 0.
    pub fn set_overall_multiplier(&mut self, multiplier: f32) {
        self.overall_multiplier = if multiplier.is_nan() {
            0.0
        } else {
            multiplier.clamp(0.0, 1.0)
        };
    }

    /// Name of the profile this frame was loaded from or last saved to.
    #[must_use]
    pub fn profile_name(&self) -> &str {
        &self.profile_name
    }

    #[must_use]
    pub fn shaping(&self) -> Shaping {
        self.allocator.shaping()
    }

    /// Snapshot of the persisted tuning.
    #[must_use]
    pub fn settings(&self) -> FrameSettings {
        let mut settings = FrameSettings {
            overall_multiplier: self.overall_multiplier,
            ..FrameSettings::default()
        };
        for id in ThrusterId::ALL {
            let thruster = self.thruster(id);
            *settings.thruster_mut(id) = ThrusterSettings {
                reversed: thruster.is_reversed(),
                multiplier: thruster.multiplier_magnitude(),
            };
        }
        settings
    }

    /// Replaces all tuning. Power is left untouched.
    pub fn apply_settings(&mut self, settings: &FrameSettings) {
        for id in ThrusterId::ALL {
            let tuned = settings.thruster(id);
            let thruster = self.thruster_mut(id);
            thruster.set_reversed(tuned.reversed);
            thruster.set_multiplier(tuned.multiplier);
        }
        self.set_overall_multiplier(settings.overall_multiplier);
        debug!("Applied thruster settings: {:?}", settings);
    }

    /// Persists the current tuning.
    ///
    /// With `Some(name)` the tuning is saved under that profile, which
    /// becomes the current one. With `None` it is saved under the current
    /// profile.
    ///
    /// # Errors
    ///
    /// - `InvalidProfileName`: `name` would escape the profile directory
    /// - `NoProfileStore`: the frame was created with [`FrameThrusters::new`]
    /// - `Io`: the profile cannot be written
    ///
    /// The current profile name only changes when the save succeeds.
    pub fn save_settings(&mut self, name: Option<&str>) -> Result<()> {
        let name = name.unwrap_or(&self.profile_name).to_string();
        validate_profile_name(&name)?;

        let Some(store) = &self.store else {
            return Err(RovPilotError::NoProfileStore(name));
        };
        store.save(&name, &self.settings())?;
        self.profile_name = name;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_frame(dir: &TempDir, name: &str) -> FrameThrusters {
        FrameThrusters::open(
            ThrusterProfileStore::new(dir.path()),
            name,
            PulseRange::default(),
            Shaping::Square,
        )
        .unwrap()
    }

    // ==================== PWM Frame Tests ====================

    #[test]
    fn test_default_frame_is_neutral() {
        let frame = FrameThrusters::default();
        assert_eq!(frame.get_pwm(), PwmFrame::uniform(1500));
    }

    #[test]
    fn test_pwm_frame_get_matches_fields() {
        let pwm = PwmFrame {
            fr: 1,
            fl: 2,
            rr: 3,
            rl: 4,
            fv: 5,
            rv: 6,
        };
        let values: Vec<u16> = ThrusterId::ALL.iter().map(|id| pwm.get(*id)).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_pwm_frame_serializes_flat() {
        let json = serde_json::to_string(&PwmFrame::uniform(1500)).unwrap();
        assert_eq!(
            json,
            r#"{"fr":1500,"fl":1500,"rr":1500,"rl":1500,"fv":1500,"rv":1500}"#
        );
    }

    // ==================== Thrust Calc Tests ====================

    #[test]
    fn test_thrust_calc_vertical() {
        let mut frame = FrameThrusters::default();

        frame.thrust_calc(0.0, 0.0, 1.0, 0.0, 0.0);
        let pwm = frame.get_pwm();
        assert_eq!((pwm.fv, pwm.rv), (1900, 1900));

        frame.thrust_calc(0.0, 0.0, 0.0, 1.0, 0.0);
        let pwm = frame.get_pwm();
        assert_eq!((pwm.fv, pwm.rv), (1100, 1900));
    }

    #[test]
    fn test_thrust_calc_yaw() {
        let mut frame = FrameThrusters::default();
        frame.thrust_calc(0.0, 0.0, 0.0, 0.0, 1.0);
        let pwm = frame.get_pwm();
        assert_eq!((pwm.fr, pwm.fl, pwm.rr, pwm.rl), (1900, 1100, 1900, 1100));
    }

    #[test]
    fn test_overall_multiplier_scales_power() {
        let mut frame = FrameThrusters::default();
        frame.set_overall_multiplier(0.5);
        frame.thrust_calc(0.0, 1.0, 1.0, 0.0, 0.0);

        for id in ThrusterId::ALL {
            assert_eq!(frame.thruster(id).power(), 0.5);
        }
        assert_eq!(frame.get_pwm(), PwmFrame::uniform(1700));
    }

    #[test]
    fn test_set_overall_multiplier_clamps() {
        let mut frame = FrameThrusters::default();
        frame.set_overall_multiplier(4.0);
        assert_eq!(frame.overall_multiplier(), 1.0);
        frame.set_overall_multiplier(-1.0);
        assert_eq!(frame.overall_multiplier(), 0.0);
        frame.set_overall_multiplier(f32::NAN);
        assert_eq!(frame.overall_multiplier(), 0.0);
    }

    #[test]
    fn test_pwm_within_range_over_grid() {
        let mut frame = FrameThrusters::new(PulseRange::default(), Shaping::Circular);
        frame.thruster_mut(ThrusterId::Fl).reverse_polarity();
        let steps: Vec<f32> = (-4..=4).map(|i| i as f32 / 4.0).collect();

        for &x in &steps {
            for &y in &steps {
                for &z in &steps {
                    for &p in &steps {
                        for &r in &steps {
                            frame.thrust_calc(x, y, z, p, r);
                            let pwm = frame.get_pwm();
                            for id in ThrusterId::ALL {
                                assert!((1100..=1900).contains(&pwm.get(id)));
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_reversed_thruster_mirrors_pwm() {
        let mut frame = FrameThrusters::default();
        frame.thruster_mut(ThrusterId::Fr).reverse_polarity();
        frame.thrust_calc(0.0, 1.0, 0.0, 0.0, 0.0);

        let pwm = frame.get_pwm();
        assert_eq!(pwm.fr, 1100);
        assert_eq!(pwm.fl, 1900);
    }

    #[test]
    fn test_neutral_zeroes_power() {
        let mut frame = FrameThrusters::default();
        frame.thrust_calc(0.3, -0.7, 0.2, 0.9, -0.1);
        frame.neutral();
        assert_eq!(frame.get_pwm(), PwmFrame::uniform(1500));
    }

    // ==================== Persistence Tests ====================

    #[test]
    fn test_open_fresh_profile_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let frame = open_frame(&dir, "default");

        assert_eq!(frame.profile_name(), "default");
        assert_eq!(frame.settings(), FrameSettings::default());
        assert!(dir.path().join("default.thrusters").exists());
        assert!(dir.path().join("default.frame").exists());
    }

    #[test]
    fn test_save_then_open_roundtrips_tuning() {
        let dir = TempDir::new().unwrap();
        let mut frame = open_frame(&dir, "default");

        frame.thruster_mut(ThrusterId::Rr).reverse_polarity();
        frame.thruster_mut(ThrusterId::Rr).set_multiplier(0.8);
        frame.thruster_mut(ThrusterId::Fv).set_multiplier(0.75);
        frame.set_overall_multiplier(0.6);
        frame.save_settings(Some("pool")).unwrap();
        assert_eq!(frame.profile_name(), "pool");

        let reopened = open_frame(&dir, "pool");
        assert!(reopened.thruster(ThrusterId::Rr).is_reversed());
        assert_eq!(reopened.thruster(ThrusterId::Rr).get_multiplier(), -0.8);
        assert_eq!(reopened.thruster(ThrusterId::Fv).multiplier_magnitude(), 0.75);
        assert_eq!(reopened.overall_multiplier(), 0.6);
        assert_eq!(reopened.settings(), frame.settings());

        // The default profile is untouched
        assert_eq!(open_frame(&dir, "default").settings(), FrameSettings::default());
    }

    #[test]
    fn test_save_settings_defaults_to_current_profile() {
        let dir = TempDir::new().unwrap();
        let mut frame = open_frame(&dir, "bench");
        frame.set_overall_multiplier(0.25);
        frame.save_settings(None).unwrap();

        assert_eq!(open_frame(&dir, "bench").overall_multiplier(), 0.25);
    }

    #[test]
    fn test_open_corrupt_profile_uses_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("junk.thrusters"), "fr:maybe:1\n").unwrap();
        std::fs::write(dir.path().join("junk.frame"), "").unwrap();

        let frame = open_frame(&dir, "junk");
        assert_eq!(frame.settings(), FrameSettings::default());
    }

    #[test]
    fn test_save_settings_without_store() {
        let mut frame = FrameThrusters::default();
        let before = frame.profile_name().to_string();

        match frame.save_settings(Some("scratch")) {
            Err(RovPilotError::NoProfileStore(name)) => assert_eq!(name, "scratch"),
            other => panic!("Expected NoProfileStore, got: {:?}", other),
        }
        assert_eq!(frame.profile_name(), before);
        assert!(matches!(frame.save_settings(None), Err(RovPilotError::NoProfileStore(_))));
        assert!(matches!(
            frame.save_settings(Some("a/b")),
            Err(RovPilotError::InvalidProfileName(_))
        ));
    }
}
