//! # Thrusters Module
//!
//! Thrust allocation and PWM output for a six-thruster frame.
//!
//! This module handles:
//! - Mixing lateral (sway, surge, yaw) and vertical (heave, pitch) requests
//!   across the physical thrusters
//! - Per-thruster polarity, multiplier and pulse range
//! - Named on-disk tuning profiles
//!
//! ## Thruster Layout
//!
//! | Id | Position | Role |
//! |----|----------|------|
//! | fr | front right | lateral |
//! | fl | front left | lateral |
//! | rr | rear right | lateral |
//! | rl | rear left | lateral |
//! | fv | front | vertical |
//! | rv | rear | vertical |

pub mod allocator;
pub mod frame;
pub mod profile;
pub mod thruster;

use std::fmt;
use std::str::FromStr;

use crate::error::RovPilotError;

/// Identifies one of the six thrusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThrusterId {
    Fr,
    Fl,
    Rr,
    Rl,
    Fv,
    Rv,
}

impl ThrusterId {
    /// All thrusters in wire order.
    pub const ALL: [ThrusterId; 6] = [
        ThrusterId::Fr,
        ThrusterId::Fl,
        ThrusterId::Rr,
        ThrusterId::Rl,
        ThrusterId::Fv,
        ThrusterId::Rv,
    ];

    /// Index into per-thruster arrays.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            ThrusterId::Fr => 0,
            ThrusterId::Fl => 1,
            ThrusterId::Rr => 2,
            ThrusterId::Rl => 3,
            ThrusterId::Fv => 4,
            ThrusterId::Rv => 5,
        }
    }

    /// Short name used on the wire and in profiles.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ThrusterId::Fr => "fr",
            ThrusterId::Fl => "fl",
            ThrusterId::Rr => "rr",
            ThrusterId::Rl => "rl",
            ThrusterId::Fv => "fv",
            ThrusterId::Rv => "rv",
        }
    }

    /// Returns true for the two vertical thrusters.
    #[must_use]
    pub fn is_vertical(self) -> bool {
        matches!(self, ThrusterId::Fv | ThrusterId::Rv)
    }
}

impl fmt::Display for ThrusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThrusterId {
    type Err = RovPilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ThrusterId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RovPilotError::CorruptProfile(format!("unknown thruster '{}'", s)))
    }
}
