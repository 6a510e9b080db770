//! # Controller Module
//!
//! Gamepad input handling, from evdev events to normalized controls.
//!
//! This module handles:
//! - Gamepad detection and a background event reader via evdev
//! - Folding device events into raw samples
//! - Stick calibration profiles and the interactive calibration routine
//! - Center correction, range remapping and deadzones

pub mod calibration;
pub mod gamepad;
pub mod mapper;
pub mod normalizer;
pub mod profile;
pub mod range;

use crate::error::Result;
use mapper::RawSample;

/// Anything that can be polled for the current controller reading.
///
/// `poll` must return within one control-cycle tick.
#[cfg_attr(test, mockall::automock)]
pub trait ControllerSource {
    /// Returns the latest raw sample.
    ///
    /// # Errors
    ///
    /// Returns `ControllerDisconnected` once the device stops reporting.
    fn poll(&mut self) -> Result<RawSample>;
}
