//! # ROV Pilot Library
//!
//! Drive a six-thruster ROV from a gamepad.
//!
//! This library provides the pieces between the operator's hands and the
//! vehicle's motor controllers:
//! - [`controller`]: gamepad input, stick calibration and normalization
//! - [`thrusters`]: thrust allocation, per-thruster tuning and PWM output
//! - [`link`]: the JSON command stream to the vehicle

pub mod config;
pub mod controller;
pub mod error;
pub mod link;
pub mod thrusters;
