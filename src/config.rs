//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and every field is optional; anything left out takes the
//! default listed in `config/default.toml`.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::controller::calibration::CalibrationTimings;
use crate::error::{Result, RovPilotError};
use crate::thrusters::allocator::Shaping;
use crate::thrusters::profile::validate_profile_name;
use crate::thrusters::thruster::PulseRange;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub thrusters: ThrusterConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Controller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Empty means auto-detect
    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_deadzone")]
    pub deadzone: f32,

    #[serde(default = "default_calibration_file")]
    pub calibration_file: PathBuf,
}

/// Calibration routine timing
#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationConfig {
    #[serde(default = "default_liveness_timeout_s")]
    pub liveness_timeout_s: u64,

    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_center_samples")]
    pub center_samples: usize,

    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    #[serde(default = "default_idle_settle_ms")]
    pub idle_settle_ms: u64,

    #[serde(default = "default_sweep_duration_s")]
    pub sweep_duration_s: u64,

    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

/// Thruster output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ThrusterConfig {
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,

    #[serde(default = "default_profile")]
    pub profile: String,

    #[serde(default = "default_pulse_min")]
    pub pulse_min: u16,

    #[serde(default = "default_pulse_max")]
    pub pulse_max: u16,

    #[serde(default)]
    pub shaping: Shaping,
}

/// How PWM frames leave the pilot station
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// TCP to the vehicle's onboard computer
    #[default]
    Tcp,
    /// Serial line
    Serial,
    /// Frames are only logged
    #[serde(rename = "none")]
    Offline,
}

/// Link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default)]
    pub transport: Transport,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_port_span")]
    pub port_span: u16,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    #[serde(default = "default_serial_port")]
    pub serial_port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Control loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControlConfig {
    #[serde(default = "default_loop_rate_hz")]
    pub loop_rate_hz: u32,

    #[serde(default = "default_status_interval_cycles")]
    pub status_interval_cycles: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Empty means console only
    #[serde(default)]
    pub dir: String,
}

// Default value functions
fn default_deadzone() -> f32 { 0.15 }
fn default_calibration_file() -> PathBuf { PathBuf::from("./calibration.txt") }

fn default_liveness_timeout_s() -> u64 { 30 }
fn default_settle_ms() -> u64 { 1000 }
fn default_center_samples() -> usize { 20 }
fn default_sample_interval_ms() -> u64 { 100 }
fn default_idle_settle_ms() -> u64 { 2000 }
fn default_sweep_duration_s() -> u64 { 10 }
fn default_sweep_interval_ms() -> u64 { 10 }

fn default_profile_dir() -> PathBuf { PathBuf::from("./profiles") }
fn default_profile() -> String { "default".to_string() }
fn default_pulse_min() -> u16 { 1100 }
fn default_pulse_max() -> u16 { 1900 }

fn default_host() -> String { "169.254.6.161".to_string() }
fn default_port() -> u16 { 5005 }
fn default_port_span() -> u16 { 10 }
fn default_connect_timeout_ms() -> u64 { 5000 }
fn default_reply_timeout_ms() -> u64 { 500 }
fn default_serial_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud_rate() -> u32 { 115200 }

fn default_loop_rate_hz() -> u32 { 50 }
fn default_status_interval_cycles() -> u64 { 500 }

fn default_log_level() -> String { "info".to_string() }

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            deadzone: default_deadzone(),
            calibration_file: default_calibration_file(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_s: default_liveness_timeout_s(),
            settle_ms: default_settle_ms(),
            center_samples: default_center_samples(),
            sample_interval_ms: default_sample_interval_ms(),
            idle_settle_ms: default_idle_settle_ms(),
            sweep_duration_s: default_sweep_duration_s(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl Default for ThrusterConfig {
    fn default() -> Self {
        Self {
            profile_dir: default_profile_dir(),
            profile: default_profile(),
            pulse_min: default_pulse_min(),
            pulse_max: default_pulse_max(),
            shaping: Shaping::default(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            host: default_host(),
            port: default_port(),
            port_span: default_port_span(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reply_timeout_ms: default_reply_timeout_ms(),
            serial_port: default_serial_port(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            loop_rate_hz: default_loop_rate_hz(),
            status_interval_cycles: default_status_interval_cycles(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: String::new(),
        }
    }
}

impl CalibrationConfig {
    /// Timings for [`CalibrationRoutine`](crate::controller::calibration::CalibrationRoutine).
    #[must_use]
    pub fn timings(&self) -> CalibrationTimings {
        CalibrationTimings {
            liveness_timeout: Duration::from_secs(self.liveness_timeout_s),
            settle: Duration::from_millis(self.settle_ms),
            center_samples: self.center_samples,
            sample_interval: Duration::from_millis(self.sample_interval_ms),
            idle_settle: Duration::from_millis(self.idle_settle_ms),
            sweep_duration: Duration::from_secs(self.sweep_duration_s),
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
        }
    }
}

impl ThrusterConfig {
    /// Configured pulse range.
    ///
    /// # Errors
    ///
    /// Returns `DegenerateRange` unless `pulse_min < pulse_max`.
    pub fn pulse_range(&self) -> Result<PulseRange> {
        PulseRange::new(self.pulse_min, self.pulse_max)
    }
}

impl LinkConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

impl ControlConfig {
    /// Time between control cycles.
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_secs(1) / self.loop_rate_hz.max(1)
    }
}

fn invalid(msg: impl std::fmt::Display) -> RovPilotError {
    RovPilotError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rov_pilot::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Examples
    ///
    /// ```
    /// use rov_pilot::config::{Config, Transport};
    ///
    /// let config = Config::parse("[link]\ntransport = \"none\"\n")?;
    /// assert_eq!(config.link.transport, Transport::Offline);
    /// assert_eq!(config.control.loop_rate_hz, 50);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Validate controller
        if !(0.0..=0.5).contains(&self.controller.deadzone) {
            return Err(invalid("deadzone must be between 0.0 and 0.5"));
        }

        if self.controller.calibration_file.as_os_str().is_empty() {
            return Err(invalid("calibration_file cannot be empty"));
        }

        // Validate calibration timing
        for (name, value) in [
            ("liveness_timeout_s", self.calibration.liveness_timeout_s),
            ("center_samples", self.calibration.center_samples as u64),
            ("sample_interval_ms", self.calibration.sample_interval_ms),
            ("sweep_duration_s", self.calibration.sweep_duration_s),
            ("sweep_interval_ms", self.calibration.sweep_interval_ms),
        ] {
            if value == 0 {
                return Err(invalid(format!("{} must be greater than 0", name)));
            }
        }

        // Validate thrusters
        if self.thrusters.profile_dir.as_os_str().is_empty() {
            return Err(invalid("profile_dir cannot be empty"));
        }

        if validate_profile_name(&self.thrusters.profile).is_err() {
            return Err(invalid(format!(
                "profile '{}' must be a plain name without path separators",
                self.thrusters.profile
            )));
        }

        for (name, value) in [
            ("pulse_min", self.thrusters.pulse_min),
            ("pulse_max", self.thrusters.pulse_max),
        ] {
            if !(500..=2500).contains(&value) {
                return Err(invalid(format!("{} must be between 500 and 2500", name)));
            }
        }

        if self.thrusters.pulse_min >= self.thrusters.pulse_max {
            return Err(invalid("pulse_min must be less than pulse_max"));
        }

        // Validate link
        match self.link.transport {
            Transport::Tcp if self.link.host.is_empty() => {
                return Err(invalid("host cannot be empty for tcp transport"));
            }
            Transport::Serial if self.link.serial_port.is_empty() => {
                return Err(invalid("serial_port cannot be empty for serial transport"));
            }
            _ => {}
        }

        if !(1..=100).contains(&self.link.port_span) {
            return Err(invalid("port_span must be between 1 and 100"));
        }

        if self.link.connect_timeout_ms == 0 || self.link.connect_timeout_ms > 60000 {
            return Err(invalid("connect_timeout_ms must be between 1 and 60000"));
        }

        if self.link.reply_timeout_ms == 0 || self.link.reply_timeout_ms > 60000 {
            return Err(invalid("reply_timeout_ms must be between 1 and 60000"));
        }

        if self.link.baud_rate == 0 {
            return Err(invalid("baud_rate must be greater than 0"));
        }

        // Validate control loop
        if !(1..=500).contains(&self.control.loop_rate_hz) {
            return Err(invalid("loop_rate_hz must be between 1 and 500"));
        }

        if self.control.status_interval_cycles == 0 {
            return Err(invalid("status_interval_cycles must be greater than 0"));
        }

        // Validate log level
        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }
}
