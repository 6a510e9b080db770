//! # Calibration Profile
//!
//! Per-axis stick center and observed travel, produced by the calibration
//! routine and consumed by the normalizer.
//!
//! ## On-disk format
//!
//! A short text record: optional `#` comment lines, then one line per stick axis:
//!
//! ```text
//! # calibrated 2026-10-19T14:02:11+00:00
//! left_x:0.0018005371:-1.0018005:0.99816895
//! left_y:0.031738281:-1.0247498:0.9682312
//! right_x:0.078186035:-1.028717:0.92178345
//! right_y:0.036590576:-1.0365906:0.9633789
//! ```
//!
//! Floats are written with Rust's shortest round-trip formatting, so a
//! save/load cycle reproduces every field bit for bit.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::{info, warn};

use super::range::is_degenerate;
use crate::error::{Result, RovPilotError};

/// The four calibrated stick axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StickAxis {
    LeftX,
    LeftY,
    RightX,
    RightY,
}

impl StickAxis {
    /// All axes in record order.
    pub const ALL: [StickAxis; 4] = [
        StickAxis::LeftX,
        StickAxis::LeftY,
        StickAxis::RightX,
        StickAxis::RightY,
    ];

    /// Index into per-axis arrays.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            StickAxis::LeftX => 0,
            StickAxis::LeftY => 1,
            StickAxis::RightX => 2,
            StickAxis::RightY => 3,
        }
    }

    /// Record key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StickAxis::LeftX => "left_x",
            StickAxis::LeftY => "left_y",
            StickAxis::RightX => "right_x",
            StickAxis::RightY => "right_y",
        }
    }
}

impl fmt::Display for StickAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StickAxis {
    type Err = RovPilotError;

    fn from_str(s: &str) -> Result<Self> {
        StickAxis::ALL
            .into_iter()
            .find(|axis| axis.as_str() == s)
            .ok_or_else(|| RovPilotError::CorruptProfile(format!("unknown axis '{}'", s)))
    }
}

/// Center offset and observed (centered) travel of one stick axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCalibration {
    /// Raw reading at rest.
    pub center: f32,
    /// Smallest `raw - center` seen during the sweep.
    pub min: f32,
    /// Largest `raw - center` seen during the sweep.
    pub max: f32,
}

impl Default for AxisCalibration {
    fn default() -> Self {
        Self {
            center: 0.0,
            min: -1.0,
            max: 1.0,
        }
    }
}

impl AxisCalibration {
    /// Observed range as a tuple for [`map_ranges`](super::range::map_ranges).
    #[must_use]
    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }
}

/// Calibration for both sticks.
///
/// The default profile is uncalibrated: center 0 and range [-1, 1] on every
/// axis, which makes the normalizer an identity plus deadzone.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibrationProfile {
    axes: [AxisCalibration; 4],
}

impl CalibrationProfile {
    /// Builds a profile from per-axis records in [`StickAxis::ALL`] order.
    #[must_use]
    pub fn new(axes: [AxisCalibration; 4]) -> Self {
        Self { axes }
    }

    /// Calibration for one axis.
    #[must_use]
    pub fn axis(&self, axis: StickAxis) -> &AxisCalibration {
        &self.axes[axis.index()]
    }

    /// Mutable calibration for one axis.
    pub fn axis_mut(&mut self, axis: StickAxis) -> &mut AxisCalibration {
        &mut self.axes[axis.index()]
    }

    /// Returns true if this is the uncalibrated identity profile.
    #[must_use]
    pub fn is_uncalibrated(&self) -> bool {
        *self == Self::default()
    }

    /// Axes whose observed range has zero width, in [`StickAxis::ALL`] order.
    ///
    /// The normalizer passes these through unmapped.
    #[must_use]
    pub fn degenerate_axes(&self) -> Vec<StickAxis> {
        StickAxis::ALL
            .into_iter()
            .filter(|axis| is_degenerate(self.axis(*axis).range()))
            .collect()
    }

    /// Parses a profile record.
    ///
    /// # Errors
    ///
    /// Returns [`RovPilotError::CorruptProfile`] if an axis is missing,
    /// repeated, unparsable, non-finite, or has `min > max`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut seen = [false; 4];
        let mut axes = [AxisCalibration::default(); 4];

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() != 4 {
                return Err(RovPilotError::CorruptProfile(format!(
                    "expected <axis>:<center>:<min>:<max>, got '{}'",
                    line
                )));
            }

            let axis: StickAxis = fields[0].parse()?;
            if seen[axis.index()] {
                return Err(RovPilotError::CorruptProfile(format!(
                    "axis '{}' listed twice",
                    axis
                )));
            }

            let center = parse_float(fields[1], line)?;
            let min = parse_float(fields[2], line)?;
            let max = parse_float(fields[3], line)?;
            if min > max {
                return Err(RovPilotError::CorruptProfile(format!(
                    "axis '{}' has min {} above max {}",
                    axis, min, max
                )));
            }

            axes[axis.index()] = AxisCalibration { center, min, max };
            seen[axis.index()] = true;
        }

        if let Some(missing) = StickAxis::ALL.into_iter().find(|a| !seen[a.index()]) {
            return Err(RovPilotError::CorruptProfile(format!(
                "axis '{}' missing",
                missing
            )));
        }

        Ok(Self { axes })
    }

    /// Renders the profile record, without a comment header.
    #[must_use]
    pub fn to_record(&self) -> String {
        StickAxis::ALL
            .iter()
            .map(|axis| {
                let cal = self.axis(*axis);
                format!("{}:{}:{}:{}\n", axis, cal.center, cal.min, cal.max)
            })
            .collect()
    }

    /// Loads a profile from `path`.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `CorruptProfile` if it
    /// cannot be parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Loads a profile, falling back to the uncalibrated default on any error.
    ///
    /// Thrust control keeps running on a degraded calibration rather than
    /// refusing to start.
    #[must_use]
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(profile) => {
                info!("Loaded calibration profile from {}", path.display());
                profile
            }
            Err(e) => {
                warn!(
                    "Using uncalibrated sticks, could not load {}: {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Writes the profile to `path` with a timestamp header.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let contents = format!(
            "# calibrated {}\n{}",
            chrono::Local::now().to_rfc3339(),
            self.to_record()
        );
        fs::write(path, contents)?;
        info!("Saved calibration profile to {}", path.display());
        Ok(())
    }
}

fn parse_float(field: &str, line: &str) -> Result<f32> {
    field
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RovPilotError::CorruptProfile(format!("bad number in '{}'", line)))
}
