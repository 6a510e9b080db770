//! # Thruster Profiles
//!
//! Named on-disk tuning for a frame: per-thruster polarity and multiplier,
//! plus the overall multiplier.
//!
//! ## On-disk format
//!
//! Each profile `<name>` is two text records in the profile directory.
//!
//! `<name>.thrusters`, one line per thruster in any order:
//!
//! ```text
//! fr:true:0.85
//! fl:false:1
//! rr:true:1
//! rl:true:1
//! fv:false:0.75
//! rv:false:0.75
//! ```
//!
//! `<name>.frame`:
//!
//! ```text
//! multiplier:0.6
//! ```
//!
//! Loading heals each record independently: a missing, short or unparsable
//! record is replaced by defaults and written back, and the frame keeps
//! running.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::ThrusterId;
use crate::error::{Result, RovPilotError};

/// Thruster record file extension.
pub const THRUSTERS_EXTENSION: &str = "thrusters";

/// Frame record file extension.
pub const FRAME_EXTENSION: &str = "frame";

/// Frame record key.
const FRAME_KEY: &str = "multiplier";

/// Tuning of a single thruster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrusterSettings {
    pub reversed: bool,
    /// Magnitude in [0, 1].
    pub multiplier: f32,
}

impl Default for ThrusterSettings {
    fn default() -> Self {
        Self {
            reversed: false,
            multiplier: 1.0,
        }
    }
}

/// Everything a profile persists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSettings {
    /// Indexed by [`ThrusterId::index`].
    pub thrusters: [ThrusterSettings; 6],
    pub overall_multiplier: f32,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            thrusters: [ThrusterSettings::default(); 6],
            overall_multiplier: 1.0,
        }
    }
}

impl FrameSettings {
    #[must_use]
    pub fn thruster(&self, id: ThrusterId) -> &ThrusterSettings {
        &self.thrusters[id.index()]
    }

    pub fn thruster_mut(&mut self, id: ThrusterId) -> &mut ThrusterSettings {
        &mut self.thrusters[id.index()]
    }
}

/// Parses a thruster record.
///
/// # Errors
///
/// Returns `CorruptProfile` if a thruster is missing or repeated, a line
/// does not have three fields, the polarity is not a boolean literal, or a
/// multiplier is not a finite value in [0, 1].
///
/// # Examples
///
/// ```
/// use rov_pilot::thrusters::profile::parse_thrusters;
/// use rov_pilot::thrusters::ThrusterId;
///
/// let text = "fr:true:0.5\nfl:false:1\nrr:false:1\nrl:false:1\nfv:False:1\nrv:false:1\n";
/// let thrusters = parse_thrusters(text).unwrap();
/// assert!(thrusters[ThrusterId::Fr.index()].reversed);
/// assert_eq!(thrusters[ThrusterId::Fr.index()].multiplier, 0.5);
/// ```
pub fn parse_thrusters(text: &str) -> Result<[ThrusterSettings; 6]> {
    let mut seen = [false; 6];
    let mut thrusters = [ThrusterSettings::default(); 6];

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() != 3 {
            return Err(RovPilotError::CorruptProfile(format!(
                "expected <id>:<reversed>:<multiplier>, got '{}'",
                line
            )));
        }

        let id: ThrusterId = fields[0].parse()?;
        if seen[id.index()] {
            return Err(RovPilotError::CorruptProfile(format!(
                "thruster '{}' listed twice",
                id
            )));
        }

        thrusters[id.index()] = ThrusterSettings {
            reversed: parse_bool(fields[1], line)?,
            multiplier: parse_multiplier(fields[2], line)?,
        };
        seen[id.index()] = true;
    }

    if let Some(missing) = ThrusterId::ALL.into_iter().find(|id| !seen[id.index()]) {
        return Err(RovPilotError::CorruptProfile(format!(
            "thruster '{}' missing",
            missing
        )));
    }

    Ok(thrusters)
}

/// Renders a thruster record in [`ThrusterId::ALL`] order.
#[must_use]
pub fn render_thrusters(thrusters: &[ThrusterSettings; 6]) -> String {
    ThrusterId::ALL
        .iter()
        .map(|id| {
            let t = &thrusters[id.index()];
            format!("{}:{}:{}\n", id, t.reversed, t.multiplier)
        })
        .collect()
}

/// Parses a frame record.
///
/// # Errors
///
/// Returns `CorruptProfile` unless the record holds exactly one
/// `multiplier:<float>` line with a value in [0, 1].
pub fn parse_frame(text: &str) -> Result<f32> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    let line = lines
        .next()
        .ok_or_else(|| RovPilotError::CorruptProfile("frame record is empty".to_string()))?;
    if lines.next().is_some() {
        return Err(RovPilotError::CorruptProfile(
            "frame record has extra lines".to_string(),
        ));
    }

    match line.split_once(':') {
        Some((key, value)) if key.trim() == FRAME_KEY => parse_multiplier(value, line),
        _ => Err(RovPilotError::CorruptProfile(format!(
            "expected {}:<float>, got '{}'",
            FRAME_KEY, line
        ))),
    }
}

/// Renders a frame record.
#[must_use]
pub fn render_frame(overall_multiplier: f32) -> String {
    format!("{}:{}\n", FRAME_KEY, overall_multiplier)
}

/// Strict `true`/`false`, plus the capitalised form older profiles used.
fn parse_bool(field: &str, line: &str) -> Result<bool> {
    match field.trim() {
        "true" | "True" => Ok(true),
        "false" | "False" => Ok(false),
        _ => Err(RovPilotError::CorruptProfile(format!(
            "bad polarity in '{}'",
            line
        ))),
    }
}

fn parse_multiplier(field: &str, line: &str) -> Result<f32> {
    field
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite() && (0.0..=1.0).contains(v))
        .ok_or_else(|| RovPilotError::CorruptProfile(format!("bad multiplier in '{}'", line)))
}

/// Checks that a profile name is a plain file stem.
///
/// # Errors
///
/// Returns `InvalidProfileName` for empty names, names containing path
/// separators, and `.`/`..`.
pub fn validate_profile_name(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name.contains(['/', '\\'])
        || name == "."
        || name == "..";
    if invalid {
        return Err(RovPilotError::InvalidProfileName(name.to_string()));
    }
    Ok(())
}

/// Directory of named thruster profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrusterProfileStore {
    dir: PathBuf,
}

impl ThrusterProfileStore {
    /// Creates a store rooted at `dir`. Nothing is touched until a load or save.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the thruster record for `name`.
    #[must_use]
    pub fn thrusters_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, THRUSTERS_EXTENSION))
    }

    /// Path of the frame record for `name`.
    #[must_use]
    pub fn frame_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, FRAME_EXTENSION))
    }

    /// Loads a profile, healing either record if needed.
    ///
    /// Damaged records never fail the load; they are replaced by defaults
    /// and rewritten. A failed rewrite is logged and the defaults are still
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `InvalidProfileName` if `name` is not a plain file stem.
    ///
    /// # Examples
    ///
    /// ```
    /// use rov_pilot::thrusters::profile::{FrameSettings, ThrusterProfileStore};
    ///
    /// let dir = tempfile::tempdir()?;
    /// let store = ThrusterProfileStore::new(dir.path());
    ///
    /// // First load bootstraps the profile on disk
    /// assert_eq!(store.load("bench")?, FrameSettings::default());
    /// assert!(store.thrusters_path("bench").exists());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load(&self, name: &str) -> Result<FrameSettings> {
        validate_profile_name(name)?;

        let thrusters_path = self.thrusters_path(name);
        let thrusters = match read_record(&thrusters_path).and_then(|t| parse_thrusters(&t)) {
            Ok(thrusters) => thrusters,
            Err(e) => {
                let defaults = FrameSettings::default().thrusters;
                self.heal(&thrusters_path, &render_thrusters(&defaults), &e);
                defaults
            }
        };

        let frame_path = self.frame_path(name);
        let overall_multiplier = match read_record(&frame_path).and_then(|t| parse_frame(&t)) {
            Ok(multiplier) => multiplier,
            Err(e) => {
                let default = FrameSettings::default().overall_multiplier;
                self.heal(&frame_path, &render_frame(default), &e);
                default
            }
        };

        info!("Loaded thruster profile '{}' from {}", name, self.dir.display());
        Ok(FrameSettings {
            thrusters,
            overall_multiplier,
        })
    }

    /// Writes both records of a profile.
    ///
    /// # Errors
    ///
    /// Returns `InvalidProfileName` for a bad name and `Io` if either record
    /// cannot be written.
    pub fn save(&self, name: &str, settings: &FrameSettings) -> Result<()> {
        validate_profile_name(name)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(self.thrusters_path(name), render_thrusters(&settings.thrusters))?;
        fs::write(self.frame_path(name), render_frame(settings.overall_multiplier))?;
        info!("Saved thruster profile '{}' to {}", name, self.dir.display());
        Ok(())
    }

    fn heal(&self, path: &Path, contents: &str, cause: &RovPilotError) {
        match cause {
            RovPilotError::Io(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("Creating default profile record {}", path.display());
            }
            _ => warn!(
                "Regenerating profile record {} with defaults: {}",
                path.display(),
                cause
            ),
        }

        let written = fs::create_dir_all(&self.dir).and_then(|_| fs::write(path, contents));
        if let Err(e) = written {
            warn!("Could not write back {}: {}", path.display(), e);
        }
    }
}

fn read_record(path: &Path) -> Result<String> {
    Ok(fs::read_to_string(path)?)
}
