//! # Calibration Module
//!
//! Interactive stick calibration that produces a new [`CalibrationProfile`].
//!
//! ## Phases
//!
//! ```text
//! WaitForward -> CenterSampling -> IdleSettle -> SweepSampling -> Done
//! ```
//!
//! - **WaitForward**: the operator pushes both sticks diagonally forward;
//!   the routine continues once both Y axes read forward (negative, since
//!   stick Y grows downward) and both X axes read non-zero. This gate is
//!   bounded by a liveness timeout.
//! - **CenterSampling**: after a settle delay with the sticks released, a
//!   fixed number of samples at a fixed cadence are averaged per axis.
//! - **IdleSettle**: a pause before the sweep so the operator can get ready.
//! - **SweepSampling**: for a fixed window the operator rotates both sticks
//!   through their full travel; the routine tracks the min/max of
//!   `raw - center` per axis.
//! - **Done**: the new profile is assembled. Nothing is written to disk.
//!
//! The whole procedure takes tens of seconds and must not run alongside the
//! control loop. Any phase can be aborted through the cancel future.
//!
//! ## Usage
//!
//! ```no_run
//! use rov_pilot::controller::calibration::{CalibrationRoutine, CalibrationTimings};
//! use rov_pilot::controller::gamepad::Gamepad;
//!
//! # async fn calibrate() -> rov_pilot::error::Result<()> {
//! let mut pad = Gamepad::open("")?;
//! let mut routine = CalibrationRoutine::new(CalibrationTimings::default());
//!
//! let cancel = async {
//!     let _ = tokio::signal::ctrl_c().await;
//! };
//! let profile = routine.run(&mut pad, cancel).await?;
//! profile.save("calibration.txt")?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, sleep, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::mapper::RawSample;
use super::profile::{AxisCalibration, CalibrationProfile};
use super::ControllerSource;
use crate::error::{Result, RovPilotError};

/// Current step of the calibration procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    WaitForward,
    CenterSampling,
    IdleSettle,
    SweepSampling,
    Done,
}

/// Durations and sample counts for each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationTimings {
    /// Upper bound on the WaitForward gate.
    pub liveness_timeout: Duration,
    /// Delay between the gate and the first center sample.
    pub settle: Duration,
    /// Number of samples averaged into each center.
    pub center_samples: usize,
    /// Cadence of liveness polls and center samples.
    pub sample_interval: Duration,
    /// Pause between center sampling and the sweep.
    pub idle_settle: Duration,
    /// Length of the sweep window.
    pub sweep_duration: Duration,
    /// Cadence of sweep samples.
    pub sweep_interval: Duration,
}

impl Default for CalibrationTimings {
    fn default() -> Self {
        Self {
            liveness_timeout: Duration::from_secs(30),
            settle: Duration::from_millis(1000),
            center_samples: 20,
            sample_interval: Duration::from_millis(100),
            idle_settle: Duration::from_millis(2000),
            sweep_duration: Duration::from_secs(10),
            sweep_interval: Duration::from_millis(10),
        }
    }
}

/// Stateful calibration procedure.
///
/// The accumulation steps are public so the routine can also be driven by a
/// caller that owns its own timing; [`run`](Self::run) is the normal entry point.
#[derive(Debug, Clone)]
pub struct CalibrationRoutine {
    timings: CalibrationTimings,
    phase: CalibrationPhase,
    center_sum: [f64; 4],
    center_count: usize,
    centers: [f32; 4],
    mins: [f32; 4],
    maxs: [f32; 4],
}

impl CalibrationRoutine {
    /// Creates a routine in the WaitForward phase.
    #[must_use]
    pub fn new(timings: CalibrationTimings) -> Self {
        Self {
            timings,
            phase: CalibrationPhase::WaitForward,
            center_sum: [0.0; 4],
            center_count: 0,
            centers: [0.0; 4],
            mins: [0.0; 4],
            maxs: [0.0; 4],
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// Configured timings.
    #[must_use]
    pub fn timings(&self) -> &CalibrationTimings {
        &self.timings
    }

    /// Liveness gate: both sticks deflected forward and to either side.
    ///
    /// Forward is negative Y. A stick pulled back does not open the gate.
    #[must_use]
    pub fn is_live(sample: &RawSample) -> bool {
        let sideways = |v: f32| v != 0.0 && v.is_finite();
        let forward = |v: f32| v < 0.0 && v.is_finite();
        sideways(sample.left_x)
            && forward(sample.left_y)
            && sideways(sample.right_x)
            && forward(sample.right_y)
    }

    /// Adds one resting sample to the center average.
    pub fn add_center_sample(&mut self, sample: &RawSample) {
        for (sum, value) in self.center_sum.iter_mut().zip(sample.sticks()) {
            *sum += f64::from(value);
        }
        self.center_count += 1;
    }

    /// Averages the collected resting samples into the new centers.
    ///
    /// With no samples the centers stay at zero.
    pub fn finish_centers(&mut self) -> [f32; 4] {
        if self.center_count > 0 {
            let n = self.center_count as f64;
            for (center, sum) in self.centers.iter_mut().zip(self.center_sum) {
                *center = (sum / n) as f32;
            }
        }
        self.centers
    }

    /// Widens the observed range with one sweep sample.
    ///
    /// Ranges start at zero width around the new center, so an axis that
    /// never moves ends with a degenerate range.
    pub fn add_sweep_sample(&mut self, sample: &RawSample) {
        for (i, value) in sample.sticks().into_iter().enumerate() {
            if !value.is_finite() {
                continue;
            }
            let centered = value - self.centers[i];
            self.mins[i] = self.mins[i].min(centered);
            self.maxs[i] = self.maxs[i].max(centered);
        }
    }

    /// Assembles the profile from the collected centers and ranges.
    #[must_use]
    pub fn profile(&self) -> CalibrationProfile {
        let mut axes = [AxisCalibration::default(); 4];
        for (i, axis) in axes.iter_mut().enumerate() {
            *axis = AxisCalibration {
                center: self.centers[i],
                min: self.mins[i],
                max: self.maxs[i],
            };
        }
        CalibrationProfile::new(axes)
    }

    /// Runs the full procedure against `source`.
    ///
    /// `cancel` is raced against every phase; when it completes first the
    /// routine stops and returns `CalibrationCancelled`.
    ///
    /// # Errors
    ///
    /// - `CalibrationTimeout`: the liveness gate was not met in time
    /// - `CalibrationCancelled`: `cancel` resolved first
    /// - any error returned by `source.poll()`
    pub async fn run<S, C>(&mut self, source: &mut S, cancel: C) -> Result<CalibrationProfile>
    where
        S: ControllerSource,
        C: Future<Output = ()>,
    {
        let outcome = tokio::select! {
            biased;
            _ = cancel => Err(RovPilotError::CalibrationCancelled),
            result = self.drive(source) => result,
        };

        if let Err(e) = &outcome {
            warn!("Calibration aborted during {:?}: {}", self.phase, e);
        }
        outcome
    }

    async fn drive<S: ControllerSource>(&mut self, source: &mut S) -> Result<CalibrationProfile> {
        *self = Self::new(self.timings);
        let timings = self.timings;

        info!("Push both sticks diagonally forward to start calibration");
        match timeout(timings.liveness_timeout, self.wait_forward(source)).await {
            Ok(result) => result?,
            Err(_) => return Err(RovPilotError::CalibrationTimeout(timings.liveness_timeout)),
        }

        self.enter(CalibrationPhase::CenterSampling);
        info!("Release both sticks and leave them centered");
        sleep(timings.settle).await;

        let mut ticker = interval(timings.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        for _ in 0..timings.center_samples {
            ticker.tick().await;
            let sample = source.poll()?;
            self.add_center_sample(&sample);
        }
        let centers = self.finish_centers();
        info!("Stick centers: {:?}", centers);

        self.enter(CalibrationPhase::IdleSettle);
        info!(
            "Rotate both sticks through their full travel for {:?}",
            timings.sweep_duration
        );
        sleep(timings.idle_settle).await;

        self.enter(CalibrationPhase::SweepSampling);
        let deadline = Instant::now() + timings.sweep_duration;
        let mut ticker = interval(timings.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweep_count: u64 = 0;
        while Instant::now() < deadline {
            ticker.tick().await;
            let sample = source.poll()?;
            self.add_sweep_sample(&sample);
            sweep_count += 1;
        }
        debug!("Collected {} sweep samples", sweep_count);

        self.enter(CalibrationPhase::Done);
        let profile = self.profile();
        info!("Calibration complete: {:?}", profile);
        Ok(profile)
    }

    async fn wait_forward<S: ControllerSource>(&mut self, source: &mut S) -> Result<()> {
        let mut ticker = interval(self.timings.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if Self::is_live(&source.poll()?) {
                return Ok(());
            }
        }
    }

    fn enter(&mut self, phase: CalibrationPhase) {
        info!("Calibration phase: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }
}
