//! # ROV Pilot
//!
//! Drive a six-thruster ROV from a gamepad.
//!
//! ## Commands
//!
//! - `run` (default): read the gamepad, allocate thrust and stream PWM
//!   frames to the vehicle until Ctrl+C
//! - `calibrate`: measure stick centers and travel and save them
//! - `tune`: flip polarity or change multipliers in a thruster profile
//!
//! ## Control Mapping
//!
//! | Input | Motion |
//! |-------|--------|
//! | Left stick X | sway |
//! | Left stick Y | surge |
//! | Right stick X | yaw |
//! | Right stick Y | pitch (inverted) |
//! | Right trigger - left trigger | heave |

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use rov_pilot::config::{Config, LoggingConfig};
use rov_pilot::controller::calibration::CalibrationRoutine;
use rov_pilot::controller::gamepad::Gamepad;
use rov_pilot::controller::normalizer::{JoystickNormalizer, NormalizedControls};
use rov_pilot::controller::profile::{CalibrationProfile, StickAxis};
use rov_pilot::controller::ControllerSource;
use rov_pilot::link::{Link, PwmCommand};
use rov_pilot::thrusters::frame::FrameThrusters;
use rov_pilot::thrusters::profile::ThrusterProfileStore;
use rov_pilot::thrusters::ThrusterId;

/// Configuration file used when `--config` is not given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix for daily log files
const LOG_FILE_PREFIX: &str = "rov-pilot.log";

#[derive(Parser, Debug)]
#[command(name = "rov-pilot", version)]
#[command(about = "Drive a six-thruster ROV from a gamepad")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Stream thruster commands from the gamepad (default)
    Run,
    /// Measure stick centers and travel
    Calibrate,
    /// Adjust and save a thruster profile
    Tune(TuneArgs),
}

#[derive(clap::Args, Debug, Clone, PartialEq)]
struct TuneArgs {
    /// Profile to edit instead of the configured one
    #[arg(long)]
    profile: Option<String>,

    /// Flip the polarity of a thruster (fr, fl, rr, rl, fv, rv)
    #[arg(long, value_name = "ID")]
    reverse: Vec<ThrusterId>,

    /// Set a thruster multiplier in [0, 1]
    #[arg(long, value_name = "ID=VALUE", value_parser = parse_multiplier_arg)]
    multiplier: Vec<(ThrusterId, f32)>,

    /// Set the overall multiplier in [0, 1]
    #[arg(long, value_name = "VALUE")]
    overall: Option<f32>,

    /// Print the profile after applying changes
    #[arg(long)]
    show: bool,
}

impl TuneArgs {
    fn has_changes(&self) -> bool {
        !self.reverse.is_empty() || !self.multiplier.is_empty() || self.overall.is_some()
    }
}

/// Parses `ID=VALUE` for `--multiplier`.
fn parse_multiplier_arg(s: &str) -> std::result::Result<(ThrusterId, f32), String> {
    let (id, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got '{}'", s))?;
    let id: ThrusterId = id.parse().map_err(|e| format!("{}", e))?;
    let value: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("multiplier {} must be between 0 and 1", value));
    }
    Ok((id, value))
}

/// Main entry point for ROV Pilot
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Parse the command line and load configuration
///    - Set up logging (console, plus daily files if configured)
///
/// 2. **Command**
///    - `run`: control loop at `loop_rate_hz` until Ctrl+C
///    - `calibrate`: interactive stick calibration, Ctrl+C cancels
///    - `tune`: edit a thruster profile and exit
///
/// 3. **Graceful Shutdown**
///    - `run` sends a neutral frame with the restart flag before exiting
///
/// # Errors
///
/// Returns error if:
/// - An explicitly given configuration file is missing or invalid
/// - The gamepad or the vehicle link cannot be opened
/// - The gamepad or link fails during the control loop
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_missing) = load_config(&cli.config)?;
    let _log_guard = init_logging(&config.logging)?;

    info!("ROV Pilot v{} starting...", env!("CARGO_PKG_VERSION"));
    if config_missing {
        warn!(
            "No configuration file at {}, using built-in defaults",
            cli.config.display()
        );
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config).await,
        Command::Calibrate => calibrate(&config).await,
        Command::Tune(args) => tune(&config, &args),
    }
}

/// Loads the configuration. Returns defaults (and `true`) only when the
/// default path was used and nothing is there.
fn load_config(path: &Path) -> Result<(Config, bool)> {
    if path == Path::new(DEFAULT_CONFIG_PATH) && !path.exists() {
        return Ok((Config::default(), true));
    }

    let config = Config::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    Ok((config, false))
}

/// Console logging filtered by `RUST_LOG` or the configured level, plus a
/// daily rolling file when a log directory is configured.
///
/// The returned guard flushes the file writer on drop.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level: LevelFilter = config
        .level
        .parse()
        .with_context(|| format!("Invalid log level '{}'", config.level))?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if config.dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    std::fs::create_dir_all(&config.dir)
        .with_context(|| format!("Failed to create log directory {}", config.dir))?;
    let appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        )
        .init();

    Ok(Some(guard))
}

/// Opens the configured thruster profile.
fn open_frame(config: &Config, profile: &str) -> Result<FrameThrusters> {
    let store = ThrusterProfileStore::new(&config.thrusters.profile_dir);
    let frame = FrameThrusters::open(
        store,
        profile,
        config.thrusters.pulse_range()?,
        config.thrusters.shaping,
    )?;
    Ok(frame)
}

/// Feeds one cycle of normalized controls into the allocator.
fn apply_controls(frame: &mut FrameThrusters, controls: &NormalizedControls) {
    frame.thrust_calc(
        controls.left_x,
        controls.left_y,
        controls.triggers,
        -controls.right_y,
        controls.right_x,
    );
}

/// Control loop: poll, normalize, allocate, send.
async fn run(config: &Config) -> Result<()> {
    let calibration = CalibrationProfile::load_or_default(&config.controller.calibration_file);
    let normalizer = JoystickNormalizer::new(calibration, config.controller.deadzone);

    let mut pad = Gamepad::open(&config.controller.device_path)?;
    info!("Gamepad: {} at {}", pad.name(), pad.device_path());

    let mut frame = open_frame(config, &config.thrusters.profile)?;
    info!(
        "Thruster profile '{}' (overall multiplier {})",
        frame.profile_name(),
        frame.overall_multiplier()
    );

    let mut link = Link::connect(&config.link).await?;

    let mut ticker = interval(config.control.period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Starting control loop at {}Hz", config.control.loop_rate_hz);
    info!("Press Ctrl+C to exit");

    let mut cycles: u64 = 0;

    // Main control loop
    let outcome: Result<()> = loop {
        tokio::select! {
            _ = ticker.tick() => {
                let raw = match pad.poll() {
                    Ok(raw) => raw,
                    Err(e) => break Err(e.into()),
                };

                let controls = normalizer.normalize(&raw);
                apply_controls(&mut frame, &controls);

                let command = PwmCommand::new(frame.get_pwm());
                debug!("PWM frame: {:?}", command.pwm);

                if let Err(e) = link.send_command(&command).await {
                    break Err(e.into());
                }

                cycles += 1;
                if cycles % config.control.status_interval_cycles == 0 {
                    info!("Sent {} frames to {}, last {:?}", cycles, link.peer(), command.pwm);
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break Ok(());
            }
        }
    };

    info!("Total frames sent: {}", cycles);
    send_shutdown(&mut frame, &mut link).await;
    outcome
}

/// Stops every thruster and asks the vehicle to restart its control process.
async fn send_shutdown(frame: &mut FrameThrusters, link: &mut Link) {
    frame.neutral();
    let command = PwmCommand::shutdown(frame.get_pwm());

    if let Err(e) = link.send_command(&command).await {
        warn!("Could not send shutdown frame: {}", e);
        return;
    }

    match link.recv().await {
        Ok(Some(reply)) => info!("Vehicle replied: {}", String::from_utf8_lossy(&reply).trim()),
        Ok(None) => {}
        Err(e) => warn!("No acknowledgement of shutdown frame: {}", e),
    }
}

/// Interactive calibration against the live gamepad.
async fn calibrate(config: &Config) -> Result<()> {
    let mut pad = Gamepad::open(&config.controller.device_path)?;
    info!("Calibrating {} at {}", pad.name(), pad.device_path());

    let mut routine = CalibrationRoutine::new(config.calibration.timings());
    let cancel = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let profile = routine.run(&mut pad, cancel).await?;
    profile.save(&config.controller.calibration_file)?;

    for axis in StickAxis::ALL {
        let cal = profile.axis(axis);
        info!(
            "{}: center {:.4}, travel [{:.4}, {:.4}]",
            axis, cal.center, cal.min, cal.max
        );
    }

    for axis in profile.degenerate_axes() {
        warn!(
            "{} did not move during the sweep and will be used uncalibrated",
            axis
        );
    }
    Ok(())
}

/// Edits and persists a thruster profile.
fn tune(config: &Config, args: &TuneArgs) -> Result<()> {
    let name = args.profile.as_deref().unwrap_or(&config.thrusters.profile);
    let mut frame = open_frame(config, name)?;

    apply_tuning(&mut frame, args);

    if args.has_changes() {
        frame.save_settings(None)?;
    }
    if args.show || !args.has_changes() {
        print_profile(&frame);
    }
    Ok(())
}

fn apply_tuning(frame: &mut FrameThrusters, args: &TuneArgs) {
    for id in &args.reverse {
        let reversed = frame.thruster_mut(*id).reverse_polarity();
        info!("{} reversed: {}", id, reversed);
    }

    for (id, value) in &args.multiplier {
        frame.thruster_mut(*id).set_multiplier(*value);
        info!("{} multiplier: {}", id, value);
    }

    if let Some(overall) = args.overall {
        frame.set_overall_multiplier(overall);
        info!("Overall multiplier: {}", frame.overall_multiplier());
    }
}

fn print_profile(frame: &FrameThrusters) {
    println!("Profile '{}'", frame.profile_name());
    for id in ThrusterId::ALL {
        let thruster = frame.thruster(id);
        println!(
            "  {}  reversed: {:<5}  multiplier: {}",
            id,
            thruster.is_reversed(),
            thruster.multiplier_magnitude()
        );
    }
    println!("  overall multiplier: {}", frame.overall_multiplier());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn tune_args(argv: &[&str]) -> TuneArgs {
        let mut full = vec!["rov-pilot", "tune"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Some(Command::Tune(args)) => args,
            other => panic!("Expected tune command, got: {:?}", other),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_command_is_run() {
        let cli = Cli::try_parse_from(["rov-pilot"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_tune_arguments() {
        let args = tune_args(&[
            "--profile", "pool", "--reverse", "fr", "--reverse", "RL", "--multiplier", "fv=0.75",
            "--overall", "0.6",
        ]);
        assert_eq!(args.profile.as_deref(), Some("pool"));
        assert_eq!(args.reverse, vec![ThrusterId::Fr, ThrusterId::Rl]);
        assert_eq!(args.multiplier, vec![(ThrusterId::Fv, 0.75)]);
        assert_eq!(args.overall, Some(0.6));
        assert!(args.has_changes());
    }

    #[test]
    fn test_tune_rejects_unknown_thruster() {
        assert!(Cli::try_parse_from(["rov-pilot", "tune", "--reverse", "xx"]).is_err());
    }

    #[test]
    fn test_parse_multiplier_arg() {
        assert_eq!(parse_multiplier_arg("rr=0.5"), Ok((ThrusterId::Rr, 0.5)));
        assert_eq!(parse_multiplier_arg("rv= 1"), Ok((ThrusterId::Rv, 1.0)));
        assert!(parse_multiplier_arg("rr").is_err());
        assert!(parse_multiplier_arg("rr=1.5").is_err());
        assert!(parse_multiplier_arg("rr=abc").is_err());
        assert!(parse_multiplier_arg("zz=0.5").is_err());
    }

    #[test]
    fn test_apply_tuning() {
        let mut frame = FrameThrusters::default();
        apply_tuning(
            &mut frame,
            &tune_args(&["--reverse", "fl", "--multiplier", "fl=0.5", "--overall", "0.8"]),
        );

        assert!(frame.thruster(ThrusterId::Fl).is_reversed());
        assert_eq!(frame.thruster(ThrusterId::Fl).get_multiplier(), -0.5);
        assert_eq!(frame.overall_multiplier(), 0.8);
    }

    #[test]
    fn test_show_only_has_no_changes() {
        assert!(!tune_args(&["--show"]).has_changes());
    }

    #[test]
    fn test_control_mapping() {
        let mut frame = FrameThrusters::default();

        // Right stick pulled back pitches the nose up
        let controls = NormalizedControls {
            right_y: -1.0,
            ..NormalizedControls::default()
        };
        apply_controls(&mut frame, &controls);
        let pwm = frame.get_pwm();
        assert_eq!((pwm.fv, pwm.rv), (1100, 1900));

        // Right trigger alone is full heave
        let controls = NormalizedControls {
            triggers: 1.0,
            ..NormalizedControls::default()
        };
        apply_controls(&mut frame, &controls);
        let pwm = frame.get_pwm();
        assert_eq!((pwm.fv, pwm.rv), (1900, 1900));
        assert_eq!((pwm.fr, pwm.fl, pwm.rr, pwm.rl), (1500, 1500, 1500, 1500));
    }

    #[test]
    fn test_missing_default_config_uses_defaults() {
        // Only meaningful where the default path does not resolve
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            let (_, missing) = load_config(Path::new(DEFAULT_CONFIG_PATH)).unwrap();
            assert!(!missing);
        } else {
            let (config, missing) = load_config(Path::new(DEFAULT_CONFIG_PATH)).unwrap();
            assert!(missing);
            assert_eq!(config.control.loop_rate_hz, 50);
        }
    }

    #[test]
    fn test_explicit_missing_config_is_error() {
        assert!(load_config(Path::new("/nonexistent/rov-pilot.toml")).is_err());
    }
}
