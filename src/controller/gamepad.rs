//! # Gamepad Module
//!
//! This module handles gamepad detection, connection, and input reading
//! using the Linux evdev interface.
//!
//! ## Controller Detection
//!
//! Supported pads are identified by vendor and product ID:
//! - Sony DualSense / DualSense Edge (vendor 0x054c)
//! - Microsoft Xbox 360 / One S / Series (vendor 0x045e)
//!
//! A device path from the configuration bypasses the scan.
//!
//! ## Reading
//!
//! `fetch_events` blocks, so a dedicated reader thread folds events into a
//! [`RawSample`] and publishes it on a `tokio::sync::watch` channel. The
//! control loop polls the latest value without ever waiting on the device.

use evdev::Device;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::mapper::{AxisLayout, AxisRole, EventMapper, RawSample};
use super::ControllerSource;
use crate::error::{Result, RovPilotError};

/// Sony vendor ID
const SONY_VENDOR_ID: u16 = 0x054c;

/// Microsoft vendor ID
const MICROSOFT_VENDOR_ID: u16 = 0x045e;

/// Known gamepads: (vendor, product, layout, name)
const SUPPORTED_PADS: &[(u16, u16, AxisLayout, &str)] = &[
    (SONY_VENDOR_ID, 0x0ce6, AxisLayout::DualSense, "DualSense"),
    (SONY_VENDOR_ID, 0x0df2, AxisLayout::DualSense, "DualSense Edge"),
    (MICROSOFT_VENDOR_ID, 0x028e, AxisLayout::Xbox, "Xbox 360"),
    (MICROSOFT_VENDOR_ID, 0x02ea, AxisLayout::Xbox, "Xbox One S"),
    (MICROSOFT_VENDOR_ID, 0x0b12, AxisLayout::Xbox, "Xbox Series"),
];

/// Looks up a supported pad by USB ID.
fn lookup_pad(vendor: u16, product: u16) -> Option<(AxisLayout, &'static str)> {
    SUPPORTED_PADS
        .iter()
        .find(|(v, p, _, _)| *v == vendor && *p == product)
        .map(|(_, _, layout, name)| (*layout, *name))
}

/// Guesses the layout of a device the user pointed at explicitly.
fn layout_for_vendor(vendor: u16) -> AxisLayout {
    if vendor == SONY_VENDOR_ID {
        AxisLayout::DualSense
    } else {
        AxisLayout::Xbox
    }
}

/// Handle to a connected gamepad.
///
/// Dropping the handle stops the reader thread after its next event.
pub struct Gamepad {
    device_path: String,
    name: String,
    layout: AxisLayout,
    samples: watch::Receiver<RawSample>,
}

impl std::fmt::Debug for Gamepad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gamepad")
            .field("device_path", &self.device_path)
            .field("name", &self.name)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl Gamepad {
    /// Opens a gamepad and starts its reader thread.
    ///
    /// # Arguments
    ///
    /// * `device_path` - `/dev/input/eventX` to open, or empty to auto-detect
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: no supported gamepad found on the system
    /// - `Controller`: the device could not be opened or read
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rov_pilot::controller::gamepad::Gamepad;
    ///
    /// let pad = Gamepad::open("")?;
    /// println!("Connected to {} at {}", pad.name(), pad.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(device_path: &str) -> Result<Self> {
        let (device, path, layout) = if device_path.is_empty() {
            Self::detect()?
        } else {
            let device = Device::open(device_path).map_err(|e| {
                RovPilotError::Controller(format!("Failed to open {}: {}", device_path, e))
            })?;
            let layout = layout_for_vendor(device.input_id().vendor());
            (device, PathBuf::from(device_path), layout)
        };

        Self::start(device, &path, layout)
    }

    /// Scans `/dev/input/event*` for the first supported gamepad.
    fn detect() -> Result<(Device, PathBuf, AxisLayout)> {
        let input_dir = Path::new("/dev/input");

        if !input_dir.exists() {
            return Err(RovPilotError::Controller(
                "/dev/input directory not found".to_string(),
            ));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| RovPilotError::Controller(format!("Failed to read /dev/input: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                RovPilotError::Controller(format!("Failed to read directory entry: {}", e))
            })?;

        // Deterministic choice when several pads are plugged in
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();

            let is_event_node = path
                .file_name()
                .map(|name| name.to_string_lossy().starts_with("event"))
                .unwrap_or(false);
            if !is_event_node {
                continue;
            }

            match Device::open(&path) {
                Ok(device) => {
                    let id = device.input_id();
                    debug!(
                        "Found input device: {} (vendor: 0x{:04x}, product: 0x{:04x})",
                        path.display(),
                        id.vendor(),
                        id.product()
                    );

                    if let Some((layout, name)) = lookup_pad(id.vendor(), id.product()) {
                        info!("Found {} gamepad at: {}", name, path.display());
                        return Ok((device, path, layout));
                    }
                }
                Err(e) => {
                    // Permission denied or other errors - skip device
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(RovPilotError::ControllerNotFound)
    }

    fn start(device: Device, path: &Path, layout: AxisLayout) -> Result<Self> {
        let mut mapper = EventMapper::new(layout);

        match device.get_abs_state() {
            Ok(abs_state) => {
                for role in AxisRole::ALL {
                    let info = abs_state[layout.axis_code(role).0 as usize];
                    mapper.set_range(role, info.minimum, info.maximum);
                }
            }
            Err(e) => warn!(
                "Could not read axis ranges from {}, using defaults: {}",
                path.display(),
                e
            ),
        }

        let name = device.name().unwrap_or("unknown gamepad").to_string();
        let device_path = path.to_string_lossy().to_string();
        let (tx, rx) = watch::channel(*mapper.sample());

        let reader_path = device_path.clone();
        std::thread::Builder::new()
            .name("gamepad-reader".to_string())
            .spawn(move || read_events(device, mapper, tx, reader_path))
            .map_err(|e| RovPilotError::Controller(format!("Failed to spawn reader: {}", e)))?;

        Ok(Self {
            device_path,
            name,
            layout,
            samples: rx,
        })
    }

    /// Get the device path of this gamepad.
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Human-readable device name reported by the kernel.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Axis layout used to decode this device.
    pub fn layout(&self) -> AxisLayout {
        self.layout
    }
}

impl ControllerSource for Gamepad {
    fn poll(&mut self) -> Result<RawSample> {
        if self.samples.has_changed().is_err() {
            return Err(RovPilotError::ControllerDisconnected);
        }
        let sample = *self.samples.borrow_and_update();
        Ok(sample)
    }
}

/// Reader thread body: runs until the device errors or the handle is dropped.
fn read_events(
    mut device: Device,
    mut mapper: EventMapper,
    tx: watch::Sender<RawSample>,
    device_path: String,
) {
    loop {
        match device.fetch_events() {
            Ok(events) => {
                for event in events {
                    mapper.process_event(&event);
                }
            }
            Err(e) => {
                warn!("Gamepad at {} stopped reporting: {}", device_path, e);
                return;
            }
        }

        tx.send_replace(*mapper.sample());
        if tx.is_closed() {
            debug!("Gamepad handle dropped, stopping reader for {}", device_path);
            return;
        }
    }
}
