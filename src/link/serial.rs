//! Serial link to the vehicle.
//!
//! Opens the port 8N1 with no flow control and wraps it in a [`PiLink`].

use std::time::Duration;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::info;

use super::PiLink;
use crate::error::{Result, RovPilotError};

/// Opens a serial link.
///
/// # Arguments
///
/// * `path` - Device path (e.g., "/dev/ttyACM0")
/// * `baud_rate` - Line speed
/// * `reply_timeout` - Passed on to the returned link
///
/// # Errors
///
/// Returns `Transport` if the port cannot be opened.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use rov_pilot::link::serial::open;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let link = open("/dev/ttyACM0", 115_200, Duration::from_millis(500))?;
///     println!("Connected to {}", link.peer());
///     Ok(())
/// }
/// ```
pub fn open(path: &str, baud_rate: u32, reply_timeout: Duration) -> Result<PiLink<SerialStream>> {
    let port = open_port(path, baud_rate)?;
    info!("Opened serial link at {} ({} baud)", path, baud_rate);
    Ok(PiLink::new(port, path, reply_timeout))
}

fn open_port(path: &str, baud_rate: u32) -> Result<SerialStream> {
    tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| RovPilotError::Transport(format!("Failed to open {}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_invalid_path_returns_error() {
        let result = open(
            "/dev/nonexistent_serial_device_12345",
            115_200,
            Duration::from_millis(500),
        );

        match result {
            Err(RovPilotError::Transport(msg)) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Transport error, got: {:?}", other),
        }
    }

    // Integration test - only runs with a serial adapter attached
    #[tokio::test]
    #[ignore]
    async fn test_open_with_real_hardware() {
        let link = open("/dev/ttyACM0", 115_200, Duration::from_millis(500))
            .expect("no serial device at /dev/ttyACM0");
        assert_eq!(link.peer(), "/dev/ttyACM0");
    }
}
