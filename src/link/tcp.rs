//! TCP link to the vehicle's onboard computer.
//!
//! The vehicle side may bind any port in a small window above its base port,
//! so connecting walks `port, port + 1, ...` until one accepts.

use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::PiLink;
use crate::error::{Result, RovPilotError};

/// Connects to the first port in `port .. port + span` that accepts.
///
/// # Arguments
///
/// * `host` - Vehicle address
/// * `port` - First port to try
/// * `span` - Number of consecutive ports to try
/// * `connect_timeout` - Bound on each attempt
/// * `reply_timeout` - Passed on to the returned link
///
/// # Errors
///
/// Returns `TransportNotFound` listing every address tried if none accepted.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use rov_pilot::link::tcp::connect_scan;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let link = connect_scan(
///         "169.254.6.161",
///         5005,
///         10,
///         Duration::from_secs(5),
///         Duration::from_millis(500),
///     )
///     .await?;
///     println!("Connected to {}", link.peer());
///     Ok(())
/// }
/// ```
pub async fn connect_scan(
    host: &str,
    port: u16,
    span: u16,
    connect_timeout: Duration,
    reply_timeout: Duration,
) -> Result<PiLink<TcpStream>> {
    let mut tried = Vec::new();

    for offset in 0..span {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        let addr = format!("{}:{}", host, candidate);
        debug!("Trying {}", addr);

        match tokio::time::timeout(connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                info!("Connected to vehicle at {}", addr);
                return Ok(PiLink::new(stream, addr, reply_timeout));
            }
            Ok(Err(e)) => debug!("Connection to {} failed: {}", addr, e),
            Err(_) => debug!("Connection to {} timed out after {:?}", addr, connect_timeout),
        }
        tried.push(addr);
    }

    Err(RovPilotError::TransportNotFound(tried.join(", ")))
}
