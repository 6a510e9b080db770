//! # Link Module
//!
//! Carries PWM frames from the pilot station to the vehicle.
//!
//! This module handles:
//! - The JSON command payload
//! - Newline-terminated framing over any async byte stream
//! - TCP (with a port scan) and serial transports
//!
//! ## Wire Format
//!
//! One JSON object per line:
//!
//! ```text
//! {"fr":1500,"fl":1500,"rr":1500,"rl":1500,"fv":1500,"rv":1500,"msg":[],"restart":false}
//! ```
//!
//! Failures are returned to the caller as they happen; nothing here retries.

pub mod serial;
pub mod tcp;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_serial::SerialStream;
use tracing::{debug, info};

use crate::config::{LinkConfig, Transport};
use crate::error::{Result, RovPilotError};
use crate::thrusters::frame::PwmFrame;

/// Largest reply read in one `recv`.
pub const RECV_BUFFER_SIZE: usize = 1024;

/// Command sent to the vehicle every control cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PwmCommand {
    #[serde(flatten)]
    pub pwm: PwmFrame,
    /// Free-form messages for the vehicle.
    pub msg: Vec<String>,
    /// Asks the vehicle to restart its control process.
    pub restart: bool,
}

impl PwmCommand {
    /// A regular control frame.
    #[must_use]
    pub fn new(pwm: PwmFrame) -> Self {
        Self {
            pwm,
            msg: Vec::new(),
            restart: false,
        }
    }

    /// Final frame with the restart flag set, sent on shutdown.
    #[must_use]
    pub fn shutdown(pwm: PwmFrame) -> Self {
        Self {
            pwm,
            msg: Vec::new(),
            restart: true,
        }
    }

    /// Serializes to one newline-terminated JSON line.
    ///
    /// # Examples
    ///
    /// ```
    /// use rov_pilot::link::PwmCommand;
    /// use rov_pilot::thrusters::frame::PwmFrame;
    ///
    /// let wire = PwmCommand::new(PwmFrame::uniform(1500)).to_wire()?;
    /// assert!(wire.starts_with(b"{\"fr\":1500,"));
    /// assert!(wire.ends_with(b"\"msg\":[],\"restart\":false}\n"));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn to_wire(&self) -> Result<Bytes> {
        let json = serde_json::to_vec(self)?;
        let mut buf = BytesMut::with_capacity(json.len() + 1);
        buf.put_slice(&json);
        buf.put_u8(b'\n');
        Ok(buf.freeze())
    }
}

/// Framed link to the vehicle over any async byte stream.
pub struct PiLink<S> {
    stream: S,
    peer: String,
    reply_timeout: Duration,
}

impl<S> std::fmt::Debug for PiLink<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiLink")
            .field("peer", &self.peer)
            .field("reply_timeout", &self.reply_timeout)
            .finish_non_exhaustive()
    }
}

impl<S> PiLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    ///
    /// # Arguments
    ///
    /// * `stream` - Connected byte stream
    /// * `peer` - Description of the other end, for logs
    /// * `reply_timeout` - Upper bound on each [`recv`](Self::recv)
    pub fn new(stream: S, peer: impl Into<String>, reply_timeout: Duration) -> Self {
        Self {
            stream,
            peer: peer.into(),
            reply_timeout,
        }
    }

    /// Description of the other end.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Writes and flushes raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the stream rejects the write.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Sends one command line.
    ///
    /// # Errors
    ///
    /// Returns `Json` if the command cannot be serialized and `Io` if the
    /// write fails.
    pub async fn send_command(&mut self, command: &PwmCommand) -> Result<()> {
        let wire = command.to_wire()?;
        self.send(&wire).await?;
        debug!("Sent {} bytes to {}", wire.len(), self.peer);
        Ok(())
    }

    /// Reads whatever the vehicle replied, up to [`RECV_BUFFER_SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// - `Transport`: no reply within the reply timeout, or the peer closed
    ///   the stream
    /// - `Io`: the read failed
    pub async fn recv(&mut self) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(RECV_BUFFER_SIZE);
        let n = tokio::time::timeout(self.reply_timeout, self.stream.read(&mut buf))
            .await
            .map_err(|_| {
                RovPilotError::Transport(format!(
                    "No reply from {} within {:?}",
                    self.peer, self.reply_timeout
                ))
            })??;

        if n == 0 {
            return Err(RovPilotError::Transport(format!(
                "Connection closed by {}",
                self.peer
            )));
        }

        buf.truncate(n);
        Ok(buf.freeze())
    }

    /// Releases the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

/// The configured transport, ready to send.
#[derive(Debug)]
pub enum Link {
    Tcp(PiLink<TcpStream>),
    Serial(PiLink<SerialStream>),
    /// Frames are logged and dropped.
    Offline,
}

impl Link {
    /// Opens the transport selected in `config`.
    ///
    /// # Errors
    ///
    /// - `TransportNotFound`: no TCP port in the scan accepted a connection
    /// - `Transport`: the serial port could not be opened
    pub async fn connect(config: &LinkConfig) -> Result<Self> {
        match config.transport {
            Transport::Tcp => Ok(Link::Tcp(
                tcp::connect_scan(
                    &config.host,
                    config.port,
                    config.port_span,
                    config.connect_timeout(),
                    config.reply_timeout(),
                )
                .await?,
            )),
            Transport::Serial => Ok(Link::Serial(serial::open(
                &config.serial_port,
                config.baud_rate,
                config.reply_timeout(),
            )?)),
            Transport::Offline => {
                info!("Link disabled, PWM frames will only be logged");
                Ok(Link::Offline)
            }
        }
    }

    /// Description of the other end.
    pub fn peer(&self) -> &str {
        match self {
            Link::Tcp(link) => link.peer(),
            Link::Serial(link) => link.peer(),
            Link::Offline => "offline",
        }
    }

    /// Sends one command.
    ///
    /// # Errors
    ///
    /// See [`PiLink::send_command`].
    pub async fn send_command(&mut self, command: &PwmCommand) -> Result<()> {
        match self {
            Link::Tcp(link) => link.send_command(command).await,
            Link::Serial(link) => link.send_command(command).await,
            Link::Offline => {
                debug!("Offline frame: {:?}", command);
                Ok(())
            }
        }
    }

    /// Reads a reply. The offline link never replies.
    ///
    /// # Errors
    ///
    /// See [`PiLink::recv`].
    pub async fn recv(&mut self) -> Result<Option<Bytes>> {
        match self {
            Link::Tcp(link) => link.recv().await.map(Some),
            Link::Serial(link) => link.recv().await.map(Some),
            Link::Offline => Ok(None),
        }
    }
}
