//! Status sinks: no-op, log, and an OSC chatbox overlay.

use crate::collaborators::StatusSink;
use crate::config::{StatusBackend, StatusConfig};
use crate::error::{HarkError, Result};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use tracing::info;

const CHATBOX_ADDRESS: &str = "/chatbox/input";

/// Build the sink selected by `config.backend`.
///
/// # Errors
///
/// Returns [`HarkError::Status`] if the OSC target cannot be resolved or
/// the socket cannot be bound.
pub fn from_config(config: &StatusConfig) -> Result<Arc<dyn StatusSink>> {
    Ok(match config.backend {
        StatusBackend::None => Arc::new(NoopStatus),
        StatusBackend::Log => Arc::new(LogStatus),
        StatusBackend::Osc => Arc::new(OscStatus::connect(&config.osc_addr)?),
    })
}

/// Discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatus;

impl StatusSink for NoopStatus {
    fn show(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// Writes updates to the log at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn show(&self, text: &str) -> Result<()> {
        info!(text, "status");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        info!("status cleared");
        Ok(())
    }
}

/// Sends `/chatbox/input` messages (`text, send_now = true, notify = false`)
/// over UDP.
#[derive(Debug)]
pub struct OscStatus {
    socket: UdpSocket,
    target: SocketAddr,
}

impl OscStatus {
    /// Bind an ephemeral local socket for sending to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`HarkError::Status`] if `addr` does not resolve or the bind fails.
    pub fn connect(addr: &str) -> Result<Self> {
        let target = addr
            .to_socket_addrs()
            .map_err(|e| HarkError::Status(format!("invalid OSC address {addr}: {e}")))?
            .next()
            .ok_or_else(|| HarkError::Status(format!("OSC address {addr} did not resolve")))?;
        let bind: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind)
            .map_err(|e| HarkError::Status(format!("OSC socket bind failed: {e}")))?;
        Ok(Self { socket, target })
    }

    fn send(&self, text: &str) -> Result<()> {
        let packet = chatbox_message(text);
        self.socket
            .send_to(&packet, self.target)
            .map_err(|e| HarkError::Status(format!("OSC send to {} failed: {e}", self.target)))?;
        Ok(())
    }
}

impl StatusSink for OscStatus {
    fn show(&self, text: &str) -> Result<()> {
        self.send(text)
    }

    fn clear(&self) -> Result<()> {
        self.send("")
    }
}

/// OSC strings are NUL-terminated and padded to a multiple of four bytes.
fn push_osc_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    let padded = (s.len() / 4 + 1) * 4;
    buf.resize(buf.len() + padded - s.len(), 0);
}

fn chatbox_message(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(CHATBOX_ADDRESS.len() + text.len() + 16);
    push_osc_string(&mut buf, CHATBOX_ADDRESS);
    push_osc_string(&mut buf, ",sTF");
    push_osc_string(&mut buf, text);
    buf
}
