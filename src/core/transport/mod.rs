//! Transport layer
//!
//! Byte-stream endpoints the bridge moves data between: serial links to
//! the receivers and UDP sockets toward the network. Everything here is
//! synchronous; reads hand back whatever is pending and return instead of
//! parking the polling loop.

mod serial;
mod udp;

pub use serial::{list_ports, SerialConfig, SerialLine, SerialLink, SerialParity};
pub use udp::{CorrectionSocket, UdpSink, MAX_DATAGRAM};

use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Destination for relayed frames.
///
/// Returns `true` when the frame was handed to the transport. Implemented
/// for closures so tests can capture traffic without a socket.
pub trait TransportSink: Send {
    /// Send one frame.
    fn send(&mut self, frame: &[u8]) -> bool;
}

impl<F> TransportSink for F
where
    F: FnMut(&[u8]) -> bool + Send,
{
    fn send(&mut self, frame: &[u8]) -> bool {
        self(frame)
    }
}
