//! UDP endpoints toward the network

use super::{TransportError, TransportSink};
use std::net::{SocketAddr, UdpSocket};
use tracing::{debug, trace};

/// Largest correction datagram the bridge accepts.
pub const MAX_DATAGRAM: usize = 2048;

/// Broadcasts relayed frames as UDP datagrams.
pub struct UdpSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpSink {
    /// Create a sink aimed at `target` (`host:port`).
    ///
    /// The socket binds an ephemeral local port with broadcast enabled, so
    /// the target may be a subnet broadcast address.
    pub fn new(target: &str) -> Result<Self, TransportError> {
        let target: SocketAddr = target.parse().map_err(|_| {
            TransportError::ConfigError(format!("invalid target address: {}", target))
        })?;
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.set_broadcast(true)?;
        Ok(Self { socket, target })
    }

    /// Destination address of this sink.
    #[must_use]
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl TransportSink for UdpSink {
    fn send(&mut self, frame: &[u8]) -> bool {
        match self.socket.send_to(frame, self.target) {
            Ok(_) => true,
            Err(e) => {
                debug!("UDP send to {} failed: {}", self.target, e);
                false
            }
        }
    }
}

/// Listens for correction datagrams from the network.
pub struct CorrectionSocket {
    socket: UdpSocket,
}

impl CorrectionSocket {
    /// Bind a non-blocking listener on `listen` (`host:port`).
    pub fn bind(listen: &str) -> Result<Self, TransportError> {
        let addr: SocketAddr = listen.parse().map_err(|_| {
            TransportError::ConfigError(format!("invalid listen address: {}", listen))
        })?;
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket })
    }

    /// Address the listener actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive one pending datagram into `buf`.
    ///
    /// Returns `Ok(None)` when nothing is waiting.
    pub fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
        match self.socket.recv_from(buf) {
            Ok((n, from)) => {
                trace!("{} byte correction datagram from {}", n, from);
                Ok(Some(n))
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(TransportError::IoError(e)),
        }
    }
}
