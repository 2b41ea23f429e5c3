//! Receiver channels
//!
//! A channel owns the serial line to one receiver and knows how that
//! receiver should be set up: the position receiver streams the standard
//! NMEA sentence set, the heading receiver streams NAV-RELPOSNED. Bringing
//! a channel up negotiates the baud rate first, then pushes the role's
//! output profile message by message, waiting for each acknowledgement.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use super::negotiate::{self, NegotiationError, NegotiatorConfig};
use super::transport::{SerialLine, TransportError};
use super::ubx::{self, nmea_msg};

/// Which receiver a channel talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRole {
    /// The position receiver, producing NMEA telemetry.
    Position,
    /// The heading receiver, producing NAV-RELPOSNED solutions.
    Heading,
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position => write!(f, "position"),
            Self::Heading => write!(f, "heading"),
        }
    }
}

/// Lifecycle state of a receiver channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No receiver reachable.
    Disconnected,
    /// Baud negotiation in progress.
    Negotiating,
    /// Link negotiated; the channel is relaying.
    Connected,
}

/// Per-channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Baud negotiation parameters.
    pub negotiation: NegotiatorConfig,
    /// How long to wait for each configuration acknowledgement.
    pub ack_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            negotiation: NegotiatorConfig::default(),
            ack_timeout: Duration::from_millis(1100),
        }
    }
}

/// One receiver and the serial line to it.
pub struct ReceiverChannel {
    role: ChannelRole,
    state: ChannelState,
    config: ChannelConfig,
    line: Box<dyn SerialLine>,
}

impl ReceiverChannel {
    /// Wrap a line as an unconnected channel.
    pub fn new(role: ChannelRole, config: ChannelConfig, line: Box<dyn SerialLine>) -> Self {
        Self {
            role,
            state: ChannelState::Disconnected,
            config,
            line,
        }
    }

    /// The channel's role.
    #[must_use]
    pub fn role(&self) -> ChannelRole {
        self.role
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// True when the channel is up and relaying.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ChannelState::Connected
    }

    /// Negotiated rate, when connected.
    #[must_use]
    pub fn baud(&self) -> Option<u32> {
        match self.state {
            ChannelState::Connected => Some(self.line.baud()),
            _ => None,
        }
    }

    /// Negotiate the link and push the role's output profile.
    ///
    /// Profile failures are tolerated: a receiver that answers the probe
    /// but balks at a tuning message usually still streams usable output,
    /// so the channel comes up anyway and the failure is logged.
    pub fn init(&mut self) -> Result<(), NegotiationError> {
        self.state = ChannelState::Negotiating;
        info!("{} channel: negotiating", self.role);

        let outcome = match negotiate::negotiate(self.line.as_mut(), &self.config.negotiation) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state = ChannelState::Disconnected;
                error!("{} channel: negotiation failed: {}", self.role, e);
                return Err(e);
            }
        };
        info!(
            "{} channel: link up at {} baud after {} probes",
            self.role, outcome.baud, outcome.attempts
        );
        self.state = ChannelState::Connected;

        let profile = match self.role {
            ChannelRole::Position => self.apply_position_profile(),
            ChannelRole::Heading => self.apply_heading_profile(),
        };
        if let Err(e) = profile {
            warn!("{} channel: receiver profile incomplete: {}", self.role, e);
        }
        Ok(())
    }

    /// 10 Hz navigation, mixed UBX+NMEA output, standard sentences at 1 Hz.
    fn apply_position_profile(&mut self) -> Result<(), TransportError> {
        self.configure(ubx::msg::CFG_RATE, &ubx::cfg_rate(100))?;
        let baud = self.line.baud();
        self.configure(ubx::msg::CFG_PRT, &ubx::cfg_prt_uart1(baud))?;
        for id in [
            nmea_msg::GGA,
            nmea_msg::GSA,
            nmea_msg::GSV,
            nmea_msg::RMC,
            nmea_msg::GST,
            nmea_msg::VTG,
            nmea_msg::GLL,
        ] {
            self.configure(ubx::msg::CFG_MSG, &ubx::cfg_msg(nmea_msg::CLASS, id, 1))?;
        }
        Ok(())
    }

    /// Stream the relative-position solution heading synthesis feeds on.
    fn apply_heading_profile(&mut self) -> Result<(), TransportError> {
        let (class, id) = ubx::msg::NAV_RELPOSNED;
        self.configure(ubx::msg::CFG_MSG, &ubx::cfg_msg(class, id, 1))
    }

    /// Send one configuration frame and wait for its acknowledgement.
    fn configure(&mut self, msg: (u8, u8), frame: &[u8]) -> Result<(), TransportError> {
        self.line.write_all(frame)?;

        let mut parser = ubx::UbxParser::new();
        let mut buf = [0u8; 512];
        let deadline = Instant::now() + self.config.ack_timeout;

        loop {
            let n = self.line.read_available(&mut buf)?;
            for &byte in &buf[..n] {
                if let Some(reply) = parser.consume(byte) {
                    if reply.acknowledges(msg) {
                        return Ok(());
                    }
                    if reply.rejects(msg) {
                        return Err(TransportError::ConfigError(format!(
                            "receiver rejected {:02X}-{:02X}",
                            msg.0, msg.1
                        )));
                    }
                }
            }
            if Instant::now() >= deadline {
                return Err(TransportError::ConfigError(format!(
                    "no acknowledgement for {:02X}-{:02X}",
                    msg.0, msg.1
                )));
            }
            thread::sleep(self.config.negotiation.poll_interval);
        }
    }

    /// Read pending receiver bytes into `buf`.
    pub(crate) fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.line.read_available(buf)
    }

    /// Write raw bytes toward the receiver.
    pub(crate) fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.line.write_all(data)
    }
}
