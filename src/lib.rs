//! # Navbridge Core Library
//!
//! Bridges a pair of u-blox GNSS receivers onto the network:
//! - Auto-negotiates each receiver's baud rate (MON-VER probing, CFG-PRT)
//! - Pushes role-specific output profiles (position telemetry, NAV-RELPOSNED)
//! - Reframes position telemetry into sentences behind a bounded buffer
//! - Synthesizes `$GNHDT` heading sentences from moving-baseline solutions
//! - Relays everything as UDP datagrams and routes corrections back in
//!
//! ## Example
//!
//! ```rust,no_run
//! use navbridge_core::{AppConfig, RelayService};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let mut service = RelayService::new(config);
//!     service.start().map_err(|e| anyhow::anyhow!(e))?;
//!
//!     std::thread::sleep(std::time::Duration::from_secs(10));
//!
//!     let stats = service.stats();
//!     println!("relayed {} frames", stats.frames_relayed);
//!     service.stop();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::config::{AppConfig, ConfigError};
pub use crate::core::frame::{Frame, FrameBuffer, FrameKind};
pub use crate::core::heading::HeadingSynthesizer;
pub use crate::core::negotiate::{Negotiated, NegotiationError, NegotiatorConfig};
pub use crate::core::receiver::{ChannelConfig, ChannelRole, ChannelState, ReceiverChannel};
pub use crate::core::router::{ChannelRouter, RouterConfig, RouterStats};
pub use crate::core::sentence::SentenceError;
pub use crate::core::service::{RelayService, ServiceState};
pub use crate::core::transport::{
    CorrectionSocket, SerialConfig, SerialLine, SerialLink, TransportError, TransportSink, UdpSink,
};
pub use crate::core::ubx::{RelativePositionPacket, UbxFrame, UbxParser};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
