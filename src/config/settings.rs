//! Application settings

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::ConfigError;
use crate::core::frame;
use crate::core::negotiate::NegotiatorConfig;
use crate::core::receiver::ChannelConfig;
use crate::core::router::RouterConfig;
use crate::core::transport::SerialConfig;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Position receiver settings
    pub position: ReceiverSettings,
    /// Heading receiver settings
    pub heading: ReceiverSettings,
    /// Network endpoints
    pub transport: TransportSettings,
    /// Relay loop settings
    pub service: ServiceSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            position: ReceiverSettings::position_defaults(),
            heading: ReceiverSettings::heading_defaults(),
            transport: TransportSettings::default(),
            service: ServiceSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load config from the platform config directory, or defaults when no
    /// file exists yet.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = super::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("config.toml");

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to the platform config directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_dir = super::config_dir().ok_or(ConfigError::NoConfigDir)?;
        std::fs::create_dir_all(&config_dir)?;
        self.save_to(&config_dir.join("config.toml"))
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Router tuning derived from these settings.
    #[must_use]
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            relay_capacity: self.transport.relay_capacity,
            read_chunk: self.transport.read_chunk,
        }
    }
}

/// Settings for one receiver channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverSettings {
    /// Serial port parameters
    pub serial: SerialConfig,
    /// Baud rates probed during negotiation, in order
    pub baud_candidates: Vec<u32>,
    /// Rate the receiver is moved to once found
    pub operating_baud: u32,
    /// Settle delay after each rate switch (milliseconds)
    pub settle_ms: u64,
    /// Probe and acknowledgement timeout (milliseconds)
    pub response_timeout_ms: u64,
}

impl ReceiverSettings {
    /// Defaults for the position receiver.
    #[must_use]
    pub fn position_defaults() -> Self {
        Self {
            serial: SerialConfig::new("/dev/ttyACM0", 38_400),
            baud_candidates: vec![38_400, 115_200, 230_400],
            operating_baud: 230_400,
            settle_ms: 500,
            response_timeout_ms: 1100,
        }
    }

    /// Defaults for the heading receiver.
    #[must_use]
    pub fn heading_defaults() -> Self {
        Self {
            serial: SerialConfig::new("/dev/ttyACM1", 460_800),
            baud_candidates: vec![460_800, 230_400, 115_200, 38_400],
            operating_baud: 460_800,
            settle_ms: 200,
            response_timeout_ms: 1100,
        }
    }

    /// Channel configuration derived from these settings.
    #[must_use]
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            negotiation: NegotiatorConfig {
                candidates: self.baud_candidates.clone(),
                target: self.operating_baud,
                settle: Duration::from_millis(self.settle_ms),
                handshake_timeout: Duration::from_millis(self.response_timeout_ms),
                poll_interval: Duration::from_millis(10),
            },
            ack_timeout: Duration::from_millis(self.response_timeout_ms),
        }
    }
}

/// Network endpoints and relay buffers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Telemetry destination (`host:port`, may be a broadcast address)
    pub target: String,
    /// Correction listener bind address (`host:port`)
    pub listen: String,
    /// Relay framing buffer capacity in bytes
    pub relay_capacity: usize,
    /// Largest burst taken from a serial line per read
    pub read_chunk: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            target: "192.168.5.255:9999".to_string(),
            listen: "0.0.0.0:2233".to_string(),
            relay_capacity: frame::DEFAULT_CAPACITY,
            read_chunk: 5 * 1024,
        }
    }
}

/// Relay loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Idle sleep between polling passes (milliseconds)
    pub tick_ms: u64,
    /// Reconnect policy for downed channels
    pub reconnect: ReconnectSettings,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            tick_ms: 2,
            reconnect: ReconnectSettings::default(),
        }
    }
}

/// Reconnect settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSettings {
    /// Retry downed channels while running
    pub enabled: bool,
    /// Delay between retry passes (seconds)
    pub delay_secs: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_secs: 10,
        }
    }
}
