//! Serial links to the receivers

use super::TransportError;
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Serial port parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SerialParity {
    /// No parity
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

/// Serial port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g., /dev/ttyACM0, COM3)
    pub port: String,
    /// Baud rate to open the port at
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
}

impl SerialConfig {
    /// Create a new serial configuration with default framing
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
        }
    }

    /// Set data bits
    #[must_use]
    pub fn data_bits(mut self, bits: u8) -> Self {
        self.data_bits = bits;
        self
    }

    /// Set stop bits
    #[must_use]
    pub fn stop_bits(mut self, bits: u8) -> Self {
        self.stop_bits = bits;
        self
    }

    /// Set parity
    #[must_use]
    pub fn parity(mut self, parity: SerialParity) -> Self {
        self.parity = parity;
        self
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("/dev/ttyACM0", 38400)
    }
}

/// Byte-level operations the bridge needs from a receiver link.
///
/// [`SerialLink`] is the hardware implementation; tests substitute
/// scripted fakes.
pub trait SerialLine: Send {
    /// Baud rate the link currently runs at.
    fn baud(&self) -> u32;

    /// Switch the link to a new baud rate, discarding buffered bytes.
    fn reconfigure(&mut self, baud: u32) -> Result<(), TransportError>;

    /// Read whatever is pending into `buf`, returning the byte count.
    /// Returns `Ok(0)` when nothing is waiting.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write all of `data` and flush it to the wire.
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;
}

/// An open serial connection to a receiver.
pub struct SerialLink {
    name: String,
    baud: u32,
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    /// Open the port described by `config`.
    pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
        let data_bits = match config.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        };

        let stop_bits = match config.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        };

        let parity = match config.parity {
            SerialParity::Odd => Parity::Odd,
            SerialParity::Even => Parity::Even,
            SerialParity::None => Parity::None,
        };

        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => {
                    TransportError::PortNotFound(config.port.clone())
                }
                serialport::ErrorKind::Io(io_kind) => match io_kind {
                    std::io::ErrorKind::PermissionDenied => {
                        TransportError::PermissionDenied(config.port.clone())
                    }
                    _ => TransportError::ConnectionFailed(e.to_string()),
                },
                _ => TransportError::ConnectionFailed(e.to_string()),
            })?;

        Ok(Self {
            name: config.port.clone(),
            baud: config.baud_rate,
            port,
        })
    }

    /// Port name this link was opened on.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SerialLine for SerialLink {
    fn baud(&self) -> u32 {
        self.baud
    }

    fn reconfigure(&mut self, baud: u32) -> Result<(), TransportError> {
        self.port
            .set_baud_rate(baud)
            .map_err(|e| TransportError::IoError(e.into()))?;
        // Bytes captured at the old rate are framing garbage at the new one.
        self.port
            .clear(ClearBuffer::All)
            .map_err(|e| TransportError::IoError(e.into()))?;
        self.baud = baud;
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let pending = self
            .port
            .bytes_to_read()
            .map_err(|e| TransportError::IoError(e.into()))?;
        if pending == 0 {
            return Ok(0);
        }

        let want = buf.len().min(pending as usize);
        match self.port.read(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                // Data drained between the query and the read
                Ok(0)
            }
            Err(e) => Err(TransportError::IoError(e)),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(data).map_err(TransportError::IoError)?;
        self.port.flush().map_err(TransportError::IoError)?;
        Ok(())
    }
}

/// List available serial ports
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    serialport::available_ports().map_err(|e| TransportError::IoError(e.into()))
}
