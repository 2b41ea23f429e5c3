//! Channel routing
//!
//! The router owns both receiver channels and moves everything between
//! them and the network. Position bytes are reframed into sentences and
//! relayed to the sink. Heading bytes are parsed as UBX and usable
//! NAV-RELPOSNED solutions leave as synthesized `$GNHDT` sentences on the
//! same sink. Correction datagrams flow the other way, into the position
//! receiver.

use tracing::{debug, error, trace, warn};

use super::frame::{self, Frame, FrameBuffer, FrameKind};
use super::heading::HeadingSynthesizer;
use super::receiver::ReceiverChannel;
use super::transport::TransportSink;
use super::ubx::{self, UbxParser};

/// Router tuning.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Relay framing buffer capacity in bytes.
    pub relay_capacity: usize,
    /// Largest burst taken from a serial line per read.
    pub read_chunk: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            relay_capacity: frame::DEFAULT_CAPACITY,
            read_chunk: 5 * 1024,
        }
    }
}

/// Counters describing router activity since startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouterStats {
    /// Position frames relayed to the sink.
    pub frames_relayed: u64,
    /// Bytes inside those frames.
    pub bytes_relayed: u64,
    /// Frames flushed early because the relay buffer filled.
    pub forced_flushes: u64,
    /// Synthesized heading sentences sent.
    pub headings_sent: u64,
    /// Heading packets skipped for an untrustworthy solution.
    pub headings_skipped: u64,
    /// UBX frames dropped for bad checksums.
    pub bad_ubx_frames: u64,
    /// Frames the sink refused or could not deliver.
    pub send_failures: u64,
    /// Correction datagrams written to the position receiver.
    pub corrections_forwarded: u64,
    /// Correction datagrams dropped.
    pub corrections_rejected: u64,
}

/// Moves data between the two receiver channels and the network.
pub struct ChannelRouter {
    position: ReceiverChannel,
    heading: ReceiverChannel,
    framer: FrameBuffer,
    ubx_parser: UbxParser,
    synthesizer: HeadingSynthesizer,
    sink: Option<Box<dyn TransportSink>>,
    stats: RouterStats,
    scratch: Vec<u8>,
}

impl ChannelRouter {
    /// Build a router over the two channels.
    pub fn new(
        position: ReceiverChannel,
        heading: ReceiverChannel,
        config: &RouterConfig,
    ) -> Self {
        Self {
            position,
            heading,
            framer: FrameBuffer::with_capacity(config.relay_capacity),
            ubx_parser: UbxParser::new(),
            synthesizer: HeadingSynthesizer::new(),
            sink: None,
            stats: RouterStats::default(),
            scratch: vec![0u8; config.read_chunk],
        }
    }

    /// Attach the outbound sink.
    pub fn set_sink(&mut self, sink: Box<dyn TransportSink>) {
        self.sink = Some(sink);
    }

    /// The position channel.
    #[must_use]
    pub fn position_channel(&self) -> &ReceiverChannel {
        &self.position
    }

    /// The position channel, mutably.
    pub fn position_channel_mut(&mut self) -> &mut ReceiverChannel {
        &mut self.position
    }

    /// The heading channel.
    #[must_use]
    pub fn heading_channel(&self) -> &ReceiverChannel {
        &self.heading
    }

    /// The heading channel, mutably.
    pub fn heading_channel_mut(&mut self) -> &mut ReceiverChannel {
        &mut self.heading
    }

    /// Drain the position receiver, relaying every released frame.
    pub fn poll_position(&mut self) {
        if !self.position.is_connected() {
            return;
        }
        loop {
            let n = match self.position.read_available(&mut self.scratch) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    error!("position read failed: {}", e);
                    break;
                }
            };
            for i in 0..n {
                let byte = self.scratch[i];
                for frame in self.framer.consume(byte) {
                    self.relay_frame(&frame);
                }
            }
        }
    }

    /// Drain the heading receiver, synthesizing sentences from solutions.
    pub fn poll_heading(&mut self) {
        if !self.heading.is_connected() {
            return;
        }
        loop {
            let n = match self.heading.read_available(&mut self.scratch) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    error!("heading read failed: {}", e);
                    break;
                }
            };
            for i in 0..n {
                let byte = self.scratch[i];
                if let Some(frame) = self.ubx_parser.consume(byte) {
                    self.handle_ubx(&frame);
                }
            }
        }
    }

    /// Forward one correction datagram to the position receiver.
    ///
    /// Returns `true` when the datagram reached the wire.
    pub fn route_correction(&mut self, data: &[u8]) -> bool {
        if !self.position.is_connected() {
            self.stats.corrections_rejected += 1;
            debug!(
                "dropping {} byte correction: position channel down",
                data.len()
            );
            return false;
        }
        match self.position.write(data) {
            Ok(()) => {
                self.stats.corrections_forwarded += 1;
                true
            }
            Err(e) => {
                self.stats.corrections_rejected += 1;
                error!("correction write failed: {}", e);
                false
            }
        }
    }

    /// Snapshot of router counters.
    #[must_use]
    pub fn stats(&self) -> RouterStats {
        let mut stats = self.stats;
        stats.headings_skipped = self.synthesizer.skipped();
        stats.bad_ubx_frames = self.ubx_parser.bad_checksums();
        stats
    }

    fn relay_frame(&mut self, frame: &Frame) {
        if frame.kind == FrameKind::Forced {
            self.stats.forced_flushes += 1;
            warn!(
                "relay buffer full, flushing {} unterminated bytes",
                frame.bytes.len()
            );
        }
        if self.send(&frame.bytes) {
            self.stats.frames_relayed += 1;
            self.stats.bytes_relayed += frame.bytes.len() as u64;
        }
    }

    fn handle_ubx(&mut self, frame: &ubx::UbxFrame) {
        if !frame.is(ubx::msg::NAV_RELPOSNED) {
            trace!("ignoring UBX {:02X}-{:02X}", frame.class, frame.id);
            return;
        }
        let packet = match ubx::decode_relposned(&frame.payload) {
            Some(packet) => packet,
            None => {
                debug!(
                    "undecodable NAV-RELPOSNED payload: {}",
                    hex::encode(&frame.payload)
                );
                return;
            }
        };
        match self.synthesizer.on_packet(&packet) {
            Ok(Some(sentence)) => {
                if self.send(&sentence) {
                    self.stats.headings_sent += 1;
                }
            }
            Ok(None) => {}
            Err(e) => error!("heading synthesis failed: {}", e),
        }
    }

    fn send(&mut self, payload: &[u8]) -> bool {
        let ok = match self.sink.as_mut() {
            Some(sink) => sink.send(payload),
            None => false,
        };
        if !ok {
            self.stats.send_failures += 1;
            error!(
                "dropping {} byte frame: transport sink unavailable",
                payload.len()
            );
        }
        ok
    }
}
