//! Test doubles shared across the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::negotiate::NegotiatorConfig;
use super::receiver::{ChannelConfig, ChannelRole, ReceiverChannel};
use super::transport::{SerialLine, TransportError};
use super::ubx;

/// Flags word for a fully trustworthy NAV-RELPOSNED solution.
pub(crate) const RELPOSNED_VALID: u32 = 0x0103;

struct FakeWire {
    baud: u32,
    rx: VecDeque<u8>,
    writes: Vec<(u32, Vec<u8>)>,
    replies: HashMap<u32, VecDeque<Vec<u8>>>,
    reconfigures: Vec<u32>,
    fail_writes: bool,
}

/// Scripted serial line: records writes and plays back canned replies.
///
/// Replies are queued per baud rate; each write at that rate releases the
/// next queued reply into the read buffer, mimicking a receiver that only
/// answers when spoken to at the rate it listens on. Clones share the
/// underlying wire, so a test can keep a handle while a channel owns the
/// line.
#[derive(Clone)]
pub(crate) struct FakeLine {
    wire: Arc<Mutex<FakeWire>>,
}

impl FakeLine {
    pub(crate) fn new(baud: u32) -> Self {
        Self {
            wire: Arc::new(Mutex::new(FakeWire {
                baud,
                rx: VecDeque::new(),
                writes: Vec::new(),
                replies: HashMap::new(),
                reconfigures: Vec::new(),
                fail_writes: false,
            })),
        }
    }

    /// Queue a reply released by the next write at `baud`.
    pub(crate) fn reply_at(&self, baud: u32, reply: Vec<u8>) {
        self.wire
            .lock()
            .replies
            .entry(baud)
            .or_default()
            .push_back(reply);
    }

    /// Make receiver bytes immediately readable.
    pub(crate) fn push_rx(&self, data: &[u8]) {
        self.wire.lock().rx.extend(data.iter().copied());
    }

    pub(crate) fn writes(&self) -> Vec<(u32, Vec<u8>)> {
        self.wire.lock().writes.clone()
    }

    pub(crate) fn reconfigures(&self) -> Vec<u32> {
        self.wire.lock().reconfigures.clone()
    }

    pub(crate) fn current_baud(&self) -> u32 {
        self.wire.lock().baud
    }

    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.wire.lock().fail_writes = fail;
    }
}

impl SerialLine for FakeLine {
    fn baud(&self) -> u32 {
        self.wire.lock().baud
    }

    fn reconfigure(&mut self, baud: u32) -> Result<(), TransportError> {
        let mut wire = self.wire.lock();
        wire.baud = baud;
        wire.rx.clear();
        wire.reconfigures.push(baud);
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut wire = self.wire.lock();
        let mut n = 0;
        while n < buf.len() {
            match wire.rx.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut wire = self.wire.lock();
        if wire.fail_writes {
            return Err(TransportError::ConnectionFailed(
                "scripted write failure".to_string(),
            ));
        }
        let baud = wire.baud;
        wire.writes.push((baud, data.to_vec()));
        let reply = wire.replies.get_mut(&baud).and_then(VecDeque::pop_front);
        if let Some(reply) = reply {
            wire.rx.extend(reply);
        }
        Ok(())
    }
}

/// A MON-VER answer frame with a blank version block.
pub(crate) fn mon_ver_reply() -> Vec<u8> {
    ubx::frame(ubx::msg::MON_VER.0, ubx::msg::MON_VER.1, &[0u8; 40]).to_vec()
}

/// ACK-ACK naming `msg`.
pub(crate) fn ack_for(msg: (u8, u8)) -> Vec<u8> {
    ubx::frame(ubx::msg::ACK_ACK.0, ubx::msg::ACK_ACK.1, &[msg.0, msg.1]).to_vec()
}

/// ACK-NAK naming `msg`.
pub(crate) fn nak_for(msg: (u8, u8)) -> Vec<u8> {
    ubx::frame(ubx::msg::ACK_NAK.0, ubx::msg::ACK_NAK.1, &[msg.0, msg.1]).to_vec()
}

/// Negotiator config with every wait zeroed so tests never sleep.
pub(crate) fn instant_config(candidates: Vec<u32>, target: u32) -> NegotiatorConfig {
    NegotiatorConfig {
        candidates,
        target,
        settle: Duration::ZERO,
        handshake_timeout: Duration::ZERO,
        poll_interval: Duration::ZERO,
    }
}

/// Channel config with every wait zeroed.
pub(crate) fn instant_channel_config(candidates: Vec<u32>, target: u32) -> ChannelConfig {
    ChannelConfig {
        negotiation: instant_config(candidates, target),
        ack_timeout: Duration::ZERO,
    }
}

/// Bring a channel up over `line` at its current rate.
///
/// Only the probe is answered; profile messages time out instantly, which
/// the channel tolerates.
pub(crate) fn connected_channel(role: ChannelRole, line: &FakeLine) -> ReceiverChannel {
    let baud = line.current_baud();
    line.reply_at(baud, mon_ver_reply());
    let mut channel = ReceiverChannel::new(
        role,
        instant_channel_config(vec![baud], baud),
        Box::new(line.clone()),
    );
    channel.init().expect("channel init failed");
    channel
}

/// Full NAV-RELPOSNED wire frame with the given heading and flags.
pub(crate) fn relposned_frame(heading_e5: i32, flags: u32) -> Vec<u8> {
    let mut payload = vec![0u8; ubx::RELPOSNED_LEN];
    payload[0] = 1;
    payload[24..28].copy_from_slice(&heading_e5.to_le_bytes());
    payload[60..64].copy_from_slice(&flags.to_le_bytes());
    ubx::frame(
        ubx::msg::NAV_RELPOSNED.0,
        ubx::msg::NAV_RELPOSNED.1,
        &payload,
    )
    .to_vec()
}
