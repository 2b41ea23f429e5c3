//! UBX binary protocol support
//!
//! The receivers speak u-blox UBX alongside NMEA on the same wire. This
//! module covers the slice of UBX the bridge needs: building configuration
//! and poll frames, parsing inbound frames out of a mixed byte stream, and
//! decoding the NAV-RELPOSNED heading solution.
//!
//! Frame layout: `B5 62 <class> <id> <len lo> <len hi> <payload> <ck_a>
//! <ck_b>`, with a two-byte Fletcher checksum computed over everything
//! between the sync bytes and the checksum itself.

use bytes::{BufMut, Bytes, BytesMut};

/// First sync byte of every UBX frame.
pub const SYNC1: u8 = 0xB5;
/// Second sync byte of every UBX frame.
pub const SYNC2: u8 = 0x62;

/// Payload length of a version 1 NAV-RELPOSNED message.
pub const RELPOSNED_LEN: usize = 64;

const MAX_PAYLOAD: usize = 1024;

/// UBX message classes and ids used by the bridge.
pub mod msg {
    /// ACK-ACK, configuration accepted.
    pub const ACK_ACK: (u8, u8) = (0x05, 0x01);
    /// ACK-NAK, configuration rejected.
    pub const ACK_NAK: (u8, u8) = (0x05, 0x00);
    /// CFG-PRT, port protocol and baud configuration.
    pub const CFG_PRT: (u8, u8) = (0x06, 0x00);
    /// CFG-MSG, per-message output rate.
    pub const CFG_MSG: (u8, u8) = (0x06, 0x01);
    /// CFG-RATE, navigation measurement cadence.
    pub const CFG_RATE: (u8, u8) = (0x06, 0x08);
    /// MON-VER, version poll used as a liveness probe.
    pub const MON_VER: (u8, u8) = (0x0A, 0x04);
    /// NAV-RELPOSNED, relative position and heading solution.
    pub const NAV_RELPOSNED: (u8, u8) = (0x01, 0x3C);
}

/// Ids under the standard NMEA output class, for CFG-MSG rate control.
pub mod nmea_msg {
    /// The NMEA standard message class.
    pub const CLASS: u8 = 0xF0;
    /// Fix data.
    pub const GGA: u8 = 0x00;
    /// Geographic position.
    pub const GLL: u8 = 0x01;
    /// Active satellites and dilution of precision.
    pub const GSA: u8 = 0x02;
    /// Satellites in view.
    pub const GSV: u8 = 0x03;
    /// Recommended minimum fix data.
    pub const RMC: u8 = 0x04;
    /// Course and speed over ground.
    pub const VTG: u8 = 0x05;
    /// Pseudorange error statistics.
    pub const GST: u8 = 0x07;
}

/// Fletcher checksum over `body` (class, id, length and payload bytes).
#[must_use]
pub fn checksum(body: &[u8]) -> (u8, u8) {
    let mut ck_a = 0u8;
    let mut ck_b = 0u8;
    for &byte in body {
        ck_a = ck_a.wrapping_add(byte);
        ck_b = ck_b.wrapping_add(ck_a);
    }
    (ck_a, ck_b)
}

/// Assemble a complete frame around `payload`.
///
/// # Panics
///
/// Panics if `payload` does not fit the 16-bit length field.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn frame(class: u8, id: u8, payload: &[u8]) -> Bytes {
    assert!(payload.len() <= usize::from(u16::MAX));
    let mut out = BytesMut::with_capacity(payload.len() + 8);
    out.put_u8(SYNC1);
    out.put_u8(SYNC2);
    out.put_u8(class);
    out.put_u8(id);
    out.put_u16_le(payload.len() as u16);
    out.put_slice(payload);
    let (ck_a, ck_b) = checksum(&out[2..]);
    out.put_u8(ck_a);
    out.put_u8(ck_b);
    out.freeze()
}

/// Zero-length MON-VER poll. Receivers answer it at any configuration,
/// which makes it the probe of choice for baud detection.
#[must_use]
pub fn mon_ver_poll() -> Bytes {
    frame(msg::MON_VER.0, msg::MON_VER.1, &[])
}

/// CFG-PRT for UART1: 8N1 framing at `baud`, UBX+NMEA+RTCM3 inbound,
/// UBX+NMEA outbound.
#[must_use]
pub fn cfg_prt_uart1(baud: u32) -> Bytes {
    let mut payload = [0u8; 20];
    payload[0] = 1; // port id: UART1
    payload[4..8].copy_from_slice(&0x0000_08D0_u32.to_le_bytes()); // 8 data bits, no parity, 1 stop bit
    payload[8..12].copy_from_slice(&baud.to_le_bytes());
    payload[12..14].copy_from_slice(&0x0023_u16.to_le_bytes()); // in: UBX | NMEA | RTCM3
    payload[14..16].copy_from_slice(&0x0003_u16.to_le_bytes()); // out: UBX | NMEA
    frame(msg::CFG_PRT.0, msg::CFG_PRT.1, &payload)
}

/// CFG-RATE with a `measurement_ms` solution interval, one navigation
/// solution per measurement, aligned to GPS time.
#[must_use]
pub fn cfg_rate(measurement_ms: u16) -> Bytes {
    let mut payload = [0u8; 6];
    payload[0..2].copy_from_slice(&measurement_ms.to_le_bytes());
    payload[2..4].copy_from_slice(&1_u16.to_le_bytes());
    payload[4..6].copy_from_slice(&1_u16.to_le_bytes());
    frame(msg::CFG_RATE.0, msg::CFG_RATE.1, &payload)
}

/// CFG-MSG setting the output `rate` of one message on the current port.
#[must_use]
pub fn cfg_msg(class: u8, id: u8, rate: u8) -> Bytes {
    frame(msg::CFG_MSG.0, msg::CFG_MSG.1, &[class, id, rate])
}

/// A checksum-verified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UbxFrame {
    /// Message class.
    pub class: u8,
    /// Message id within the class.
    pub id: u8,
    /// Payload bytes.
    pub payload: Bytes,
}

impl UbxFrame {
    /// True when the frame carries the given message.
    #[must_use]
    pub fn is(&self, msg: (u8, u8)) -> bool {
        (self.class, self.id) == msg
    }

    /// True when the frame is an ACK-ACK naming `msg`.
    #[must_use]
    pub fn acknowledges(&self, msg: (u8, u8)) -> bool {
        self.is(msg::ACK_ACK) && self.payload.as_ref() == [msg.0, msg.1]
    }

    /// True when the frame is an ACK-NAK naming `msg`.
    #[must_use]
    pub fn rejects(&self, msg: (u8, u8)) -> bool {
        self.is(msg::ACK_NAK) && self.payload.as_ref() == [msg.0, msg.1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Sync1,
    Sync2,
    Class,
    Id,
    Len1,
    Len2,
    Payload,
    CkA,
    CkB,
}

/// Incremental UBX frame parser.
///
/// Feed it bytes one at a time; anything that is not a valid frame,
/// including interleaved NMEA text, is skipped while hunting for the next
/// sync sequence. Frames with a bad checksum are dropped and counted.
pub struct UbxParser {
    state: ParseState,
    class: u8,
    id: u8,
    len: usize,
    payload: Vec<u8>,
    ck_a: u8,
    run_a: u8,
    run_b: u8,
    bad_checksums: u64,
}

impl UbxParser {
    /// Create a parser hunting for the first sync byte.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ParseState::Sync1,
            class: 0,
            id: 0,
            len: 0,
            payload: Vec::new(),
            ck_a: 0,
            run_a: 0,
            run_b: 0,
            bad_checksums: 0,
        }
    }

    /// Frames dropped for checksum mismatch since creation.
    #[must_use]
    pub fn bad_checksums(&self) -> u64 {
        self.bad_checksums
    }

    /// Consume one byte, returning a frame when it completes one.
    pub fn consume(&mut self, byte: u8) -> Option<UbxFrame> {
        match self.state {
            ParseState::Sync1 => {
                if byte == SYNC1 {
                    self.state = ParseState::Sync2;
                }
            }
            ParseState::Sync2 => {
                if byte == SYNC2 {
                    self.run_a = 0;
                    self.run_b = 0;
                    self.payload.clear();
                    self.state = ParseState::Class;
                } else if byte != SYNC1 {
                    self.state = ParseState::Sync1;
                }
            }
            ParseState::Class => {
                self.accumulate(byte);
                self.class = byte;
                self.state = ParseState::Id;
            }
            ParseState::Id => {
                self.accumulate(byte);
                self.id = byte;
                self.state = ParseState::Len1;
            }
            ParseState::Len1 => {
                self.accumulate(byte);
                self.len = usize::from(byte);
                self.state = ParseState::Len2;
            }
            ParseState::Len2 => {
                self.accumulate(byte);
                self.len |= usize::from(byte) << 8;
                if self.len > MAX_PAYLOAD {
                    // Corrupt header; hunt for the next sync instead of
                    // swallowing kilobytes of stream.
                    self.state = ParseState::Sync1;
                } else if self.len == 0 {
                    self.state = ParseState::CkA;
                } else {
                    self.state = ParseState::Payload;
                }
            }
            ParseState::Payload => {
                self.accumulate(byte);
                self.payload.push(byte);
                if self.payload.len() == self.len {
                    self.state = ParseState::CkA;
                }
            }
            ParseState::CkA => {
                self.ck_a = byte;
                self.state = ParseState::CkB;
            }
            ParseState::CkB => {
                self.state = ParseState::Sync1;
                if (self.ck_a, byte) == (self.run_a, self.run_b) {
                    return Some(UbxFrame {
                        class: self.class,
                        id: self.id,
                        payload: Bytes::from(std::mem::take(&mut self.payload)),
                    });
                }
                self.bad_checksums += 1;
            }
        }
        None
    }

    fn accumulate(&mut self, byte: u8) {
        self.run_a = self.run_a.wrapping_add(byte);
        self.run_b = self.run_b.wrapping_add(self.run_a);
    }
}

impl Default for UbxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Heading-bearing fields of a NAV-RELPOSNED solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativePositionPacket {
    /// Heading of the baseline vector, degrees scaled by 1e-5.
    pub heading_e5: i32,
    /// Position solution is within operational limits.
    pub fix_ok: bool,
    /// Differential corrections were applied.
    pub diff_soln: bool,
    /// The reported heading is usable.
    pub heading_valid: bool,
}

/// Decode the fields of interest from a NAV-RELPOSNED payload.
///
/// Returns `None` for truncated payloads or unknown message versions.
#[must_use]
pub fn decode_relposned(payload: &[u8]) -> Option<RelativePositionPacket> {
    if payload.len() < RELPOSNED_LEN || payload[0] != 1 {
        return None;
    }
    let heading_e5 = i32::from_le_bytes(payload[24..28].try_into().ok()?);
    let flags = u32::from_le_bytes(payload[60..64].try_into().ok()?);
    Some(RelativePositionPacket {
        heading_e5,
        fix_ok: flags & 0x0001 != 0,
        diff_soln: flags & 0x0002 != 0,
        heading_valid: flags & 0x0100 != 0,
    })
}
