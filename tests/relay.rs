use std::collections::VecDeque;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use navbridge_core::core::ubx;
use navbridge_core::{
    ChannelConfig, ChannelRole, ChannelRouter, NegotiatorConfig, ReceiverChannel, RouterConfig,
    SerialLine, TransportError, TransportSink, UdpSink,
};

struct Inner {
    baud: u32,
    rx: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    replies: VecDeque<Vec<u8>>,
}

/// Scripted serial line: each write releases the next queued reply.
#[derive(Clone)]
struct ScriptedLine {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedLine {
    fn new(baud: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                baud,
                rx: VecDeque::new(),
                writes: Vec::new(),
                replies: VecDeque::new(),
            })),
        }
    }

    fn queue_reply(&self, reply: Vec<u8>) {
        self.inner.lock().replies.push_back(reply);
    }

    fn push_rx(&self, data: &[u8]) {
        self.inner.lock().rx.extend(data.iter().copied());
    }

    fn writes(&self) -> Vec<Vec<u8>> {
        self.inner.lock().writes.clone()
    }
}

impl SerialLine for ScriptedLine {
    fn baud(&self) -> u32 {
        self.inner.lock().baud
    }

    fn reconfigure(&mut self, baud: u32) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        inner.baud = baud;
        inner.rx.clear();
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut inner = self.inner.lock();
        let mut n = 0;
        while n < buf.len() {
            match inner.rx.pop_front() {
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
        let mut inner = self.inner.lock();
        inner.writes.push(data.to_vec());
        if let Some(reply) = inner.replies.pop_front() {
            inner.rx.extend(reply);
        }
        Ok(())
    }
}

fn instant_channel_config(baud: u32) -> ChannelConfig {
    ChannelConfig {
        negotiation: NegotiatorConfig {
            candidates: vec![baud],
            target: baud,
            settle: Duration::ZERO,
            handshake_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
        },
        ack_timeout: Duration::ZERO,
    }
}

fn connected_channel(role: ChannelRole, line: &ScriptedLine) -> ReceiverChannel {
    let baud = line.baud();
    line.queue_reply(ubx::frame(ubx::msg::MON_VER.0, ubx::msg::MON_VER.1, &[0u8; 40]).to_vec());
    let mut channel =
        ReceiverChannel::new(role, instant_channel_config(baud), Box::new(line.clone()));
    channel.init().expect("channel init failed");
    channel
}

fn relposned_frame(heading_e5: i32, flags: u32) -> Vec<u8> {
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

fn router_over(position_line: &ScriptedLine, heading_line: &ScriptedLine) -> ChannelRouter {
    let position = connected_channel(ChannelRole::Position, position_line);
    let heading = connected_channel(ChannelRole::Heading, heading_line);
    ChannelRouter::new(position, heading, &RouterConfig::default())
}

fn recording_sink(seen: &Arc<Mutex<Vec<Vec<u8>>>>) -> Box<dyn TransportSink> {
    let seen = Arc::clone(seen);
    Box::new(move |frame: &[u8]| {
        seen.lock().push(frame.to_vec());
        true
    })
}

#[test]
fn position_telemetry_relays_in_order() {
    let position_line = ScriptedLine::new(230_400);
    let heading_line = ScriptedLine::new(460_800);
    let mut router = router_over(&position_line, &heading_line);

    let seen = Arc::new(Mutex::new(Vec::new()));
    router.set_sink(recording_sink(&seen));

    // Two complete sentences and the start of a third.
    position_line.push_rx(b"$GPGGA*56\r\n$GNHDT,0.000,T*2B\r\n$GPRMC,12");
    router.poll_position();

    {
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], b"$GPGGA*56\r\n");
        assert_eq!(seen[1], b"$GNHDT,0.000,T*2B\r\n");
    }

    // The partial sentence is held until its terminator arrives.
    position_line.push_rx(b"3519,A*07\r\n");
    router.poll_position();

    let seen = seen.lock();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[2], b"$GPRMC,123519,A*07\r\n");
    assert_eq!(router.stats().frames_relayed, 3);
}

#[test]
fn heading_solutions_synthesize_sentences() {
    let position_line = ScriptedLine::new(230_400);
    let heading_line = ScriptedLine::new(460_800);
    let mut router = router_over(&position_line, &heading_line);

    let seen = Arc::new(Mutex::new(Vec::new()));
    router.set_sink(recording_sink(&seen));

    heading_line.push_rx(&relposned_frame(9_000_000, 0x0103));
    heading_line.push_rx(&relposned_frame(4_500_000, 0x0002));
    router.poll_heading();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], b"$GNHDT,90.000,T*12\r\n");

    let stats = router.stats();
    assert_eq!(stats.headings_sent, 1);
    assert_eq!(stats.headings_skipped, 1);
}

#[test]
fn corrections_flow_back_to_position_receiver() {
    let position_line = ScriptedLine::new(230_400);
    let heading_line = ScriptedLine::new(460_800);
    let mut router = router_over(&position_line, &heading_line);

    assert!(router.route_correction(b"rtcm-correction"));
    assert_eq!(
        position_line.writes().last(),
        Some(&b"rtcm-correction".to_vec())
    );
    assert_eq!(router.stats().corrections_forwarded, 1);
}

#[test]
fn downed_channels_drop_everything() {
    let position_line = ScriptedLine::new(230_400);
    let heading_line = ScriptedLine::new(460_800);
    let position = ReceiverChannel::new(
        ChannelRole::Position,
        instant_channel_config(230_400),
        Box::new(position_line.clone()),
    );
    let heading = ReceiverChannel::new(
        ChannelRole::Heading,
        instant_channel_config(460_800),
        Box::new(heading_line.clone()),
    );
    let mut router = ChannelRouter::new(position, heading, &RouterConfig::default());

    let seen = Arc::new(Mutex::new(Vec::new()));
    router.set_sink(recording_sink(&seen));

    position_line.push_rx(b"$GPGGA*56\r\n");
    heading_line.push_rx(&relposned_frame(0, 0x0103));
    router.poll_position();
    router.poll_heading();

    assert!(seen.lock().is_empty());
    assert!(!router.route_correction(b"rtcm"));
    assert_eq!(router.stats().corrections_rejected, 1);
}

#[test]
fn telemetry_reaches_udp_consumer() {
    let receiver = UdpSocket::bind("127.0.0.1:0").expect("bind receiver");
    receiver
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("set timeout");
    let target = receiver.local_addr().expect("local addr");

    let position_line = ScriptedLine::new(230_400);
    let heading_line = ScriptedLine::new(460_800);
    let mut router = router_over(&position_line, &heading_line);
    router.set_sink(Box::new(
        UdpSink::new(&target.to_string()).expect("udp sink"),
    ));

    position_line.push_rx(b"$GPGGA*56\r\n");
    router.poll_position();

    let mut buf = [0u8; 128];
    let (n, _) = receiver.recv_from(&mut buf).expect("datagram");
    assert_eq!(&buf[..n], b"$GPGGA*56\r\n");
}
