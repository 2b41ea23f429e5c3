//! Relay service
//!
//! Owns the background thread the router runs on: opens the serial and
//! UDP endpoints, brings both channels up, then pumps telemetry out and
//! corrections in until stopped. Downed channels are retried on a timer
//! when reconnect is enabled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info};

use crate::config::AppConfig;

use super::receiver::{ChannelRole, ChannelState, ReceiverChannel};
use super::router::{ChannelRouter, RouterStats};
use super::transport::{CorrectionSocket, SerialLink, TransportError, UdpSink, MAX_DATAGRAM};

const REPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Service state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Not started.
    Stopped,
    /// Thread launched, endpoints not yet open.
    Starting,
    /// Relaying.
    Running,
    /// Startup failed and the thread has exited.
    Error,
}

/// The relay, run on a background thread.
pub struct RelayService {
    config: AppConfig,
    state: Arc<Mutex<ServiceState>>,
    stats: Arc<Mutex<RouterStats>>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl RelayService {
    /// Create a stopped service around `config`.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(ServiceState::Stopped)),
            stats: Arc::new(Mutex::new(RouterStats::default())),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Launch the relay thread.
    pub fn start(&mut self) -> Result<(), String> {
        if self.running.load(Ordering::Relaxed) {
            return Err("Relay already running".to_string());
        }

        *self.state.lock() = ServiceState::Starting;
        self.running.store(true, Ordering::Relaxed);

        let config = self.config.clone();
        let running = self.running.clone();
        let state = self.state.clone();
        let stats = self.stats.clone();

        let handle = thread::spawn(move || {
            run(&config, &running, &state, &stats);
        });

        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the relay and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        *self.state.lock() = ServiceState::Stopped;
    }

    /// Current state
    pub fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    /// Latest router counters
    pub fn stats(&self) -> RouterStats {
        *self.stats.lock()
    }

    /// Is the relay supposed to be running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Drop for RelayService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    config: &AppConfig,
    running: &Arc<AtomicBool>,
    state: &Arc<Mutex<ServiceState>>,
    stats: &Arc<Mutex<RouterStats>>,
) {
    let mut router = match build_router(config) {
        Ok(router) => router,
        Err(e) => {
            *state.lock() = ServiceState::Error;
            error!("could not open receiver ports: {}", e);
            return;
        }
    };

    let sink = match UdpSink::new(&config.transport.target) {
        Ok(sink) => sink,
        Err(e) => {
            *state.lock() = ServiceState::Error;
            error!("could not create telemetry sink: {}", e);
            return;
        }
    };
    info!("relaying telemetry to {}", sink.target());
    router.set_sink(Box::new(sink));

    let corrections = match CorrectionSocket::bind(&config.transport.listen) {
        Ok(socket) => socket,
        Err(e) => {
            *state.lock() = ServiceState::Error;
            error!("could not bind correction listener: {}", e);
            return;
        }
    };
    info!("listening for corrections on {}", config.transport.listen);

    *state.lock() = ServiceState::Running;

    // A dead receiver leaves its channel down here; the reconnect policy
    // retries it later when enabled.
    let _ = router.position_channel_mut().init();
    let _ = router.heading_channel_mut().init();

    let tick = Duration::from_millis(config.service.tick_ms);
    let reconnect_delay = Duration::from_secs(config.service.reconnect.delay_secs);
    let mut last_reconnect = Instant::now();
    let mut last_report = Instant::now();
    let mut corr_buf = [0u8; MAX_DATAGRAM];

    while running.load(Ordering::Relaxed) {
        router.poll_position();
        router.poll_heading();

        loop {
            match corrections.recv(&mut corr_buf) {
                Ok(Some(n)) => {
                    router.route_correction(&corr_buf[..n]);
                }
                Ok(None) => break,
                Err(e) => {
                    error!("correction socket failed: {}", e);
                    break;
                }
            }
        }

        if config.service.reconnect.enabled && last_reconnect.elapsed() >= reconnect_delay {
            last_reconnect = Instant::now();
            reconnect_downed(&mut router);
        }

        *stats.lock() = router.stats();
        if last_report.elapsed() >= REPORT_INTERVAL {
            last_report = Instant::now();
            let snapshot = router.stats();
            info!(
                "relayed {} frames ({} bytes), {} headings, {} corrections forwarded",
                snapshot.frames_relayed,
                snapshot.bytes_relayed,
                snapshot.headings_sent,
                snapshot.corrections_forwarded
            );
        }

        thread::sleep(tick);
    }
}

fn build_router(config: &AppConfig) -> Result<ChannelRouter, TransportError> {
    let position_link = SerialLink::open(&config.position.serial)?;
    info!("position receiver on {}", position_link.name());
    let position = ReceiverChannel::new(
        ChannelRole::Position,
        config.position.channel_config(),
        Box::new(position_link),
    );

    let heading_link = SerialLink::open(&config.heading.serial)?;
    info!("heading receiver on {}", heading_link.name());
    let heading = ReceiverChannel::new(
        ChannelRole::Heading,
        config.heading.channel_config(),
        Box::new(heading_link),
    );

    Ok(ChannelRouter::new(position, heading, &config.router_config()))
}

fn reconnect_downed(router: &mut ChannelRouter) {
    if router.position_channel().state() == ChannelState::Disconnected {
        info!("retrying position channel");
        let _ = router.position_channel_mut().init();
    }
    if router.heading_channel().state() == ChannelState::Disconnected {
        info!("retrying heading channel");
        let _ = router.heading_channel_mut().init();
    }
}
