//! Baud rate auto-negotiation
//!
//! A receiver keeps whatever rate it was last configured for, so the bridge
//! cannot assume anything at startup. Negotiation walks a candidate list,
//! polling MON-VER at each rate until the receiver answers, then moves the
//! link to the preferred operating rate with CFG-PRT and follows it there.

use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::transport::{SerialLine, TransportError};
use super::ubx;

/// Baud negotiation parameters for one receiver channel.
#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    /// Rates to probe, in order.
    pub candidates: Vec<u32>,
    /// Rate to move the receiver to once found.
    pub target: u32,
    /// Settle delay after each local rate switch.
    pub settle: Duration,
    /// How long to wait for a probe answer.
    pub handshake_timeout: Duration,
    /// Poll interval while waiting for serial data.
    pub poll_interval: Duration,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            candidates: vec![38_400, 115_200, 230_400],
            target: 230_400,
            settle: Duration::from_millis(500),
            handshake_timeout: Duration::from_millis(1100),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Outcome of a successful negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    /// Rate the link runs at now.
    pub baud: u32,
    /// Candidate rates probed before the receiver answered.
    pub attempts: u32,
}

/// Negotiation errors
#[derive(Error, Debug)]
pub enum NegotiationError {
    /// The receiver never answered the version poll at any candidate rate.
    #[error("No response from receiver after {attempts} probe attempts")]
    NoResponse {
        /// Candidate rates tried.
        attempts: u32,
    },

    /// The serial link failed mid-negotiation.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Find the receiver's current rate and move it to the configured target.
///
/// Probes each candidate in order. When the receiver answers at the target
/// rate already, negotiation is done. Otherwise the receiver is asked to
/// switch via CFG-PRT; if it cannot be verified at the target afterwards,
/// the link falls back to the rate that worked and reports that instead of
/// failing, so a stubborn receiver still gets bridged.
pub fn negotiate(
    line: &mut dyn SerialLine,
    config: &NegotiatorConfig,
) -> Result<Negotiated, NegotiationError> {
    let mut attempts = 0u32;
    let mut probed = None;

    for &candidate in &config.candidates {
        attempts += 1;
        debug!("probing for receiver at {} baud", candidate);
        if let Err(e) = line.reconfigure(candidate) {
            warn!("could not switch to {} baud: {}", candidate, e);
            continue;
        }
        thread::sleep(config.settle);
        if probe(line, config)? {
            probed = Some(candidate);
            break;
        }
    }

    let probed = match probed {
        Some(baud) => baud,
        None => return Err(NegotiationError::NoResponse { attempts }),
    };
    info!("receiver answered at {} baud", probed);

    if probed == config.target {
        return Ok(Negotiated {
            baud: probed,
            attempts,
        });
    }

    match pin_rate(line, config) {
        Ok(()) => {
            info!("receiver moved to {} baud", config.target);
            Ok(Negotiated {
                baud: config.target,
                attempts,
            })
        }
        Err(e) => {
            warn!(
                "failed to pin receiver to {} baud, staying at {}: {}",
                config.target, probed, e
            );
            let _ = line.reconfigure(probed);
            Ok(Negotiated {
                baud: probed,
                attempts,
            })
        }
    }
}

/// Ask the receiver to move to the target rate, then verify it answered.
fn pin_rate(line: &mut dyn SerialLine, config: &NegotiatorConfig) -> Result<(), TransportError> {
    line.write_all(&ubx::cfg_prt_uart1(config.target))?;
    thread::sleep(config.settle);
    line.reconfigure(config.target)?;
    thread::sleep(config.settle);

    if probe(line, config)? {
        Ok(())
    } else {
        Err(TransportError::ConnectionFailed(format!(
            "no response at {} baud",
            config.target
        )))
    }
}

/// Poll MON-VER and watch for any answer before the handshake deadline.
fn probe(line: &mut dyn SerialLine, config: &NegotiatorConfig) -> Result<bool, TransportError> {
    line.write_all(&ubx::mon_ver_poll())?;

    let mut parser = ubx::UbxParser::new();
    let mut buf = [0u8; 512];
    let deadline = Instant::now() + config.handshake_timeout;

    loop {
        let n = line.read_available(&mut buf)?;
        for &byte in &buf[..n] {
            if let Some(frame) = parser.consume(byte) {
                if frame.is(ubx::msg::MON_VER) {
                    return Ok(true);
                }
            }
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        thread::sleep(config.poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testutil::{instant_config, mon_ver_reply, FakeLine};

    #[test]
    fn test_finds_receiver_on_second_candidate() {
        let mut line = FakeLine::new(9_600);
        line.reply_at(19_200, mon_ver_reply());

        let config = instant_config(vec![9_600, 19_200], 19_200);
        let outcome = negotiate(&mut line, &config).unwrap();

        assert_eq!(
            outcome,
            Negotiated {
                baud: 19_200,
                attempts: 2
            }
        );
        assert_eq!(line.reconfigures(), vec![9_600, 19_200]);
    }

    #[test]
    fn test_no_response_after_all_candidates() {
        let mut line = FakeLine::new(9_600);
        let config = instant_config(vec![9_600], 230_400);

        let err = negotiate(&mut line, &config).unwrap_err();
        assert!(matches!(err, NegotiationError::NoResponse { attempts: 1 }));
    }

    #[test]
    fn test_empty_candidate_list() {
        let mut line = FakeLine::new(9_600);
        let config = instant_config(vec![], 230_400);

        let err = negotiate(&mut line, &config).unwrap_err();
        assert!(matches!(err, NegotiationError::NoResponse { attempts: 0 }));
    }

    #[test]
    fn test_pins_receiver_to_target_rate() {
        let mut line = FakeLine::new(38_400);
        line.reply_at(38_400, mon_ver_reply());
        line.reply_at(230_400, mon_ver_reply());

        let config = instant_config(vec![38_400], 230_400);
        let outcome = negotiate(&mut line, &config).unwrap();

        assert_eq!(
            outcome,
            Negotiated {
                baud: 230_400,
                attempts: 1
            }
        );
        assert_eq!(line.current_baud(), 230_400);
        assert_eq!(line.reconfigures(), vec![38_400, 230_400]);

        let writes = line.writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0], (38_400, ubx::mon_ver_poll().to_vec()));
        assert_eq!(writes[1], (38_400, ubx::cfg_prt_uart1(230_400).to_vec()));
        assert_eq!(writes[2], (230_400, ubx::mon_ver_poll().to_vec()));
    }

    #[test]
    fn test_falls_back_when_pin_unanswered() {
        let mut line = FakeLine::new(38_400);
        line.reply_at(38_400, mon_ver_reply());

        let config = instant_config(vec![38_400], 230_400);
        let outcome = negotiate(&mut line, &config).unwrap();

        assert_eq!(
            outcome,
            Negotiated {
                baud: 38_400,
                attempts: 1
            }
        );
        assert_eq!(line.current_baud(), 38_400);
        assert_eq!(line.reconfigures(), vec![38_400, 230_400, 38_400]);
    }
}
