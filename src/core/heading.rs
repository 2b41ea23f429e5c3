//! Heading sentence synthesis
//!
//! The heading receiver reports its moving-baseline solution as a binary
//! NAV-RELPOSNED packet. Consumers downstream only understand NMEA, so the
//! bridge rewrites each usable solution as a `$GNHDT` true-heading sentence.

use bytes::Bytes;
use tracing::trace;

use super::sentence::{self, SentenceError};
use super::ubx::RelativePositionPacket;

const HEADING_SCALE: f64 = 1e-5;

/// Rewrites relative-position packets as NMEA true-heading sentences.
///
/// A sentence is only produced while the solution is trustworthy: the fix
/// must be within limits, differential corrections applied, and the heading
/// flagged valid. Anything less is silently skipped so downstream consumers
/// never steer on a float solution.
#[derive(Debug, Default)]
pub struct HeadingSynthesizer {
    emitted: u64,
    skipped: u64,
}

impl HeadingSynthesizer {
    /// Create a synthesizer with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sentences produced since creation.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Packets skipped for an untrustworthy solution.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Convert one packet, or skip it when the solution is not usable.
    pub fn on_packet(
        &mut self,
        packet: &RelativePositionPacket,
    ) -> Result<Option<Bytes>, SentenceError> {
        if !(packet.fix_ok && packet.diff_soln && packet.heading_valid) {
            self.skipped += 1;
            trace!(
                "skipping heading packet: fix_ok={} diff_soln={} heading_valid={}",
                packet.fix_ok,
                packet.diff_soln,
                packet.heading_valid
            );
            return Ok(None);
        }

        let degrees = f64::from(packet.heading_e5) * HEADING_SCALE;
        let sentence = sentence::format(&format!("GNHDT,{:.3},T", degrees))?;
        self.emitted += 1;
        Ok(Some(Bytes::from(sentence.into_bytes())))
    }
}
