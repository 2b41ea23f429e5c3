//! NMEA 0183 sentence assembly
//!
//! Builds `$<payload>*HH\r\n` sentences with the standard XOR checksum.
//! The bridge uses this to re-emit binary navigation data as text for
//! consumers that only speak NMEA.

use thiserror::Error;

/// Longest sentence this crate will emit, terminator included.
pub const MAX_SENTENCE_LEN: usize = 128;

/// Sentence assembly errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SentenceError {
    /// Rendered sentence would exceed [`MAX_SENTENCE_LEN`]
    #[error("sentence too long: {0} bytes")]
    TooLong(usize),
}

/// Calculate the XOR checksum over a sentence payload.
///
/// The payload excludes the leading `$` and everything from `*` on. A XOR
/// fold cannot see byte order, only which bits flipped; it guards against
/// line corruption, not tampering.
#[must_use]
pub fn checksum(payload: &str) -> u8 {
    payload.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Render a complete sentence from its payload.
///
/// Fails without producing anything if the rendered sentence would not fit
/// [`MAX_SENTENCE_LEN`]; a truncated sentence with a stale checksum is
/// worse than no sentence.
pub fn format(payload: &str) -> Result<String, SentenceError> {
    // '$' + payload + '*' + two hex digits + CRLF
    let rendered_len = payload.len() + 6;
    if rendered_len > MAX_SENTENCE_LEN {
        return Err(SentenceError::TooLong(rendered_len));
    }
    Ok(format!("${}*{:02X}\r\n", payload, checksum(payload)))
}
