//! Line framing for relayed telemetry
//!
//! Receivers emit LF-terminated sentences mixed into a continuous byte
//! stream. [`FrameBuffer`] rebuilds sentence boundaries one byte at a time
//! behind a fixed ceiling, so a receiver stuck mid-sentence can never grow
//! the buffer without bound. Nothing is ever discarded: when the ceiling
//! is hit the accumulated prefix is flushed as-is and the stream continues.

use bytes::Bytes;

/// Default framing capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 256;

const TERMINATOR: u8 = b'\n';

/// How a frame left the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Terminator seen; the frame carries it as its last byte.
    Complete,
    /// Capacity reached; the frame is an unterminated prefix.
    Forced,
}

/// A reassembled frame.
///
/// The kind tag exists for accounting only. On the wire a forced frame is
/// indistinguishable from a complete one, which is exactly how downstream
/// consumers expect partial sentences to arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Completion marker.
    pub kind: FrameKind,
    /// Frame contents.
    pub bytes: Bytes,
}

impl Frame {
    fn complete(bytes: Bytes) -> Self {
        Self {
            kind: FrameKind::Complete,
            bytes,
        }
    }

    fn forced(bytes: Bytes) -> Self {
        Self {
            kind: FrameKind::Forced,
            bytes,
        }
    }
}

/// Frames produced by a single consumed byte, in emission order.
///
/// At most two: a forced flush followed by a terminated frame, when the
/// terminator arrives exactly at capacity.
#[derive(Debug, Default)]
pub struct Emitted {
    first: Option<Frame>,
    second: Option<Frame>,
}

impl Iterator for Emitted {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.first.take().or_else(|| self.second.take())
    }
}

/// Bounded sentence reassembly buffer.
pub struct FrameBuffer {
    buf: Box<[u8]>,
    len: usize,
}

impl FrameBuffer {
    /// Create a buffer with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a buffer with an explicit capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; a zero-capacity buffer could never
    /// hold even the byte it is consuming.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "framing capacity must be nonzero");
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes accumulated toward the next frame.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Consume one byte, returning any frames it released.
    ///
    /// A byte arriving at a full buffer first flushes the accumulated
    /// contents as a forced frame, then starts the next frame; the
    /// terminator additionally flushes whatever it just joined. Both can
    /// happen for the same byte.
    pub fn consume(&mut self, byte: u8) -> Emitted {
        let mut out = Emitted::default();

        if self.len == self.buf.len() {
            out.first = Some(Frame::forced(self.take()));
        }

        self.buf[self.len] = byte;
        self.len += 1;

        if byte == TERMINATOR {
            let frame = Frame::complete(self.take());
            if out.first.is_some() {
                out.second = Some(frame);
            } else {
                out.first = Some(frame);
            }
        }

        out
    }

    /// Consume a chunk, collecting every released frame.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for &byte in data {
            frames.extend(self.consume(byte));
        }
        frames
    }

    /// Drop any accumulated bytes.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    fn take(&mut self) -> Bytes {
        let out = Bytes::copy_from_slice(&self.buf[..self.len]);
        self.len = 0;
        out
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
