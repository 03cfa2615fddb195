//! Marker-delimited packet reassembly
//!
//! The modem streams packets back to back, each opened by the marker and
//! closed by the marker that opens the next one:
//!
//! ```text
//! .. noise .. | M payload₁ | M payload₂ | M payload₃ | M ..
//! ```
//!
//! [`Framer`] accumulates bytes until the buffer both starts and ends with
//! the marker, then hands out the payload between the two occurrences and
//! keeps the trailing marker as the start of the next packet. Bytes seen
//! before the first marker are discarded as out-of-frame noise.
//!
//! # Marker collisions
//!
//! The protocol has no escaping. A payload that happens to contain the
//! marker is split at that point into two bogus packets, and the remainder
//! of the real packet is lost. The framer cannot tell the difference; the
//! CRC16 check in the decoder is what rejects the fragments.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{trace, warn};

use crate::error::FramingError;
use crate::source::{ByteSource, SourceEvent};
use crate::types::Marker;

/// Upper bound on buffered bytes. A beacon status list with 255 entries is
/// 2048 bytes; anything larger means the terminating marker was lost.
pub const MAX_FRAME_LEN: usize = 4096;

/// Stateful packet framer.
///
/// State survives across calls: a [`FramingError::Unavailable`] keeps the
/// partial packet so the next [`Framer::next_packet`] resumes it.
#[derive(Debug, Clone)]
pub struct Framer {
    marker: Marker,
    buffer: BytesMut,
}

impl Framer {
    pub fn new(marker: Marker) -> Self {
        Self { marker, buffer: BytesMut::with_capacity(256) }
    }

    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    /// Bytes accumulated towards the current packet, including its marker.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Whether the buffer currently holds exactly one marker, i.e. the next
    /// byte read is the first payload byte of a packet.
    pub fn at_boundary(&self) -> bool {
        self.buffer[..] == *self.marker.as_bytes()
    }

    /// Drop all buffered state, returning what was discarded.
    pub fn clear(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    /// Feed one byte. Returns the payload of a packet when this byte
    /// completes its terminating marker.
    pub fn push(&mut self, byte: u8) -> Option<Bytes> {
        self.buffer.put_u8(byte);

        let marker = self.marker.as_bytes();
        let m = marker.len();
        let len = self.buffer.len();

        if !self.buffer.ends_with(marker) {
            if !self.buffer.starts_with(marker) {
                // Out of frame: only a partial marker is worth keeping
                if len >= m {
                    self.buffer.advance(len + 1 - m);
                }
            } else if len > MAX_FRAME_LEN {
                warn!(
                    buffered = len,
                    "No terminating marker within {} bytes, dropping partial packet", MAX_FRAME_LEN
                );
                self.buffer.advance(len + 1 - m);
            }
            return None;
        }

        if len > 2 * m && self.buffer.starts_with(marker) {
            let mut frame = self.buffer.split_to(len - m);
            frame.advance(m);
            trace!(len = frame.len(), "Framed packet");
            return Some(frame.freeze());
        }

        // Marker with nothing usable before it opens a fresh packet
        if len > m {
            trace!(discarded = len - m, "Discarding bytes before marker");
            self.buffer.advance(len - m);
        }
        None
    }

    /// Read from `source` until a complete packet is framed.
    ///
    /// Returns the payload between the two markers, markers stripped.
    pub fn next_packet<S>(&mut self, source: &mut S) -> Result<Bytes, FramingError>
    where
        S: ByteSource + ?Sized,
    {
        loop {
            match source.read_byte()? {
                SourceEvent::Byte(byte) => {
                    if let Some(packet) = self.push(byte) {
                        return Ok(packet);
                    }
                }
                SourceEvent::Timeout => {
                    return Err(FramingError::Unavailable { buffered: self.buffer.len() });
                }
                SourceEvent::Closed => return Err(FramingError::Closed),
            }
        }
    }

    /// Discard input until positioned on a marker boundary.
    ///
    /// Used once after opening a link to drop the tail of a packet that was
    /// in flight before reading started. Best effort: returns `false` if the
    /// source times out, closes or fails first, and never errors.
    pub fn sync<S>(&mut self, source: &mut S) -> bool
    where
        S: ByteSource + ?Sized,
    {
        let discarded = self.clear();
        let mut skipped = discarded.len();

        loop {
            match source.read_byte() {
                Ok(SourceEvent::Byte(byte)) => {
                    skipped += 1;
                    // Cannot complete a packet: the buffer never starts with
                    // the marker before reaching the boundary
                    let _ = self.push(byte);
                    if self.at_boundary() {
                        trace!(skipped, "Synchronized on marker");
                        return true;
                    }
                }
                Ok(event) => {
                    trace!(?event, skipped, "Sync stopped before a marker was seen");
                    return false;
                }
                Err(e) => {
                    trace!(error = %e, skipped, "Sync stopped on I/O error");
                    return false;
                }
            }
        }
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(Marker::default())
    }
}
