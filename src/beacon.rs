//! Blocking packet reader over a byte source
//!
//! [`Beacon`] composes a [`Framer`] and a [`Decoder`] over one
//! [`ByteSource`] and is the packet-oriented view of a modem link:
//!
//! - [`Beacon::read_raw`] frames one packet (marker re-attached)
//! - [`Beacon::read_packet`] frames and decodes one packet
//! - [`Beacon::packets`] iterates decoded packets until the link closes
//!
//! A beacon is a single reader. Cancellation comes from outside through a
//! [`CloseHandle`], which any thread may trigger while a read is blocked.
//! The handle is checked around every byte read, so a blocked read returns
//! `Closed` once the source yields a byte or times out. Sources over a
//! serial port therefore need a read timeout on the port.
//!
//! ```rust
//! use mmgps::{Beacon, DecodedPacket, source::ReplaySource};
//!
//! let capture = ReplaySource::from_bytes(vec![0x00u8, 0xFF, 0x47]);
//! let mut beacon = Beacon::new(capture);
//! let stop = beacon.close_handle();
//!
//! // e.g. from a Ctrl-C handler
//! std::thread::spawn(move || stop.close());
//!
//! for packet in beacon.packets() {
//!     if let DecodedPacket::Position(position) = packet {
//!         println!("{:.2} {:.2} {:.2}", position.x, position.y, position.z);
//!     }
//! }
//! ```

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::BeaconConfig;
use crate::error::FramingError;
use crate::framer::Framer;
use crate::protocol::Decoder;
use crate::source::{ByteSource, SourceEvent};
use crate::types::{DecodedPacket, RawPacket};
use crate::{ConnectionError, DecodeError, Result};

/// Thread-safe, idempotent close signal for a [`Beacon`].
#[derive(Debug, Clone, Default)]
pub struct CloseHandle {
    token: CancellationToken,
}

impl CloseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request closure. Safe to call repeatedly and from any thread.
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`CloseHandle::close`] has been called.
    pub async fn closed(&self) {
        self.token.cancelled().await
    }
}

/// Source wrapper that reports `Closed` as soon as the handle fires, both
/// before a read starts and after a blocked read returns.
struct Guarded<'a, S> {
    source: &'a mut S,
    close: &'a CloseHandle,
}

impl<S: ByteSource> ByteSource for Guarded<'_, S> {
    fn read_byte(&mut self) -> std::io::Result<SourceEvent> {
        if self.close.is_closed() {
            return Ok(SourceEvent::Closed);
        }
        let event = self.source.read_byte()?;
        if self.close.is_closed() {
            return Ok(SourceEvent::Closed);
        }
        Ok(event)
    }

    fn close(&mut self) {
        self.source.close()
    }

    fn is_closed(&self) -> bool {
        self.close.is_closed() || self.source.is_closed()
    }
}

/// Packet-oriented connection to a MarvelMind modem.
pub struct Beacon<S: ByteSource> {
    source: S,
    framer: Framer,
    decoder: Decoder,
    config: BeaconConfig,
    last_packet: Option<RawPacket>,
    close: CloseHandle,
}

impl<S: ByteSource> Beacon<S> {
    /// Beacon with the default configuration (`FF 47` marker, little endian).
    pub fn new(source: S) -> Self {
        let config = BeaconConfig::default();
        Self {
            source,
            framer: config.framer(),
            decoder: config.decoder(),
            config,
            last_packet: None,
            close: CloseHandle::new(),
        }
    }

    pub fn with_config(source: S, config: BeaconConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            framer: config.framer(),
            decoder: config.decoder(),
            config,
            last_packet: None,
            close: CloseHandle::new(),
        })
    }

    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    /// Handle that closes this beacon from another thread or task.
    ///
    /// Handles are tied to the current source: after [`Beacon::reopen`] a
    /// new handle must be fetched.
    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_closed() || self.source.is_closed()
    }

    /// Close the beacon and its source. Idempotent.
    pub fn close(&mut self) {
        if !self.close.is_closed() {
            info!("Closing beacon connection");
        }
        self.close.close();
        self.source.close();
    }

    /// Replace the source and start over with empty framing state.
    pub fn reopen(&mut self, source: S) {
        self.source.close();
        self.source = source;
        let discarded = self.framer.clear();
        self.last_packet = None;
        self.close = CloseHandle::new();
        info!(discarded = discarded.len(), "Beacon connection reopened");
    }

    /// Most recent raw packet framed, whether or not it decoded.
    pub fn last_packet(&self) -> Option<&RawPacket> {
        self.last_packet.as_ref()
    }

    /// Skip to the next marker boundary. Best effort, see [`Framer::sync`].
    pub fn sync(&mut self) -> bool {
        let mut source = Guarded { source: &mut self.source, close: &self.close };
        let synced = self.framer.sync(&mut source);
        debug!(synced, "Beacon sync finished");
        synced
    }

    /// Frame the next packet.
    ///
    /// The returned packet starts with the marker, which on MarvelMind
    /// links is the address and type header of the packet itself.
    pub fn read_raw(&mut self) -> Result<RawPacket> {
        let mut source = Guarded { source: &mut self.source, close: &self.close };

        match self.framer.next_packet(&mut source) {
            Ok(payload) => {
                let packet = RawPacket::from_frame(self.framer.marker(), &payload);
                trace!(len = packet.len(), "Read raw packet");
                self.last_packet = Some(packet.clone());
                Ok(packet)
            }
            Err(FramingError::Unavailable { buffered }) => {
                trace!(buffered, "No data within read timeout");
                Err(ConnectionError::Timeout { duration: self.read_timeout() })
            }
            Err(FramingError::Closed) => {
                self.close();
                Err(ConnectionError::Closed)
            }
            Err(FramingError::Io(e)) => Err(e.into()),
        }
    }

    /// Frame and decode the next packet.
    ///
    /// - `Ok(None)`: nothing arrived within the read timeout; partial
    ///   framing state is kept
    /// - `Err(ConnectionError::Decode { .. })`: a packet was framed but
    ///   rejected; the raw bytes travel with the error
    /// - `Err(ConnectionError::Closed)`: the source is gone
    pub fn read_packet(&mut self) -> Result<Option<DecodedPacket>> {
        let packet = match self.read_raw() {
            Ok(packet) => packet,
            Err(ConnectionError::Timeout { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        match self.decoder.decode(packet.as_bytes()) {
            Ok(decoded) => Ok(Some(decoded)),
            Err(source) => Err(ConnectionError::Decode { source, packet }),
        }
    }

    /// Decoded packets until the source closes.
    ///
    /// Malformed packets are logged and skipped, timeouts are waited out.
    pub fn packets(&mut self) -> Packets<'_, S> {
        Packets { beacon: self, discarded: 0 }
    }

    fn read_timeout(&self) -> Duration {
        self.config.read_timeout()
    }
}

impl<S: ByteSource> Drop for Beacon<S> {
    fn drop(&mut self) {
        self.source.close();
    }
}

impl<S: ByteSource> std::fmt::Debug for Beacon<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Beacon")
            .field("marker", self.framer.marker())
            .field("byte_order", &self.decoder.byte_order())
            .field("buffered", &self.framer.buffered().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Iterator over decoded packets, see [`Beacon::packets`].
pub struct Packets<'a, S: ByteSource> {
    beacon: &'a mut Beacon<S>,
    discarded: u64,
}

impl<S: ByteSource> Packets<'_, S> {
    /// Packets framed but rejected by the decoder so far.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl<S: ByteSource> Iterator for Packets<'_, S> {
    type Item = DecodedPacket;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.beacon.read_packet() {
                Ok(Some(packet)) => return Some(packet),
                Ok(None) => continue,
                Err(ConnectionError::Decode { source, packet }) => {
                    self.discarded += 1;
                    log_malformed(&source, &packet);
                }
                Err(ConnectionError::Closed) => {
                    debug!(discarded = self.discarded, "Packet iteration finished, source closed");
                    return None;
                }
                Err(e) => {
                    error!(error = %e, "Packet iteration stopped");
                    return None;
                }
            }
        }
    }
}

fn log_malformed(error: &DecodeError, packet: &RawPacket) {
    match error {
        DecodeError::InvalidChecksum { computed, received } => warn!(
            packet = %packet,
            computed = format_args!("{:04X}", computed),
            received = format_args!("{:04X}", received),
            "Discarding packet with invalid CRC16"
        ),
        other => warn!(packet = %packet, error = %other, "Discarding malformed packet"),
    }
}
