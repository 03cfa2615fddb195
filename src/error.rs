//! Error types for beacon framing, decoding and connections.
//!
//! Errors are split by pipeline stage so each layer reports only what it can
//! actually observe:
//!
//! - [`FramingError`]: the byte source ran dry, closed, or failed while a
//!   packet was being reassembled
//! - [`DecodeError`]: a complete packet failed validation or could not be
//!   interpreted
//! - [`ConnectionError`]: what callers of a connection see, combining the two
//!   above with configuration and capture-file failures
//!
//! ## Recovery
//!
//! Only [`ConnectionError::Closed`] is terminal for a read loop. Everything a
//! beacon can do wrong on the wire is recoverable by reading the next packet:
//!
//! ```rust
//! use mmgps::{ConnectionError, DecodeError, RawPacket};
//!
//! let error = ConnectionError::Decode {
//!     source: DecodeError::UnknownType(3),
//!     packet: RawPacket::new(vec![0xFFu8, 0x47, 0x03, 0x00]),
//! };
//! assert!(error.is_retryable());
//! assert!(!ConnectionError::Closed.is_retryable());
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::RawPacket;

/// Result type alias for connection-level operations.
pub type Result<T, E = ConnectionError> = std::result::Result<T, E>;

/// Failure while reassembling a packet from the byte source.
#[derive(Error, Debug)]
pub enum FramingError {
    /// The source produced nothing within its read window. Buffered bytes are
    /// kept and the next call resumes the same packet.
    #[error("no data available from byte source ({buffered} bytes buffered)")]
    Unavailable { buffered: usize },

    /// The source is permanently closed.
    #[error("byte source closed")]
    Closed,

    #[error("byte source I/O error")]
    Io(#[from] std::io::Error),
}

/// Failure while validating or interpreting one raw packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes than the packet layout requires.
    #[error("packet truncated: need at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// CRC16 over the whole packet did not come out as zero.
    ///
    /// `computed` is the checksum of the packet without its trailing two
    /// bytes; `received` is what those two bytes carried.
    #[error("invalid CRC16: computed {computed:04X}, packet carries {received:04X}")]
    InvalidChecksum { computed: u16, received: u16 },

    #[error("unknown packet type code {0:#06x}")]
    UnknownType(u16),

    /// A beacon status list whose entry count leaves bytes unaccounted for.
    #[error("beacon status packet declares {count} entries ({expected} bytes) but carries {actual}")]
    Malformed { count: u8, expected: usize, actual: usize },
}

/// Error surfaced by a beacon connection.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConnectionError {
    /// Nothing arrived within the read timeout. Framing state is preserved.
    #[error("no data within {duration:?}")]
    Timeout { duration: Duration },

    /// The byte source is gone, or the connection was closed.
    #[error("connection closed")]
    Closed,

    /// A complete packet arrived but could not be decoded.
    #[error("{source} [{packet}]")]
    Decode {
        #[source]
        source: DecodeError,
        packet: RawPacket,
    },

    #[error("byte source I/O error")]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("capture file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

impl ConnectionError {
    /// Returns whether reading the next packet can be expected to succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConnectionError::Timeout { .. } => true,
            ConnectionError::Decode { .. } => true,
            ConnectionError::Closed => false,
            ConnectionError::Io { .. } => false,
            ConnectionError::File { .. } => false,
            ConnectionError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ConnectionError::Timeout { .. } => vec![
                "Check that the modem is powered and paired with the hedgehog",
                "Verify the serial port baud rate matches the device",
                "Increase the read timeout",
            ],
            ConnectionError::Closed => vec![
                "Reopen the connection with a fresh byte source",
                "Check that the USB cable is still attached",
            ],
            ConnectionError::Decode { source, .. } => match source {
                DecodeError::InvalidChecksum { .. } => vec![
                    "Check the serial line for noise or a wrong baud rate",
                    "Occasional checksum failures are expected when markers collide with payload",
                ],
                DecodeError::UnknownType(_) => vec![
                    "Disable unused packet types in the dashboard",
                    "Check the configured byte order against the firmware protocol version",
                ],
                DecodeError::Truncated { .. } | DecodeError::Malformed { .. } => vec![
                    "Check the configured byte order against the firmware protocol version",
                    "Update the firmware to a supported protocol revision",
                ],
            },
            ConnectionError::Io { .. } => vec![
                "Check the serial device permissions",
                "Reconnect the device and reopen the connection",
            ],
            ConnectionError::File { .. } => vec![
                "Check the capture file exists and is readable",
                "Check file permissions",
            ],
            ConnectionError::Config { .. } => vec![
                "Check the configuration file against the documented fields",
                "Use a non-empty marker and a non-zero timeout",
            ],
        }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        ConnectionError::Config { reason: reason.into() }
    }

    /// Helper constructor for capture file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        ConnectionError::File { path, source }
    }
}

impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> Self {
        ConnectionError::Io { source: err }
    }
}
