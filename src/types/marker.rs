//! Start/stop marker delimiting packets on the wire

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::hex_dump;
use crate::{ConnectionError, Result};

/// Marker emitted by MarvelMind modems: destination address `0xFF`
/// followed by packet type `0x47`.
pub const DEFAULT_MARKER: [u8; 2] = [0xFF, 0x47];

/// Immutable, non-empty byte sequence that both opens and closes a packet.
///
/// Consecutive packets share a marker: the occurrence that ends packet N
/// also starts packet N+1. The protocol never escapes the marker, so a
/// payload that happens to contain it is split at that point; the CRC on
/// each resulting fragment is what rejects the garbage.
///
/// Serialized as a hex string such as `"FF 47"`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Marker(Arc<[u8]>);

impl Marker {
    /// Create a marker from raw bytes. Empty markers are rejected.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ConnectionError::config("marker must contain at least one byte"));
        }
        Ok(Self(bytes.into()))
    }

    /// Parse a marker from hex pairs, optionally separated by whitespace
    /// (`"FF47"`, `"ff 47"`).
    pub fn from_hex(text: &str) -> Result<Self> {
        let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = hex::decode(&digits).map_err(|e| {
            ConnectionError::config(format!("marker '{}' is not valid hex: {}", text, e))
        })?;
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Marker {
    fn default() -> Self {
        Self(Arc::from(&DEFAULT_MARKER[..]))
    }
}

impl AsRef<[u8]> for Marker {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex_dump(&self.0))
    }
}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Marker({})", self)
    }
}

impl TryFrom<String> for Marker {
    type Error = ConnectionError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<Marker> for String {
    fn from(marker: Marker) -> Self {
        marker.to_string()
    }
}
