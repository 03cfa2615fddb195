//! Beacon link configuration
//!
//! Everything protocol-related that is not a property of the physical port.
//! Loadable from YAML; every field is optional:
//!
//! ```yaml
//! marker: "FF 47"
//! byte_order: little
//! read_timeout_ms: 1000
//! packet_rate_hz: 16.0
//! max_consecutive_errors: 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::framer::Framer;
use crate::protocol::Decoder;
use crate::types::{ByteOrder, Marker};
use crate::{ConnectionError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BeaconConfig {
    /// Packet start/stop marker.
    pub marker: Marker,

    /// Field byte order of the firmware's protocol revision.
    pub byte_order: ByteOrder,

    /// Read timeout the application configured on the byte source. The
    /// crate never applies it; it is the duration reported in
    /// [`ConnectionError::Timeout`].
    pub read_timeout_ms: u64,

    /// Nominal rate at which the modem emits packets. Replay is paced at
    /// this rate and stream throttles at or above it are no-ops.
    pub packet_rate_hz: f64,

    /// Consecutive byte source failures (I/O errors) after which an async
    /// connection gives up. Rejected packets and timeouts are not counted.
    pub max_consecutive_errors: u32,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            marker: Marker::default(),
            byte_order: ByteOrder::Little,
            read_timeout_ms: 1000,
            packet_rate_hz: 16.0,
            max_consecutive_errors: 10,
        }
    }
}

impl BeaconConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| ConnectionError::config(format!("YAML parsing failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ConnectionError::file_error(path.to_path_buf(), e))?;

        let config = Self::from_yaml_str(&yaml)?;
        debug!(path = %path.display(), ?config, "Loaded beacon configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.marker.is_empty() {
            return Err(ConnectionError::config("marker must contain at least one byte"));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConnectionError::config("read_timeout_ms must be greater than zero"));
        }
        if !self.packet_rate_hz.is_finite() || self.packet_rate_hz <= 0.0 {
            return Err(ConnectionError::config(format!(
                "packet_rate_hz must be a positive number, got {}",
                self.packet_rate_hz
            )));
        }
        if self.max_consecutive_errors == 0 {
            return Err(ConnectionError::config("max_consecutive_errors must be at least 1"));
        }
        Ok(())
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.marker = marker;
        self
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = timeout.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn with_packet_rate(mut self, hz: f64) -> Self {
        self.packet_rate_hz = hz;
        self
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Interval between packets at the nominal packet rate.
    pub fn packet_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.packet_rate_hz)
    }

    pub fn decoder(&self) -> Decoder {
        Decoder::new(self.byte_order)
    }

    pub fn framer(&self) -> Framer {
        Framer::new(self.marker.clone())
    }
}
