//! Update rate control for position streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rate at which position updates are delivered to a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every position the modem sends
    Native,

    /// At most this many updates per second, latest wins.
    /// Falls back to Native when it is not below the packet rate.
    Max(u32),
}

impl UpdateRate {
    /// Resolve against the nominal packet rate of the source
    pub fn normalize(self, packet_rate_hz: f64) -> Self {
        match self {
            UpdateRate::Max(0) => UpdateRate::Native,
            UpdateRate::Max(hz) if hz as f64 >= packet_rate_hz => UpdateRate::Native,
            other => other,
        }
    }

    /// Interval between deliveries, if throttling applies
    pub fn throttle_interval(self, packet_rate_hz: f64) -> Option<Duration> {
        match self.normalize(packet_rate_hz) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}
