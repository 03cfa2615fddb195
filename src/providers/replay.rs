//! Replay provider for raw serial captures

use std::path::Path;
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace};

use crate::beacon::Beacon;
use crate::config::BeaconConfig;
use crate::provider::Provider;
use crate::source::ReplaySource;
use crate::types::DecodedPacket;
use crate::{ConnectionError, Result};

/// Replay provider feeding a capture through the live decoding pipeline
pub struct ReplayProvider {
    beacon: Beacon<ReplaySource>,

    /// Playback speed multiplier (1.0 = modem rate)
    speed: f64,

    /// Packet pacing interval
    interval: Interval,

    packet_rate: f64,
}

impl ReplayProvider {
    /// Open a raw capture file
    pub fn open<P: AsRef<Path>>(path: P, config: BeaconConfig) -> Result<Self> {
        let source = ReplaySource::open(path)?;
        Self::new(source, config)
    }

    pub fn from_bytes(bytes: impl Into<bytes::Bytes>, config: BeaconConfig) -> Result<Self> {
        Self::new(ReplaySource::from_bytes(bytes), config)
    }

    pub fn new(source: ReplaySource, config: BeaconConfig) -> Result<Self> {
        let packet_rate = config.packet_rate_hz;
        info!("Replaying {} bytes from {} at {}Hz", source.len(), source.path().display(), packet_rate);

        let beacon = Beacon::with_config(source, config)?;
        let interval = pacing(packet_rate);
        Ok(Self { beacon, speed: 1.0, interval, packet_rate })
    }

    /// Set playback speed, clamped to 0.1x..=10x
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(0.1, 10.0);
        self.interval = pacing(self.packet_rate * self.speed);
        debug!("Playback speed set to {}x", self.speed);
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.set_speed(speed);
        self
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn config(&self) -> &BeaconConfig {
        self.beacon.config()
    }
}

fn pacing(rate_hz: f64) -> Interval {
    let mut interval = interval(Duration::from_secs_f64(1.0 / rate_hz));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

#[async_trait::async_trait]
impl Provider for ReplayProvider {
    async fn next_packet(&mut self) -> Result<Option<DecodedPacket>> {
        if self.beacon.is_closed() {
            debug!("Reached end of replay");
            return Ok(None);
        }

        // Wait for next packet timing (pacing)
        self.interval.tick().await;

        loop {
            match self.beacon.read_packet() {
                Ok(Some(packet)) => {
                    trace!(code = packet.type_code(), "Replayed packet");
                    return Ok(Some(packet));
                }
                // A replay source never times out, but stay faithful to the live policy
                Ok(None) => continue,
                Err(ConnectionError::Closed) => {
                    debug!("Replay source exhausted");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn packet_rate(&self) -> f64 {
        self.packet_rate
    }

    fn shutdown(&mut self) {
        self.beacon.close();
    }
}
