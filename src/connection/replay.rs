//! Replay connection for raw serial captures

use futures::Stream;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{beacon_stream, position_stream};
use crate::config::BeaconConfig;
use crate::driver::Driver;
use crate::provider::Provider;
use crate::providers::ReplayProvider;
use crate::types::{BeaconStatusEntry, PositionRecord, UpdateRate};
use crate::Result;

/// How long `open` waits for the first decoded packet
const FIRST_PACKET_TIMEOUT: Duration = Duration::from_secs(5);

/// Replay connection from a capture file
pub struct ReplayConnection {
    /// Position watch receiver
    positions: watch::Receiver<Option<Arc<PositionRecord>>>,

    /// Frozen beacon watch receiver
    beacons: watch::Receiver<Option<Arc<[BeaconStatusEntry]>>>,

    /// Nominal packet rate
    packet_rate_hz: f64,

    /// Cancellation token for stopping the driver
    cancel: CancellationToken,
}

impl ReplayConnection {
    /// Open a capture file for replay.
    ///
    /// Waits for the first packet to be available before returning to ensure
    /// the connection is fully initialized and ready for subscriptions.
    pub async fn open<P: AsRef<Path>>(path: P, config: BeaconConfig) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening capture file: {}", path.display());
        let provider = ReplayProvider::open(path, config)?;
        Ok(Self::from_provider(provider).await)
    }

    /// Replay a capture held in memory.
    pub async fn from_bytes(bytes: impl Into<bytes::Bytes>, config: BeaconConfig) -> Result<Self> {
        let provider = ReplayProvider::from_bytes(bytes, config)?;
        Ok(Self::from_provider(provider).await)
    }

    /// Start replay from a configured provider, e.g. one with a custom speed.
    pub async fn from_provider(provider: ReplayProvider) -> Self {
        let packet_rate_hz = provider.packet_rate();
        let max_errors = provider.config().max_consecutive_errors;

        let channels = Driver::spawn(provider, max_errors);

        // Wait for the first position or beacon list
        let mut positions = channels.positions.clone();
        let mut beacons = channels.beacons.clone();
        let wait_result = tokio::time::timeout(FIRST_PACKET_TIMEOUT, async {
            tokio::select! {
                _ = positions.changed() => {}
                _ = beacons.changed() => {}
            }
        })
        .await;

        if wait_result.is_err() {
            warn!("Timeout waiting for first packet from capture");
        }

        info!("Replay connection opened ({}Hz)", packet_rate_hz);

        Self {
            positions: channels.positions,
            beacons: channels.beacons,
            packet_rate_hz,
            cancel: channels.cancel,
        }
    }

    /// Subscribe to hedgehog positions
    pub fn subscribe(&self, rate: UpdateRate) -> impl Stream<Item = PositionRecord> + Send + 'static {
        position_stream(self.positions.clone(), rate, self.packet_rate_hz)
    }

    /// Frozen beacon lists as they change
    pub fn beacon_updates(&self) -> impl Stream<Item = Arc<[BeaconStatusEntry]>> + Send + 'static {
        beacon_stream(self.beacons.clone())
    }

    pub fn current_beacons(&self) -> Option<Arc<[BeaconStatusEntry]>> {
        self.beacons.borrow().clone()
    }

    pub fn latest_position(&self) -> Option<PositionRecord> {
        self.positions.borrow().as_deref().copied()
    }

    pub fn packet_rate_hz(&self) -> f64 {
        self.packet_rate_hz
    }

    /// Stop the replay. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for ReplayConnection {
    fn drop(&mut self) {
        debug!("Dropping replay connection");
        self.cancel.cancel();
    }
}
