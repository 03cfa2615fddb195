//! Live connection to a MarvelMind modem

use futures::Stream;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{beacon_stream, position_stream};
use crate::beacon::{Beacon, CloseHandle};
use crate::driver::Driver;
use crate::provider::Provider;
use crate::providers::LiveProvider;
use crate::source::ByteSource;
use crate::types::{BeaconStatusEntry, PositionRecord, UpdateRate};
use crate::{ConnectionError, Result};

/// Live connection streaming positions from a modem link
pub struct LiveConnection {
    /// Position watch receiver
    positions: watch::Receiver<Option<Arc<PositionRecord>>>,

    /// Frozen beacon watch receiver
    beacons: watch::Receiver<Option<Arc<[BeaconStatusEntry]>>>,

    /// Nominal packet rate
    packet_rate_hz: f64,

    /// Closes the link, interrupting a blocked read
    close: CloseHandle,

    /// Cancellation token for stopping the driver
    cancel: CancellationToken,
}

impl LiveConnection {
    /// Start streaming from an open beacon link.
    ///
    /// Discards the partial packet that may be in flight (see
    /// [`Beacon::sync`]), then spawns the driver. Does not wait for the
    /// first packet; subscriptions wait for data instead.
    pub async fn connect<S>(mut beacon: Beacon<S>) -> Result<Self>
    where
        S: ByteSource + Send + 'static,
    {
        info!("Connecting to beacon link");
        let max_errors = beacon.config().max_consecutive_errors;

        let beacon = tokio::task::spawn_blocking(move || {
            beacon.sync();
            beacon
        })
        .await
        .map_err(|e| ConnectionError::Io { source: std::io::Error::other(e) })?;

        let provider = LiveProvider::new(beacon);
        let close = provider.close_handle();
        let packet_rate_hz = provider.packet_rate();

        let channels = Driver::spawn(provider, max_errors);

        info!("Live connection established ({}Hz) - waiting for beacon data", packet_rate_hz);

        Ok(Self {
            positions: channels.positions,
            beacons: channels.beacons,
            packet_rate_hz,
            close,
            cancel: channels.cancel,
        })
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

    /// Handle that closes the link from elsewhere, e.g. a signal handler.
    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    /// Close the link and stop the driver. Idempotent.
    pub fn close(&self) {
        self.close.close();
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_closed() || self.cancel.is_cancelled()
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        debug!("Dropping live connection");
        self.close();
    }
}
