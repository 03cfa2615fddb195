//! Live provider over a blocking byte source

use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::beacon::{Beacon, CloseHandle};
use crate::provider::Provider;
use crate::source::ByteSource;
use crate::types::DecodedPacket;
use crate::{ConnectionError, Result};

/// Live provider reading a modem link
///
/// Every read runs on tokio's blocking pool, since a byte source may block
/// for up to its read timeout. The beacon is moved into the blocking task
/// and handed back when the read completes.
///
/// `next_packet` is cancel safe: a read abandoned mid-flight stays in
/// `in_flight` and the next call picks up its result.
pub struct LiveProvider<S: ByteSource> {
    /// Beacon, absent while a read is in flight
    beacon: Option<Beacon<S>>,

    /// Blocking read that has not been collected yet
    in_flight: Option<PendingRead<S>>,

    /// Closes the beacon from outside the blocking task
    close: CloseHandle,

    packet_rate: f64,
}

type PendingRead<S> = JoinHandle<(Beacon<S>, Result<Option<DecodedPacket>>)>;

impl<S> LiveProvider<S>
where
    S: ByteSource + Send + 'static,
{
    pub fn new(beacon: Beacon<S>) -> Self {
        let close = beacon.close_handle();
        let packet_rate = beacon.config().packet_rate_hz;
        Self { beacon: Some(beacon), in_flight: None, close, packet_rate }
    }

    /// Handle closing the link, usable while a read is blocked.
    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }
}

#[async_trait::async_trait]
impl<S> Provider for LiveProvider<S>
where
    S: ByteSource + Send + 'static,
{
    async fn next_packet(&mut self) -> Result<Option<DecodedPacket>> {
        let mut timeouts = 0u32;

        loop {
            let pending = match self.in_flight.take() {
                Some(pending) => {
                    trace!("Resuming interrupted read");
                    pending
                }
                None => {
                    let Some(mut beacon) = self.beacon.take() else {
                        debug!("Live provider has no beacon, treating as closed");
                        return Ok(None);
                    };
                    tokio::task::spawn_blocking(move || {
                        let result = beacon.read_packet();
                        (beacon, result)
                    })
                }
            };

            // Parked in self until joined, so dropping this future loses nothing
            let joined = self.in_flight.insert(pending).await;
            self.in_flight = None;

            let (beacon, result) =
                joined.map_err(|e| ConnectionError::Io { source: std::io::Error::other(e) })?;
            self.beacon = Some(beacon);

            match result {
                Ok(Some(packet)) => {
                    if timeouts > 0 {
                        debug!("Beacon data resumed after {} timeouts", timeouts);
                    }
                    return Ok(Some(packet));
                }
                Ok(None) => {
                    // Link is quiet, keep waiting
                    timeouts += 1;
                    if timeouts == 1 {
                        info!("Waiting for beacon data...");
                    } else {
                        trace!("Still waiting for beacon data ({} timeouts)", timeouts);
                    }
                }
                Err(ConnectionError::Closed) => {
                    info!("Beacon link closed");
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
        self.close.close();
        if let Some(beacon) = self.beacon.as_mut() {
            beacon.close();
        }
    }
}
