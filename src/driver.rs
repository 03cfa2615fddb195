//! Driver spawns and manages the packet reading task

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::ConnectionError;
use crate::provider::Provider;
use crate::types::{BeaconStatusEntry, DecodedPacket, PositionRecord};

/// Result of spawning the driver task
pub struct DriverChannels {
    /// Latest hedgehog position
    pub positions: watch::Receiver<Option<Arc<PositionRecord>>>,
    /// Latest frozen beacon list, updated only when it changes
    pub beacons: watch::Receiver<Option<Arc<[BeaconStatusEntry]>>>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Driver spawns and manages the packet reading task
///
/// The task owns the provider and publishes decoded packets on watch
/// channels. Receivers see the latest value; a slow subscriber skips
/// intermediate positions rather than building a backlog. Both channels
/// close when the task ends.
pub struct Driver;

impl Driver {
    /// Spawn the reader task for the given provider
    ///
    /// The task stops when cancelled, when the provider reports the end of
    /// its stream, or after `max_errors` consecutive source failures.
    /// Rejected packets and timeouts never stop it.
    pub fn spawn<P>(provider: P, max_errors: u32) -> DriverChannels
    where
        P: Provider,
    {
        let (position_tx, position_rx) = watch::channel(None);
        let (beacon_tx, beacon_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let cancel_reader = cancel.clone();
        tokio::spawn(async move {
            Self::packet_reader_task(provider, position_tx, beacon_tx, cancel_reader, max_errors)
                .await;
        });

        DriverChannels { positions: position_rx, beacons: beacon_rx, cancel }
    }

    async fn packet_reader_task<P>(
        mut provider: P,
        position_tx: watch::Sender<Option<Arc<PositionRecord>>>,
        beacon_tx: watch::Sender<Option<Arc<[BeaconStatusEntry]>>>,
        cancel: CancellationToken,
        max_errors: u32,
    ) where
        P: Provider,
    {
        info!("Packet reader task started");
        let mut packet_count = 0u64;
        let mut error_count = 0u32;
        let mut discarded = 0u64;

        loop {
            // Use select to allow cancellation during provider.next_packet()
            let result = tokio::select! {
                _ = cancel.cancelled() => None,
                result = provider.next_packet() => Some(result),
            };
            let Some(result) = result else {
                info!("Packet reader cancelled");
                provider.shutdown();
                break;
            };

            match result {
                Ok(Some(packet)) => {
                    packet_count += 1;
                    error_count = 0;

                    match packet {
                        DecodedPacket::Position(position) => {
                            trace!(
                                "Packet {}: position ({:.2}, {:.2}, {:.2}) at {:.3}s",
                                packet_count, position.x, position.y, position.z, position.timestamp
                            );
                            if position_tx.send(Some(Arc::new(position))).is_err()
                                && beacon_tx.is_closed()
                            {
                                debug!("All receivers dropped, shutting down");
                                provider.shutdown();
                                break;
                            }
                        }
                        DecodedPacket::BeaconStatus(entries) => {
                            let changed = beacon_tx.send_if_modified(|current| {
                                if current.as_deref() == Some(entries.as_slice()) {
                                    false
                                } else {
                                    *current = Some(entries.into());
                                    true
                                }
                            });
                            if changed {
                                debug!("Frozen beacon list updated");
                            }
                        }
                    }
                }
                Ok(None) => {
                    info!("Provider stream ended after {} packets", packet_count);
                    break;
                }
                // Rejected packets and quiet links are not source failures;
                // only the latter count toward the budget
                Err(e @ ConnectionError::Decode { .. }) => {
                    discarded += 1;
                    error_count = 0;
                    warn!("Discarding packet ({} so far): {}", discarded, e);
                }
                Err(ConnectionError::Timeout { duration }) => {
                    trace!("No packet within {:?}", duration);
                }
                Err(ConnectionError::Closed) => {
                    info!("Packet source closed after {} packets", packet_count);
                    break;
                }
                Err(e) => {
                    error_count += 1;

                    if error_count >= max_errors {
                        error!("Too many consecutive source errors ({}), last: {}", error_count, e);
                        provider.shutdown();
                        break;
                    }

                    error!("Source error ({}/{}): {}", error_count, max_errors, e);
                    // Exponential backoff: 100ms, 200ms, 400ms, ...
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            provider.shutdown();
                            break;
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        info!("Packet reader task ended (processed {} packets)", packet_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawPacket;
    use crate::{DecodeError, Result};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Provider replaying a fixed script, then ending or stalling
    struct ScriptedProvider {
        script: VecDeque<Result<Option<DecodedPacket>>>,
        stall: bool,
        shut_down: Arc<AtomicBool>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<Option<DecodedPacket>>>) -> Self {
            Self { script: script.into(), stall: false, shut_down: Arc::new(AtomicBool::new(false)) }
        }
    }

    #[async_trait::async_trait]
    impl Provider for ScriptedProvider {
        async fn next_packet(&mut self) -> Result<Option<DecodedPacket>> {
            match self.script.pop_front() {
                Some(item) => item,
                None if self.stall => std::future::pending().await,
                None => Ok(None),
            }
        }

        fn packet_rate(&self) -> f64 {
            16.0
        }

        fn shutdown(&mut self) {
            self.shut_down.store(true, Ordering::SeqCst);
        }
    }

    fn position(ticks: u32) -> DecodedPacket {
        DecodedPacket::Position(PositionRecord::from_raw(ticks, 100, 200, 300, 0))
    }

    fn beacons(addresses: &[u8]) -> DecodedPacket {
        DecodedPacket::BeaconStatus(
            addresses.iter().map(|a| BeaconStatusEntry::from_raw(*a, 0, 0, 0, 0)).collect(),
        )
    }

    fn decode_error() -> ConnectionError {
        ConnectionError::Decode {
            source: DecodeError::UnknownType(9),
            packet: RawPacket::new(vec![0xFFu8, 0x47, 0x09, 0x00]),
        }
    }

    async fn wait_closed<T>(rx: &mut watch::Receiver<T>) {
        while rx.changed().await.is_ok() {}
    }

    #[tokio::test]
    async fn publishes_latest_packets_then_closes() {
        let provider = ScriptedProvider::new(vec![
            Ok(Some(beacons(&[1, 2]))),
            Ok(Some(position(64))),
            Ok(Some(position(128))),
        ]);
        let mut channels = Driver::spawn(provider, 10);

        wait_closed(&mut channels.positions).await;
        let latest = channels.positions.borrow().clone().unwrap();
        assert_eq!(latest.timestamp, 2.0);

        let beacons = channels.beacons.borrow().clone().unwrap();
        assert_eq!(beacons.iter().map(|b| b.address).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn unchanged_beacon_lists_are_not_republished() {
        let provider = ScriptedProvider::new(vec![
            Ok(Some(beacons(&[1, 2]))),
            Ok(Some(beacons(&[1, 2]))),
            Ok(Some(beacons(&[1, 2]))),
        ]);
        let mut channels = Driver::spawn(provider, 10);

        let mut updates = 0;
        while channels.beacons.changed().await.is_ok() {
            updates += 1;
        }
        assert_eq!(updates, 1);
    }

    #[tokio::test]
    async fn decode_errors_do_not_stop_the_stream() {
        let provider = ScriptedProvider::new(vec![
            Err(decode_error()),
            Err(decode_error()),
            Ok(Some(position(64))),
            Err(decode_error()),
            Ok(Some(position(192))),
        ]);
        let mut channels = Driver::spawn(provider, 3);

        wait_closed(&mut channels.positions).await;
        assert_eq!(channels.positions.borrow().as_ref().unwrap().timestamp, 3.0);
    }

    #[tokio::test]
    async fn rejected_packets_never_exhaust_the_budget() {
        let mut script: Vec<Result<Option<DecodedPacket>>> =
            (0..10).map(|_| Err(decode_error())).collect();
        script.push(Err(ConnectionError::Timeout { duration: Duration::from_secs(1) }));
        script.extend((1..=5).map(|i| Ok(Some(position(i * 64)))));
        let shut_down = Arc::new(AtomicBool::new(false));
        let provider = ScriptedProvider { script: script.into(), stall: false, shut_down: shut_down.clone() };
        let mut channels = Driver::spawn(provider, 3);

        wait_closed(&mut channels.positions).await;
        assert_eq!(channels.positions.borrow().as_ref().unwrap().timestamp, 5.0);
        assert!(!shut_down.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_consecutive_source_errors() {
        let io_error = || Err(ConnectionError::from(std::io::Error::other("unplugged")));
        let mut provider =
            ScriptedProvider::new(vec![io_error(), io_error(), io_error(), Ok(Some(position(64)))]);
        provider.stall = true;
        let shut_down = provider.shut_down.clone();
        let mut channels = Driver::spawn(provider, 3);

        wait_closed(&mut channels.positions).await;
        assert!(channels.positions.borrow().is_none());
        assert!(shut_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn closed_provider_ends_the_task() {
        let mut provider =
            ScriptedProvider::new(vec![Ok(Some(position(64))), Err(ConnectionError::Closed)]);
        provider.stall = true;
        let mut channels = Driver::spawn(provider, 3);

        wait_closed(&mut channels.positions).await;
        assert_eq!(channels.positions.borrow().as_ref().unwrap().timestamp, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn io_errors_back_off() {
        let provider = ScriptedProvider::new(vec![
            Err(ConnectionError::from(std::io::Error::other("unplugged"))),
            Ok(Some(position(64))),
        ]);
        let start = tokio::time::Instant::now();
        let mut channels = Driver::spawn(provider, 10);

        wait_closed(&mut channels.positions).await;
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(channels.positions.borrow().is_some());
    }

    #[tokio::test]
    async fn cancel_shuts_provider_down() {
        let mut provider = ScriptedProvider::new(vec![Ok(Some(position(64)))]);
        provider.stall = true;
        let shut_down = provider.shut_down.clone();
        let mut channels = Driver::spawn(provider, 10);

        channels.positions.changed().await.unwrap();
        channels.cancel.cancel();
        wait_closed(&mut channels.positions).await;
        assert!(shut_down.load(Ordering::SeqCst));
    }
}
