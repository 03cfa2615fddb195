//! Async connections publishing decoded packets as streams
//!
//! [`LiveConnection`](live::LiveConnection) wraps a modem link,
//! [`ReplayConnection`](replay::ReplayConnection) a recorded capture. Both
//! run a driver task that owns the packet source and expose the same
//! subscription API.

pub mod live;
pub mod replay;


use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::stream::ThrottleExt;
use crate::types::{BeaconStatusEntry, PositionRecord, UpdateRate};

/// Position stream over the driver's watch channel.
///
/// WatchStream yields the current value immediately, which is `None` until
/// the first position arrives. Leading `None`s are skipped; the stream ends
/// when the driver task exits and drops its sender.
pub(crate) fn position_stream(
    positions: watch::Receiver<Option<Arc<PositionRecord>>>,
    rate: UpdateRate,
    packet_rate_hz: f64,
) -> impl Stream<Item = PositionRecord> + Send + 'static {
    let positions = WatchStream::new(positions)
        .skip_while(|opt| {
            let is_none = opt.is_none();
            async move { is_none }
        })
        .filter_map(|opt| async move { opt.map(|position| *position) });

    match rate.throttle_interval(packet_rate_hz) {
        None => positions.boxed(),
        Some(interval) => positions.throttle(interval).boxed(),
    }
}

/// Beacon list updates, current list first if one is known.
pub(crate) fn beacon_stream(
    beacons: watch::Receiver<Option<Arc<[BeaconStatusEntry]>>>,
) -> impl Stream<Item = Arc<[BeaconStatusEntry]>> + Send + 'static {
    WatchStream::new(beacons).filter_map(|opt| async move { opt }).boxed()
}
