//! Provider trait for packet sources

use crate::Result;
use crate::types::DecodedPacket;

/// Asynchronous source of decoded packets
///
/// Providers abstract over live links and capture replay and handle their
/// own pacing: a live provider waits for the modem, a replay provider
/// releases packets at the nominal packet rate.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Get the next decoded packet
    ///
    /// Returns:
    /// - `Ok(Some(packet))` - Packet decoded
    /// - `Ok(None)` - Source closed (normal termination)
    /// - `Err(e)` - A packet was rejected or the source failed
    ///
    /// Read timeouts are not errors; providers keep waiting through them.
    async fn next_packet(&mut self) -> Result<Option<DecodedPacket>>;

    /// Nominal packet rate in Hz
    fn packet_rate(&self) -> f64;

    /// Release the underlying source, interrupting any blocked read.
    ///
    /// Called by the driver when it is cancelled. Must be idempotent.
    fn shutdown(&mut self) {}
}
