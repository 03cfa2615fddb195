//! Decoder for the MarvelMind indoor positioning serial protocol.
//!
//! A MarvelMind modem streams binary packets over a serial link: live
//! hedgehog positions and lists of frozen (stationary) beacons. Each packet
//! is delimited by a two-byte marker and protected by a CRC16. This crate
//! turns that byte stream into typed records.
//!
//! # Pipeline
//!
//! ```text
//! ByteSource ──► Framer ──► RawPacket ──► Decoder ──► DecodedPacket
//!  (1 byte)    (markers)                 (CRC16, layout)
//! ```
//!
//! - [`source`]: byte-at-a-time sources over any `std::io::Read` or a capture
//! - [`Framer`]: reassembles marker-delimited packets
//! - [`Decoder`]: validates CRC16 and decodes position and beacon packets
//! - [`Beacon`]: blocking reader composing the two, with out-of-band close
//! - [`LiveConnection`] / [`ReplayConnection`]: async streams on top
//!
//! Opening and configuring the serial port is left to the application.
//!
//! # Quick Start
//!
//! ## Blocking
//!
//! ```rust,no_run
//! use mmgps::{Beacon, BeaconConfig, DecodedPacket, source::ReaderSource};
//!
//! fn main() -> mmgps::Result<()> {
//!     // Port opened and configured by the application, with a read timeout
//!     let port = std::fs::File::open("/dev/ttyACM0")?;
//!     let config = BeaconConfig::load("beacon.yaml")?;
//!     let mut beacon = Beacon::with_config(ReaderSource::new(port), config)?;
//!     beacon.sync();
//!
//!     for packet in beacon.packets() {
//!         match packet {
//!             DecodedPacket::Position(p) => println!("{:.3}s: {:.2} {:.2} {:.2}", p.timestamp, p.x, p.y, p.z),
//!             DecodedPacket::BeaconStatus(list) => println!("{} frozen beacons", list.len()),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Async replay
//!
//! ```rust,no_run
//! use mmgps::{BeaconConfig, MmGps, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> mmgps::Result<()> {
//!     let connection = MmGps::open("session.bin", BeaconConfig::default()).await?;
//!     let mut positions = connection.subscribe(UpdateRate::Max(4));
//!
//!     while let Some(position) = positions.next().await {
//!         println!("{:?}", position.coordinates());
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Framing and decoding pipeline
pub mod beacon;
pub mod config;
pub mod framer;
pub mod protocol;
pub mod source;

// Stream-based async architecture
pub mod connection;
pub mod driver;
pub mod provider;
pub mod providers;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

pub use beacon::{Beacon, CloseHandle, Packets};
pub use config::BeaconConfig;
pub use framer::Framer;
pub use protocol::{Decoder, crc16, validate_crc16};

// Main API exports
pub use connection::live::LiveConnection;
pub use connection::replay::ReplayConnection;

/// Unified entry point for async beacon connections.
///
/// # Examples
///
/// ## Live link
///
/// The port needs a read timeout so that closing the connection is
/// observed while the line is silent.
/// ```rust,no_run
/// use mmgps::{BeaconConfig, MmGps, source::ReaderSource};
///
/// #[tokio::main]
/// async fn main() -> mmgps::Result<()> {
///     let port = std::fs::File::open("/dev/ttyACM0")?;
///     let connection = MmGps::connect(ReaderSource::new(port), BeaconConfig::default()).await?;
///     // Use connection...
///     Ok(())
/// }
/// ```
pub struct MmGps;

impl MmGps {
    /// Stream packets from an open modem link.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub async fn connect<S>(source: S, config: BeaconConfig) -> Result<LiveConnection>
    where
        S: source::ByteSource + Send + 'static,
    {
        let beacon = Beacon::with_config(source, config)?;
        LiveConnection::connect(beacon).await
    }

    /// Replay a raw serial capture at the configured packet rate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the configuration is
    /// invalid.
    pub async fn open<P: AsRef<std::path::Path>>(
        path: P,
        config: BeaconConfig,
    ) -> Result<ReplayConnection> {
        ReplayConnection::open(path, config).await
    }
}
