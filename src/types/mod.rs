//! Core types for beacon protocol data.
//!
//! - [`Marker`] delimits packets on the wire
//! - [`ByteOrder`] selects the field byte order of the firmware's protocol revision
//! - [`RawPacket`] is one complete wire packet, kept for decoding and diagnostics
//! - [`DecodedPacket`] is either a [`PositionRecord`] or a list of [`BeaconStatusEntry`]
//! - [`UpdateRate`] throttles position streams
//!
//! ## Usage Example
//!
//! ```rust
//! use mmgps::types::{DecodedPacket, PositionRecord};
//!
//! // 6400 ticks of 1/64 s, coordinates in centimetres on the wire
//! let record = PositionRecord::from_raw(6400, 1234, -567, 89, 0);
//! assert_eq!(record.timestamp, 100.0);
//! assert_eq!(record.coordinates(), (12.34, -5.67, 0.89));
//!
//! let packet = DecodedPacket::Position(record);
//! assert_eq!(packet.type_code(), 0x0001);
//! ```

mod byte_order;
mod marker;
mod packet;
mod update_rate;

pub use byte_order::ByteOrder;
pub use marker::{DEFAULT_MARKER, Marker};
pub use packet::{BeaconStatusEntry, DecodedPacket, PositionRecord, RawPacket, hex_dump};
pub use update_rate::UpdateRate;
