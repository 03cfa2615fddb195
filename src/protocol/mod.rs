//! MarvelMind streaming packet format
//!
//! Every packet the modem streams has the same envelope:
//!
//! ```text
//! +------+------+-----------+------+-----------------+-----------+
//! | 0xFF | 0x47 | code (16) | size | payload[size]   | CRC16 LE  |
//! +------+------+-----------+------+-----------------+-----------+
//!   addr   type   u16         u8
//! ```
//!
//! `0xFF 0x47` doubles as the framing marker, so consecutive packets are
//! separated by it. The CRC covers everything from the address byte through
//! the payload.
//!
//! ## Supported payloads
//!
//! | Code     | Payload                                                         |
//! |----------|-----------------------------------------------------------------|
//! | `0x0001` | `ts u32` (1/64 s), `x y z i16` (cm), `flags u8`, 5 more bytes   |
//! | `0x0002` | `count u8`, then `count` × (`addr u8`, `x y z i16` (cm), `u8`)  |
//!
//! Field byte order follows the firmware's protocol revision, see
//! [`ByteOrder`](crate::types::ByteOrder).

pub mod crc;
mod decode;
pub mod encode;

pub use crc::{append_crc16, crc16, validate_crc16};
pub use decode::{Decoder, PacketHeader};
pub use encode::{Encoder, MAX_BEACON_ENTRIES, wire_stream};

/// Live hedgehog position.
pub const PACKET_TYPE_POSITION: u16 = 0x0001;

/// Frozen (stationary) beacon coordinates.
pub const PACKET_TYPE_BEACON_STATUS: u16 = 0x0002;

/// Address, type, code and size bytes.
pub const HEADER_LEN: usize = 5;

/// Header plus the first payload byte; nothing shorter is decoded.
pub const MIN_PACKET_LEN: usize = 6;

pub const CRC_LEN: usize = 2;

/// Bytes of the position payload that are decoded.
pub const POSITION_FIELDS_LEN: usize = 11;

/// Position payload size sent by hedgehogs.
pub const POSITION_PAYLOAD_LEN: usize = 16;

pub const BEACON_ENTRY_OFFSET: usize = 6;
pub const BEACON_ENTRY_LEN: usize = 8;
