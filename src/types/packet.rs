//! Raw and decoded packet types

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Marker;

/// Render bytes as space separated uppercase hex pairs (`"FF 47 01"`).
pub fn hex_dump(bytes: &[u8]) -> String {
    let encoded = hex::encode_upper(bytes);
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, digit) in encoded.chars().enumerate() {
        if i > 0 && i % 2 == 0 {
            out.push(' ');
        }
        out.push(digit);
    }
    out
}

/// One complete wire packet as handed to the decoder: header, payload and
/// CRC16 trailer, without the closing marker.
///
/// The two marker bytes double as the first two header bytes (destination
/// address and packet type), so a packet built from a framed payload starts
/// with the marker again.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RawPacket {
    bytes: Bytes,
}

impl RawPacket {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// Rebuild the wire packet from a marker-stripped frame payload.
    pub fn from_frame(marker: &Marker, payload: &[u8]) -> Self {
        let mut bytes = BytesMut::with_capacity(marker.len() + payload.len());
        bytes.put_slice(marker.as_bytes());
        bytes.put_slice(payload);
        Self { bytes: bytes.freeze() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex_dump(&self.bytes)
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl AsRef<[u8]> for RawPacket {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for RawPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for RawPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawPacket({})", self.to_hex())
    }
}

/// Live position of a mobile beacon (hedgehog), packet type `0x0001`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Seconds, wire unit is 1/64 s
    pub timestamp: f64,
    /// Metres, wire unit is 1/100
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Status flags as sent by the modem
    pub flags: u8,
}

impl PositionRecord {
    /// Wire ticks per second of the timestamp field.
    pub const TIMESTAMP_SCALE: f64 = 64.0;

    /// Wire units per metre of the coordinate fields.
    pub const COORDINATE_SCALE: f64 = 100.0;

    /// Apply fixed-point scaling to raw wire fields.
    pub fn from_raw(timestamp: u32, x: i16, y: i16, z: i16, flags: u8) -> Self {
        Self {
            timestamp: timestamp as f64 / Self::TIMESTAMP_SCALE,
            x: x as f64 / Self::COORDINATE_SCALE,
            y: y as f64 / Self::COORDINATE_SCALE,
            z: z as f64 / Self::COORDINATE_SCALE,
            flags,
        }
    }

    pub fn coordinates(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }
}

/// One stationary beacon in a frozen-beacons list, packet type `0x0002`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeaconStatusEntry {
    pub address: u8,
    /// Metres, wire unit is 1/100
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub reserved: u8,
}

impl BeaconStatusEntry {
    pub fn from_raw(address: u8, x: i16, y: i16, z: i16, reserved: u8) -> Self {
        Self {
            address,
            x: x as f64 / PositionRecord::COORDINATE_SCALE,
            y: y as f64 / PositionRecord::COORDINATE_SCALE,
            z: z as f64 / PositionRecord::COORDINATE_SCALE,
            reserved,
        }
    }

    pub fn coordinates(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }
}

/// A successfully decoded packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecodedPacket {
    Position(PositionRecord),
    /// Frozen beacons in payload order; may be empty
    BeaconStatus(Vec<BeaconStatusEntry>),
}

impl DecodedPacket {
    /// Wire type code this packet was decoded from.
    pub fn type_code(&self) -> u16 {
        match self {
            DecodedPacket::Position(_) => crate::protocol::PACKET_TYPE_POSITION,
            DecodedPacket::BeaconStatus(_) => crate::protocol::PACKET_TYPE_BEACON_STATUS,
        }
    }

    pub fn as_position(&self) -> Option<&PositionRecord> {
        match self {
            DecodedPacket::Position(record) => Some(record),
            DecodedPacket::BeaconStatus(_) => None,
        }
    }

    pub fn as_beacon_status(&self) -> Option<&[BeaconStatusEntry]> {
        match self {
            DecodedPacket::Position(_) => None,
            DecodedPacket::BeaconStatus(entries) => Some(entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hex_dump_formats_like_the_modem_tools() {
        assert_eq!(hex_dump(&[]), "");
        assert_eq!(hex_dump(&[0x0F]), "0F");
        assert_eq!(hex_dump(&[0xFF, 0x47, 0x01, 0x00]), "FF 47 01 00");
    }

    #[test]
    fn raw_packet_from_frame_reattaches_marker() {
        let packet = RawPacket::from_frame(&Marker::default(), &[0x01, 0x00, 0x10]);
        assert_eq!(packet.as_bytes(), &[0xFF, 0x47, 0x01, 0x00, 0x10]);
        assert_eq!(packet.len(), 5);
        assert_eq!(format!("{:?}", packet), "RawPacket(FF 47 01 00 10)");
    }

    #[test]
    fn packet_accessors_match_variant() {
        let position = DecodedPacket::Position(PositionRecord::from_raw(64, 100, 200, 300, 0));
        assert_eq!(position.type_code(), 1);
        assert!(position.as_beacon_status().is_none());
        assert_eq!(position.as_position().map(|p| p.timestamp), Some(1.0));

        let status = DecodedPacket::BeaconStatus(vec![]);
        assert_eq!(status.type_code(), 2);
        assert_eq!(status.as_beacon_status().map(|e| e.len()), Some(0));
    }

    proptest! {
        #[test]
        fn position_scaling_matches_fixed_point_units(
            ts in any::<u32>(),
            x in any::<i16>(),
            y in any::<i16>(),
            z in any::<i16>(),
            flags in any::<u8>(),
        ) {
            let record = PositionRecord::from_raw(ts, x, y, z, flags);
            prop_assert_eq!(record.timestamp, ts as f64 / 64.0);
            prop_assert_eq!(record.x, x as f64 / 100.0);
            prop_assert_eq!(record.y, y as f64 / 100.0);
            prop_assert_eq!(record.z, z as f64 / 100.0);
            prop_assert_eq!(record.flags, flags);
        }

        #[test]
        fn beacon_entry_scaling_matches_fixed_point_units(
            address in any::<u8>(),
            x in any::<i16>(),
            y in any::<i16>(),
            z in any::<i16>(),
        ) {
            let entry = BeaconStatusEntry::from_raw(address, x, y, z, 0);
            prop_assert_eq!(entry.address, address);
            prop_assert_eq!(entry.coordinates(), (x as f64 / 100.0, y as f64 / 100.0, z as f64 / 100.0));
        }
    }
}
