//! Wire frame construction
//!
//! Builds packets the way a modem sends them. Used to synthesize captures for
//! replay, tests and benchmarks; there is no path for writing to a device.

use bytes::{BufMut, Bytes, BytesMut};

use super::crc::append_crc16;
use super::{BEACON_ENTRY_LEN, PACKET_TYPE_BEACON_STATUS, PACKET_TYPE_POSITION, POSITION_PAYLOAD_LEN};
use crate::types::{BeaconStatusEntry, ByteOrder, DEFAULT_MARKER, Marker, PositionRecord};

/// Largest frozen-beacons list whose payload (count byte plus 8 bytes per
/// entry) fits the one-byte size field.
pub const MAX_BEACON_ENTRIES: usize = (u8::MAX as usize - 1) / BEACON_ENTRY_LEN;

/// Encodes decoded records back into wire packets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Encoder {
    byte_order: ByteOrder,
}

impl Encoder {
    pub fn new(byte_order: ByteOrder) -> Self {
        Self { byte_order }
    }

    /// Complete packet: address and type bytes, code, size, payload, CRC16.
    ///
    /// The size byte saturates at 255 for longer payloads; such packets
    /// still decode since layouts are read from their own count fields.
    pub fn frame(&self, code: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(5 + payload.len() + 2);
        buf.extend_from_slice(&DEFAULT_MARKER);
        buf.extend_from_slice(&self.byte_order.u16_bytes(code));
        buf.push(payload.len().min(u8::MAX as usize) as u8);
        buf.extend_from_slice(payload);
        append_crc16(&mut buf);
        buf
    }

    /// Position packet with the 16-byte payload hedgehogs send. Trailing
    /// bytes not modelled by [`PositionRecord`] are zero.
    pub fn position(&self, record: &PositionRecord) -> Vec<u8> {
        let order = self.byte_order;
        let mut payload = Vec::with_capacity(POSITION_PAYLOAD_LEN);
        payload.extend_from_slice(&order.u32_bytes(to_ticks(record.timestamp)));
        payload.extend_from_slice(&order.i16_bytes(to_centi(record.x)));
        payload.extend_from_slice(&order.i16_bytes(to_centi(record.y)));
        payload.extend_from_slice(&order.i16_bytes(to_centi(record.z)));
        payload.push(record.flags);
        payload.resize(POSITION_PAYLOAD_LEN, 0);
        self.frame(PACKET_TYPE_POSITION, &payload)
    }

    /// Frozen-beacons packet. At most [`MAX_BEACON_ENTRIES`] entries are
    /// encoded, the most whose payload length fits the size byte.
    pub fn beacon_status(&self, entries: &[BeaconStatusEntry]) -> Vec<u8> {
        let order = self.byte_order;
        let entries = &entries[..entries.len().min(MAX_BEACON_ENTRIES)];
        let mut payload = Vec::with_capacity(1 + entries.len() * 8);
        payload.push(entries.len() as u8);
        for entry in entries {
            payload.push(entry.address);
            payload.extend_from_slice(&order.i16_bytes(to_centi(entry.x)));
            payload.extend_from_slice(&order.i16_bytes(to_centi(entry.y)));
            payload.extend_from_slice(&order.i16_bytes(to_centi(entry.z)));
            payload.push(entry.reserved);
        }
        self.frame(PACKET_TYPE_BEACON_STATUS, &payload)
    }
}

/// Join packets into a byte stream as seen on the serial line.
///
/// Packets already start with the marker bytes; a trailing marker is
/// appended so the last packet is terminated.
pub fn wire_stream<I, P>(packets: I, marker: &Marker) -> Bytes
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    let mut stream = BytesMut::new();
    for packet in packets {
        stream.put_slice(packet.as_ref());
    }
    stream.put_slice(marker.as_bytes());
    stream.freeze()
}

fn to_ticks(seconds: f64) -> u32 {
    (seconds * PositionRecord::TIMESTAMP_SCALE).round() as u32
}

fn to_centi(metres: f64) -> i16 {
    (metres * PositionRecord::COORDINATE_SCALE).round() as i16
}
