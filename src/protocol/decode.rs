//! Packet validation and decoding

use tracing::trace;

use super::crc::{crc16, validate_crc16};
use super::{
    BEACON_ENTRY_LEN, BEACON_ENTRY_OFFSET, CRC_LEN, HEADER_LEN, MIN_PACKET_LEN,
    PACKET_TYPE_BEACON_STATUS, PACKET_TYPE_POSITION, POSITION_FIELDS_LEN,
};
use crate::DecodeError;
use crate::types::{BeaconStatusEntry, ByteOrder, DecodedPacket, PositionRecord};

/// Fixed header at the start of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Destination address, `0xFF` for broadcast
    pub address: u8,
    /// Packet type, `0x47` for streaming data
    pub packet_type: u8,
    /// Data code selecting the payload layout
    pub code: u16,
    /// Payload size declared by the sender
    pub payload_len: u8,
}

impl PacketHeader {
    pub fn parse(bytes: &[u8], byte_order: ByteOrder) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_LEN {
            return Err(DecodeError::Truncated { expected: HEADER_LEN, actual: bytes.len() });
        }
        Ok(Self {
            address: bytes[0],
            packet_type: bytes[1],
            code: read_u16(bytes, 2, byte_order)?,
            payload_len: bytes[4],
        })
    }
}

/// Stateless decoder for one raw packet.
///
/// The only configuration is the field byte order; decoding is otherwise a
/// pure function of the input bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Decoder {
    byte_order: ByteOrder,
}

impl Decoder {
    pub fn new(byte_order: ByteOrder) -> Self {
        Self { byte_order }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Validate and decode a complete wire packet (header through CRC).
    ///
    /// The checksum is verified before any structural decoding, since a
    /// corrupted packet can carry an arbitrary type code.
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedPacket, DecodeError> {
        if bytes.len() < MIN_PACKET_LEN {
            return Err(DecodeError::Truncated { expected: MIN_PACKET_LEN, actual: bytes.len() });
        }

        if !validate_crc16(bytes) {
            let (body, trailer) = bytes.split_at(bytes.len() - CRC_LEN);
            return Err(DecodeError::InvalidChecksum {
                computed: crc16(body),
                received: u16::from_le_bytes([trailer[0], trailer[1]]),
            });
        }

        let header = PacketHeader::parse(bytes, self.byte_order)?;
        let body = &bytes[..bytes.len() - CRC_LEN];
        trace!(code = header.code, len = bytes.len(), "Decoding packet");

        match header.code {
            PACKET_TYPE_POSITION => self.decode_position(body).map(DecodedPacket::Position),
            PACKET_TYPE_BEACON_STATUS => {
                self.decode_beacon_status(body).map(DecodedPacket::BeaconStatus)
            }
            code => Err(DecodeError::UnknownType(code)),
        }
    }

    fn decode_position(&self, body: &[u8]) -> Result<PositionRecord, DecodeError> {
        let required = HEADER_LEN + POSITION_FIELDS_LEN;
        if body.len() < required {
            return Err(DecodeError::Truncated {
                expected: required + CRC_LEN,
                actual: body.len() + CRC_LEN,
            });
        }

        // ts(u32) x(i16) y(i16) z(i16) flags(u8)
        let order = self.byte_order;
        let timestamp = read_u32(body, HEADER_LEN, order)?;
        let x = read_i16(body, HEADER_LEN + 4, order)?;
        let y = read_i16(body, HEADER_LEN + 6, order)?;
        let z = read_i16(body, HEADER_LEN + 8, order)?;
        let flags = body[HEADER_LEN + 10];

        Ok(PositionRecord::from_raw(timestamp, x, y, z, flags))
    }

    fn decode_beacon_status(&self, body: &[u8]) -> Result<Vec<BeaconStatusEntry>, DecodeError> {
        // Entry count is the first payload byte, entries follow back to back
        let count = *body.get(HEADER_LEN).ok_or(DecodeError::Truncated {
            expected: BEACON_ENTRY_OFFSET + CRC_LEN,
            actual: body.len() + CRC_LEN,
        })?;
        let required = BEACON_ENTRY_OFFSET + count as usize * BEACON_ENTRY_LEN;

        if body.len() < required {
            return Err(DecodeError::Truncated {
                expected: required + CRC_LEN,
                actual: body.len() + CRC_LEN,
            });
        }
        if body.len() > required {
            return Err(DecodeError::Malformed { count, expected: required, actual: body.len() });
        }

        let order = self.byte_order;
        (0..count as usize)
            .map(|i| {
                let offset = BEACON_ENTRY_OFFSET + i * BEACON_ENTRY_LEN;
                Ok(BeaconStatusEntry::from_raw(
                    body[offset],
                    read_i16(body, offset + 1, order)?,
                    read_i16(body, offset + 3, order)?,
                    read_i16(body, offset + 5, order)?,
                    body[offset + 7],
                ))
            })
            .collect()
    }
}

/// Bounds-checked field readers
fn field<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], DecodeError> {
    data.get(offset..offset + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(DecodeError::Truncated { expected: offset + N, actual: data.len() })
}

fn read_u16(data: &[u8], offset: usize, order: ByteOrder) -> Result<u16, DecodeError> {
    field::<2>(data, offset).map(|bytes| order.u16_from(bytes))
}

fn read_i16(data: &[u8], offset: usize, order: ByteOrder) -> Result<i16, DecodeError> {
    field::<2>(data, offset).map(|bytes| order.i16_from(bytes))
}

fn read_u32(data: &[u8], offset: usize, order: ByteOrder) -> Result<u32, DecodeError> {
    field::<4>(data, offset).map(|bytes| order.u32_from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::append_crc16;
    use crate::protocol::encode::Encoder;
    use crate::test_utils::{POSITION_FRAME, STATUS_FRAME};
    use proptest::prelude::*;

    fn with_crc(mut body: Vec<u8>) -> Vec<u8> {
        append_crc16(&mut body);
        body
    }

    #[test]
    fn decodes_captured_position_frame() {
        let packet = Decoder::default().decode(&POSITION_FRAME).unwrap();
        let DecodedPacket::Position(record) = packet else {
            panic!("expected position, got {packet:?}");
        };
        assert_eq!(record.timestamp, 100.0);
        assert_eq!(record.x, 12.34);
        assert_eq!(record.y, -5.67);
        assert_eq!(record.z, 0.89);
        assert_eq!(record.flags, 0x02);
    }

    #[test]
    fn decodes_captured_status_frame_in_payload_order() {
        let packet = Decoder::default().decode(&STATUS_FRAME).unwrap();
        let entries = packet.as_beacon_status().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], BeaconStatusEntry::from_raw(3, 100, 200, -50, 0));
        assert_eq!(entries[1].address, 4);
        assert_eq!(entries[1].coordinates(), (-15.0, 25.0, 3.0));
    }

    #[test]
    fn header_fields() {
        let header = PacketHeader::parse(&POSITION_FRAME, ByteOrder::Little).unwrap();
        assert_eq!(
            header,
            PacketHeader { address: 0xFF, packet_type: 0x47, code: 1, payload_len: 0x10 }
        );
    }

    #[test]
    fn checksum_is_checked_before_type() {
        let mut frame = with_crc(vec![0xFF, 0x47, 0x03, 0x00, 0x03, 0x01, 0x02, 0x03]);
        assert_eq!(Decoder::default().decode(&frame), Err(DecodeError::UnknownType(3)));

        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        assert!(matches!(
            Decoder::default().decode(&frame),
            Err(DecodeError::InvalidChecksum { .. })
        ));
    }

    #[test]
    fn invalid_checksum_reports_both_values() {
        let mut frame = POSITION_FRAME.to_vec();
        frame[21] = 0x00;
        frame[22] = 0x00;
        assert_eq!(
            Decoder::default().decode(&frame),
            Err(DecodeError::InvalidChecksum { computed: 0x2AFD, received: 0x0000 })
        );
    }

    #[test]
    fn short_packets_are_truncated() {
        let decoder = Decoder::default();
        assert_eq!(
            decoder.decode(&[0xFF, 0x47, 0x01]),
            Err(DecodeError::Truncated { expected: 6, actual: 3 })
        );

        // Valid checksum but only 4 of the 11 position field bytes
        let frame = with_crc(vec![0xFF, 0x47, 0x01, 0x00, 0x04, 0x00, 0x19, 0x00, 0x00]);
        assert_eq!(decoder.decode(&frame), Err(DecodeError::Truncated { expected: 18, actual: 11 }));
    }

    #[test]
    fn empty_beacon_list_decodes() {
        let frame = [0xFF, 0x47, 0x02, 0x00, 0x01, 0x00, 0xA0, 0x33];
        assert_eq!(Decoder::default().decode(&frame), Ok(DecodedPacket::BeaconStatus(vec![])));
    }

    #[test]
    fn beacon_count_must_match_payload() {
        let decoder = Decoder::default();

        // Declares 2 entries, carries 1
        let mut body = vec![0xFF, 0x47, 0x02, 0x00, 0x09, 0x02];
        body.extend_from_slice(&[3, 100, 0, 200, 0, 206, 255, 0]);
        assert_eq!(
            decoder.decode(&with_crc(body.clone())),
            Err(DecodeError::Truncated { expected: 24, actual: 16 })
        );

        // Declares 0 entries, carries 1
        body[5] = 0;
        assert_eq!(
            decoder.decode(&with_crc(body)),
            Err(DecodeError::Malformed { count: 0, expected: 6, actual: 14 })
        );
    }

    #[test]
    fn big_endian_revision() {
        let record = PositionRecord::from_raw(6400, 1234, -567, 89, 2);
        let frame = Encoder::new(ByteOrder::Big).position(&record);
        assert_eq!(&frame[2..4], &[0x00, 0x01]);

        let decoded = Decoder::new(ByteOrder::Big).decode(&frame).unwrap();
        assert_eq!(decoded, DecodedPacket::Position(record));

        // Little-endian decoder reads type 0x0100
        assert_eq!(Decoder::default().decode(&frame), Err(DecodeError::UnknownType(0x0100)));
    }

    proptest! {
        #[test]
        fn position_fields_scale(
            ts in any::<u32>(),
            x in any::<i16>(),
            y in any::<i16>(),
            z in any::<i16>(),
            flags in any::<u8>(),
        ) {
            let mut body = vec![0xFF, 0x47, 0x01, 0x00, 0x10];
            body.extend_from_slice(&ts.to_le_bytes());
            body.extend_from_slice(&x.to_le_bytes());
            body.extend_from_slice(&y.to_le_bytes());
            body.extend_from_slice(&z.to_le_bytes());
            body.push(flags);
            body.extend_from_slice(&[0; 5]);

            let decoded = Decoder::default().decode(&with_crc(body)).unwrap();
            let record = *decoded.as_position().unwrap();
            prop_assert_eq!(record.timestamp, ts as f64 / 64.0);
            prop_assert_eq!(record.x, x as f64 / 100.0);
            prop_assert_eq!(record.y, y as f64 / 100.0);
            prop_assert_eq!(record.z, z as f64 / 100.0);
            prop_assert_eq!(record.flags, flags);
        }

        #[test]
        fn status_lists_decode_exact_count(
            raw in prop::collection::vec((any::<u8>(), any::<i16>(), any::<i16>(), any::<i16>()), 0..30)
        ) {
            let mut body = vec![0xFF, 0x47, 0x02, 0x00, (1 + raw.len() * 8) as u8, raw.len() as u8];
            for (address, x, y, z) in &raw {
                body.push(*address);
                body.extend_from_slice(&x.to_le_bytes());
                body.extend_from_slice(&y.to_le_bytes());
                body.extend_from_slice(&z.to_le_bytes());
                body.push(0);
            }

            let decoded = Decoder::default().decode(&with_crc(body)).unwrap();
            let entries = decoded.as_beacon_status().unwrap();
            prop_assert_eq!(entries.len(), raw.len());
            for (entry, (address, x, y, z)) in entries.iter().zip(&raw) {
                prop_assert_eq!(*entry, BeaconStatusEntry::from_raw(*address, *x, *y, *z, 0));
            }
        }
    }
}
