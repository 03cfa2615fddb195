//! Wire bytes in, typed packets out, through the public API only.

use mmgps::protocol::{Encoder, append_crc16, wire_stream};
use mmgps::source::ReplaySource;
use mmgps::{
    Beacon, BeaconConfig, BeaconStatusEntry, ByteOrder, ConnectionError, DecodeError,
    DecodedPacket, Decoder, Marker, PositionRecord,
};

const MARKER: [u8; 2] = [0xFF, 0x47];

/// `FF 47 01 00 10` header, then ts 6400, x 1234, y -567, z 89, flags 2.
fn position_packet() -> Vec<u8> {
    let mut packet = vec![0xFF, 0x47, 0x01, 0x00, 0x10];
    packet.extend_from_slice(&6400u32.to_le_bytes());
    packet.extend_from_slice(&1234i16.to_le_bytes());
    packet.extend_from_slice(&(-567i16).to_le_bytes());
    packet.extend_from_slice(&89i16.to_le_bytes());
    packet.push(0x02);
    packet.extend_from_slice(&[0x05, 0x00, 0x00, 0x00, 0x00]);
    append_crc16(&mut packet);
    packet
}

fn beacon_over(bytes: Vec<u8>) -> Beacon<ReplaySource> {
    Beacon::new(ReplaySource::from_bytes(bytes))
}

#[test]
fn position_stream_decodes_to_scaled_record() {
    let mut stream = position_packet();
    stream.extend_from_slice(&MARKER);

    let mut beacon = beacon_over(stream);
    let packet = beacon.read_packet().expect("read").expect("packet");

    assert_eq!(
        packet,
        DecodedPacket::Position(PositionRecord {
            timestamp: 100.0,
            x: 12.34,
            y: -5.67,
            z: 0.89,
            flags: 0x02,
        })
    );
    assert!(matches!(beacon.read_packet(), Err(ConnectionError::Closed)));
}

#[test]
fn unknown_type_code_is_reported() {
    let mut stream = vec![0xFF, 0x47, 0x03, 0x00, 0x03, 0x01, 0x02, 0x03];
    append_crc16(&mut stream);
    stream.extend_from_slice(&MARKER);

    let mut beacon = beacon_over(stream);
    match beacon.read_packet() {
        Err(ConnectionError::Decode { source, packet }) => {
            assert_eq!(source, DecodeError::UnknownType(3));
            assert_eq!(&packet.as_bytes()[..2], &MARKER);
        }
        other => panic!("expected UnknownType(3), got {other:?}"),
    }
}

#[test]
fn fragmented_stream_survives_noise_and_corruption() {
    let encoder = Encoder::default();
    let entries = [
        BeaconStatusEntry::from_raw(1, 0, 0, 250, 0),
        BeaconStatusEntry::from_raw(2, 800, 0, 250, 0),
    ];
    let good = position_packet();
    let mut corrupted = good.clone();
    corrupted[7] ^= 0x40;

    let mut stream = vec![0x13, 0x37, 0xFF];
    stream.extend_from_slice(&wire_stream(
        [good.clone(), corrupted, encoder.beacon_status(&entries), good],
        &Marker::default(),
    ));

    let mut beacon = beacon_over(stream);
    let mut packets = beacon.packets();
    let decoded: Vec<DecodedPacket> = packets.by_ref().collect();

    assert_eq!(packets.discarded(), 1);
    assert_eq!(decoded.len(), 3);
    assert_eq!(decoded[1].as_beacon_status(), Some(&entries[..]));
    assert!(beacon.is_closed());
}

#[test]
fn big_endian_revision_is_configurable() {
    let record = PositionRecord::from_raw(128, -100, 250, 1000, 0x01);
    let packet = Encoder::new(ByteOrder::Big).position(&record);
    let stream = wire_stream([packet.clone()], &Marker::default());

    let config = BeaconConfig::default().with_byte_order(ByteOrder::Big);
    let mut beacon = Beacon::with_config(ReplaySource::from_bytes(stream), config).expect("valid config");
    assert_eq!(beacon.read_packet().expect("read"), Some(DecodedPacket::Position(record)));

    // The same bytes read as little endian carry an unknown type code
    let little = Decoder::new(ByteOrder::Little).decode(&packet);
    assert!(matches!(little, Err(DecodeError::UnknownType(0x0100))));
}
