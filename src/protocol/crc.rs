//! CRC16 used by MarvelMind modems
//!
//! CRC-16/MODBUS: initial value `0xFFFF`, reflected polynomial `0xA001`, no
//! final XOR. The modem appends the checksum little-endian, so running the
//! CRC over a packet including its trailer yields zero.

const INITIAL: u16 = 0xFFFF;
const POLYNOMIAL: u16 = 0xA001;

/// Compute the CRC16 of `bytes`.
pub fn crc16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(INITIAL, |crc, byte| crc16_update(crc, *byte))
}

pub(crate) fn crc16_update(crc: u16, byte: u8) -> u16 {
    let mut crc = crc ^ byte as u16;
    for _ in 0..8 {
        let odd = crc & 0x0001 != 0;
        crc >>= 1;
        if odd {
            crc ^= POLYNOMIAL;
        }
    }
    crc
}

/// True when `bytes` ends with the CRC16 of everything before it.
pub fn validate_crc16(bytes: &[u8]) -> bool {
    crc16(bytes) == 0
}

/// Append the little-endian CRC16 of `buf` to it.
pub fn append_crc16(buf: &mut Vec<u8>) {
    let crc = crc16(buf);
    buf.extend_from_slice(&crc.to_le_bytes());
}
