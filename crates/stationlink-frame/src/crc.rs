//! Frame checksums.
//!
//! The header is guarded by CRC-8 (poly 0x07, init 0, no reflection) and the
//! body by CRC-16/ARC (reflected poly 0x8005, init 0). Both use the
//! 256-entry lookup tables generated by the `crc` crate.

use crc::{Crc, CRC_16_ARC, CRC_8_SMBUS};

const HEADER_CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);
const BODY_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// CRC-8 used for the magic + length prefix.
pub fn crc8(data: &[u8]) -> u8 {
    HEADER_CRC.checksum(data)
}

/// CRC-16 used for the whole frame body, stored little-endian.
pub fn crc16(data: &[u8]) -> u16 {
    BODY_CRC.checksum(data)
}
