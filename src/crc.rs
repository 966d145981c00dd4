//! CRC-16 used by Dynamixel protocol 2.0.
//!
//! Polynomial 0x8005, no reflection, no final XOR.

const POLYNOMIAL: u32 = 0x8005;

/// Update a CRC value with the given data.
///
/// Pass 0 as `crc` to start a new checksum.
pub fn calculate_crc(crc: u16, data: &[u8]) -> u16 {
	let mut crc = u32::from(crc);
	for &byte in data {
		crc ^= u32::from(byte) << 8;
		for _ in 0..8 {
			crc <<= 1;
			if crc & 0x1_0000 != 0 {
				crc ^= 0x1_0000 | POLYNOMIAL;
			}
		}
	}
	crc as u16
}
