//! Little-endian packing of register values.
//!
//! Register values on both buses are little-endian and between 1 and 8 bytes wide.
//! The width is taken from the length of the buffer.

/// Write the lowest `buffer.len()` bytes of `value` in little-endian order.
///
/// Bytes beyond the eighth are zero.
pub fn write_uint_le(buffer: &mut [u8], value: u64) {
	for (i, byte) in buffer.iter_mut().enumerate() {
		*byte = value.checked_shr(8 * i as u32).unwrap_or(0) as u8;
	}
}

/// Write a signed value in two's complement, truncated to `buffer.len()` bytes.
pub fn write_int_le(buffer: &mut [u8], value: i64) {
	write_uint_le(buffer, value as u64)
}

/// Encode the lowest `width` bytes of `value` as a new vector.
pub fn uint_to_bytes(value: u64, width: usize) -> Vec<u8> {
	let mut buffer = vec![0; width];
	write_uint_le(&mut buffer, value);
	buffer
}

/// Encode a signed value as `width` bytes of two's complement.
pub fn int_to_bytes(value: i64, width: usize) -> Vec<u8> {
	uint_to_bytes(value as u64, width)
}

/// Read an unsigned little-endian value of `buffer.len()` bytes.
///
/// Bytes beyond the eighth are ignored.
pub fn read_uint_le(buffer: &[u8]) -> u64 {
	buffer
		.iter()
		.take(8)
		.enumerate()
		.fold(0, |value, (i, &byte)| value | u64::from(byte) << (8 * i))
}

/// Read a signed little-endian value of `buffer.len()` bytes, sign-extending from the last byte.
pub fn read_int_le(buffer: &[u8]) -> i64 {
	let width = buffer.len().min(8);
	if width == 0 {
		return 0;
	}
	let raw = read_uint_le(buffer);
	let shift = 64 - 8 * width as u32;
	((raw << shift) as i64) >> shift
}
