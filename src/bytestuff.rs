//! Byte-stuffing and de-stuffing of Dynamixel protocol 2.0 parameters.
//!
//! The header `[0xFF, 0xFF, 0xFD]` may not appear inside a packet body,
//! so every occurrence in the parameters is followed by an extra `0xFD`.

pub const PATTERN: [u8; 4] = [0xFF, 0xFF, 0xFD, 0xFD];

/// Advance the pattern matcher by one byte.
///
/// The state is the number of leading `PATTERN` bytes seen at the end of the input so far.
fn next_state(state: usize, byte: u8) -> usize {
	match (state, byte) {
		(0 | 1, 0xFF) => state + 1,
		(2, 0xFF) => 2,
		(2, 0xFD) => 3,
		(3, 0xFD) => 4,
		(_, 0xFF) => 1,
		_ => 0,
	}
}

/// Remove byte-stuffing in-place.
///
/// All patterns of `[0xFF, 0xFF, 0xFD, 0xFD]` will be replaced with `[0xFF, 0xFF, 0xFD]`.
/// Returns the new length of the data.
#[must_use]
pub fn unstuff_inplace(data: &mut [u8]) -> usize {
	let mut deleted = 0;
	let mut state = 0;

	for i in 0..data.len() {
		state = next_state(state, data[i]);
		if state == 4 {
			state = 0;
			deleted += 1;
		} else if deleted > 0 {
			data[i - deleted] = data[i]
		}
	}

	data.len() - deleted
}

/// Remove byte-stuffing from a vector.
pub fn unstuff(mut data: Vec<u8>) -> Vec<u8> {
	let len = unstuff_inplace(&mut data);
	data.truncate(len);
	data
}

/// Calculate the amount of stuffing bytes required for specific data.
pub fn stuffing_required(data: &[u8]) -> usize {
	let mut state = 0;
	let mut count = 0;
	for &byte in data {
		state = next_state(state, byte);
		if state == 3 {
			state = 0;
			count += 1;
		}
	}

	count
}

/// Apply byte-stuffing, producing a new vector.
pub fn stuff(data: &[u8]) -> Vec<u8> {
	let mut output = Vec::with_capacity(data.len() + stuffing_required(data));
	let mut state = 0;
	for &byte in data {
		output.push(byte);
		state = next_state(state, byte);
		if state == 3 {
			output.push(PATTERN[3]);
			state = 0;
		}
	}
	output
}
