//! Futaba short packet protocol (RS30x series).
//!
//! A short packet looks like `[0xFA, 0xAF, id, flag, address, length, count, data.., checksum]`.
//! The checksum is the XOR of all bytes from `id` up to and including the data.
//! Replies use the same layout with the header `[0xFD, 0xDF]`.

use super::{Codec, Command, Status};
use crate::error::{InvalidChecksum, InvalidHeaderPrefix, InvalidLength, InvalidParameter};
use crate::Error;

/// Header of a command packet.
pub const HEADER: [u8; 2] = [0xFA, 0xAF];

/// Header of a reply packet.
pub const REPLY_HEADER: [u8; 2] = [0xFD, 0xDF];

/// Index of the first data byte in a packet.
pub const DATA_INDEX: usize = 7;

/// Header, id, flag, address, length, count and checksum.
pub const OVERHEAD: usize = 8;

pub const MIN_SERVO_ID: u8 = 1;
pub const MAX_SERVO_ID: u8 = 127;

#[rustfmt::skip]
pub mod flag {
	pub const NONE:           u8 = 0x00;
	pub const RESET_MEMORY:   u8 = 0x10;
	pub const REBOOT:         u8 = 0x20;
	pub const WRITE_ROM:      u8 = 0x40;
	/// Return the memory map range selected by address and length.
	pub const READ_RANGE:     u8 = 0x0F;
}

/// Address used for whole-memory operations like writing the ROM.
pub const ADDRESS_ALL: u8 = 0xFF;

/// The Futaba short packet codec.
pub struct FutabaCodec;

/// Check that a servo ID can be addressed on a Futaba bus.
pub fn check_servo_id(servo_id: u8) -> Result<u8, InvalidParameter> {
	InvalidParameter::check_range("servo ID", servo_id, MIN_SERVO_ID, MAX_SERVO_ID)
}

/// Compute the checksum of a packet without its trailing checksum byte.
pub fn checksum(packet: &[u8]) -> u8 {
	packet.iter().skip(2).fold(0, |sum, byte| sum ^ byte)
}

fn check_data_len(len: usize) -> Result<u8, InvalidParameter> {
	u8::try_from(len).map_err(|_| InvalidParameter {
		name: "data length",
		message: format!("{} bytes do not fit in a short packet", len),
	})
}

impl FutabaCodec {
	/// Encode a short packet with an explicit length field.
	pub fn encode_with_length(servo_id: u8, flag: u8, address: u8, length: u8, count: u8, data: &[u8]) -> Vec<u8> {
		let mut packet = Vec::with_capacity(OVERHEAD + data.len());
		packet.extend_from_slice(&HEADER);
		packet.extend_from_slice(&[servo_id, flag, address, length, count]);
		packet.extend_from_slice(data);
		packet.push(checksum(&packet));
		packet
	}

	/// Encode a short packet where the length field is the size of `data`.
	pub fn encode(servo_id: u8, flag: u8, address: u8, count: u8, data: &[u8]) -> Result<Vec<u8>, InvalidParameter> {
		let length = check_data_len(data.len())?;
		Ok(Self::encode_with_length(servo_id, flag, address, length, count, data))
	}

	/// A write of `data` to the memory map of a single servo. Futaba servos do not answer writes.
	pub fn write(servo_id: u8, address: u8, data: &[u8]) -> Result<Command, Error> {
		let servo_id = check_servo_id(servo_id)?;
		Ok(Command::no_response(Self::encode(servo_id, flag::NONE, address, 1, data)?))
	}

	/// A request for `length` bytes of the memory map.
	pub fn read(servo_id: u8, address: u8, length: u8) -> Result<Command, Error> {
		let servo_id = check_servo_id(servo_id)?;
		Ok(Command::single(Self::encode_with_length(
			servo_id,
			flag::READ_RANGE,
			address,
			length,
			0,
			&[],
		)))
	}

	/// A command that only sets a flag, like writing the ROM or resetting the memory map.
	pub fn flag_only(servo_id: u8, flag: u8) -> Result<Command, Error> {
		let servo_id = check_servo_id(servo_id)?;
		Ok(Command::no_response(Self::encode_with_length(
			servo_id,
			flag,
			ADDRESS_ALL,
			0,
			0,
			&[],
		)))
	}

	/// Encode a burst write, which writes the same address range on multiple servos.
	///
	/// All entries must carry the same amount of data.
	pub fn encode_burst(address: u8, entries: &[(u8, Vec<u8>)]) -> Result<Vec<u8>, InvalidParameter> {
		let data_len = entries.first().map(|(_, data)| data.len()).unwrap_or(0);
		if let Some((servo_id, data)) = entries.iter().find(|(_, data)| data.len() != data_len) {
			return Err(InvalidParameter {
				name: "burst data",
				message: format!(
					"servo {} has {} bytes of data, expected {}",
					servo_id,
					data.len(),
					data_len
				),
			});
		}
		let per_servo_len = check_data_len(data_len + 1)?;
		let count = check_data_len(entries.len())?;

		let mut packet = Vec::with_capacity(OVERHEAD + entries.len() * usize::from(per_servo_len));
		packet.extend_from_slice(&HEADER);
		packet.extend_from_slice(&[0, flag::NONE, address, per_servo_len, count]);
		for (servo_id, data) in entries {
			packet.push(check_servo_id(*servo_id)?);
			packet.extend_from_slice(data);
		}
		packet.push(checksum(&packet));
		Ok(packet)
	}

	/// A burst write. Futaba servos do not answer it.
	pub fn burst_write(address: u8, entries: &[(u8, Vec<u8>)]) -> Result<Command, Error> {
		Ok(Command::no_response(Self::encode_burst(address, entries)?))
	}
}

impl Codec for FutabaCodec {
	const NAME: &'static str = "Futaba";

	fn frame_len(buffer: &[u8]) -> Option<usize> {
		if buffer.len() < 6 {
			None
		} else {
			Some(OVERHEAD + usize::from(buffer[5]))
		}
	}

	/// A reply is complete when its size matches the length field exactly.
	fn is_complete(buffer: &[u8]) -> bool {
		Self::frame_len(buffer) == Some(buffer.len())
	}

	fn decode(frame: &[u8]) -> Result<Status, Error> {
		InvalidHeaderPrefix::check(frame, &REPLY_HEADER)?;
		let declared = Self::frame_len(frame).unwrap_or(OVERHEAD);
		if frame.len() < OVERHEAD || frame.len() != declared {
			return Err(InvalidLength {
				declared,
				actual: frame.len(),
			}
			.into());
		}

		let (body, sum) = frame.split_at(frame.len() - 1);
		InvalidChecksum::check(checksum(body).into(), sum[0].into())?;

		let length = usize::from(frame[5]);
		Ok(Status {
			servo_id: frame[2],
			data: frame[DATA_INDEX..DATA_INDEX + length].to_vec(),
		})
	}
}
