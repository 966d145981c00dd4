//! Dynamixel protocol 2.0.
//!
//! Instruction packets look like `[0xFF, 0xFF, 0xFD, 0x00, id, len_l, len_h, instruction, params.., crc_l, crc_h]`,
//! where the length counts the instruction, the parameters and the CRC.
//! Status packets use the instruction [`instruction_id::STATUS`] followed by an error byte.

use super::{Codec, Command, Status};
use crate::crc::calculate_crc;
use crate::endian::{read_uint_le, write_uint_le};
use crate::error::{DeviceError, InvalidChecksum, InvalidHeaderPrefix, InvalidInstruction, InvalidLength, InvalidParameter};
use crate::{bytestuff, Error};

pub const HEADER_PREFIX: [u8; 4] = [0xFF, 0xFF, 0xFD, 0x00];

/// Header prefix, packet ID, length and instruction.
pub const HEADER_SIZE: usize = 8;

/// Size of a status packet without parameters.
pub const STATUS_OVERHEAD: usize = HEADER_SIZE + 1 + 2;

#[rustfmt::skip]
pub mod instruction_id {
	pub const PING:          u8 = 0x01;
	pub const READ:          u8 = 0x02;
	pub const WRITE:         u8 = 0x03;
	pub const REG_WRITE:     u8 = 0x04;
	pub const ACTION:        u8 = 0x05;
	pub const FACTORY_RESET: u8 = 0x06;
	pub const REBOOT:        u8 = 0x08;
	pub const SYNC_READ:     u8 = 0x82;
	pub const SYNC_WRITE:    u8 = 0x83;
	pub const STATUS:        u8 = 0x55;
}

#[rustfmt::skip]
pub mod packet_id {
	pub const MAX:       u8 = 0xFC;
	pub const RESERVED:  u8 = 0xFD;
	pub const BROADCAST: u8 = 0xFE;
}

/// The Dynamixel protocol 2.0 codec.
pub struct RobotisCodec;

/// Check that a packet ID can be addressed, allowing the broadcast ID.
pub fn check_packet_id(servo_id: u8) -> Result<u8, InvalidParameter> {
	if servo_id <= packet_id::MAX || servo_id == packet_id::BROADCAST {
		Ok(servo_id)
	} else {
		Err(InvalidParameter {
			name: "servo ID",
			message: format!("{} is outside of the range 0..=252 and is not the broadcast ID", servo_id),
		})
	}
}

/// Check that a servo ID names a single servo.
pub fn check_unicast_id(servo_id: u8) -> Result<u8, InvalidParameter> {
	InvalidParameter::check_range("servo ID", servo_id, 0, packet_id::MAX)
}

fn check_u16(name: &'static str, value: usize) -> Result<u16, InvalidParameter> {
	u16::try_from(value).map_err(|_| InvalidParameter {
		name,
		message: format!("{} does not fit in 16 bits", value),
	})
}

impl RobotisCodec {
	/// Encode an instruction packet.
	///
	/// The parameters are byte-stuffed before the length and CRC are computed.
	pub fn encode(packet_id: u8, instruction: u8, parameters: &[u8]) -> Result<Vec<u8>, InvalidParameter> {
		let packet_id = check_packet_id(packet_id)?;
		let parameters = bytestuff::stuff(parameters);
		let length = check_u16("parameter length", parameters.len() + 3)?;

		let mut packet = Vec::with_capacity(HEADER_SIZE + parameters.len() + 2);
		packet.extend_from_slice(&HEADER_PREFIX);
		packet.push(packet_id);
		packet.extend_from_slice(&length.to_le_bytes());
		packet.push(instruction);
		packet.extend_from_slice(&parameters);

		let crc = calculate_crc(0, &packet);
		packet.extend_from_slice(&crc.to_le_bytes());
		Ok(packet)
	}

	/// Encode an instruction and work out how many status packets it elicits.
	///
	/// Unicast instructions are answered once, broadcasts not at all.
	fn command(packet_id: u8, instruction: u8, parameters: &[u8]) -> Result<Command, Error> {
		let payload = Self::encode(packet_id, instruction, parameters)?;
		if packet_id == packet_id::BROADCAST {
			Ok(Command::no_response(payload))
		} else {
			Ok(Command::single(payload))
		}
	}

	pub fn ping(servo_id: u8) -> Result<Command, Error> {
		Self::command(servo_id, instruction_id::PING, &[])
	}

	pub fn read(servo_id: u8, address: u16, length: u16) -> Result<Command, Error> {
		let mut parameters = [0; 4];
		write_uint_le(&mut parameters[0..2], address.into());
		write_uint_le(&mut parameters[2..4], length.into());
		Self::command(check_unicast_id(servo_id)?, instruction_id::READ, &parameters)
	}

	pub fn write(servo_id: u8, address: u16, data: &[u8]) -> Result<Command, Error> {
		let mut parameters = Vec::with_capacity(2 + data.len());
		parameters.extend_from_slice(&address.to_le_bytes());
		parameters.extend_from_slice(data);
		Self::command(servo_id, instruction_id::WRITE, &parameters)
	}

	/// Reset the control table to factory defaults.
	///
	/// `mode` selects what survives the reset: 0xFF resets everything,
	/// 0x01 keeps the ID and 0x02 keeps the ID and baud rate.
	pub fn factory_reset(servo_id: u8, mode: u8) -> Result<Command, Error> {
		Self::command(servo_id, instruction_id::FACTORY_RESET, &[mode])
	}

	pub fn reboot(servo_id: u8) -> Result<Command, Error> {
		Self::command(servo_id, instruction_id::REBOOT, &[])
	}

	/// Read the same register range from multiple servos.
	///
	/// One status packet is expected from every listed servo.
	pub fn sync_read(address: u16, length: u16, servo_ids: &[u8]) -> Result<Command, Error> {
		let mut parameters = Vec::with_capacity(4 + servo_ids.len());
		parameters.extend_from_slice(&address.to_le_bytes());
		parameters.extend_from_slice(&length.to_le_bytes());
		for (i, &servo_id) in servo_ids.iter().enumerate() {
			if servo_ids[..i].contains(&servo_id) {
				return Err(Error::invalid_parameter(
					"servo IDs",
					format!("servo {} is listed more than once", servo_id),
				));
			}
			parameters.push(check_unicast_id(servo_id)?);
		}
		let payload = Self::encode(packet_id::BROADCAST, instruction_id::SYNC_READ, &parameters)?;
		Ok(Command::from_servos(payload, servo_ids))
	}

	/// Write the same register range on multiple servos.
	///
	/// All entries must carry the same amount of data. No status packets are sent back.
	pub fn sync_write(address: u16, entries: &[(u8, Vec<u8>)]) -> Result<Command, Error> {
		let data_len = entries.first().map(|(_, data)| data.len()).unwrap_or(0);
		if let Some((servo_id, data)) = entries.iter().find(|(_, data)| data.len() != data_len) {
			return Err(Error::invalid_parameter(
				"sync write data",
				format!("servo {} has {} bytes of data, expected {}", servo_id, data.len(), data_len),
			));
		}

		let mut parameters = Vec::with_capacity(4 + entries.len() * (1 + data_len));
		parameters.extend_from_slice(&address.to_le_bytes());
		parameters.extend_from_slice(&check_u16("data length", data_len)?.to_le_bytes());
		for (servo_id, data) in entries {
			parameters.push(check_unicast_id(*servo_id)?);
			parameters.extend_from_slice(data);
		}
		let payload = Self::encode(packet_id::BROADCAST, instruction_id::SYNC_WRITE, &parameters)?;
		Ok(Command::no_response(payload))
	}
}

/// Find the first possible packet header in a buffer.
///
/// A partial header at the end of the buffer also counts.
/// Returns `buffer.len()` if no header could be found.
fn find_header(buffer: &[u8]) -> usize {
	for i in 0..buffer.len() {
		let possible_prefix = HEADER_PREFIX.len().min(buffer.len() - i);
		if buffer[i..].starts_with(&HEADER_PREFIX[..possible_prefix]) {
			return i;
		}
	}

	buffer.len()
}

impl Codec for RobotisCodec {
	const NAME: &'static str = "Dynamixel protocol 2.0";

	fn frame_len(buffer: &[u8]) -> Option<usize> {
		if buffer.len() < HEADER_SIZE - 1 {
			None
		} else {
			Some(HEADER_SIZE - 1 + read_uint_le(&buffer[5..7]) as usize)
		}
	}

	fn find_header(buffer: &[u8]) -> usize {
		find_header(buffer)
	}

	fn decode(frame: &[u8]) -> Result<Status, Error> {
		InvalidHeaderPrefix::check(frame, &HEADER_PREFIX)?;
		let declared = Self::frame_len(frame).unwrap_or(STATUS_OVERHEAD);
		if frame.len() < STATUS_OVERHEAD || frame.len() != declared {
			return Err(InvalidLength {
				declared,
				actual: frame.len(),
			}
			.into());
		}

		let (body, crc) = frame.split_at(frame.len() - 2);
		InvalidChecksum::check(calculate_crc(0, body), read_uint_le(crc) as u16)?;
		InvalidInstruction::check(frame[7], instruction_id::STATUS)?;

		let servo_id = frame[4];
		DeviceError::check(servo_id, frame[8])?;

		Ok(Status {
			servo_id,
			data: bytestuff::unstuff(body[STATUS_OVERHEAD - 2..].to_vec()),
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use assert2::{assert, let_assert};

	/// Build a status packet the way a servo would.
	fn status(servo_id: u8, error: u8, parameters: &[u8]) -> Vec<u8> {
		let length = (parameters.len() + 4) as u16;
		let mut packet = vec![0xFF, 0xFF, 0xFD, 0x00, servo_id];
		packet.extend_from_slice(&length.to_le_bytes());
		packet.extend_from_slice(&[instruction_id::STATUS, error]);
		packet.extend_from_slice(parameters);
		let crc = calculate_crc(0, &packet);
		packet.extend_from_slice(&crc.to_le_bytes());
		packet
	}

	#[test]
	fn test_ping_packet() {
		let_assert!(Ok(command) = RobotisCodec::ping(1));
		assert!(command.payload == [0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x03, 0x00, 0x01, 0x19, 0x4E]);
		assert!(command.expected_response_count == 1);
	}

	#[test]
	fn test_broadcast_ping_has_no_response() {
		let_assert!(Ok(command) = RobotisCodec::ping(packet_id::BROADCAST));
		assert!(!command.expects_response());
	}

	#[test]
	fn test_read_packet() {
		let_assert!(Ok(command) = RobotisCodec::read(1, 132, 4));
		assert!(command.payload == [0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x07, 0x00, 0x02, 0x84, 0x00, 0x04, 0x00, 0x1D, 0x15]);
	}

	#[test]
	fn test_write_packets() {
		let_assert!(Ok(command) = RobotisCodec::write(1, 116, &[0x00, 0x02, 0x00, 0x00]));
		assert!(command.payload == [0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x09, 0x00, 0x03, 0x74, 0x00, 0x00, 0x02, 0x00, 0x00, 0xCA, 0x89]);

		let_assert!(Ok(command) = RobotisCodec::write(1, 64, &[0x01]));
		assert!(command.payload == [0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x06, 0x00, 0x03, 0x40, 0x00, 0x01, 0xDB, 0x66]);
	}

	#[test]
	fn test_sync_read_packet() {
		let_assert!(Ok(command) = RobotisCodec::sync_read(132, 4, &[1, 2]));
		assert!(command.payload == [0xFF, 0xFF, 0xFD, 0x00, 0xFE, 0x09, 0x00, 0x82, 0x84, 0x00, 0x04, 0x00, 0x01, 0x02, 0xCE, 0xFA]);
		assert!(command.expected_response_count == 2);
		assert!(command.servo_ids == [1, 2]);
	}

	#[test]
	fn test_sync_read_rejects_repeated_servo() {
		let_assert!(Err(Error::InvalidParameter(e)) = RobotisCodec::sync_read(132, 4, &[1, 2, 1]));
		assert!(e.name == "servo IDs");
	}

	#[test]
	fn test_sync_write_packet() {
		let entries = [(1, vec![0x96, 0x00, 0x00, 0x00]), (2, vec![0xAA, 0x00, 0x00, 0x00])];
		let_assert!(Ok(command) = RobotisCodec::sync_write(116, &entries));
		assert!(
			command.payload
				== [
					0xFF, 0xFF, 0xFD, 0x00, 0xFE, 0x11, 0x00, 0x83, 0x74, 0x00, 0x04, 0x00, 0x01, 0x96, 0x00, 0x00, 0x00,
					0x02, 0xAA, 0x00, 0x00, 0x00, 0x82, 0x87,
				]
		);
		assert!(!command.expects_response());
	}

	#[test]
	fn test_reserved_id_is_rejected() {
		let_assert!(Err(Error::InvalidParameter(_)) = RobotisCodec::ping(packet_id::RESERVED));
		let_assert!(Err(Error::InvalidParameter(_)) = RobotisCodec::read(packet_id::BROADCAST, 0, 1));
		let_assert!(Err(Error::InvalidParameter(_)) = RobotisCodec::sync_read(0, 1, &[1, 253]));
	}

	#[test]
	fn test_parameters_are_stuffed() {
		let_assert!(Ok(command) = RobotisCodec::write(1, 0xFFFF, &[0xFD]));
		assert!(command.payload[5..7] == [0x07, 0x00]);
		assert!(command.payload[8..12] == [0xFF, 0xFF, 0xFD, 0xFD]);
	}

	#[test]
	fn test_is_complete() {
		let packet = status(1, 0, &[0x06, 0x04, 0x26]);
		assert!(packet == [0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x07, 0x00, 0x55, 0x00, 0x06, 0x04, 0x26, 0x65, 0x5D]);
		assert!(!RobotisCodec::is_complete(&packet[..6]));
		assert!(!RobotisCodec::is_complete(&packet[..13]));
		assert!(RobotisCodec::is_complete(&packet));
	}

	#[test]
	fn test_decode_status() {
		let_assert!(Ok(status) = RobotisCodec::decode(&status(7, 0, &[0x06, 0x04, 0x26])));
		assert!(status.servo_id == 7);
		assert!(status.data == [0x06, 0x04, 0x26]);
	}

	#[test]
	fn test_decode_unstuffs() {
		let_assert!(Ok(status) = RobotisCodec::decode(&status(7, 0, &[0xFF, 0xFF, 0xFD, 0xFD, 0x01])));
		assert!(status.data == [0xFF, 0xFF, 0xFD, 0x01]);
	}

	#[test]
	fn test_decode_errors() {
		let mut packet = status(1, 0, &[0x01]);
		packet[9] = 0x02;
		let_assert!(Err(Error::ChecksumMismatch(_)) = RobotisCodec::decode(&packet));

		let_assert!(Err(Error::DeviceReportedError(e)) = RobotisCodec::decode(&status(3, 0x84, &[])));
		assert!(e.servo_id == 3);
		assert!(e.alert());
		assert!(e.error_number() == 4);

		let_assert!(Ok(command) = RobotisCodec::ping(1));
		let_assert!(Err(Error::MalformedResponse(_)) = RobotisCodec::decode(&command.payload));
	}

	#[test]
	fn test_find_header() {
		assert!(find_header(&[0xFF]) == 0);
		assert!(find_header(&[0xFF, 0xFF]) == 0);
		assert!(find_header(&[0x00, 0xFF]) == 1);
		assert!(find_header(&[0x00, 0xFF, 0xFF, 0xFD, 0x00]) == 1);
		assert!(find_header(&[0x00, 0x01, 0x02]) == 3);
		assert!(find_header(&[0xFF, 0xFD, 0xFF, 0xFF, 0xFD]) == 2);
	}
}
