//! Driver for Futaba RS30x servos.

use super::{clamp, single_reply, Bus, PingResponse, ServoDriver};
use crate::completion::Query;
use crate::endian::{int_to_bytes, read_int_le, read_uint_le, uint_to_bytes};
use crate::error::InvalidParameter;
use crate::protocol::futaba::{check_servo_id, flag, FutabaCodec};
use crate::protocol::Codec;
use crate::transport::Transport;
use crate::{Config, Error};

/// The memory map of RS30x servos.
#[rustfmt::skip]
pub mod address {
	pub const MODEL_NUMBER:      u8 = 0x00;
	pub const FIRMWARE_VERSION:  u8 = 0x02;
	pub const SERVO_ID:          u8 = 0x04;
	pub const REVERSE:           u8 = 0x05;
	pub const BAUD_RATE:         u8 = 0x06;
	pub const RETURN_DELAY:      u8 = 0x07;
	pub const CW_ANGLE_LIMIT:    u8 = 0x08;
	pub const CCW_ANGLE_LIMIT:   u8 = 0x0A;
	pub const TEMPERATURE_LIMIT: u8 = 0x0E;
	pub const GOAL_POSITION:     u8 = 0x1E;
	pub const GOAL_TIME:         u8 = 0x20;
	pub const MAX_TORQUE:        u8 = 0x23;
	pub const TORQUE_ENABLE:     u8 = 0x24;
	pub const PID_COEFFICIENT:   u8 = 0x26;
	pub const PRESENT_POSITION:  u8 = 0x2A;
	pub const PRESENT_TIME:      u8 = 0x2C;
	pub const PRESENT_SPEED:     u8 = 0x2E;
	pub const PRESENT_CURRENT:   u8 = 0x30;
	pub const TEMPERATURE:       u8 = 0x32;
	pub const VOLTAGE:           u8 = 0x34;
}

/// The highest valid baud rate index, selecting 230400 baud.
pub const MAX_BAUD_RATE_INDEX: u8 = 9;

/// Positions are limited to this many degrees either way.
pub const MAX_ANGLE: f64 = 150.0;

/// The longest goal time in seconds.
pub const MAX_GOAL_TIME: f64 = 163.83;

/// A bus of Futaba servos using the short packet protocol.
pub struct Futaba {
	bus: Bus,
}

impl Futaba {
	/// Start a driver on a transport with the default configuration.
	pub fn new(transport: impl Transport) -> Result<Self, Error> {
		Self::with_config(transport, Config::default())
	}

	pub fn with_config(transport: impl Transport, config: Config) -> Result<Self, Error> {
		Ok(Self {
			bus: Bus::spawn::<FutabaCodec, _>(transport, config)?,
		})
	}

	/// Open a serial port and start a driver on it.
	#[cfg(feature = "serial2")]
	pub fn open(path: impl AsRef<std::path::Path>, baud_rate: u32) -> Result<Self, Error> {
		Self::new(crate::transport::SerialTransport::open(path, baud_rate)?)
	}

	pub fn config(&self) -> &Config {
		self.bus.config()
	}

	/// The number of commands waiting to be sent.
	pub fn pending(&self) -> usize {
		self.bus.dispatcher().pending()
	}

	fn read_register<T: 'static>(
		&self,
		servo_id: u8,
		address: u8,
		length: u8,
		convert: impl FnOnce(&[u8]) -> T + Send + 'static,
	) -> Query<'_, T> {
		self.bus.query(FutabaCodec::read(servo_id, address, length), move |statuses| {
			let data = single_reply(statuses, servo_id, length.into())?;
			Ok(convert(&data))
		})
	}

	fn write_register(&self, operation: &'static str, servo_id: u8, address: u8, data: &[u8]) -> Result<(), Error> {
		self.bus.send(operation, FutabaCodec::write(servo_id, address, data))
	}
}

fn short_address(address: u16) -> Result<u8, InvalidParameter> {
	u8::try_from(address).map_err(|_| InvalidParameter {
		name: "address",
		message: format!("{:#X} is beyond the memory map", address),
	})
}

fn tenths_of_degree(data: &[u8]) -> f64 {
	read_int_le(data) as f64 / 10.0
}

fn encode_angle(degrees: f64) -> Vec<u8> {
	let tenths = (clamp(degrees, -MAX_ANGLE, MAX_ANGLE) * 10.0).round() as i64;
	int_to_bytes(tenths, 2)
}

impl ServoDriver for Futaba {
	fn protocol(&self) -> &'static str {
		FutabaCodec::NAME
	}

	/// Identify a servo by reading its model number and firmware version.
	fn ping(&self, servo_id: u8) -> Query<'_, PingResponse> {
		self.read_register(servo_id, address::MODEL_NUMBER, 3, move |data| PingResponse {
			servo_id,
			model_number: read_uint_le(&data[0..2]) as u16,
			firmware_version: data[2],
		})
	}

	fn get_torque_enable(&self, servo_id: u8) -> Query<'_, bool> {
		self.read_register(servo_id, address::TORQUE_ENABLE, 1, |data| data[0] == 0x01)
	}

	fn set_torque_enable(&self, enable: bool, servo_id: u8) -> Result<(), Error> {
		self.write_register("set_torque_enable", servo_id, address::TORQUE_ENABLE, &[u8::from(enable)])
	}

	fn get_temperature(&self, servo_id: u8) -> Query<'_, i16> {
		self.read_register(servo_id, address::TEMPERATURE, 2, |data| read_int_le(data) as i16)
	}

	fn get_current(&self, servo_id: u8) -> Query<'_, f64> {
		self.read_register(servo_id, address::PRESENT_CURRENT, 2, |data| read_uint_le(data) as f64)
	}

	fn get_voltage(&self, servo_id: u8) -> Query<'_, f64> {
		self.read_register(servo_id, address::VOLTAGE, 2, |data| read_int_le(data) as f64 / 100.0)
	}

	fn get_target_position(&self, servo_id: u8) -> Query<'_, f64> {
		self.read_register(servo_id, address::GOAL_POSITION, 2, tenths_of_degree)
	}

	fn set_target_position(&self, degrees: f64, servo_id: u8) -> Result<(), Error> {
		self.write_register("set_target_position", servo_id, address::GOAL_POSITION, &encode_angle(degrees))
	}

	fn get_current_position(&self, servo_id: u8) -> Query<'_, f64> {
		self.read_register(servo_id, address::PRESENT_POSITION, 2, tenths_of_degree)
	}

	fn get_target_time(&self, servo_id: u8) -> Query<'_, f64> {
		self.read_register(servo_id, address::GOAL_TIME, 2, |data| read_uint_le(data) as f64 / 100.0)
	}

	fn set_target_time(&self, seconds: f64, servo_id: u8) -> Result<(), Error> {
		let hundredths = (clamp(seconds, 0.0, MAX_GOAL_TIME) * 100.0).round() as u64;
		self.write_register("set_target_time", servo_id, address::GOAL_TIME, &uint_to_bytes(hundredths, 2))
	}

	fn get_speed(&self, servo_id: u8) -> Query<'_, f64> {
		self.read_register(servo_id, address::PRESENT_SPEED, 2, |data| read_int_le(data) as f64)
	}

	fn get_pid_coefficient(&self, servo_id: u8) -> Query<'_, u8> {
		self.read_register(servo_id, address::PID_COEFFICIENT, 1, |data| data[0])
	}

	/// Set the control gain. 100% is the factory default.
	///
	/// The servos misbehave at exactly 10%, so that value is sent as 9%.
	fn set_pid_coefficient(&self, percent: u8, servo_id: u8) -> Result<(), Error> {
		let percent = match percent {
			0 => 1,
			10 => 9,
			x => x,
		};
		self.write_register("set_pid_coefficient", servo_id, address::PID_COEFFICIENT, &[percent])
	}

	fn get_max_torque(&self, servo_id: u8) -> Query<'_, u8> {
		self.read_register(servo_id, address::MAX_TORQUE, 1, |data| data[0])
	}

	fn set_max_torque(&self, percent: u8, servo_id: u8) -> Result<(), Error> {
		self.write_register("set_max_torque", servo_id, address::MAX_TORQUE, &[percent.min(100)])
	}

	fn get_servo_id(&self, servo_id: u8) -> Query<'_, u8> {
		self.read_register(servo_id, address::SERVO_ID, 1, |data| data[0])
	}

	/// Change the ID of a servo. It is only kept after [`Self::save_rom`] and a restart.
	fn set_servo_id(&self, new_id: u8, servo_id: u8) -> Result<(), Error> {
		let new_id = check_servo_id(new_id)?;
		self.write_register("set_servo_id", servo_id, address::SERVO_ID, &[new_id])
	}

	fn save_rom(&self, servo_id: u8) -> Result<(), Error> {
		self.bus.send("save_rom", FutabaCodec::flag_only(servo_id, flag::WRITE_ROM))
	}

	fn reset_memory(&self, servo_id: u8) -> Result<(), Error> {
		self.bus.send("reset_memory", FutabaCodec::flag_only(servo_id, flag::RESET_MEMORY))
	}

	fn reboot(&self, servo_id: u8) -> Result<(), Error> {
		self.bus.send("reboot", FutabaCodec::flag_only(servo_id, flag::REBOOT))
	}

	fn get_baud_rate(&self, servo_id: u8) -> Query<'_, u8> {
		self.read_register(servo_id, address::BAUD_RATE, 1, |data| data[0])
	}

	fn set_baud_rate(&self, baud_rate_index: u8, servo_id: u8) -> Result<(), Error> {
		let index = InvalidParameter::check_range("baud rate index", baud_rate_index, 0, MAX_BAUD_RATE_INDEX)?;
		self.write_register("set_baud_rate", servo_id, address::BAUD_RATE, &[index])
	}

	fn get_limit_cw_position(&self, servo_id: u8) -> Query<'_, f64> {
		self.read_register(servo_id, address::CW_ANGLE_LIMIT, 2, tenths_of_degree)
	}

	fn set_limit_cw_position(&self, degrees: f64, servo_id: u8) -> Result<(), Error> {
		let degrees = InvalidParameter::check_range("CW limit", degrees, 0.0, MAX_ANGLE)?;
		self.write_register("set_limit_cw_position", servo_id, address::CW_ANGLE_LIMIT, &encode_angle(degrees))
	}

	fn get_limit_ccw_position(&self, servo_id: u8) -> Query<'_, f64> {
		self.read_register(servo_id, address::CCW_ANGLE_LIMIT, 2, tenths_of_degree)
	}

	fn set_limit_ccw_position(&self, degrees: f64, servo_id: u8) -> Result<(), Error> {
		let degrees = InvalidParameter::check_range("CCW limit", degrees, -MAX_ANGLE, 0.0)?;
		self.write_register("set_limit_ccw_position", servo_id, address::CCW_ANGLE_LIMIT, &encode_angle(degrees))
	}

	fn get_limit_temperature(&self, servo_id: u8) -> Query<'_, i16> {
		self.read_register(servo_id, address::TEMPERATURE_LIMIT, 2, |data| read_int_le(data) as i16)
	}

	fn read(&self, servo_id: u8, address: u16, length: u16) -> Query<'_, Vec<u8>> {
		let address = match short_address(address) {
			Ok(x) => x,
			Err(e) => return Query::error(e),
		};
		let length = match InvalidParameter::check_range("length", length, 0, u8::MAX.into()) {
			Ok(x) => x as u8,
			Err(e) => return Query::error(e),
		};
		self.read_register(servo_id, address, length, |data| data.to_vec())
	}

	fn write(&self, servo_id: u8, address: u16, data: &[u8]) -> Result<(), Error> {
		self.write_register("write", servo_id, short_address(address)?, data)
	}

	fn set_burst_target_positions(&self, positions: &[(u8, f64)]) -> Result<(), Error> {
		if positions.is_empty() {
			return Err(Error::invalid_parameter("positions", "no servos given"));
		}
		let entries: Vec<_> = positions
			.iter()
			.map(|&(servo_id, degrees)| (servo_id, encode_angle(degrees)))
			.collect();
		self.bus.send(
			"set_burst_target_positions",
			FutabaCodec::burst_write(address::GOAL_POSITION, &entries),
		)
	}

	fn burst_write(&self, address: u16, entries: &[(u8, Vec<u8>)]) -> Result<(), Error> {
		if entries.is_empty() {
			return Err(Error::invalid_parameter("entries", "no servos given"));
		}
		self.bus.send("burst_write", FutabaCodec::burst_write(short_address(address)?, entries))
	}

	fn close(&self, drain: bool) {
		self.bus.dispatcher().close(drain)
	}
}
