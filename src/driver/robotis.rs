//! Driver for Dynamixel X-series servos using protocol 2.0.

use super::{clamp, single_reply, BurstPosition, BurstReply, Bus, PingResponse, ServoDriver};
use crate::completion::Query;
use crate::endian::{int_to_bytes, read_int_le, read_uint_le, uint_to_bytes};
use crate::error::{InvalidParameter, InvalidParameterCount};
use crate::protocol::robotis::{check_unicast_id, RobotisCodec};
use crate::protocol::{Codec, Status};
use crate::transport::Transport;
use crate::{Config, Error};

/// The control table of X-series servos.
#[rustfmt::skip]
pub mod address {
	pub const MODEL_NUMBER:        u16 = 0;
	pub const FIRMWARE_VERSION:    u16 = 6;
	pub const ID:                  u16 = 7;
	pub const BAUD_RATE:           u16 = 8;
	pub const RETURN_DELAY_TIME:   u16 = 9;
	pub const OPERATING_MODE:      u16 = 11;
	pub const TEMPERATURE_LIMIT:   u16 = 31;
	pub const MAX_POSITION_LIMIT:  u16 = 48;
	pub const MIN_POSITION_LIMIT:  u16 = 52;
	pub const TORQUE_ENABLE:       u16 = 64;
	pub const LED:                 u16 = 65;
	pub const POSITION_D_GAIN:     u16 = 80;
	pub const POSITION_I_GAIN:     u16 = 82;
	pub const POSITION_P_GAIN:     u16 = 84;
	pub const GOAL_VELOCITY:       u16 = 104;
	pub const PROFILE_VELOCITY:    u16 = 112;
	pub const GOAL_POSITION:       u16 = 116;
	pub const PRESENT_CURRENT:     u16 = 126;
	pub const PRESENT_VELOCITY:    u16 = 128;
	pub const PRESENT_POSITION:    u16 = 132;
	pub const PRESENT_VOLTAGE:     u16 = 144;
	pub const PRESENT_TEMPERATURE: u16 = 146;
}

/// Factory reset mode that keeps the ID and baud rate.
pub const RESET_KEEP_ID_AND_BAUD_RATE: u8 = 0x02;

/// The highest valid baud rate index, selecting 4.5 Mbps.
pub const MAX_BAUD_RATE_INDEX: u8 = 7;

/// The highest temperature limit in degrees Celsius.
pub const MAX_TEMPERATURE_LIMIT: i16 = 100;

/// Position steps per revolution.
const POSITION_RESOLUTION: f64 = 4096.0;

/// One velocity step is 0.229 rpm.
const DEGREES_PER_SECOND_PER_STEP: f64 = 0.229 * 360.0 / 60.0;

/// One current step is 2.69 mA.
const MILLIAMPERE_PER_STEP: f64 = 2.69;

/// A bus of Dynamixel servos using protocol 2.0.
pub struct RobotisP20 {
	bus: Bus,
}

impl RobotisP20 {
	/// Start a driver on a transport with the default configuration.
	pub fn new(transport: impl Transport) -> Result<Self, Error> {
		Self::with_config(transport, Config::default())
	}

	pub fn with_config(transport: impl Transport, config: Config) -> Result<Self, Error> {
		Ok(Self {
			bus: Bus::spawn::<RobotisCodec, _>(transport, config)?,
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
		address: u16,
		length: u16,
		convert: impl FnOnce(&[u8]) -> T + Send + 'static,
	) -> Query<'_, T> {
		self.bus.query(RobotisCodec::read(servo_id, address, length), move |statuses| {
			let data = single_reply(statuses, servo_id, length.into())?;
			Ok(convert(&data))
		})
	}

	/// Write a register. The status packet is checked in the background and failures are logged.
	fn write_register(&self, operation: &'static str, servo_id: u8, address: u16, data: &[u8]) -> Result<(), Error> {
		self.bus.send(operation, RobotisCodec::write(servo_id, address, data))
	}

	/// Read the same register range from multiple servos.
	fn sync_read<T: Send + 'static>(
		&self,
		address: u16,
		length: u16,
		servo_ids: &[u8],
		convert: impl Fn(Status) -> T + Send + 'static,
	) -> Query<'_, Vec<T>> {
		if servo_ids.is_empty() {
			return Query::error(Error::invalid_parameter("servo IDs", "no servos given"));
		}
		let command = RobotisCodec::sync_read(address, length, servo_ids);
		self.bus.query(command, move |statuses| {
			statuses
				.into_iter()
				.map(|status| -> Result<T, Error> {
					InvalidParameterCount::check(status.data.len(), length.into())?;
					Ok(convert(status))
				})
				.collect()
		})
	}
}

fn raw_to_degrees(raw: i64) -> f64 {
	clamp(raw as f64 * 360.0 / POSITION_RESOLUTION - 180.0, -180.0, 180.0)
}

fn degrees_to_raw(degrees: f64) -> Vec<u8> {
	let raw = ((clamp(degrees, -180.0, 180.0) + 180.0) * POSITION_RESOLUTION / 360.0).round();
	let raw = raw.min(POSITION_RESOLUTION - 1.0) as u64;
	uint_to_bytes(raw, 4)
}

fn position(data: &[u8]) -> f64 {
	raw_to_degrees(read_int_le(data))
}

impl ServoDriver for RobotisP20 {
	fn protocol(&self) -> &'static str {
		RobotisCodec::NAME
	}

	fn ping(&self, servo_id: u8) -> Query<'_, PingResponse> {
		let command = check_unicast_id(servo_id)
			.map_err(Error::from)
			.and_then(RobotisCodec::ping);
		self.bus.query(command, move |statuses| {
			let data = single_reply(statuses, servo_id, 3)?;
			Ok(PingResponse {
				servo_id,
				model_number: read_uint_le(&data[0..2]) as u16,
				firmware_version: data[2],
			})
		})
	}

	fn get_torque_enable(&self, servo_id: u8) -> Query<'_, bool> {
		self.read_register(servo_id, address::TORQUE_ENABLE, 1, |data| data[0] == 1)
	}

	fn set_torque_enable(&self, enable: bool, servo_id: u8) -> Result<(), Error> {
		self.write_register("set_torque_enable", servo_id, address::TORQUE_ENABLE, &[u8::from(enable)])
	}

	fn get_temperature(&self, servo_id: u8) -> Query<'_, i16> {
		self.read_register(servo_id, address::PRESENT_TEMPERATURE, 1, |data| i16::from(data[0]))
	}

	fn get_current(&self, servo_id: u8) -> Query<'_, f64> {
		self.read_register(servo_id, address::PRESENT_CURRENT, 2, |data| {
			read_int_le(data) as f64 * MILLIAMPERE_PER_STEP
		})
	}

	fn get_voltage(&self, servo_id: u8) -> Query<'_, f64> {
		self.read_register(servo_id, address::PRESENT_VOLTAGE, 2, |data| read_uint_le(data) as f64 / 10.0)
	}

	fn get_target_position(&self, servo_id: u8) -> Query<'_, f64> {
		self.read_register(servo_id, address::GOAL_POSITION, 4, position)
	}

	fn set_target_position(&self, degrees: f64, servo_id: u8) -> Result<(), Error> {
		self.write_register("set_target_position", servo_id, address::GOAL_POSITION, &degrees_to_raw(degrees))
	}

	fn get_current_position(&self, servo_id: u8) -> Query<'_, f64> {
		self.read_register(servo_id, address::PRESENT_POSITION, 4, position)
	}

	fn get_speed(&self, servo_id: u8) -> Query<'_, f64> {
		self.read_register(servo_id, address::PRESENT_VELOCITY, 4, |data| {
			read_int_le(data) as f64 * DEGREES_PER_SECOND_PER_STEP
		})
	}

	/// Set the profile velocity used for future moves. Zero means no limit.
	fn set_speed(&self, degrees_per_second: f64, servo_id: u8) -> Result<(), Error> {
		let steps = (clamp(degrees_per_second, 0.0, f64::MAX) / DEGREES_PER_SECOND_PER_STEP).round();
		let steps = steps.min(f64::from(i32::MAX)) as u64;
		self.write_register("set_speed", servo_id, address::PROFILE_VELOCITY, &uint_to_bytes(steps, 4))
	}

	fn get_p_gain(&self, servo_id: u8) -> Query<'_, u16> {
		self.read_register(servo_id, address::POSITION_P_GAIN, 2, |data| read_uint_le(data) as u16)
	}

	fn set_p_gain(&self, gain: u16, servo_id: u8) -> Result<(), Error> {
		self.write_register("set_p_gain", servo_id, address::POSITION_P_GAIN, &gain.to_le_bytes())
	}

	fn get_i_gain(&self, servo_id: u8) -> Query<'_, u16> {
		self.read_register(servo_id, address::POSITION_I_GAIN, 2, |data| read_uint_le(data) as u16)
	}

	fn set_i_gain(&self, gain: u16, servo_id: u8) -> Result<(), Error> {
		self.write_register("set_i_gain", servo_id, address::POSITION_I_GAIN, &gain.to_le_bytes())
	}

	fn get_d_gain(&self, servo_id: u8) -> Query<'_, u16> {
		self.read_register(servo_id, address::POSITION_D_GAIN, 2, |data| read_uint_le(data) as u16)
	}

	fn set_d_gain(&self, gain: u16, servo_id: u8) -> Result<(), Error> {
		self.write_register("set_d_gain", servo_id, address::POSITION_D_GAIN, &gain.to_le_bytes())
	}

	fn get_servo_id(&self, servo_id: u8) -> Query<'_, u8> {
		self.read_register(servo_id, address::ID, 1, |data| data[0])
	}

	/// Change the ID of a servo. The control table is in EEPROM, so the ID survives a restart.
	fn set_servo_id(&self, new_id: u8, servo_id: u8) -> Result<(), Error> {
		let new_id = check_unicast_id(new_id)?;
		self.write_register("set_servo_id", servo_id, address::ID, &[new_id])
	}

	/// Reset the control table, keeping the ID and baud rate.
	fn reset_memory(&self, servo_id: u8) -> Result<(), Error> {
		self.bus.send(
			"reset_memory",
			RobotisCodec::factory_reset(servo_id, RESET_KEEP_ID_AND_BAUD_RATE),
		)
	}

	fn reboot(&self, servo_id: u8) -> Result<(), Error> {
		self.bus.send("reboot", RobotisCodec::reboot(servo_id))
	}

	fn get_baud_rate(&self, servo_id: u8) -> Query<'_, u8> {
		self.read_register(servo_id, address::BAUD_RATE, 1, |data| data[0])
	}

	fn set_baud_rate(&self, baud_rate_index: u8, servo_id: u8) -> Result<(), Error> {
		let index = InvalidParameter::check_range("baud rate index", baud_rate_index, 0, MAX_BAUD_RATE_INDEX)?;
		self.write_register("set_baud_rate", servo_id, address::BAUD_RATE, &[index])
	}

	fn get_limit_cw_position(&self, servo_id: u8) -> Query<'_, f64> {
		self.read_register(servo_id, address::MIN_POSITION_LIMIT, 4, position)
	}

	fn set_limit_cw_position(&self, degrees: f64, servo_id: u8) -> Result<(), Error> {
		self.write_register("set_limit_cw_position", servo_id, address::MIN_POSITION_LIMIT, &degrees_to_raw(degrees))
	}

	fn get_limit_ccw_position(&self, servo_id: u8) -> Query<'_, f64> {
		self.read_register(servo_id, address::MAX_POSITION_LIMIT, 4, position)
	}

	fn set_limit_ccw_position(&self, degrees: f64, servo_id: u8) -> Result<(), Error> {
		self.write_register("set_limit_ccw_position", servo_id, address::MAX_POSITION_LIMIT, &degrees_to_raw(degrees))
	}

	fn get_limit_temperature(&self, servo_id: u8) -> Query<'_, i16> {
		self.read_register(servo_id, address::TEMPERATURE_LIMIT, 1, |data| i16::from(data[0]))
	}

	fn set_limit_temperature(&self, celsius: i16, servo_id: u8) -> Result<(), Error> {
		let celsius = InvalidParameter::check_range("temperature limit", celsius, 0, MAX_TEMPERATURE_LIMIT)?;
		self.write_register("set_limit_temperature", servo_id, address::TEMPERATURE_LIMIT, &int_to_bytes(celsius.into(), 1))
	}

	fn read(&self, servo_id: u8, address: u16, length: u16) -> Query<'_, Vec<u8>> {
		self.read_register(servo_id, address, length, |data| data.to_vec())
	}

	fn write(&self, servo_id: u8, address: u16, data: &[u8]) -> Result<(), Error> {
		self.write_register("write", servo_id, address, data)
	}

	fn set_burst_target_positions(&self, positions: &[(u8, f64)]) -> Result<(), Error> {
		if positions.is_empty() {
			return Err(Error::invalid_parameter("positions", "no servos given"));
		}
		let entries: Vec<_> = positions
			.iter()
			.map(|&(servo_id, degrees)| (servo_id, degrees_to_raw(degrees)))
			.collect();
		self.bus.send(
			"set_burst_target_positions",
			RobotisCodec::sync_write(address::GOAL_POSITION, &entries),
		)
	}

	fn get_burst_positions(&self, servo_ids: &[u8]) -> Query<'_, Vec<BurstPosition>> {
		self.sync_read(address::PRESENT_POSITION, 4, servo_ids, |status| BurstPosition {
			servo_id: status.servo_id,
			degrees: position(&status.data),
		})
	}

	fn burst_read(&self, address: u16, length: u16, servo_ids: &[u8]) -> Query<'_, Vec<BurstReply>> {
		self.sync_read(address, length, servo_ids, |status| BurstReply {
			servo_id: status.servo_id,
			data: status.data,
		})
	}

	fn burst_write(&self, address: u16, entries: &[(u8, Vec<u8>)]) -> Result<(), Error> {
		if entries.is_empty() {
			return Err(Error::invalid_parameter("entries", "no servos given"));
		}
		self.bus.send("burst_write", RobotisCodec::sync_write(address, entries))
	}

	fn close(&self, drain: bool) {
		self.bus.dispatcher().close(drain)
	}
}
