//! The uniform servo operation set and its protocol implementations.

pub mod futaba;
pub mod robotis;

pub use futaba::Futaba;
pub use robotis::RobotisP20;

use crate::completion::{Completion, Query};
use crate::dispatcher::Dispatcher;
use crate::error::{InvalidParameterCount, InvalidServoId};
use crate::protocol::{Codec, Command, Status};
use crate::transport::Transport;
use crate::{Config, Error};

/// The answer of a servo to a ping.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PingResponse {
	/// The ID of the servo that answered.
	pub servo_id: u8,

	/// The model number of the servo.
	pub model_number: u16,

	/// The version of the firmware installed on the servo.
	pub firmware_version: u8,
}

/// Raw data returned by one servo for a burst read.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BurstReply {
	pub servo_id: u8,
	pub data: Vec<u8>,
}

/// The position of one servo, returned by a burst position read.
#[derive(Debug, Clone, PartialEq)]
pub struct BurstPosition {
	pub servo_id: u8,
	pub degrees: f64,
}

/// The operations supported by serial bus servos, independent of their wire protocol.
///
/// Getters return a [`Query`] that sends nothing until it is waited on, given a callback or awaited.
/// Setters queue their command right away.
///
/// Operations a protocol can not perform fail with [`Error::NotSupported`] without sending anything.
pub trait ServoDriver: Send + Sync {
	/// The name of the wire protocol.
	fn protocol(&self) -> &'static str;

	/// Check if a servo is present and identify it.
	fn ping(&self, servo_id: u8) -> Query<'_, PingResponse>;

	fn get_torque_enable(&self, servo_id: u8) -> Query<'_, bool>;
	fn set_torque_enable(&self, enable: bool, servo_id: u8) -> Result<(), Error>;

	/// The temperature in degrees Celsius.
	fn get_temperature(&self, servo_id: u8) -> Query<'_, i16>;

	/// The motor current in milliampere.
	fn get_current(&self, servo_id: u8) -> Query<'_, f64>;

	/// The supply voltage in volt.
	fn get_voltage(&self, servo_id: u8) -> Query<'_, f64>;

	/// The goal position in degrees.
	fn get_target_position(&self, servo_id: u8) -> Query<'_, f64>;

	/// Move to a position in degrees. Out of range positions are clamped.
	fn set_target_position(&self, degrees: f64, servo_id: u8) -> Result<(), Error>;

	/// The present position in degrees.
	fn get_current_position(&self, servo_id: u8) -> Query<'_, f64>;

	/// The time to reach the goal position in seconds.
	fn get_target_time(&self, servo_id: u8) -> Query<'_, f64> {
		let _ = servo_id;
		Query::error(Error::not_supported("get_target_time", self.protocol()))
	}

	fn set_target_time(&self, seconds: f64, servo_id: u8) -> Result<(), Error> {
		let _ = (seconds, servo_id);
		Err(Error::not_supported("set_target_time", self.protocol()))
	}

	/// The present speed in degrees per second.
	fn get_speed(&self, servo_id: u8) -> Query<'_, f64>;

	/// Limit the speed of future moves, in degrees per second.
	fn set_speed(&self, degrees_per_second: f64, servo_id: u8) -> Result<(), Error> {
		let _ = (degrees_per_second, servo_id);
		Err(Error::not_supported("set_speed", self.protocol()))
	}

	/// The control gain as a percentage of the default.
	fn get_pid_coefficient(&self, servo_id: u8) -> Query<'_, u8> {
		let _ = servo_id;
		Query::error(Error::not_supported("get_pid_coefficient", self.protocol()))
	}

	fn set_pid_coefficient(&self, percent: u8, servo_id: u8) -> Result<(), Error> {
		let _ = (percent, servo_id);
		Err(Error::not_supported("set_pid_coefficient", self.protocol()))
	}

	fn get_p_gain(&self, servo_id: u8) -> Query<'_, u16> {
		let _ = servo_id;
		Query::error(Error::not_supported("get_p_gain", self.protocol()))
	}

	fn set_p_gain(&self, gain: u16, servo_id: u8) -> Result<(), Error> {
		let _ = (gain, servo_id);
		Err(Error::not_supported("set_p_gain", self.protocol()))
	}

	fn get_i_gain(&self, servo_id: u8) -> Query<'_, u16> {
		let _ = servo_id;
		Query::error(Error::not_supported("get_i_gain", self.protocol()))
	}

	fn set_i_gain(&self, gain: u16, servo_id: u8) -> Result<(), Error> {
		let _ = (gain, servo_id);
		Err(Error::not_supported("set_i_gain", self.protocol()))
	}

	fn get_d_gain(&self, servo_id: u8) -> Query<'_, u16> {
		let _ = servo_id;
		Query::error(Error::not_supported("get_d_gain", self.protocol()))
	}

	fn set_d_gain(&self, gain: u16, servo_id: u8) -> Result<(), Error> {
		let _ = (gain, servo_id);
		Err(Error::not_supported("set_d_gain", self.protocol()))
	}

	/// The maximum torque as a percentage.
	fn get_max_torque(&self, servo_id: u8) -> Query<'_, u8> {
		let _ = servo_id;
		Query::error(Error::not_supported("get_max_torque", self.protocol()))
	}

	fn set_max_torque(&self, percent: u8, servo_id: u8) -> Result<(), Error> {
		let _ = (percent, servo_id);
		Err(Error::not_supported("set_max_torque", self.protocol()))
	}

	fn get_servo_id(&self, servo_id: u8) -> Query<'_, u8>;

	/// Give a servo a new ID.
	fn set_servo_id(&self, new_id: u8, servo_id: u8) -> Result<(), Error>;

	/// Persist the memory map of a servo.
	fn save_rom(&self, servo_id: u8) -> Result<(), Error> {
		let _ = servo_id;
		Err(Error::not_supported("save_rom", self.protocol()))
	}

	/// Reset the memory map of a servo to factory defaults.
	fn reset_memory(&self, servo_id: u8) -> Result<(), Error>;

	fn reboot(&self, servo_id: u8) -> Result<(), Error> {
		let _ = servo_id;
		Err(Error::not_supported("reboot", self.protocol()))
	}

	/// The baud rate as a protocol specific index.
	fn get_baud_rate(&self, servo_id: u8) -> Query<'_, u8>;
	fn set_baud_rate(&self, baud_rate_index: u8, servo_id: u8) -> Result<(), Error>;

	/// The clockwise position limit in degrees.
	fn get_limit_cw_position(&self, servo_id: u8) -> Query<'_, f64>;
	fn set_limit_cw_position(&self, degrees: f64, servo_id: u8) -> Result<(), Error>;

	/// The counter-clockwise position limit in degrees.
	fn get_limit_ccw_position(&self, servo_id: u8) -> Query<'_, f64>;
	fn set_limit_ccw_position(&self, degrees: f64, servo_id: u8) -> Result<(), Error>;

	/// The temperature limit in degrees Celsius.
	fn get_limit_temperature(&self, servo_id: u8) -> Query<'_, i16>;

	fn set_limit_temperature(&self, celsius: i16, servo_id: u8) -> Result<(), Error> {
		let _ = (celsius, servo_id);
		Err(Error::not_supported("set_limit_temperature", self.protocol()))
	}

	/// Read raw bytes from the memory map of a servo.
	fn read(&self, servo_id: u8, address: u16, length: u16) -> Query<'_, Vec<u8>>;

	/// Write raw bytes to the memory map of a servo.
	fn write(&self, servo_id: u8, address: u16, data: &[u8]) -> Result<(), Error>;

	/// Move multiple servos with a single command.
	fn set_burst_target_positions(&self, positions: &[(u8, f64)]) -> Result<(), Error>;

	/// Read the present position of multiple servos with a single command.
	fn get_burst_positions(&self, servo_ids: &[u8]) -> Query<'_, Vec<BurstPosition>> {
		let _ = servo_ids;
		Query::error(Error::not_supported("get_burst_positions", self.protocol()))
	}

	/// Read the same memory range from multiple servos with a single command.
	///
	/// Replies are listed in arrival order.
	fn burst_read(&self, address: u16, length: u16, servo_ids: &[u8]) -> Query<'_, Vec<BurstReply>> {
		let _ = (address, length, servo_ids);
		Query::error(Error::not_supported("burst_read", self.protocol()))
	}

	/// Write the same memory range on multiple servos with a single command.
	fn burst_write(&self, address: u16, entries: &[(u8, Vec<u8>)]) -> Result<(), Error>;

	/// Stop the driver.
	///
	/// With `drain` set, commands that are already queued are still sent.
	fn close(&self, drain: bool);
}

/// The dispatcher and settings shared by the protocol drivers.
pub(crate) struct Bus {
	dispatcher: Dispatcher,
	config: Config,
}

impl Bus {
	pub(crate) fn spawn<C: Codec, T: Transport>(transport: T, config: Config) -> Result<Self, Error> {
		let dispatcher = Dispatcher::spawn::<C, T>(transport, &config)?;
		Ok(Self { dispatcher, config })
	}

	pub(crate) fn dispatcher(&self) -> &Dispatcher {
		&self.dispatcher
	}

	pub(crate) fn config(&self) -> &Config {
		&self.config
	}

	/// Build a query for a command that has yet to be sent.
	pub(crate) fn query<T>(
		&self,
		command: Result<Command, Error>,
		decode: impl FnOnce(Vec<Status>) -> Result<T, Error> + Send + 'static,
	) -> Query<'_, T> {
		Query::try_new(&self.dispatcher, command, self.config.response_timeout, decode)
	}

	/// Queue a command without waiting for its reply. Failures of the command are logged.
	pub(crate) fn send(&self, operation: &'static str, command: Result<Command, Error>) -> Result<(), Error> {
		self.dispatcher.enqueue(command?, Completion::Detached { operation })
	}
}

/// Extract the data of the single status packet that answers a unicast request.
///
/// The packet must come from `servo_id` and carry exactly `length` bytes.
pub(crate) fn single_reply(statuses: Vec<Status>, servo_id: u8, length: usize) -> Result<Vec<u8>, Error> {
	let status = statuses
		.into_iter()
		.next()
		.ok_or(InvalidParameterCount { actual: 0, expected: length })?;
	InvalidServoId::check(status.servo_id, servo_id)?;
	InvalidParameterCount::check(status.data.len(), length)?;
	Ok(status.data)
}

/// Clamp a value, mapping NaN to the lower bound.
pub(crate) fn clamp(value: f64, min: f64, max: f64) -> f64 {
	if value.is_nan() {
		min
	} else {
		value.clamp(min, max)
	}
}
