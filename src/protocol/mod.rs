//! Wire protocols: framing, checksums and response detection.

pub mod futaba;
pub mod robotis;

pub use futaba::FutabaCodec;
pub use robotis::RobotisCodec;

use crate::Error;

/// An encoded command, ready to be written to the bus.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Command {
	/// The raw bytes to transmit.
	pub payload: Vec<u8>,

	/// The number of status frames the command elicits.
	///
	/// Zero for commands that are not answered, like broadcasts and Futaba writes.
	pub expected_response_count: usize,

	/// The servos whose status frames answer the command.
	///
	/// Empty if any servo may answer. Frames from other servos are ignored otherwise.
	pub servo_ids: Vec<u8>,
}

impl Command {
	/// A command that is not answered.
	pub fn no_response(payload: Vec<u8>) -> Self {
		Self::burst(payload, 0)
	}

	/// A command answered by a single status frame.
	pub fn single(payload: Vec<u8>) -> Self {
		Self::burst(payload, 1)
	}

	/// A command answered by `count` status frames.
	pub fn burst(payload: Vec<u8>, count: usize) -> Self {
		Self {
			payload,
			expected_response_count: count,
			servo_ids: Vec::new(),
		}
	}

	/// A command answered by one status frame from each listed servo.
	pub fn from_servos(payload: Vec<u8>, servo_ids: &[u8]) -> Self {
		Self {
			payload,
			expected_response_count: servo_ids.len(),
			servo_ids: servo_ids.to_vec(),
		}
	}

	/// Check if the command elicits any response.
	pub fn expects_response(&self) -> bool {
		self.expected_response_count > 0
	}
}

/// A decoded and checksum-verified status frame.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Status {
	/// The ID of the servo that sent the frame.
	pub servo_id: u8,

	/// The data carried by the frame.
	pub data: Vec<u8>,
}

/// Framing rules of a wire protocol.
pub trait Codec: Send + 'static {
	/// The name of the protocol, used in error messages.
	const NAME: &'static str;

	/// Get the total size of the frame at the start of `buffer`, if enough of it has arrived to know.
	fn frame_len(buffer: &[u8]) -> Option<usize>;

	/// Check if `buffer` holds at least one complete frame.
	fn is_complete(buffer: &[u8]) -> bool {
		matches!(Self::frame_len(buffer), Some(len) if buffer.len() >= len)
	}

	/// Find the first position in `buffer` where a frame could start.
	///
	/// Bytes before that position can be discarded.
	fn find_header(buffer: &[u8]) -> usize {
		let _ = buffer;
		0
	}

	/// Validate and decode a single complete frame.
	fn decode(frame: &[u8]) -> Result<Status, Error>;
}
