//! Collection of the status packets that answer one command.

use crate::protocol::{Command, Status};
use crate::Error;

/// The state of a request waiting for its status packets.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BurstState {
	/// Waiting for more status packets.
	Collecting,

	/// All expected status packets arrived.
	Complete,

	/// A status packet could not be decoded, the request failed.
	Aborted,
}

/// Aggregates the status packets for a single command.
///
/// A normal command is a burst of one. A sync write is a burst of zero.
#[derive(Debug)]
pub struct Burst {
	expected: usize,
	servo_ids: Vec<u8>,
	responses: Vec<Status>,
	error: Option<Error>,
}

impl Burst {
	pub fn new(expected: usize) -> Self {
		Self {
			expected,
			servo_ids: Vec::new(),
			responses: Vec::with_capacity(expected),
			error: None,
		}
	}

	/// Create a burst that only counts status packets from the servos addressed by `command`.
	pub fn for_command(command: &Command) -> Self {
		Self {
			servo_ids: command.servo_ids.clone(),
			..Self::new(command.expected_response_count)
		}
	}

	/// The number of distinct servos that answered so far.
	pub fn received(&self) -> usize {
		self.responses.len()
	}

	pub fn expected(&self) -> usize {
		self.expected
	}

	pub fn state(&self) -> BurstState {
		if self.error.is_some() {
			BurstState::Aborted
		} else if self.responses.len() >= self.expected {
			BurstState::Complete
		} else {
			BurstState::Collecting
		}
	}

	/// Check if no more frames are needed, either because all arrived or because the burst was aborted.
	pub fn is_done(&self) -> bool {
		!matches!(self.state(), BurstState::Collecting)
	}

	/// Feed the decode result of one frame.
	///
	/// A decode error aborts the whole burst, even if other servos already answered.
	/// A second frame from a servo that already answered is ignored,
	/// and so is a frame from a servo the command was not sent to.
	pub fn push(&mut self, frame: Result<Status, Error>) -> BurstState {
		if self.is_done() {
			return self.state();
		}
		match frame {
			Err(e) => {
				debug!("aborting request after {} of {} responses: {}", self.received(), self.expected, e);
				self.error = Some(e);
				BurstState::Aborted
			},
			Ok(status) => {
				if !self.servo_ids.is_empty() && !self.servo_ids.contains(&status.servo_id) {
					debug!("ignoring response from servo {}, which was not addressed", status.servo_id);
				} else if self.responses.iter().any(|r| r.servo_id == status.servo_id) {
					debug!("ignoring duplicate response from servo {}", status.servo_id);
				} else {
					self.responses.push(status);
				}
				if self.responses.len() >= self.expected {
					BurstState::Complete
				} else {
					BurstState::Collecting
				}
			},
		}
	}

	/// Finish the burst, yielding the collected statuses or the error that aborted it.
	pub fn finish(self) -> Result<Vec<Status>, Error> {
		match self.error {
			Some(e) => Err(e),
			None => Ok(self.responses),
		}
	}
}
