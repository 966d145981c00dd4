use std::time::Duration;

/// Tuning of the command dispatcher and reply handling.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
	/// The maximum number of commands waiting to be sent.
	pub queue_capacity: usize,

	/// How long the dispatcher waits for the complete response to a command.
	pub framing_timeout: Duration,

	/// How long a blocking call waits for its value, including time spent in the queue.
	pub response_timeout: Duration,
}

impl Config {
	pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
	pub const DEFAULT_FRAMING_TIMEOUT: Duration = Duration::from_secs(2);
	pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(19);

	pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
		self.queue_capacity = queue_capacity;
		self
	}

	pub fn with_framing_timeout(mut self, framing_timeout: Duration) -> Self {
		self.framing_timeout = framing_timeout;
		self
	}

	pub fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
		self.response_timeout = response_timeout;
		self
	}
}

impl Default for Config {
	fn default() -> Self {
		Self {
			queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
			framing_timeout: Self::DEFAULT_FRAMING_TIMEOUT,
			response_timeout: Self::DEFAULT_RESPONSE_TIMEOUT,
		}
	}
}
