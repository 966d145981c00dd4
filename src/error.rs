use std::time::Duration;

/// An error that can occur while talking to a servo.
#[derive(Debug)]
pub enum Error {
	/// A servo ID, address or value is out of range. Nothing was sent.
	InvalidParameter(InvalidParameter),

	/// The operation is not available for the protocol in use. Nothing was sent.
	NotSupported(NotSupported),

	/// The command queue is full.
	QueueFull(QueueFull),

	/// The driver was closed.
	Closed,

	/// No complete and valid response arrived in time.
	ReceiveTimeout(ReceiveTimeout),

	/// The checksum of a received frame does not match its contents.
	ChecksumMismatch(InvalidChecksum),

	/// A received frame could not be decoded.
	MalformedResponse(MalformedResponse),

	/// The servo reported an error in its status packet.
	DeviceReportedError(DeviceError),

	/// The transport failed.
	Io(std::io::Error),
}

/// A parameter is outside of its valid range.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InvalidParameter {
	pub name: &'static str,
	pub message: String,
}

/// The operation is not supported by the protocol.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NotSupported {
	pub operation: &'static str,
	pub protocol: &'static str,
}

/// The command queue has reached its capacity.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct QueueFull {
	pub capacity: usize,
}

/// Waiting for a response timed out.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ReceiveTimeout {
	pub timeout: Duration,

	/// The number of bytes received before the timeout.
	pub received: usize,
}

/// The received message has an invalid checksum value.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InvalidChecksum {
	pub message: u16,
	pub computed: u16,
}

/// The received message is not valid.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MalformedResponse {
	InvalidHeaderPrefix(InvalidHeaderPrefix),
	InvalidInstruction(InvalidInstruction),
	InvalidLength(InvalidLength),
	InvalidParameterCount(InvalidParameterCount),
	InvalidServoId(InvalidServoId),
}

/// The received message has an invalid header prefix.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InvalidHeaderPrefix {
	pub actual: Vec<u8>,
	pub expected: &'static [u8],
}

/// The received message has an unexpected instruction value.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InvalidInstruction {
	pub actual: u8,
	pub expected: u8,
}

/// The length field of a frame does not agree with the frame itself.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InvalidLength {
	pub declared: usize,
	pub actual: usize,
}

/// The response carries a different amount of data than requested.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InvalidParameterCount {
	pub actual: usize,
	pub expected: usize,
}

/// The response came from a different servo than the one addressed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InvalidServoId {
	pub actual: u8,
	pub expected: u8,
}

/// An error status reported by a servo.
///
/// Refer to the manual of your servo for the meaning of the error number.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DeviceError {
	pub servo_id: u8,
	pub raw: u8,
}

impl Error {
	pub(crate) fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
		Self::InvalidParameter(InvalidParameter {
			name,
			message: message.into(),
		})
	}

	pub(crate) fn not_supported(operation: &'static str, protocol: &'static str) -> Self {
		Self::NotSupported(NotSupported { operation, protocol })
	}
}

impl InvalidParameter {
	pub fn check_range<T>(name: &'static str, value: T, min: T, max: T) -> Result<T, Self>
	where
		T: PartialOrd + std::fmt::Display + Copy,
	{
		if value >= min && value <= max {
			Ok(value)
		} else {
			Err(Self {
				name,
				message: format!("{} is outside of the range {}..={}", value, min, max),
			})
		}
	}
}

impl InvalidChecksum {
	pub fn check(computed: u16, message: u16) -> Result<(), Self> {
		if computed == message {
			Ok(())
		} else {
			Err(Self { message, computed })
		}
	}
}

impl InvalidHeaderPrefix {
	pub fn check(actual: &[u8], expected: &'static [u8]) -> Result<(), Self> {
		if actual.starts_with(expected) {
			Ok(())
		} else {
			Err(Self {
				actual: actual[..expected.len().min(actual.len())].to_vec(),
				expected,
			})
		}
	}
}

impl InvalidInstruction {
	pub fn check(actual: u8, expected: u8) -> Result<(), Self> {
		if actual == expected {
			Ok(())
		} else {
			Err(Self { actual, expected })
		}
	}
}

impl InvalidParameterCount {
	pub fn check(actual: usize, expected: usize) -> Result<(), Self> {
		if actual == expected {
			Ok(())
		} else {
			Err(Self { actual, expected })
		}
	}
}

impl InvalidServoId {
	pub fn check(actual: u8, expected: u8) -> Result<(), Self> {
		if actual == expected {
			Ok(())
		} else {
			Err(Self { actual, expected })
		}
	}
}

impl DeviceError {
	pub fn check(servo_id: u8, raw: u8) -> Result<(), Self> {
		if raw == 0 {
			Ok(())
		} else {
			Err(Self { servo_id, raw })
		}
	}

	/// The alert bit, set when the servo has a hardware error pending.
	pub fn alert(&self) -> bool {
		self.raw & 0x80 != 0
	}

	/// The error number without the alert bit.
	pub fn error_number(&self) -> u8 {
		self.raw & 0x7F
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl std::error::Error for InvalidParameter {}
impl std::error::Error for NotSupported {}
impl std::error::Error for QueueFull {}
impl std::error::Error for ReceiveTimeout {}
impl std::error::Error for InvalidChecksum {}
impl std::error::Error for MalformedResponse {}
impl std::error::Error for InvalidHeaderPrefix {}
impl std::error::Error for InvalidInstruction {}
impl std::error::Error for InvalidLength {}
impl std::error::Error for InvalidParameterCount {}
impl std::error::Error for InvalidServoId {}
impl std::error::Error for DeviceError {}

impl From<std::io::Error> for Error {
	fn from(other: std::io::Error) -> Self {
		Self::Io(other)
	}
}

impl From<InvalidParameter> for Error {
	fn from(other: InvalidParameter) -> Self {
		Self::InvalidParameter(other)
	}
}

impl From<NotSupported> for Error {
	fn from(other: NotSupported) -> Self {
		Self::NotSupported(other)
	}
}

impl From<QueueFull> for Error {
	fn from(other: QueueFull) -> Self {
		Self::QueueFull(other)
	}
}

impl From<ReceiveTimeout> for Error {
	fn from(other: ReceiveTimeout) -> Self {
		Self::ReceiveTimeout(other)
	}
}

impl From<InvalidChecksum> for Error {
	fn from(other: InvalidChecksum) -> Self {
		Self::ChecksumMismatch(other)
	}
}

impl From<MalformedResponse> for Error {
	fn from(other: MalformedResponse) -> Self {
		Self::MalformedResponse(other)
	}
}

impl From<DeviceError> for Error {
	fn from(other: DeviceError) -> Self {
		Self::DeviceReportedError(other)
	}
}

impl From<InvalidHeaderPrefix> for Error {
	fn from(other: InvalidHeaderPrefix) -> Self {
		Self::MalformedResponse(other.into())
	}
}

impl From<InvalidInstruction> for Error {
	fn from(other: InvalidInstruction) -> Self {
		Self::MalformedResponse(other.into())
	}
}

impl From<InvalidLength> for Error {
	fn from(other: InvalidLength) -> Self {
		Self::MalformedResponse(other.into())
	}
}

impl From<InvalidParameterCount> for Error {
	fn from(other: InvalidParameterCount) -> Self {
		Self::MalformedResponse(other.into())
	}
}

impl From<InvalidServoId> for Error {
	fn from(other: InvalidServoId) -> Self {
		Self::MalformedResponse(other.into())
	}
}

impl From<InvalidHeaderPrefix> for MalformedResponse {
	fn from(other: InvalidHeaderPrefix) -> Self {
		Self::InvalidHeaderPrefix(other)
	}
}

impl From<InvalidInstruction> for MalformedResponse {
	fn from(other: InvalidInstruction) -> Self {
		Self::InvalidInstruction(other)
	}
}

impl From<InvalidLength> for MalformedResponse {
	fn from(other: InvalidLength) -> Self {
		Self::InvalidLength(other)
	}
}

impl From<InvalidParameterCount> for MalformedResponse {
	fn from(other: InvalidParameterCount) -> Self {
		Self::InvalidParameterCount(other)
	}
}

impl From<InvalidServoId> for MalformedResponse {
	fn from(other: InvalidServoId) -> Self {
		Self::InvalidServoId(other)
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::InvalidParameter(e) => write!(f, "{}", e),
			Self::NotSupported(e) => write!(f, "{}", e),
			Self::QueueFull(e) => write!(f, "{}", e),
			Self::Closed => write!(f, "the driver has been closed"),
			Self::ReceiveTimeout(e) => write!(f, "{}", e),
			Self::ChecksumMismatch(e) => write!(f, "{}", e),
			Self::MalformedResponse(e) => write!(f, "{}", e),
			Self::DeviceReportedError(e) => write!(f, "{}", e),
			Self::Io(e) => write!(f, "transport error: {}", e),
		}
	}
}

impl std::fmt::Display for InvalidParameter {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "invalid {}: {}", self.name, self.message)
	}
}

impl std::fmt::Display for NotSupported {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{} is not supported by the {} protocol", self.operation, self.protocol)
	}
}

impl std::fmt::Display for QueueFull {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "command queue is full ({} pending commands)", self.capacity)
	}
}

impl std::fmt::Display for ReceiveTimeout {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"no complete response within {:?} ({} bytes received)",
			self.timeout, self.received
		)
	}
}

impl std::fmt::Display for InvalidChecksum {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"invalid checksum, message claims {:#02X}, computed {:#02X}",
			self.message, self.computed
		)
	}
}

impl std::fmt::Display for MalformedResponse {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::InvalidHeaderPrefix(e) => write!(f, "{}", e),
			Self::InvalidInstruction(e) => write!(f, "{}", e),
			Self::InvalidLength(e) => write!(f, "{}", e),
			Self::InvalidParameterCount(e) => write!(f, "{}", e),
			Self::InvalidServoId(e) => write!(f, "{}", e),
		}
	}
}

impl std::fmt::Display for InvalidHeaderPrefix {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"invalid header prefix, expected {:02X?}, got {:02X?}",
			self.expected, self.actual
		)
	}
}

impl std::fmt::Display for InvalidInstruction {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"invalid instruction ID, expected {:#02X}, got {:#02X}",
			self.expected, self.actual
		)
	}
}

impl std::fmt::Display for InvalidLength {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "invalid frame length, declared {}, got {}", self.declared, self.actual)
	}
}

impl std::fmt::Display for InvalidParameterCount {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "invalid parameter count, expected {}, got {}", self.expected, self.actual)
	}
}

impl std::fmt::Display for InvalidServoId {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "invalid servo ID, expected {}, got {}", self.expected, self.actual)
	}
}

impl std::fmt::Display for DeviceError {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "servo {} reported error status: {:#02X}", self.servo_id, self.raw)
	}
}
