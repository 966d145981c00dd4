//! Serial port transport implementation using the `serial2` crate.

use std::path::Path;
use std::time::Duration;

/// Re-exported `serial2` crate in case you need to modify serial port settings.
pub use serial2;

/// The default baud rate of both servo families.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// A [`Transport`][super::Transport] backed by a serial port.
pub struct SerialTransport {
	port: Option<serial2::SerialPort>,
}

impl SerialTransport {
	/// Open a serial port with the given baud rate.
	///
	/// The port is configured in raw mode with 8 data bits, no parity and 1 stop bit.
	pub fn open(path: impl AsRef<Path>, baud_rate: u32) -> std::io::Result<Self> {
		let port = serial2::SerialPort::open(path, baud_rate)?;
		Self::from_port(port)
	}

	/// Wrap an already configured serial port.
	pub fn from_port(mut port: serial2::SerialPort) -> std::io::Result<Self> {
		port.set_read_timeout(POLL_TIMEOUT)?;
		Ok(Self { port: Some(port) })
	}

	/// Get a reference to the underlying serial port, if it is still open.
	pub fn port(&self) -> Option<&serial2::SerialPort> {
		self.port.as_ref()
	}

	fn port_mut(&mut self) -> std::io::Result<&mut serial2::SerialPort> {
		self.port.as_mut().ok_or_else(|| std::io::ErrorKind::NotConnected.into())
	}
}

impl super::Transport for SerialTransport {
	fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
		self.port_mut()?.write(data)
	}

	fn read(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
		match self.port_mut()?.read(buffer) {
			Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
			Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
			result => result,
		}
	}

	fn discard_input(&mut self) -> std::io::Result<()> {
		self.port_mut()?.discard_input_buffer()
	}

	fn is_open(&self) -> bool {
		self.port.is_some()
	}

	fn close(&mut self) -> std::io::Result<()> {
		self.port = None;
		Ok(())
	}
}
