//! Byte transports that carry frames to and from the servos.

#[cfg(feature = "serial2")]
mod serial2;

#[cfg(feature = "serial2")]
pub use self::serial2::SerialTransport;

/// A half-duplex byte stream connected to a servo bus.
///
/// The transport is owned by the dispatch thread of a driver,
/// so it must be [`Send`] and must not borrow anything.
pub trait Transport: Send + 'static {
	/// Write bytes to the bus, returning the number of bytes written.
	fn write(&mut self, data: &[u8]) -> std::io::Result<usize>;

	/// Read whatever bytes are currently available.
	///
	/// May return `Ok(0)` if nothing arrived within a short poll interval.
	fn read(&mut self, buffer: &mut [u8]) -> std::io::Result<usize>;

	/// Throw away all bytes that were received but not read yet.
	fn discard_input(&mut self) -> std::io::Result<()>;

	/// Check if the transport is still usable.
	fn is_open(&self) -> bool;

	/// Close the transport.
	fn close(&mut self) -> std::io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
	fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
		(**self).write(data)
	}

	fn read(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
		(**self).read(buffer)
	}

	fn discard_input(&mut self) -> std::io::Result<()> {
		(**self).discard_input()
	}

	fn is_open(&self) -> bool {
		(**self).is_open()
	}

	fn close(&mut self) -> std::io::Result<()> {
		(**self).close()
	}
}

/// Write a complete buffer to a transport.
pub(crate) fn write_all(transport: &mut impl Transport, mut data: &[u8]) -> std::io::Result<()> {
	while !data.is_empty() {
		match transport.write(data)? {
			0 => return Err(std::io::ErrorKind::WriteZero.into()),
			n => data = &data[n..],
		}
	}
	Ok(())
}
