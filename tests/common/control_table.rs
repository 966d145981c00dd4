use log::trace;

/// The register memory of a simulated servo.
#[derive(Clone)]
pub struct ControlTable {
	data: Vec<u8>,
}

impl ControlTable {
	pub fn new(size: usize) -> Self {
		Self { data: vec![0; size] }
	}

	pub fn read(&self, address: u16, length: u16) -> Option<&[u8]> {
		let start = address as usize;
		let end = start + length as usize;
		if end > self.data.len() {
			return None;
		}
		trace!("read {:02X?} from {} in control table", &self.data[start..end], address);
		Some(&self.data[start..end])
	}

	pub fn write(&mut self, address: u16, data: &[u8]) -> bool {
		let start = address as usize;
		let end = start + data.len();
		if end > self.data.len() {
			return false;
		}
		self.data[start..end].copy_from_slice(data);
		trace!("wrote {:02X?} to {} in control table", data, address);
		true
	}
}
