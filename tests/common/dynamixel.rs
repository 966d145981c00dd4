use super::ControlTable;
use gs2d::bytestuff;
use gs2d::crc::calculate_crc;
use log::warn;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Model number reported by every simulated servo.
pub const MODEL_NUMBER: u16 = 1060;

/// Firmware version reported by every simulated servo.
pub const FIRMWARE_VERSION: u8 = 0x26;

const BROADCAST_ID: u8 = 0xFE;

#[derive(Default)]
struct Servos {
	tables: BTreeMap<u8, ControlTable>,
	errors: BTreeMap<u8, u8>,
	corrupt: Vec<u8>,
	garbage: Vec<u8>,
	reverse_sync_read: bool,
	resets: Vec<(u8, u8)>,
	reboots: Vec<u8>,
}

/// A set of simulated Dynamixel protocol 2.0 servos sharing a bus.
#[derive(Clone)]
pub struct DynamixelBus {
	servos: Arc<Mutex<Servos>>,
}

impl DynamixelBus {
	pub fn new(ids: &[u8]) -> Self {
		let mut servos = Servos::default();
		for &id in ids {
			let mut table = ControlTable::new(256);
			table.write(0, &MODEL_NUMBER.to_le_bytes());
			table.write(6, &[FIRMWARE_VERSION]);
			table.write(7, &[id]);
			table.write(8, &[1]);
			table.write(31, &[80]);
			table.write(48, &4095u32.to_le_bytes());
			table.write(52, &0u32.to_le_bytes());
			table.write(80, &0u16.to_le_bytes());
			table.write(82, &0u16.to_le_bytes());
			table.write(84, &800u16.to_le_bytes());
			table.write(126, &100i16.to_le_bytes());
			table.write(128, &(-10i32).to_le_bytes());
			table.write(132, &2048u32.to_le_bytes());
			table.write(144, &120u16.to_le_bytes());
			table.write(146, &[35]);
			servos.tables.insert(id, table);
		}
		Self {
			servos: Arc::new(Mutex::new(servos)),
		}
	}

	/// Make a servo report `error` in the error byte of its status packets.
	pub fn set_error(&self, id: u8, error: u8) {
		self.servos.lock().unwrap().errors.insert(id, error);
	}

	/// Make a servo send status packets with a broken CRC.
	pub fn corrupt(&self, id: u8) {
		self.servos.lock().unwrap().corrupt.push(id);
	}

	/// Send `garbage` in front of every response.
	pub fn set_garbage(&self, garbage: &[u8]) {
		self.servos.lock().unwrap().garbage = garbage.to_vec();
	}

	/// Answer sync reads starting with the last listed servo.
	pub fn reverse_sync_read(&self, reverse: bool) {
		self.servos.lock().unwrap().reverse_sync_read = reverse;
	}

	pub fn register(&self, id: u8, address: u16, length: u16) -> Vec<u8> {
		let servos = self.servos.lock().unwrap();
		servos.tables[&id].read(address, length).unwrap().to_vec()
	}

	pub fn set_register(&self, id: u8, address: u16, data: &[u8]) {
		let mut servos = self.servos.lock().unwrap();
		servos.tables.get_mut(&id).unwrap().write(address, data);
	}

	/// The `(id, mode)` pairs of all received factory resets.
	pub fn resets(&self) -> Vec<(u8, u8)> {
		self.servos.lock().unwrap().resets.clone()
	}

	pub fn reboots(&self) -> Vec<u8> {
		self.servos.lock().unwrap().reboots.clone()
	}

	pub fn responder(&self) -> impl FnMut(&[u8]) -> Vec<u8> + Send + 'static {
		let servos = self.servos.clone();
		move |frame| servos.lock().unwrap().handle(frame)
	}
}

impl Servos {
	fn handle(&mut self, frame: &[u8]) -> Vec<u8> {
		if frame.len() < 10 || frame[..4] != [0xFF, 0xFF, 0xFD, 0x00] {
			warn!("simulated Dynamixel bus ignores invalid frame {:02X?}", frame);
			return Vec::new();
		}
		let length = usize::from(u16::from_le_bytes([frame[5], frame[6]]));
		let (body, crc) = frame.split_at(frame.len() - 2);
		if frame.len() != 7 + length || calculate_crc(0, body) != u16::from_le_bytes([crc[0], crc[1]]) {
			warn!("simulated Dynamixel bus ignores corrupt frame {:02X?}", frame);
			return Vec::new();
		}

		let id = frame[4];
		let instruction = frame[7];
		let params = bytestuff::unstuff(body[8..].to_vec());

		let mut response = self.garbage.clone();
		match instruction {
			0x82 => {
				let address = u16::from_le_bytes([params[0], params[1]]);
				let length = u16::from_le_bytes([params[2], params[3]]);
				let mut ids = params[4..].to_vec();
				if self.reverse_sync_read {
					ids.reverse();
				}
				for id in ids {
					if let Some(data) = self.tables.get(&id).and_then(|table| table.read(address, length)) {
						let data = data.to_vec();
						response.extend(self.status(id, &data));
					}
				}
			},
			0x83 => {
				let address = u16::from_le_bytes([params[0], params[1]]);
				let length = usize::from(u16::from_le_bytes([params[2], params[3]]));
				for entry in params[4..].chunks(length + 1) {
					if let Some(table) = self.tables.get_mut(&entry[0]) {
						table.write(address, &entry[1..]);
					}
				}
			},
			_ if id == BROADCAST_ID => {
				for id in self.tables.keys().copied().collect::<Vec<_>>() {
					self.execute(id, instruction, &params);
				}
			},
			_ => {
				if let Some(data) = self.execute(id, instruction, &params) {
					response.extend(self.status(id, &data));
				}
			},
		}
		response
	}

	/// Run a unicast instruction, returning the parameters of the status packet.
	fn execute(&mut self, id: u8, instruction: u8, params: &[u8]) -> Option<Vec<u8>> {
		let table = self.tables.get_mut(&id)?;
		match instruction {
			0x01 => {
				let mut data = MODEL_NUMBER.to_le_bytes().to_vec();
				data.push(FIRMWARE_VERSION);
				Some(data)
			},
			0x02 => {
				let address = u16::from_le_bytes([params[0], params[1]]);
				let length = u16::from_le_bytes([params[2], params[3]]);
				table.read(address, length).map(|data| data.to_vec())
			},
			0x03 => {
				let address = u16::from_le_bytes([params[0], params[1]]);
				table.write(address, &params[2..]).then(Vec::new)
			},
			0x06 => {
				self.resets.push((id, params[0]));
				Some(Vec::new())
			},
			0x08 => {
				self.reboots.push(id);
				Some(Vec::new())
			},
			_ => None,
		}
	}

	fn status(&self, id: u8, params: &[u8]) -> Vec<u8> {
		let params = bytestuff::stuff(params);
		let length = (params.len() + 4) as u16;
		let error = self.errors.get(&id).copied().unwrap_or(0);
		let mut packet = vec![0xFF, 0xFF, 0xFD, 0x00, id];
		packet.extend_from_slice(&length.to_le_bytes());
		packet.extend_from_slice(&[0x55, error]);
		packet.extend_from_slice(&params);
		let mut crc = calculate_crc(0, &packet);
		if self.corrupt.contains(&id) {
			crc ^= 0x5A5A;
		}
		packet.extend_from_slice(&crc.to_le_bytes());
		packet
	}
}
