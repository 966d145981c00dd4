use super::ControlTable;
use gs2d::protocol::futaba::checksum;
use log::warn;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Model number reported by every simulated servo.
pub const MODEL_NUMBER: u16 = 0x4005;

/// Firmware version reported by every simulated servo.
pub const FIRMWARE_VERSION: u8 = 0x12;

#[derive(Default)]
struct Servos {
	tables: BTreeMap<u8, ControlTable>,
	corrupt_replies: bool,
	flags: Vec<(u8, u8)>,
}

/// A set of simulated Futaba servos sharing a bus.
#[derive(Clone)]
pub struct FutabaBus {
	servos: Arc<Mutex<Servos>>,
}

impl FutabaBus {
	pub fn new(ids: &[u8]) -> Self {
		let mut servos = Servos::default();
		for &id in ids {
			let mut table = ControlTable::new(256);
			table.write(0x00, &MODEL_NUMBER.to_le_bytes());
			table.write(0x02, &[FIRMWARE_VERSION]);
			table.write(0x04, &[id]);
			table.write(0x06, &[0x07]);
			table.write(0x08, &1500u16.to_le_bytes());
			table.write(0x0A, &(-1500i16).to_le_bytes());
			table.write(0x0E, &75u16.to_le_bytes());
			table.write(0x23, &[100]);
			table.write(0x26, &[100]);
			table.write(0x2A, &(-900i16).to_le_bytes());
			table.write(0x2E, &(-12i16).to_le_bytes());
			table.write(0x30, &250u16.to_le_bytes());
			table.write(0x32, &31u16.to_le_bytes());
			table.write(0x34, &740u16.to_le_bytes());
			servos.tables.insert(id, table);
		}
		Self {
			servos: Arc::new(Mutex::new(servos)),
		}
	}

	/// Make servos answer with a broken checksum.
	pub fn corrupt_replies(&self, corrupt: bool) {
		self.servos.lock().unwrap().corrupt_replies = corrupt;
	}

	pub fn register(&self, id: u8, address: u8, length: u8) -> Vec<u8> {
		let servos = self.servos.lock().unwrap();
		servos.tables[&id].read(address.into(), length.into()).unwrap().to_vec()
	}

	pub fn set_register(&self, id: u8, address: u8, data: &[u8]) {
		let mut servos = self.servos.lock().unwrap();
		servos.tables.get_mut(&id).unwrap().write(address.into(), data);
	}

	/// The `(id, flag)` pairs of all received flag-only commands.
	pub fn flags(&self) -> Vec<(u8, u8)> {
		self.servos.lock().unwrap().flags.clone()
	}

	pub fn responder(&self) -> impl FnMut(&[u8]) -> Vec<u8> + Send + 'static {
		let servos = self.servos.clone();
		move |frame| servos.lock().unwrap().handle(frame)
	}
}

impl Servos {
	fn handle(&mut self, frame: &[u8]) -> Vec<u8> {
		if frame.len() < 8 || frame[..2] != [0xFA, 0xAF] || checksum(&frame[..frame.len() - 1]) != frame[frame.len() - 1] {
			warn!("simulated Futaba bus ignores invalid frame {:02X?}", frame);
			return Vec::new();
		}
		let (id, flag, address, length, count) = (frame[2], frame[3], frame[4], frame[5], frame[6]);
		let data = &frame[7..frame.len() - 1];

		if id == 0 {
			for entry in data.chunks(length.into()).take(count.into()) {
				if let Some(table) = self.tables.get_mut(&entry[0]) {
					table.write(address.into(), &entry[1..]);
				}
			}
			return Vec::new();
		}

		let corrupt = self.corrupt_replies;
		let table = match self.tables.get_mut(&id) {
			Some(table) => table,
			None => return Vec::new(),
		};

		match flag {
			0x0F => {
				let value = match table.read(address.into(), length.into()) {
					Some(value) => value.to_vec(),
					None => return Vec::new(),
				};
				let mut reply = vec![0xFD, 0xDF, id, 0x00, address, length, 0x01];
				reply.extend_from_slice(&value);
				let sum = checksum(&reply);
				reply.push(if corrupt { !sum } else { sum });
				reply
			},
			0x00 if count == 1 => {
				table.write(address.into(), data);
				Vec::new()
			},
			flag => {
				self.flags.push((id, flag));
				Vec::new()
			},
		}
	}
}
