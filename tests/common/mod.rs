#![allow(dead_code)]

mod control_table;
mod dynamixel;
mod futaba;

pub use control_table::ControlTable;
pub use dynamixel::DynamixelBus;
pub use futaba::FutabaBus;

use gs2d::Transport;
use log::{debug, trace};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Produces the bytes the bus sends back after a frame was written.
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

#[derive(Default)]
struct Gate {
	held: Mutex<bool>,
	blocked: Mutex<usize>,
	condvar: Condvar,
}

struct State {
	written: Vec<Vec<u8>>,
	incoming: VecDeque<u8>,
	responder: Responder,
	chunk_size: usize,
	closed: bool,
	next_delay: Option<Duration>,
	ready_at: Option<Instant>,
}

/// A handle to inspect and steer a [`MockTransport`] from the test.
#[derive(Clone)]
pub struct MockBus {
	state: Arc<Mutex<State>>,
	gate: Arc<Gate>,
}

/// A transport that answers written frames through a responder.
pub struct MockTransport {
	bus: MockBus,
}

impl MockBus {
	pub fn new(responder: impl FnMut(&[u8]) -> Vec<u8> + Send + 'static) -> (Self, MockTransport) {
		let bus = Self {
			state: Arc::new(Mutex::new(State {
				written: Vec::new(),
				incoming: VecDeque::new(),
				responder: Box::new(responder),
				chunk_size: usize::MAX,
				closed: false,
				next_delay: None,
				ready_at: None,
			})),
			gate: Arc::new(Gate::default()),
		};
		let transport = MockTransport { bus: bus.clone() };
		(bus, transport)
	}

	/// A bus where nobody ever answers.
	pub fn silent() -> (Self, MockTransport) {
		Self::new(|_| Vec::new())
	}

	/// Hand out received bytes in chunks of at most `chunk_size` bytes.
	pub fn set_chunk_size(&self, chunk_size: usize) {
		self.state.lock().unwrap().chunk_size = chunk_size;
	}

	/// Hold back the response to the next written frame for `delay`.
	pub fn delay_next_response(&self, delay: Duration) {
		self.state.lock().unwrap().next_delay = Some(delay);
	}

	/// All frames written so far.
	pub fn written(&self) -> Vec<Vec<u8>> {
		self.state.lock().unwrap().written.clone()
	}

	pub fn is_closed(&self) -> bool {
		self.state.lock().unwrap().closed
	}

	/// Make writes block until [`Self::release`] is called.
	pub fn hold(&self) {
		*self.gate.held.lock().unwrap() = true;
	}

	pub fn release(&self) {
		*self.gate.held.lock().unwrap() = false;
		self.gate.condvar.notify_all();
	}

	/// Wait until a write is blocked by [`Self::hold`].
	pub fn wait_for_blocked_write(&self) {
		let deadline = Instant::now() + Duration::from_secs(5);
		while *self.gate.blocked.lock().unwrap() == 0 {
			assert!(Instant::now() < deadline, "no write was blocked within 5 seconds");
			std::thread::sleep(Duration::from_millis(1));
		}
	}

	/// Wait until at least `count` frames were written.
	pub fn wait_for_writes(&self, count: usize) -> Vec<Vec<u8>> {
		let deadline = Instant::now() + Duration::from_secs(5);
		loop {
			let written = self.written();
			if written.len() >= count {
				return written;
			}
			assert!(Instant::now() < deadline, "only {} of {} frames written", written.len(), count);
			std::thread::sleep(Duration::from_millis(1));
		}
	}
}

impl Gate {
	fn pass(&self) {
		let mut held = self.held.lock().unwrap();
		if *held {
			*self.blocked.lock().unwrap() += 1;
			while *held {
				held = self.condvar.wait(held).unwrap();
			}
			*self.blocked.lock().unwrap() -= 1;
		}
	}
}

impl Transport for MockTransport {
	fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
		self.bus.gate.pass();
		trace!("mock bus received {:02X?}", data);
		let mut state = self.bus.state.lock().unwrap();
		state.written.push(data.to_vec());
		let response = (state.responder)(data);
		state.incoming.extend(response);
		if let Some(delay) = state.next_delay.take() {
			state.ready_at = Some(Instant::now() + delay);
		}
		Ok(data.len())
	}

	fn read(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
		let mut state = self.bus.state.lock().unwrap();
		let arrived = state.ready_at.map_or(true, |ready_at| Instant::now() >= ready_at);
		if state.incoming.is_empty() || !arrived {
			drop(state);
			std::thread::sleep(Duration::from_millis(1));
			return Ok(0);
		}
		let count = buffer.len().min(state.chunk_size).min(state.incoming.len());
		for (i, byte) in state.incoming.drain(..count).enumerate() {
			buffer[i] = byte;
		}
		Ok(count)
	}

	fn discard_input(&mut self) -> std::io::Result<()> {
		let mut state = self.bus.state.lock().unwrap();
		let arrived = state.ready_at.map_or(true, |ready_at| Instant::now() >= ready_at);
		if arrived && !state.incoming.is_empty() {
			debug!("mock bus discards {:02X?}", state.incoming);
			state.incoming.clear();
		}
		Ok(())
	}

	fn is_open(&self) -> bool {
		!self.bus.is_closed()
	}

	fn close(&mut self) -> std::io::Result<()> {
		self.bus.state.lock().unwrap().closed = true;
		Ok(())
	}
}
