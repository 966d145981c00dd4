//! The command dispatcher.
//!
//! Commands are queued by callers and sent one at a time by a background thread,
//! which also collects the response of each command before sending the next one.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::burst::Burst;
use crate::completion::{Completion, RawReply};
use crate::error::{QueueFull, ReceiveTimeout};
use crate::protocol::{Codec, Command};
use crate::transport::{self, Transport};
use crate::{Config, Error};

/// Size of the chunks read from the transport.
const READ_CHUNK_SIZE: usize = 256;

/// Back-off after a read that returned nothing.
const IDLE_READ_DELAY: Duration = Duration::from_millis(1);

/// A command together with the way its reply must be delivered.
pub(crate) struct PendingRequest {
	command: Command,
	completion: Completion,
}

struct Queue {
	pending: VecDeque<PendingRequest>,

	/// Cleared when the dispatcher is closed.
	polling: bool,

	/// Keep sending queued commands after polling stopped.
	drain: bool,
}

struct Shared {
	queue: Mutex<Queue>,
	condvar: Condvar,
}

impl Shared {
	fn lock(&self) -> MutexGuard<'_, Queue> {
		self.queue.lock().unwrap_or_else(|e| e.into_inner())
	}
}

/// Owns the command queue and the thread that talks to the bus.
pub(crate) struct Dispatcher {
	shared: Arc<Shared>,
	thread: Mutex<Option<JoinHandle<()>>>,
	capacity: usize,
}

impl Dispatcher {
	/// Start a dispatcher thread that owns `transport` and frames responses with codec `C`.
	pub(crate) fn spawn<C: Codec, T: Transport>(transport: T, config: &Config) -> Result<Self, Error> {
		let shared = Arc::new(Shared {
			queue: Mutex::new(Queue {
				pending: VecDeque::with_capacity(config.queue_capacity.min(Config::DEFAULT_QUEUE_CAPACITY)),
				polling: true,
				drain: false,
			}),
			condvar: Condvar::new(),
		});

		let framing_timeout = config.framing_timeout;
		let thread = std::thread::Builder::new().name("gs2d-dispatch".into()).spawn({
			let shared = shared.clone();
			move || run::<C, T>(&shared, transport, framing_timeout)
		})?;

		Ok(Self {
			shared,
			thread: Mutex::new(Some(thread)),
			capacity: config.queue_capacity,
		})
	}

	/// Add a command to the end of the queue.
	///
	/// Fails with [`Error::QueueFull`] instead of blocking when the queue is at capacity,
	/// and with [`Error::Closed`] after [`Self::close`] was called.
	pub(crate) fn enqueue(&self, command: Command, completion: Completion) -> Result<(), Error> {
		let mut queue = self.shared.lock();
		if !queue.polling {
			return Err(Error::Closed);
		}
		if queue.pending.len() >= self.capacity {
			return Err(QueueFull {
				capacity: self.capacity,
			}
			.into());
		}
		queue.pending.push_back(PendingRequest { command, completion });
		self.shared.condvar.notify_all();
		Ok(())
	}

	/// The number of commands waiting to be sent.
	pub(crate) fn pending(&self) -> usize {
		self.shared.lock().pending.len()
	}

	/// Stop accepting commands and wait for the dispatch thread to exit.
	///
	/// With `drain` set, queued commands are still sent and answered first.
	/// Otherwise they are dropped unsent and their callbacks never run.
	/// Closing more than once has no further effect.
	pub(crate) fn close(&self, drain: bool) {
		{
			let mut queue = self.shared.lock();
			if queue.polling {
				queue.polling = false;
				queue.drain = drain;
			}
			self.shared.condvar.notify_all();
		}

		let thread = self.thread.lock().unwrap_or_else(|e| e.into_inner()).take();
		if let Some(thread) = thread {
			// A callback thread may hold the last reference, but the dispatch thread never does.
			if thread.thread().id() == std::thread::current().id() {
				return;
			}
			if thread.join().is_err() {
				warn!("dispatch thread panicked");
			}
		}
	}
}

impl Drop for Dispatcher {
	fn drop(&mut self) {
		self.close(true);
	}
}

/// Take the next request to send, sleeping while the queue is empty.
///
/// Returns `None` when the dispatch loop should stop.
fn next_request(shared: &Shared) -> Option<PendingRequest> {
	let mut queue = shared.lock();
	loop {
		if !queue.polling && !queue.drain {
			return None;
		}
		if let Some(request) = queue.pending.pop_front() {
			return Some(request);
		}
		if !queue.polling {
			return None;
		}
		queue = shared.condvar.wait(queue).unwrap_or_else(|e| e.into_inner());
	}
}

fn run<C: Codec, T: Transport>(shared: &Shared, mut transport: T, framing_timeout: Duration) {
	debug!("dispatch thread started for {}", C::NAME);
	while let Some(request) = next_request(shared) {
		let reply = transfer::<C, T>(&mut transport, &request.command, framing_timeout);
		request.completion.complete(reply);
	}

	let abandoned = std::mem::take(&mut shared.lock().pending);
	if !abandoned.is_empty() {
		debug!("dropping {} unsent commands", abandoned.len());
	}
	for request in abandoned {
		request.completion.abandon();
	}

	if let Err(e) = transport.close() {
		warn!("failed to close transport: {}", e);
	}
	debug!("dispatch thread stopped");
}

/// Send one command and collect all the status frames it elicits.
fn transfer<C: Codec, T: Transport>(transport: &mut T, command: &Command, framing_timeout: Duration) -> RawReply {
	if !transport.is_open() {
		return Err(std::io::Error::from(std::io::ErrorKind::NotConnected).into());
	}

	// Late replies to an earlier command would otherwise be taken as the reply to this one.
	trace!("discarding unread input");
	transport.discard_input()?;

	trace!("sending command: {:02X?}", command.payload);
	transport::write_all(transport, &command.payload)?;

	let mut burst = Burst::for_command(&command);
	if burst.is_done() {
		return burst.finish();
	}

	let deadline = Instant::now() + framing_timeout;
	let mut buffer = Vec::new();
	let mut chunk = [0; READ_CHUNK_SIZE];
	let mut received = 0;
	loop {
		let garbage = C::find_header(&buffer);
		if garbage > 0 {
			debug!("skipping {} bytes of garbage: {:02X?}", garbage, &buffer[..garbage]);
			buffer.drain(..garbage);
		}

		if C::is_complete(&buffer) {
			let frame_len = C::frame_len(&buffer).unwrap_or(buffer.len()).min(buffer.len());
			let frame: Vec<u8> = buffer.drain(..frame_len).collect();
			trace!("received frame: {:02X?}", frame);
			burst.push(C::decode(&frame));
			if burst.is_done() {
				return burst.finish();
			}
			continue;
		}

		if Instant::now() >= deadline {
			debug!(
				"timeout after {} of {} responses, {} bytes pending: {:02X?}",
				burst.received(),
				burst.expected(),
				buffer.len(),
				buffer
			);
			return Err(ReceiveTimeout {
				timeout: framing_timeout,
				received,
			}
			.into());
		}

		let read = transport.read(&mut chunk)?;
		if read == 0 {
			std::thread::sleep(IDLE_READ_DELAY);
		}
		received += read;
		buffer.extend_from_slice(&chunk[..read]);
	}
}
