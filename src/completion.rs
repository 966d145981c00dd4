//! Delivery of replies to callers.
//!
//! Every request is completed exactly once, in one of three ways:
//! by waking a blocked caller, by calling a callback or by resolving a future.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::channel::oneshot;

use crate::dispatcher::Dispatcher;
use crate::error::ReceiveTimeout;
use crate::protocol::{Command, Status};
use crate::Error;

/// The undecoded result of a request: the collected status packets or the error that ended it.
pub(crate) type RawReply = Result<Vec<Status>, Error>;

/// Turns the status packets of a request into the value the caller asked for.
pub(crate) type Decoder<T> = Box<dyn FnOnce(Vec<Status>) -> Result<T, Error> + Send>;

/// How a request reports back to whoever issued it.
pub(crate) enum Completion {
	/// Wake a thread blocked in [`Query::wait`].
	Blocking(Arc<BlockingSlot>),

	/// Run a callback on a new thread.
	Callback(Box<dyn FnOnce(RawReply) + Send>),

	/// Resolve a [`Reply`] future.
	Future(oneshot::Sender<RawReply>),

	/// Nobody is waiting. Failures are logged.
	Detached { operation: &'static str },
}

impl Completion {
	/// Give up on a request that was never sent.
	///
	/// Blocked callers are woken with [`Error::Closed`] and futures resolve to it.
	/// Callbacks are dropped without being called.
	pub(crate) fn abandon(self) {
		match self {
			Self::Blocking(slot) => slot.fill(Err(Error::Closed)),
			Self::Callback(_) | Self::Future(_) | Self::Detached { .. } => (),
		}
	}

	pub(crate) fn complete(self, reply: RawReply) {
		match self {
			Self::Blocking(slot) => slot.fill(reply),
			Self::Callback(callback) => {
				let spawned = std::thread::Builder::new()
					.name("gs2d-callback".into())
					.spawn(move || callback(reply));
				if let Err(e) = spawned {
					warn!("failed to spawn callback thread: {}", e);
				}
			},
			Self::Future(sender) => {
				// The receiver is gone if the future was dropped, nothing left to do then.
				let _ = sender.send(reply);
			},
			Self::Detached { operation } => {
				if let Err(e) = reply {
					warn!("{} failed: {}", operation, e);
				}
			},
		}
	}
}

/// A slot that a blocked caller waits on.
#[derive(Default)]
pub(crate) struct BlockingSlot {
	reply: Mutex<Option<RawReply>>,
	condvar: Condvar,
}

impl BlockingSlot {
	fn fill(&self, reply: RawReply) {
		let mut slot = self.reply.lock().unwrap_or_else(|e| e.into_inner());
		*slot = Some(reply);
		self.condvar.notify_all();
	}

	/// Wait for the reply, giving up after `timeout`.
	fn wait(&self, timeout: Duration) -> Option<RawReply> {
		let deadline = Instant::now() + timeout;
		let mut slot = self.reply.lock().unwrap_or_else(|e| e.into_inner());
		loop {
			if let Some(reply) = slot.take() {
				return Some(reply);
			}
			let remaining = deadline.checked_duration_since(Instant::now())?;
			slot = self
				.condvar
				.wait_timeout(slot, remaining)
				.unwrap_or_else(|e| e.into_inner())
				.0;
		}
	}
}

/// A request for a value from one or more servos.
///
/// Nothing is sent until the query is consumed.
/// Use [`Query::wait`] to block for the value, [`Query::on_reply`] to receive it in a callback,
/// or `.await` the query to receive it asynchronously.
#[must_use = "queries do nothing unless waited on, given a callback or awaited"]
pub struct Query<'a, T> {
	inner: Result<Request<'a, T>, Error>,
}

struct Request<'a, T> {
	dispatcher: &'a Dispatcher,
	command: Command,
	response_timeout: Duration,
	decode: Decoder<T>,
}

impl<'a, T> Query<'a, T> {
	pub(crate) fn new(
		dispatcher: &'a Dispatcher,
		command: Command,
		response_timeout: Duration,
		decode: impl FnOnce(Vec<Status>) -> Result<T, Error> + Send + 'static,
	) -> Self {
		Self {
			inner: Ok(Request {
				dispatcher,
				command,
				response_timeout,
				decode: Box::new(decode),
			}),
		}
	}

	/// A query that fails without sending anything.
	pub(crate) fn error(error: impl Into<Error>) -> Self {
		Self { inner: Err(error.into()) }
	}

	/// Build a query from an encoding result.
	pub(crate) fn try_new(
		dispatcher: &'a Dispatcher,
		command: Result<Command, Error>,
		response_timeout: Duration,
		decode: impl FnOnce(Vec<Status>) -> Result<T, Error> + Send + 'static,
	) -> Self {
		match command {
			Ok(command) => Self::new(dispatcher, command, response_timeout, decode),
			Err(e) => Self::error(e),
		}
	}

	/// Transform the value of the query once it arrives.
	pub fn map<U>(self, f: impl FnOnce(T) -> U + Send + 'static) -> Query<'a, U>
	where
		T: 'static,
		U: 'static,
	{
		match self.inner {
			Err(e) => Query::error(e),
			Ok(request) => {
				let decode = request.decode;
				Query::new(request.dispatcher, request.command, request.response_timeout, move |statuses| {
					decode(statuses).map(f)
				})
			},
		}
	}

	/// Send the request and block until the value arrives or the response timeout expires.
	pub fn wait(self) -> Result<T, Error> {
		let request = self.inner?;
		let slot = Arc::new(BlockingSlot::default());
		request
			.dispatcher
			.enqueue(request.command, Completion::Blocking(slot.clone()))?;
		match slot.wait(request.response_timeout) {
			Some(reply) => reply.and_then(request.decode),
			None => Err(ReceiveTimeout {
				timeout: request.response_timeout,
				received: 0,
			}
			.into()),
		}
	}

	/// Send the request and pass the value to `callback` once it arrives.
	///
	/// The callback runs on a separate thread, so it may issue new commands.
	/// Errors that prevent the request from being sent are returned directly,
	/// and the callback is not called in that case.
	pub fn on_reply<F>(self, callback: F) -> Result<(), Error>
	where
		F: FnOnce(Result<T, Error>) + Send + 'static,
		T: 'static,
	{
		let request = self.inner?;
		let decode = request.decode;
		let completion = Completion::Callback(Box::new(move |reply: RawReply| callback(reply.and_then(decode))));
		request.dispatcher.enqueue(request.command, completion)
	}
}

impl<T: 'static> IntoFuture for Query<'_, T> {
	type Output = Result<T, Error>;
	type IntoFuture = Reply<T>;

	/// Send the request, returning a future that resolves to the value.
	fn into_future(self) -> Reply<T> {
		let request = match self.inner {
			Ok(request) => request,
			Err(e) => return Reply::failed(e),
		};
		let (sender, receiver) = oneshot::channel();
		match request.dispatcher.enqueue(request.command, Completion::Future(sender)) {
			Ok(()) => Reply {
				inner: ReplyInner::Pending {
					receiver,
					decode: Some(request.decode),
				},
			},
			Err(e) => Reply::failed(e),
		}
	}
}

/// A future resolving to the value of a [`Query`].
///
/// The request is already queued when this future exists.
/// There is no response timeout here, but the dispatcher gives up on a silent bus after its framing timeout.
#[must_use = "futures do nothing unless polled"]
pub struct Reply<T> {
	inner: ReplyInner<T>,
}

enum ReplyInner<T> {
	Failed(Option<Error>),
	Pending {
		receiver: oneshot::Receiver<RawReply>,
		decode: Option<Decoder<T>>,
	},
}

impl<T> Reply<T> {
	fn failed(error: Error) -> Self {
		Self {
			inner: ReplyInner::Failed(Some(error)),
		}
	}
}

impl<T> Future for Reply<T> {
	type Output = Result<T, Error>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match &mut self.get_mut().inner {
			ReplyInner::Failed(error) => Poll::Ready(Err(error.take().unwrap_or(Error::Closed))),
			ReplyInner::Pending { receiver, decode } => match Pin::new(receiver).poll(cx) {
				Poll::Pending => Poll::Pending,
				// The request was dropped unsent when the driver was closed.
				Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(Error::Closed)),
				Poll::Ready(Ok(reply)) => match decode.take() {
					Some(decode) => Poll::Ready(reply.and_then(decode)),
					None => Poll::Ready(Err(Error::Closed)),
				},
			},
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use assert2::{assert, let_assert};

	#[test]
	fn test_blocking_slot_times_out() {
		let slot = BlockingSlot::default();
		assert!(slot.wait(Duration::from_millis(10)).is_none());
	}

	#[test]
	fn test_blocking_slot_wakes_waiter() {
		let slot = Arc::new(BlockingSlot::default());
		let completion = Completion::Blocking(slot.clone());
		let thread = std::thread::spawn(move || {
			std::thread::sleep(Duration::from_millis(20));
			completion.complete(Ok(vec![Status {
				servo_id: 4,
				data: vec![1],
			}]));
		});
		let_assert!(Some(Ok(statuses)) = slot.wait(Duration::from_secs(5)));
		assert!(statuses[0].servo_id == 4);
		thread.join().unwrap();
	}

	#[test]
	fn test_callback_runs_on_other_thread() {
		let (sender, receiver) = std::sync::mpsc::channel();
		let caller = std::thread::current().id();
		let completion = Completion::Callback(Box::new(move |reply: RawReply| {
			sender.send((std::thread::current().id(), reply.is_ok())).unwrap();
		}));
		completion.complete(Ok(Vec::new()));
		let_assert!(Ok((thread, true)) = receiver.recv_timeout(Duration::from_secs(5)));
		assert!(thread != caller);
	}

	#[test]
	fn test_future_resolves() {
		let (sender, receiver) = oneshot::channel();
		let reply: Reply<usize> = Reply {
			inner: ReplyInner::Pending {
				receiver,
				decode: Some(Box::new(|statuses: Vec<Status>| Ok(statuses.len()))),
			},
		};
		Completion::Future(sender).complete(Ok(Vec::new()));
		let_assert!(Ok(0) = futures::executor::block_on(reply));
	}

	#[test]
	fn test_dropped_future_sender_reports_closed() {
		let (sender, receiver) = oneshot::channel::<RawReply>();
		let reply: Reply<()> = Reply {
			inner: ReplyInner::Pending {
				receiver,
				decode: Some(Box::new(|_| Ok(()))),
			},
		};
		drop(sender);
		let_assert!(Err(Error::Closed) = futures::executor::block_on(reply));
	}
}
