//! Logging shim.
//!
//! Forwards to the `log` crate when the `log` feature is enabled,
//! and expands to nothing otherwise.

#[cfg(feature = "log")]
#[allow(unused)]
#[macro_use]
mod log {
	macro_rules! trace {
		($($args:tt)*) => { ::log::trace!(target: "gs2d", $($args)*) }
	}

	macro_rules! debug {
		($($args:tt)*) => { ::log::debug!(target: "gs2d", $($args)*) }
	}

	macro_rules! warn {
		($($args:tt)*) => { ::log::warn!(target: "gs2d", $($args)*) }
	}
}

#[cfg(not(feature = "log"))]
#[allow(unused)]
#[macro_use]
mod log {
	macro_rules! trace {
		($($args:tt)*) => {{ let _ = format_args!($($args)*); }}
	}

	macro_rules! debug {
		($($args:tt)*) => {{ let _ = format_args!($($args)*); }}
	}

	macro_rules! warn {
		($($args:tt)*) => {{ let _ = format_args!($($args)*); }}
	}
}
